use redb::TableDefinition;

/// Persisted bearer credentials: slot name -> token value
pub const SESSION_TOKENS: TableDefinition<&str, &str> = TableDefinition::new("session_tokens");

/// Slot holding the short-lived access token
pub const ACCESS_TOKEN_SLOT: &str = "access_token";

/// Slot holding the long-lived refresh token
pub const REFRESH_TOKEN_SLOT: &str = "refresh_token";
