use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// Message used when the server gives no usable failure text
pub const GENERIC_FAILURE: &str = "Request failed";

// ============================================================================
// Gateway error taxonomy
// ============================================================================

/// Every failure a gateway call can produce.
///
/// The gateway is the only place transport and HTTP failures are
/// translated into these variants; callers above it forward them as-is.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Transport failure, no response from the server
    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),
    /// The server answered with a failure status
    #[error("{message}")]
    Request { status: StatusCode, message: String },
    /// A 401 could not be recovered by refreshing the token pair.
    /// The session has already been cleared.
    #[error("Session expired")]
    SessionExpired,
    /// A success response whose body is not the expected JSON
    #[error("Malformed response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl GatewayError {
    pub fn is_session_expired(&self) -> bool {
        matches!(self, GatewayError::SessionExpired)
    }

    /// HTTP status for server-side failures
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            GatewayError::Request { status, .. } => Some(*status),
            _ => None,
        }
    }
}

// ============================================================================
// Backend error bodies
// ============================================================================

/// Failure body produced by the backend's error handlers.
///
/// Application errors carry `{"error": CODE, "message": TEXT}`; framework
/// validation errors carry `{"detail": TEXT | [{"msg": TEXT, ...}]}`.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub detail: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorBody {
    /// The most specific human-readable message in the body, if any
    pub fn into_message(self) -> Option<String> {
        if let Some(message) = self.message.filter(|m| !m.is_empty()) {
            return Some(message);
        }

        match self.detail? {
            serde_json::Value::String(s) if !s.is_empty() => Some(s),
            serde_json::Value::Array(items) => items
                .first()
                .and_then(|item| item.get("msg"))
                .and_then(|msg| msg.as_str())
                .map(str::to_string),
            _ => None,
        }
    }
}

/// Build a `GatewayError::Request` from a raw failure body.
pub fn request_failure(status: StatusCode, body: &[u8]) -> GatewayError {
    let message = serde_json::from_slice::<ErrorBody>(body)
        .ok()
        .and_then(ErrorBody::into_message)
        .unwrap_or_else(|| GENERIC_FAILURE.to_string());

    GatewayError::Request { status, message }
}

/// Consume a failure response into a `GatewayError::Request`.
///
/// A body that cannot be read is treated like an empty one: the status is
/// what matters.
pub async fn failure_from_response(response: reqwest::Response) -> GatewayError {
    let status = response.status();
    let body = response.bytes().await.unwrap_or_default();
    request_failure(status, &body)
}
