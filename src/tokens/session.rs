//! Session manager
//!
//! Sole owner of the bearer token pair. Attaches the access token to
//! outgoing requests and runs the refresh protocol against
//! `/auth/refresh`.

use std::sync::Arc;

use reqwest::{RequestBuilder, StatusCode};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::api::routes;
use crate::storage::{TokenPair, TokenStore};

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("Refresh request failed: {0}")]
    Network(#[source] reqwest::Error),
    #[error("Refresh rejected with status {0}")]
    Rejected(StatusCode),
    #[error("Malformed refresh response: {0}")]
    Malformed(#[source] reqwest::Error),
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

pub struct SessionManager {
    base_url: String,
    http: reqwest::Client,
    store: Arc<dyn TokenStore>,
    tokens: RwLock<Option<TokenPair>>,
    /// Serializes refresh attempts so concurrent 401s share one round-trip
    refresh_lock: Mutex<()>,
}

impl SessionManager {
    /// Create a session manager, restoring any pair persisted in `store`.
    pub fn new(
        base_url: impl Into<String>,
        http: reqwest::Client,
        store: Arc<dyn TokenStore>,
    ) -> Self {
        let restored = match store.load() {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, "Failed to read persisted tokens, starting signed out");
                None
            }
        };

        if restored.is_some() {
            debug!("Restored persisted session tokens");
        }

        Self {
            base_url: base_url.into(),
            http,
            store,
            tokens: RwLock::new(restored),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Add the access token as a bearer credential, if one is held.
    pub async fn attach_credentials(&self, request: RequestBuilder) -> RequestBuilder {
        match self.tokens.read().await.as_ref() {
            Some(pair) => request.bearer_auth(&pair.access_token),
            None => request,
        }
    }

    pub async fn is_authenticated(&self) -> bool {
        self.tokens.read().await.is_some()
    }

    pub(crate) async fn access_token(&self) -> Option<String> {
        self.tokens
            .read()
            .await
            .as_ref()
            .map(|pair| pair.access_token.clone())
    }

    #[cfg(test)]
    pub(crate) async fn tokens(&self) -> Option<TokenPair> {
        self.tokens.read().await.clone()
    }

    /// Replace the held pair and its persisted copy.
    pub async fn set_tokens(&self, pair: TokenPair) {
        if let Err(e) = self.store.save(&pair) {
            warn!(error = %e, "Failed to persist session tokens");
        }
        *self.tokens.write().await = Some(pair);
    }

    /// Erase the held pair and its persisted copy.
    pub async fn clear(&self) {
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Failed to clear persisted session tokens");
        }
        if self.tokens.write().await.take().is_some() {
            info!("Session cleared");
        }
    }

    /// Exchange the held refresh token for a new pair.
    ///
    /// Returns false without any network call when no refresh token is held.
    /// On failure the existing pair is left untouched; clearing it is the
    /// caller's decision. There is no internal retry. If the pair was
    /// replaced while the call was out, the new pair is discarded and the
    /// result tells whether a pair is still held.
    pub async fn refresh(&self) -> bool {
        let _guard = self.refresh_lock.lock().await;
        self.refresh_locked().await
    }

    /// Refresh after `rejected` was answered with a 401.
    ///
    /// If another caller already replaced the access token while this one
    /// waited for the refresh lock, the new token is used as-is and no
    /// second refresh call is made.
    pub async fn refresh_after(&self, rejected: Option<&str>) -> bool {
        let _guard = self.refresh_lock.lock().await;

        if let Some(current) = self.access_token().await {
            if Some(current.as_str()) != rejected {
                debug!("Access token already renewed by a concurrent refresh");
                return true;
            }
        }

        self.refresh_locked().await
    }

    async fn refresh_locked(&self) -> bool {
        let refresh_token = match self.tokens.read().await.as_ref() {
            Some(pair) => pair.refresh_token.clone(),
            None => {
                debug!("No refresh token held, skipping refresh");
                return false;
            }
        };

        let pair = match self.request_refresh(&refresh_token).await {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, "Token refresh failed");
                return false;
            }
        };

        // A login or logout during the round-trip wins over the late refresh.
        // The caller can go on with whatever pair is held now.
        let mut tokens = self.tokens.write().await;
        match tokens.as_ref() {
            Some(held) if held.refresh_token == refresh_token => {
                if let Err(e) = self.store.save(&pair) {
                    warn!(error = %e, "Failed to persist refreshed tokens");
                }
                *tokens = Some(pair);
                debug!("Token pair refreshed");
                true
            }
            held => {
                debug!("Session changed during refresh, discarding new tokens");
                held.is_some()
            }
        }
    }

    async fn request_refresh(&self, refresh_token: &str) -> Result<TokenPair, RefreshError> {
        let url = format!("{}{}", self.base_url, routes::AUTH_REFRESH);

        let response = self
            .http
            .post(&url)
            .json(&RefreshRequest { refresh_token })
            .send()
            .await
            .map_err(RefreshError::Network)?;

        let status = response.status();
        if !status.is_success() {
            return Err(RefreshError::Rejected(status));
        }

        response
            .json::<TokenPair>()
            .await
            .map_err(RefreshError::Malformed)
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("base_url", &self.base_url)
            .finish()
    }
}
