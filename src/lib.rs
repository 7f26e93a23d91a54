//! habit-sync - Client-side session and optimistic sync core for a habit tracker
//!
//! This crate talks to the habit tracker REST backend and provides:
//! - A session manager owning the bearer token pair, with refresh on 401
//! - A request gateway that retries a rejected call exactly once
//! - An optimistic sync engine for today's completion view, with
//!   per-habit in-flight tracking and rollback on failure
//! - redb-backed token persistence, so a session survives restarts

pub mod api;
pub mod config;
pub mod models;
pub mod storage;
pub mod sync;
#[cfg(test)]
pub mod testutil;
pub mod tokens;

use std::sync::Arc;

use api::{handlers, GatewayError, RequestGateway};
use config::Config;
use storage::TokenStore;
use sync::SyncEngine;
use tokens::SessionManager;

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub engine: SyncEngine,
    pub gateway: Arc<RequestGateway>,
    pub session: Arc<SessionManager>,
}

impl AppState {
    /// Wire the session, gateway and engine over one HTTP client built from
    /// `config`. Any pair persisted in `store` is resumed.
    pub fn new(config: Config, store: Arc<dyn TokenStore>) -> Result<Self, reqwest::Error> {
        let http = config.http_client()?;
        Ok(Self::with_client(config, store, http))
    }

    pub fn with_client(config: Config, store: Arc<dyn TokenStore>, http: reqwest::Client) -> Self {
        let session = Arc::new(SessionManager::new(
            &config.api.base_url,
            http.clone(),
            store,
        ));
        let gateway = Arc::new(RequestGateway::new(
            &config.api.base_url,
            http,
            Arc::clone(&session),
        ));
        let engine = SyncEngine::new(Arc::clone(&gateway));

        Self {
            config,
            engine,
            gateway,
            session,
        }
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<(), GatewayError> {
        handlers::login(&self.gateway, email, password).await
    }

    pub async fn register(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<(), GatewayError> {
        handlers::register(&self.gateway, email, password, name).await
    }

    /// Drop the token pair and everything held for it.
    pub async fn logout(&self) {
        self.session.clear().await;
        self.engine.reset().await;
    }

    /// Tear the session down if `error` reports it expired.
    ///
    /// The gateway already dropped the tokens; this also drops the held
    /// view so nothing from the old session lingers.
    pub async fn end_if_expired(&self, error: &GatewayError) -> bool {
        if error.is_session_expired() {
            self.logout().await;
            true
        } else {
            false
        }
    }
}
