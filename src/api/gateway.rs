//! Request gateway
//!
//! Every backend call goes through [`RequestGateway::send`]. The gateway
//! attaches the session's bearer credential, recovers from a single 401 by
//! asking the session manager to refresh, and translates transport and
//! HTTP failures into [`GatewayError`].

use std::sync::Arc;

use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::response::{failure_from_response, GatewayError};
use crate::tokens::SessionManager;

/// Upper bound on automatic re-sends after a token refresh.
const MAX_AUTH_RETRIES: usize = 1;

pub struct RequestGateway {
    base_url: String,
    http: reqwest::Client,
    session: Arc<SessionManager>,
}

impl RequestGateway {
    pub fn new(
        base_url: impl Into<String>,
        http: reqwest::Client,
        session: Arc<SessionManager>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            http,
            session,
        }
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    /// Send an authenticated request.
    ///
    /// Returns `None` for a 204 response and the parsed body otherwise. A 401
    /// triggers one refresh; when it succeeds the request is rebuilt with the
    /// new credential and sent once more, and a second 401 is returned as a
    /// plain `Request` failure. When the refresh fails the session is cleared
    /// and `SessionExpired` is returned.
    pub async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&B>,
    ) -> Result<Option<Value>, GatewayError> {
        let payload = body.map(serde_json::to_vec).transpose()?;

        let mut attempt = 0;
        loop {
            let presented = self.session.access_token().await;
            let request = self
                .session
                .attach_credentials(self.build(&method, endpoint, payload.as_deref()))
                .await;

            let response = request.send().await.map_err(GatewayError::Network)?;

            if response.status() != StatusCode::UNAUTHORIZED {
                return read_body(response).await;
            }

            if attempt == MAX_AUTH_RETRIES {
                warn!(%method, endpoint, "Request rejected again after token refresh");
                return Err(failure_from_response(response).await);
            }

            if !self.session.refresh_after(presented.as_deref()).await {
                warn!(%method, endpoint, "Token refresh failed, ending session");
                self.session.clear().await;
                return Err(GatewayError::SessionExpired);
            }

            attempt += 1;
            debug!(%method, endpoint, attempt, "Retrying request with refreshed credentials");
        }
    }

    /// Send a request without credentials or 401 recovery.
    ///
    /// Used for the issuance endpoints, where a 401 means bad credentials
    /// rather than an expired session.
    pub async fn send_public<B: Serialize + ?Sized>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&B>,
    ) -> Result<Option<Value>, GatewayError> {
        let payload = body.map(serde_json::to_vec).transpose()?;
        let response = self
            .build(&method, endpoint, payload.as_deref())
            .send()
            .await
            .map_err(GatewayError::Network)?;

        read_body(response).await
    }

    /// Authenticated request with a typed response body.
    pub async fn send_json<B, R>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&B>,
    ) -> Result<R, GatewayError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let value = self.send(method, endpoint, body).await?;
        Ok(serde_json::from_value(value.unwrap_or(Value::Null))?)
    }

    /// Authenticated GET with a typed response body.
    pub async fn get<R: DeserializeOwned>(&self, endpoint: &str) -> Result<R, GatewayError> {
        self.send_json::<(), R>(Method::GET, endpoint, None).await
    }

    fn build(&self, method: &Method, endpoint: &str, payload: Option<&[u8]>) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, endpoint);
        let builder = self.http.request(method.clone(), url);

        match payload {
            Some(bytes) => builder
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(bytes.to_vec()),
            None => builder,
        }
    }
}

impl std::fmt::Debug for RequestGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestGateway")
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Map a non-401 response to the gateway result.
async fn read_body(response: reqwest::Response) -> Result<Option<Value>, GatewayError> {
    let status = response.status();

    if !status.is_success() {
        return Err(failure_from_response(response).await);
    }

    if status == StatusCode::NO_CONTENT {
        return Ok(None);
    }

    let bytes = response.bytes().await.map_err(GatewayError::Network)?;
    Ok(Some(serde_json::from_slice(&bytes)?))
}
