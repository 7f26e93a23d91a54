use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::api::gateway::RequestGateway;
use crate::api::response::GatewayError;
use crate::api::routes;
use crate::storage::TokenPair;

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct RegisterRequest<'a> {
    email: &'a str,
    name: &'a str,
    password: &'a str,
}

/// Log in and hand the issued pair to the session manager.
pub async fn login(
    gateway: &RequestGateway,
    email: &str,
    password: &str,
) -> Result<(), GatewayError> {
    let body = LoginRequest { email, password };
    let value = gateway
        .send_public(Method::POST, routes::AUTH_LOGIN, Some(&body))
        .await?;

    install_pair(gateway, value).await?;
    info!("Logged in");
    Ok(())
}

/// Create an account; the backend signs the new user in directly.
pub async fn register(
    gateway: &RequestGateway,
    email: &str,
    password: &str,
    name: &str,
) -> Result<(), GatewayError> {
    let body = RegisterRequest {
        email,
        name,
        password,
    };
    let value = gateway
        .send_public(Method::POST, routes::AUTH_REGISTER, Some(&body))
        .await?;

    install_pair(gateway, value).await?;
    info!("Registered and logged in");
    Ok(())
}

async fn install_pair(gateway: &RequestGateway, value: Option<Value>) -> Result<(), GatewayError> {
    let pair: TokenPair = serde_json::from_value(value.unwrap_or(Value::Null))?;
    gateway.session().set_tokens(pair).await;
    Ok(())
}
