use reqwest::Method;

use crate::api::gateway::RequestGateway;
use crate::api::response::GatewayError;
use crate::api::routes;
use crate::models::{Habit, HabitDraft, HabitUpdate};

pub async fn list_habits(gateway: &RequestGateway) -> Result<Vec<Habit>, GatewayError> {
    gateway.get(routes::HABITS).await
}

pub async fn create_habit(
    gateway: &RequestGateway,
    draft: &HabitDraft,
) -> Result<Habit, GatewayError> {
    gateway
        .send_json(Method::POST, routes::HABITS, Some(draft))
        .await
}

pub async fn update_habit(
    gateway: &RequestGateway,
    id: &str,
    changes: &HabitUpdate,
) -> Result<Habit, GatewayError> {
    gateway
        .send_json(Method::PUT, &routes::habit(id), Some(changes))
        .await
}

pub async fn delete_habit(gateway: &RequestGateway, id: &str) -> Result<(), GatewayError> {
    gateway
        .send::<()>(Method::DELETE, &routes::habit(id), None)
        .await
        .map(|_| ())
}
