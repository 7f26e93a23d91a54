use chrono::NaiveDate;
use reqwest::Method;

use crate::api::gateway::RequestGateway;
use crate::api::response::GatewayError;
use crate::api::routes;
use crate::models::{Entry, EntryRequest};
use crate::sync::HabitCompletionView;

pub async fn today_entries(gateway: &RequestGateway) -> Result<HabitCompletionView, GatewayError> {
    gateway.get(routes::ENTRIES_TODAY).await
}

pub async fn date_entries(
    gateway: &RequestGateway,
    date: NaiveDate,
) -> Result<HabitCompletionView, GatewayError> {
    gateway.get(&routes::entries_for_date(date)).await
}

/// Seven consecutive days starting at `week_start`.
pub async fn week_entries(
    gateway: &RequestGateway,
    week_start: NaiveDate,
) -> Result<Vec<HabitCompletionView>, GatewayError> {
    gateway.get(&routes::entries_for_week(week_start)).await
}

/// Create or update the entry for a habit and day.
pub async fn create_entry(
    gateway: &RequestGateway,
    request: &EntryRequest,
) -> Result<Entry, GatewayError> {
    gateway
        .send_json(Method::POST, routes::ENTRIES, Some(request))
        .await
}
