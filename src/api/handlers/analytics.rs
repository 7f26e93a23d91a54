//! Read-only analytics. Bodies are passed through untyped; the aggregates
//! are computed and shaped by the backend.

use chrono::NaiveDate;
use serde_json::Value;

use crate::api::gateway::RequestGateway;
use crate::api::response::GatewayError;
use crate::api::routes;
use crate::models::TrendPeriod;

pub async fn today_stats(gateway: &RequestGateway) -> Result<Value, GatewayError> {
    gateway.get(routes::ANALYTICS_TODAY).await
}

/// Current week when `week_start` is `None`.
pub async fn week_analytics(
    gateway: &RequestGateway,
    week_start: Option<NaiveDate>,
) -> Result<Value, GatewayError> {
    gateway.get(&routes::analytics_week(week_start)).await
}

/// Current month when `year_month` is `None`.
pub async fn month_analytics(
    gateway: &RequestGateway,
    year_month: Option<(i32, u32)>,
) -> Result<Value, GatewayError> {
    gateway.get(&routes::analytics_month(year_month)).await
}

pub async fn trends(
    gateway: &RequestGateway,
    period: TrendPeriod,
    lookback: u32,
) -> Result<Value, GatewayError> {
    gateway.get(&routes::analytics_trends(period, lookback)).await
}
