//! Backend endpoint paths, relative to the configured API base URL.

use chrono::NaiveDate;

use crate::models::TrendPeriod;

pub const AUTH_LOGIN: &str = "/auth/login";
pub const AUTH_REFRESH: &str = "/auth/refresh";
pub const AUTH_REGISTER: &str = "/auth/register";

pub const HABITS: &str = "/habits";

pub const ENTRIES: &str = "/entries";
pub const ENTRIES_TODAY: &str = "/entries/today";

pub const ANALYTICS_TODAY: &str = "/analytics/today";

pub fn habit(id: &str) -> String {
    format!("/habits/{id}")
}

pub fn entries_for_date(date: NaiveDate) -> String {
    format!("/entries/date/{date}")
}

pub fn entries_for_week(week_start: NaiveDate) -> String {
    format!("/entries/week/{week_start}")
}

pub fn analytics_week(week_start: Option<NaiveDate>) -> String {
    match week_start {
        Some(start) => format!("/analytics/week/{start}"),
        None => "/analytics/week".to_string(),
    }
}

pub fn analytics_month(year_month: Option<(i32, u32)>) -> String {
    match year_month {
        Some((year, month)) => format!("/analytics/month/{year}/{month}"),
        None => "/analytics/month".to_string(),
    }
}

pub fn analytics_trends(period: TrendPeriod, lookback: u32) -> String {
    format!(
        "/analytics/trends?period={}&lookback={lookback}",
        period.as_str()
    )
}
