//! Typed wrappers over the backend endpoints.

mod analytics;
mod auth;
mod entries;
mod habits;

pub use analytics::{month_analytics, today_stats, trends, week_analytics};
pub use auth::{login, register};
pub use entries::{create_entry, date_entries, today_entries, week_entries};
pub use habits::{create_habit, delete_habit, list_habits, update_habit};
