//! Wire types for the habit catalog and daily entries.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A habit in the user's catalog (`GET /habits`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Habit {
    pub category: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub display_order: i32,
    pub goal_threshold: u8,
    pub id: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub is_physical: bool,
    pub name: String,
    pub target_per_week: u8,
    pub weight: u8,
}

fn default_true() -> bool {
    true
}

/// Body of `POST /habits`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HabitDraft {
    pub category: String,
    pub goal_threshold: u8,
    pub is_physical: bool,
    pub name: String,
    pub target_per_week: u8,
    pub weight: u8,
}

impl HabitDraft {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

impl Default for HabitDraft {
    fn default() -> Self {
        Self {
            category: "general".to_string(),
            goal_threshold: 80,
            is_physical: false,
            name: String::new(),
            target_per_week: 7,
            weight: 5,
        }
    }
}

/// Body of `PUT /habits/{id}`. Unset fields are left untouched by the server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HabitUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_order: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goal_threshold: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_physical: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_per_week: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<u8>,
}

/// Catalog mutations. These are never applied optimistically.
#[derive(Debug, Clone, PartialEq)]
pub enum HabitMutation {
    Create(HabitDraft),
    Update { id: String, changes: HabitUpdate },
    Delete { id: String },
}

/// Body of `POST /entries` (create-or-update for a habit and day)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryRequest {
    pub completed: bool,
    pub entry_date: NaiveDate,
    pub habit_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// A stored daily entry as returned by `POST /entries`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub completed: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    pub entry_date: NaiveDate,
    pub habit_id: String,
    pub id: String,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Trend aggregation period for `GET /analytics/trends`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrendPeriod {
    #[default]
    Weekly,
    Monthly,
}

impl TrendPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrendPeriod::Weekly => "weekly",
            TrendPeriod::Monthly => "monthly",
        }
    }
}
