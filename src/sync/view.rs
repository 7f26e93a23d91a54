use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One habit's status within a day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HabitEntryView {
    pub category: String,
    pub completed: bool,
    #[serde(default)]
    pub entry_id: Option<String>,
    pub habit_id: String,
    pub is_physical: bool,
    #[serde(rename = "habit_name")]
    pub name: String,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Per-day completion aggregate, as served by `/entries/today`.
///
/// The aggregates always agree with `entries`:
/// `completion_count` counts completed entries, `completion_rate` is
/// `100 * completion_count / max(total_habits, 1)`, and `physical_completed`
/// is set when any physical entry is completed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HabitCompletionView {
    pub completion_count: u32,
    pub completion_rate: f64,
    pub date: NaiveDate,
    #[serde(rename = "habits")]
    pub entries: Vec<HabitEntryView>,
    #[serde(default)]
    pub physical_completed: bool,
    pub total_habits: u32,
}

pub fn completion_rate(completion_count: u32, total_habits: u32) -> f64 {
    100.0 * f64::from(completion_count) / f64::from(total_habits.max(1))
}

impl HabitCompletionView {
    pub fn entry(&self, habit_id: &str) -> Option<&HabitEntryView> {
        self.entries.iter().find(|e| e.habit_id == habit_id)
    }

    /// Set one entry's flag and recompute the aggregates.
    ///
    /// Returns the previous flag, or `None` if the habit is not in the view.
    pub fn set_completed(&mut self, habit_id: &str, completed: bool) -> Option<bool> {
        let entry = self.entries.iter_mut().find(|e| e.habit_id == habit_id)?;
        let previous = std::mem::replace(&mut entry.completed, completed);
        self.recompute();
        Some(previous)
    }

    /// Re-derive the aggregates from `entries`. `total_habits` is kept as
    /// served.
    pub fn recompute(&mut self) {
        self.completion_count = self.entries.iter().filter(|e| e.completed).count() as u32;
        self.physical_completed = self.entries.iter().any(|e| e.completed && e.is_physical);
        self.completion_rate = completion_rate(self.completion_count, self.total_habits);
    }

    /// Whether the habit may be newly marked complete.
    ///
    /// At most one physical habit counts per day, so a physical habit is
    /// locked once another physical habit is done. The server remains the
    /// authority; this only mirrors its rule for display.
    pub fn can_complete(&self, habit_id: &str) -> bool {
        match self.entry(habit_id) {
            Some(entry) => entry.completed || !(entry.is_physical && self.physical_completed),
            None => false,
        }
    }
}
