//! Optimistic sync for today's habit completions.

mod engine;
mod in_flight;
mod view;

pub use engine::SyncEngine;
pub use in_flight::{InFlightGuard, InFlightSet};
pub use view::{completion_rate, HabitCompletionView, HabitEntryView};
