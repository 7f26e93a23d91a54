use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Habit ids with a toggle awaiting server confirmation.
///
/// Overlapping toggles of the same id are counted, so the id stays listed
/// until every one of them has resolved. Membership is released through
/// [`InFlightGuard`], which removes its own registration exactly once when
/// dropped, whatever the outcome of the request.
#[derive(Debug, Default)]
pub struct InFlightSet {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    /// Bumped by `reset`; guards from an older epoch release nothing
    epoch: u64,
    pending: HashMap<String, usize>,
}

impl InFlightSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register one in-flight toggle for `habit_id`.
    pub fn insert(&self, habit_id: &str) -> InFlightGuard<'_> {
        let mut inner = self.lock();
        *inner.pending.entry(habit_id.to_string()).or_default() += 1;
        InFlightGuard {
            epoch: inner.epoch,
            habit_id: habit_id.to_string(),
            set: self,
        }
    }

    pub fn contains(&self, habit_id: &str) -> bool {
        self.lock().pending.contains_key(habit_id)
    }

    /// Number of unresolved toggles for `habit_id`
    pub fn count(&self, habit_id: &str) -> usize {
        self.lock().pending.get(habit_id).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.lock().pending.is_empty()
    }

    /// Snapshot of the in-flight ids, sorted
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.lock().pending.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Forget all tracking. Outstanding guards become inert.
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.epoch += 1;
        inner.pending.clear();
    }

    fn release(&self, habit_id: &str, epoch: u64) {
        let mut inner = self.lock();
        if inner.epoch != epoch {
            return;
        }
        if let Some(count) = inner.pending.get_mut(habit_id) {
            *count -= 1;
            if *count == 0 {
                inner.pending.remove(habit_id);
            }
        }
    }
}

/// One registration in an [`InFlightSet`], released on drop.
#[must_use = "dropping the guard immediately ends in-flight tracking"]
#[derive(Debug)]
pub struct InFlightGuard<'a> {
    epoch: u64,
    habit_id: String,
    set: &'a InFlightSet,
}

impl InFlightGuard<'_> {
    pub fn habit_id(&self) -> &str {
        &self.habit_id
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.set.release(&self.habit_id, self.epoch);
    }
}
