//! Optimistic sync engine
//!
//! Holds today's completion view and applies toggles to it before the
//! server answers. Each applied toggle is recorded per habit, oldest
//! first, so a failure can be undone for that one habit without touching
//! toggles of other habits that are still in flight or already confirmed.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::in_flight::InFlightSet;
use super::view::HabitCompletionView;
use crate::api::handlers;
use crate::api::{GatewayError, RequestGateway};
use crate::models::{EntryRequest, Habit, HabitMutation};

pub struct SyncEngine {
    gateway: Arc<RequestGateway>,
    in_flight: InFlightSet,
    state: RwLock<EngineState>,
}

#[derive(Debug, Default)]
struct EngineState {
    /// Bumped whenever the view is replaced or torn down
    generation: u64,
    habits: Vec<Habit>,
    next_sequence: u64,
    /// Unresolved optimistic toggles per habit, oldest first
    pending: HashMap<String, Vec<PendingToggle>>,
    view: Option<HabitCompletionView>,
}

#[derive(Debug)]
struct PendingToggle {
    /// Value to fall back to if this toggle fails
    previous: bool,
    sequence: u64,
    value: bool,
}

/// Handle on a toggle that was applied to the held view
#[derive(Debug, Clone, Copy)]
struct AppliedToggle {
    generation: u64,
    sequence: u64,
}

#[derive(Debug, PartialEq)]
enum Settled {
    Confirmed,
    RolledBack(bool),
    /// A later toggle of the same habit owns the displayed value
    Superseded,
    /// The view was replaced or the toggle was already settled
    Stale,
}

impl EngineState {
    fn settle(&mut self, habit_id: &str, toggle: AppliedToggle, confirmed: bool) -> Settled {
        if toggle.generation != self.generation {
            return Settled::Stale;
        }
        let Some(stack) = self.pending.get_mut(habit_id) else {
            return Settled::Stale;
        };
        let Some(index) = stack.iter().position(|t| t.sequence == toggle.sequence) else {
            return Settled::Stale;
        };

        let settled = if confirmed {
            // Everything sent before a confirmed toggle is moot now.
            let value = stack[index].value;
            stack.drain(..=index);
            if let Some(next) = stack.first_mut() {
                next.previous = value;
            }
            Settled::Confirmed
        } else {
            let failed = stack.remove(index);
            match stack.get_mut(index) {
                Some(next) => {
                    next.previous = failed.previous;
                    Settled::Superseded
                }
                None => {
                    if let Some(view) = self.view.as_mut() {
                        view.set_completed(habit_id, failed.previous);
                    }
                    Settled::RolledBack(failed.previous)
                }
            }
        };

        if stack.is_empty() {
            self.pending.remove(habit_id);
        }
        settled
    }
}

impl SyncEngine {
    pub fn new(gateway: Arc<RequestGateway>) -> Self {
        Self {
            gateway,
            in_flight: InFlightSet::new(),
            state: RwLock::new(EngineState::default()),
        }
    }

    // ========================================================================
    // Authoritative fetches
    // ========================================================================

    /// Fetch today's view and replace the held one wholesale.
    ///
    /// On failure the held view is left as it was. Toggles still in flight
    /// against the previous view are discarded when they resolve.
    pub async fn load_today(&self) -> Result<HabitCompletionView, GatewayError> {
        let mut view = handlers::today_entries(&self.gateway).await?;
        view.recompute();

        let mut state = self.state.write().await;
        state.generation += 1;
        state.pending.clear();
        state.view = Some(view.clone());

        debug!(generation = state.generation, date = %view.date, "Loaded today's view");
        Ok(view)
    }

    /// Fetch the habit catalog and replace the cached one.
    pub async fn load_habits(&self) -> Result<Vec<Habit>, GatewayError> {
        let habits = handlers::list_habits(&self.gateway).await?;
        self.state.write().await.habits = habits.clone();
        Ok(habits)
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Mark a habit completed or not for `date`, optimistically.
    ///
    /// The held view is updated and the habit registered as in flight before
    /// the request is sent. On failure this habit's flag falls back to what
    /// it was before the toggle (unless a later toggle of the same habit now
    /// owns it) and the error is returned unchanged. Without a held view, or
    /// for a habit the view does not list, this is a no-op.
    pub async fn toggle(
        &self,
        habit_id: &str,
        date: NaiveDate,
        completed: bool,
    ) -> Result<(), GatewayError> {
        let (applied, guard) = {
            let mut guard = self.state.write().await;
            let state = &mut *guard;
            let generation = state.generation;

            let Some(view) = state.view.as_mut() else {
                debug!(habit_id, "No view held, ignoring toggle");
                return Ok(());
            };

            let applied = if view.date == date {
                let Some(previous) = view.set_completed(habit_id, completed) else {
                    debug!(habit_id, "Habit not in today's view, ignoring toggle");
                    return Ok(());
                };

                state.next_sequence += 1;
                let sequence = state.next_sequence;
                state
                    .pending
                    .entry(habit_id.to_string())
                    .or_default()
                    .push(PendingToggle {
                        previous,
                        sequence,
                        value: completed,
                    });

                Some(AppliedToggle {
                    generation,
                    sequence,
                })
            } else {
                debug!(habit_id, %date, "Toggle for another day, sending without local update");
                None
            };

            (applied, self.in_flight.insert(habit_id))
        };

        let request = EntryRequest {
            completed,
            entry_date: date,
            habit_id: habit_id.to_string(),
            notes: None,
        };
        let result = handlers::create_entry(&self.gateway, &request).await;

        if let Some(toggle) = applied {
            let settled = self
                .state
                .write()
                .await
                .settle(habit_id, toggle, result.is_ok());

            match (&result, settled) {
                (Err(e), Settled::RolledBack(restored)) => {
                    warn!(habit_id, error = %e, restored, "Toggle failed, rolled back");
                }
                (Err(e), settled) => {
                    warn!(habit_id, error = %e, ?settled, "Toggle failed, nothing to roll back");
                }
                (Ok(_), Settled::Stale) => {
                    debug!(habit_id, "Confirmation for a replaced view discarded");
                }
                (Ok(_), _) => debug!(habit_id, completed, "Toggle confirmed"),
            }
        }

        drop(guard);
        result.map(|_| ())
    }

    /// Create, update or delete a catalog habit, then re-fetch the catalog
    /// and today's view. Nothing is applied locally beforehand.
    pub async fn mutate(&self, mutation: HabitMutation) -> Result<(), GatewayError> {
        match &mutation {
            HabitMutation::Create(draft) => {
                let habit = handlers::create_habit(&self.gateway, draft).await?;
                debug!(id = %habit.id, name = %habit.name, "Created habit");
            }
            HabitMutation::Update { id, changes } => {
                handlers::update_habit(&self.gateway, id, changes).await?;
                debug!(%id, "Updated habit");
            }
            HabitMutation::Delete { id } => {
                handlers::delete_habit(&self.gateway, id).await?;
                debug!(%id, "Deleted habit");
            }
        }

        self.load_habits().await?;
        self.load_today().await?;
        Ok(())
    }

    /// Drop all held state. Used on logout.
    pub async fn reset(&self) {
        let mut state = self.state.write().await;
        *state = EngineState {
            generation: state.generation + 1,
            next_sequence: state.next_sequence,
            ..Default::default()
        };
        self.in_flight.reset();
    }

    // ========================================================================
    // Read accessors
    // ========================================================================

    pub async fn view(&self) -> Option<HabitCompletionView> {
        self.state.read().await.view.clone()
    }

    pub async fn habits(&self) -> Vec<Habit> {
        self.state.read().await.habits.clone()
    }

    pub async fn generation(&self) -> u64 {
        self.state.read().await.generation
    }

    pub fn is_in_flight(&self, habit_id: &str) -> bool {
        self.in_flight.contains(habit_id)
    }

    pub fn in_flight(&self) -> &InFlightSet {
        &self.in_flight
    }
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("in_flight", &self.in_flight.ids())
            .finish()
    }
}
