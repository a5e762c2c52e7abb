//! Listener registration and match event dispatch.
//!
//! The dispatcher owns listener callbacks keyed by match event and owner,
//! together with the last-matched-text cache. Callbacks for one owner fire
//! in registration order; owners fire in the order they first registered for
//! the event. Callbacks are snapshotted under the lock and invoked outside
//! it, so a listener may re-enter registration operations without
//! deadlocking, and a panicking listener never stops the remaining ones.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error};

use crate::error::{LogMatchError, LogMatchResult};

fn lock_err(context: &'static str) -> LogMatchError {
    LogMatchError::internal(format!("poisoned lock: {context}"))
}

/// A callback invoked with the matched line when its match event fires.
///
/// Implementations cross the scripting boundary, so the contract is a single
/// capability-style method. Any `Fn(&str) + Send + Sync` closure implements
/// it.
pub trait MatchListener: Send + Sync {
    /// Called synchronously with the full matched line.
    fn on_match(&self, matched: &str);
}

impl<F> MatchListener for F
where
    F: Fn(&str) + Send + Sync,
{
    fn on_match(&self, matched: &str) {
        self(matched);
    }
}

/// Last successful match recorded for an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LastMatch {
    /// Full text of the matched line.
    pub text: String,
    /// When the match was observed.
    pub matched_at: DateTime<Utc>,
}

/// Result of firing one match event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FireOutcome {
    /// Callbacks invoked, including ones that panicked.
    pub invoked: usize,
    /// Callbacks that panicked while handling the match.
    pub panicked: usize,
}

struct OwnerSlot {
    owner: String,
    callbacks: Vec<Arc<dyn MatchListener>>,
}

#[derive(Default)]
struct DispatchState {
    /// Owner slots per event, in first-registration order.
    listeners: HashMap<String, Vec<OwnerSlot>>,
    last_matches: HashMap<String, LastMatch>,
}

/// Owns listener callbacks and the last-match cache for all match events.
#[derive(Default)]
pub struct EventDispatcher {
    state: RwLock<DispatchState>,
}

impl EventDispatcher {
    /// Create a new empty dispatcher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `listener` to `owner`'s collection under `event`.
    ///
    /// There is no uniqueness constraint on callbacks: duplicate
    /// registrations accumulate and all fire.
    ///
    /// # Errors
    /// [`LogMatchError::Internal`] if the lock is poisoned.
    pub fn register(
        &self,
        owner: &str,
        event: &str,
        listener: Arc<dyn MatchListener>,
    ) -> LogMatchResult<()> {
        let mut state = self.state.write().map_err(|_| lock_err("dispatch.register"))?;
        let slots = state.listeners.entry(event.to_string()).or_default();
        if let Some(slot) = slots.iter_mut().find(|s| s.owner == owner) {
            slot.callbacks.push(listener);
        } else {
            slots.push(OwnerSlot {
                owner: owner.to_string(),
                callbacks: vec![listener],
            });
        }
        Ok(())
    }

    /// Remove `owner`'s entire callback collection from every event.
    ///
    /// Pattern registrations are untouched. Clearing an owner with nothing
    /// registered is an expected condition during script reloads and is only
    /// noted at debug severity.
    ///
    /// # Errors
    /// [`LogMatchError::Internal`] if the lock is poisoned.
    pub fn clear_owner(&self, owner: &str) -> LogMatchResult<usize> {
        let mut state = self.state.write().map_err(|_| lock_err("dispatch.clear"))?;
        let mut removed = 0;
        for slots in state.listeners.values_mut() {
            if let Some(idx) = slots.iter().position(|s| s.owner == owner) {
                removed += slots.remove(idx).callbacks.len();
            }
        }
        if removed == 0 {
            debug!(owner, "clear_listeners: owner had nothing registered");
        }
        Ok(removed)
    }

    /// Record the match and invoke every callback registered for `event`.
    ///
    /// The callback list is snapshotted under the lock and invoked after it
    /// is released. Each invocation is isolated: a panicking listener is
    /// logged with its owner context and the rest still run.
    ///
    /// # Errors
    /// [`LogMatchError::Internal`] if the lock is poisoned.
    pub fn fire(&self, event: &str, matched: &str) -> LogMatchResult<FireOutcome> {
        let snapshot: Vec<(String, Arc<dyn MatchListener>)> = {
            let mut state = self.state.write().map_err(|_| lock_err("dispatch.fire"))?;
            state.last_matches.insert(
                event.to_string(),
                LastMatch {
                    text: matched.to_string(),
                    matched_at: Utc::now(),
                },
            );
            state
                .listeners
                .get(event)
                .map(|slots| {
                    slots
                        .iter()
                        .flat_map(|slot| {
                            slot.callbacks
                                .iter()
                                .map(|cb| (slot.owner.clone(), Arc::clone(cb)))
                        })
                        .collect()
                })
                .unwrap_or_default()
        };

        let mut outcome = FireOutcome::default();
        for (owner, callback) in snapshot {
            outcome.invoked += 1;
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| {
                callback.on_match(matched);
            })) {
                outcome.panicked += 1;
                error!(
                    owner = %owner,
                    event = %event,
                    detail = panic_detail(payload.as_ref()),
                    "match listener panicked"
                );
            }
        }
        Ok(outcome)
    }

    /// Contents of the last line that fired `event`, if any.
    ///
    /// # Errors
    /// [`LogMatchError::Internal`] if the lock is poisoned.
    pub fn last_match(&self, event: &str) -> LogMatchResult<Option<String>> {
        let state = self.state.read().map_err(|_| lock_err("dispatch.last_match"))?;
        Ok(state.last_matches.get(event).map(|m| m.text.clone()))
    }

    /// Last match for `event` together with its timestamp.
    ///
    /// # Errors
    /// [`LogMatchError::Internal`] if the lock is poisoned.
    pub fn last_match_info(&self, event: &str) -> LogMatchResult<Option<LastMatch>> {
        let state = self.state.read().map_err(|_| lock_err("dispatch.last_match"))?;
        Ok(state.last_matches.get(event).cloned())
    }

    /// True when at least one callback is registered for any event.
    ///
    /// # Errors
    /// [`LogMatchError::Internal`] if the lock is poisoned.
    pub fn has_listeners(&self) -> LogMatchResult<bool> {
        let state = self.state.read().map_err(|_| lock_err("dispatch.has_listeners"))?;
        Ok(state
            .listeners
            .values()
            .any(|slots| slots.iter().any(|s| !s.callbacks.is_empty())))
    }

    /// Number of callbacks registered for `event` across all owners.
    ///
    /// # Errors
    /// [`LogMatchError::Internal`] if the lock is poisoned.
    pub fn listener_count(&self, event: &str) -> LogMatchResult<usize> {
        let state = self.state.read().map_err(|_| lock_err("dispatch.count"))?;
        Ok(state
            .listeners
            .get(event)
            .map(|slots| slots.iter().map(|s| s.callbacks.len()).sum())
            .unwrap_or(0))
    }
}

fn panic_detail(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
