//! Bidirectional-unique registry of match events and their patterns.
//!
//! The registry is logically a bijection between match event names and
//! pattern source strings, enforced at insertion time. It is kept as one
//! state struct with a primary index (event name) and a secondary uniqueness
//! index (pattern source) so the two cannot drift apart.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::error::{LogMatchError, LogMatchResult, RegistryError};
use crate::pattern::MatchPattern;

fn lock_err(context: &'static str) -> LogMatchError {
    LogMatchError::internal(format!("poisoned lock: {context}"))
}

/// Outcome of a successful pattern insertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// A new event/pattern mapping was created.
    Inserted,
    /// The event was already registered with the identical pattern text.
    AlreadyRegistered,
}

/// Serializable summary of one registered match event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternInfo {
    /// Match event name.
    pub event: String,
    /// Pattern source text responsible for the event.
    pub pattern: String,
}

#[derive(Debug, Default)]
struct RegistryState {
    by_event: HashMap<String, MatchPattern>,
    sources: HashSet<String>,
}

/// Thread-safe registry enforcing the event-name/pattern bijection.
#[derive(Debug, Default)]
pub struct PatternRegistry {
    state: RwLock<RegistryState>,
}

impl PatternRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `pattern` as responsible for `event`.
    ///
    /// Re-registering an event with the identical pattern source is an
    /// idempotent no-op. Registering an existing event under any other
    /// source, or an existing source under any other event, is rejected
    /// without mutating the registry.
    ///
    /// # Errors
    /// [`RegistryError::EventNameTaken`] or [`RegistryError::PatternTaken`]
    /// on conflicts, [`LogMatchError::Internal`] if the lock is poisoned.
    pub fn insert(&self, event: &str, pattern: MatchPattern) -> LogMatchResult<InsertOutcome> {
        let mut state = self.state.write().map_err(|_| lock_err("registry.insert"))?;

        if let Some(existing) = state.by_event.get(event) {
            if existing.source() == pattern.source() {
                return Ok(InsertOutcome::AlreadyRegistered);
            }
            return Err(RegistryError::EventNameTaken {
                event: event.to_string(),
                existing: existing.source().to_string(),
            }
            .into());
        }

        if state.sources.contains(pattern.source()) {
            let holder = state
                .by_event
                .iter()
                .find(|(_, p)| p.source() == pattern.source())
                .map(|(e, _)| e.clone())
                .unwrap_or_default();
            return Err(RegistryError::PatternTaken {
                pattern: pattern.source().to_string(),
                event: holder,
            }
            .into());
        }

        state.sources.insert(pattern.source().to_string());
        state.by_event.insert(event.to_string(), pattern);
        Ok(InsertOutcome::Inserted)
    }

    /// Remove the mapping for `event`, returning its previous pattern source.
    ///
    /// Returns `Ok(None)` when the event was never registered; callers treat
    /// that as an expected condition, not a failure.
    ///
    /// # Errors
    /// [`LogMatchError::Internal`] if the lock is poisoned.
    pub fn remove(&self, event: &str) -> LogMatchResult<Option<String>> {
        let mut state = self.state.write().map_err(|_| lock_err("registry.remove"))?;
        let Some(pattern) = state.by_event.remove(event) else {
            return Ok(None);
        };
        state.sources.remove(pattern.source());
        Ok(Some(pattern.source().to_string()))
    }

    /// Every registered event whose pattern full-matches `line`.
    ///
    /// All patterns are tested; a line may trigger more than one event when
    /// distinct patterns both cover it.
    ///
    /// # Errors
    /// [`LogMatchError::Internal`] if the lock is poisoned.
    pub fn matching_events(&self, line: &str) -> LogMatchResult<Vec<String>> {
        let state = self.state.read().map_err(|_| lock_err("registry.match"))?;
        Ok(state
            .by_event
            .iter()
            .filter(|(_, pattern)| pattern.is_match(line))
            .map(|(event, _)| event.clone())
            .collect())
    }

    /// True when no patterns are registered.
    ///
    /// # Errors
    /// [`LogMatchError::Internal`] if the lock is poisoned.
    pub fn is_empty(&self) -> LogMatchResult<bool> {
        let state = self.state.read().map_err(|_| lock_err("registry.is_empty"))?;
        Ok(state.by_event.is_empty())
    }

    /// Number of registered match events.
    ///
    /// # Errors
    /// [`LogMatchError::Internal`] if the lock is poisoned.
    pub fn len(&self) -> LogMatchResult<usize> {
        let state = self.state.read().map_err(|_| lock_err("registry.len"))?;
        Ok(state.by_event.len())
    }

    /// Snapshot of all registered events and their pattern sources.
    ///
    /// # Errors
    /// [`LogMatchError::Internal`] if the lock is poisoned.
    pub fn snapshot(&self) -> LogMatchResult<Vec<PatternInfo>> {
        let state = self.state.read().map_err(|_| lock_err("registry.snapshot"))?;
        let mut infos: Vec<PatternInfo> = state
            .by_event
            .iter()
            .map(|(event, pattern)| PatternInfo {
                event: event.clone(),
                pattern: pattern.source().to_string(),
            })
            .collect();
        infos.sort_by(|a, b| a.event.cmp(&b.event));
        Ok(infos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(source: &str) -> MatchPattern {
        MatchPattern::compile(source).unwrap()
    }

    #[test]
    fn insert_then_reinsert_identical_is_idempotent() {
        let registry = PatternRegistry::new();
        let outcome = registry.insert("spawn_progress", pattern(r"Preparing spawn area: \d+%"));
        assert_eq!(outcome.unwrap(), InsertOutcome::Inserted);

        let outcome = registry.insert("spawn_progress", pattern(r"Preparing spawn area: \d+%"));
        assert_eq!(outcome.unwrap(), InsertOutcome::AlreadyRegistered);
        assert_eq!(registry.len().unwrap(), 1);
    }

    #[test]
    fn existing_event_with_different_pattern_is_rejected() {
        let registry = PatternRegistry::new();
        registry.insert("evt", pattern("original")).unwrap();

        let err = registry.insert("evt", pattern("changed")).unwrap_err();
        assert!(err.is_conflict());

        // Original mapping untouched.
        let snapshot = registry.snapshot().unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].pattern, "original");
    }

    #[test]
    fn existing_pattern_under_new_event_is_rejected() {
        let registry = PatternRegistry::new();
        registry.insert("evt1", pattern(r"Done \(\d+s\)!")).unwrap();

        let err = registry.insert("evt2", pattern(r"Done \(\d+s\)!")).unwrap_err();
        let LogMatchError::Registry(RegistryError::PatternTaken { event, .. }) = err else {
            panic!("expected PatternTaken, got {err:?}");
        };
        assert_eq!(event, "evt1");
        assert_eq!(registry.len().unwrap(), 1);
    }

    #[test]
    fn registered_event_rejects_pattern_owned_by_another_event() {
        // The bijection is strict: success for an already-registered event
        // requires the supplied source to equal that event's own source, even
        // when the source belongs to some other event.
        let registry = PatternRegistry::new();
        registry.insert("evt1", pattern("alpha")).unwrap();
        registry.insert("evt2", pattern("beta")).unwrap();

        let err = registry.insert("evt2", pattern("alpha")).unwrap_err();
        assert!(err.is_conflict());
        let snapshot = registry.snapshot().unwrap();
        assert_eq!(snapshot[1].pattern, "beta");
    }

    #[test]
    fn remove_returns_previous_source_and_frees_both_keys() {
        let registry = PatternRegistry::new();
        registry.insert("evt", pattern(r"\d+")).unwrap();

        assert_eq!(registry.remove("evt").unwrap().as_deref(), Some(r"\d+"));
        assert!(registry.is_empty().unwrap());

        // Both the name and the pattern source are immediately reusable.
        assert_eq!(
            registry.insert("other", pattern(r"\d+")).unwrap(),
            InsertOutcome::Inserted
        );
        assert_eq!(
            registry.insert("evt", pattern("fresh")).unwrap(),
            InsertOutcome::Inserted
        );
    }

    #[test]
    fn remove_unknown_event_is_none() {
        let registry = PatternRegistry::new();
        assert!(registry.remove("missing").unwrap().is_none());
        assert!(registry.is_empty().unwrap());
    }

    #[test]
    fn matching_events_tests_every_pattern() {
        let registry = PatternRegistry::new();
        registry
            .insert("done_exact", pattern(r"Done \(\d+\.\d+s\)!"))
            .unwrap();
        registry.insert("done_any", pattern(r"Done .*")).unwrap();
        registry.insert("unrelated", pattern(r"Saving chunks")).unwrap();

        let mut events = registry.matching_events("Done (3.2s)!").unwrap();
        events.sort();
        assert_eq!(events, vec!["done_any", "done_exact"]);
    }

    #[test]
    fn snapshot_is_sorted_by_event_name() {
        let registry = PatternRegistry::new();
        registry.insert("b_evt", pattern("b")).unwrap();
        registry.insert("a_evt", pattern("a")).unwrap();

        let snapshot = registry.snapshot().unwrap();
        assert_eq!(snapshot[0].event, "a_evt");
        assert_eq!(snapshot[1].event, "b_evt");
    }
}
