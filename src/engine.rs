//! Match engine tying the tailer, pattern registry, and dispatcher together.
//!
//! [`LogMatchEngine`] is the single owned instance a host constructs at
//! startup and hands (by `Arc`) to its scripting/plugin binding layer. The
//! host's own scheduler drives [`check_log`](LogMatchEngine::check_log) on a
//! fixed cadence; registration operations may be called from other threads
//! concurrently with a poll in progress.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use crate::dispatcher::{EventDispatcher, LastMatch, MatchListener};
use crate::error::{LogMatchResult, RegistryError};
use crate::pattern::MatchPattern;
use crate::registry::{InsertOutcome, PatternInfo, PatternRegistry};
use crate::tailer::LogTailer;

/// Supplies the path of the live log file.
///
/// The host owns the log lifecycle; it may report no active target at any
/// time, in which case polling is a cheap no-op.
pub trait LogTarget: Send + Sync {
    /// Path of the log file to tail, or `None` when no target is active.
    fn active_log(&self) -> Option<PathBuf>;
}

/// Fixed-path target for hosts with a single well-known log file.
#[derive(Debug, Clone)]
pub struct StaticLogTarget {
    path: PathBuf,
}

impl StaticLogTarget {
    /// Create a target that always reports `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl LogTarget for StaticLogTarget {
    fn active_log(&self) -> Option<PathBuf> {
        Some(self.path.clone())
    }
}

/// Counters for engine activity.
#[derive(Debug, Default)]
pub struct EngineMetrics {
    polls: AtomicU64,
    lines_scanned: AtomicU64,
    events_fired: AtomicU64,
    listener_panics: AtomicU64,
}

impl EngineMetrics {
    /// Polls that got past the fast-path emptiness checks.
    #[must_use]
    pub fn polls(&self) -> u64 {
        self.polls.load(Ordering::Relaxed)
    }

    /// Non-blank lines tested against the registry.
    #[must_use]
    pub fn lines_scanned(&self) -> u64 {
        self.lines_scanned.load(Ordering::Relaxed)
    }

    /// Match events fired.
    #[must_use]
    pub fn events_fired(&self) -> u64 {
        self.events_fired.load(Ordering::Relaxed)
    }

    /// Listener callbacks that panicked during dispatch.
    #[must_use]
    pub fn listener_panics(&self) -> u64 {
        self.listener_panics.load(Ordering::Relaxed)
    }
}

/// The log match engine.
///
/// Construct once per host session and share behind an `Arc`; all methods
/// take `&self`. Boundary operations never panic and never raise: failures
/// are logged and reported through boolean/optional return values.
pub struct LogMatchEngine {
    target: Arc<dyn LogTarget>,
    registry: PatternRegistry,
    dispatcher: EventDispatcher,
    tailer: Mutex<LogTailer>,
    metrics: EngineMetrics,
}

impl LogMatchEngine {
    /// Create an engine polling the log reported by `target`.
    #[must_use]
    pub fn new(target: Arc<dyn LogTarget>) -> Self {
        Self {
            target,
            registry: PatternRegistry::new(),
            dispatcher: EventDispatcher::new(),
            tailer: Mutex::new(LogTailer::new()),
            metrics: EngineMetrics::default(),
        }
    }

    /// Register the regex `pattern` as responsible for calling `event`.
    ///
    /// Returns true when the mapping is in place afterwards, including the
    /// idempotent case where `event` was already registered with the
    /// identical pattern text. Conflicting or malformed registrations are
    /// rejected with a warning in the operator log and leave the registry
    /// unchanged.
    pub fn add_pattern(&self, owner: &str, event: &str, pattern: &str) -> bool {
        match self.try_add_pattern(owner, event, pattern) {
            Ok(InsertOutcome::Inserted) => {
                info!(owner, event, pattern, "added match event");
                true
            }
            Ok(InsertOutcome::AlreadyRegistered) => true,
            Err(err) => {
                warn!(owner, event, pattern, %err, "rejected match pattern registration");
                false
            }
        }
    }

    /// Typed-error variant of [`add_pattern`](Self::add_pattern).
    ///
    /// # Errors
    /// [`RegistryError`] (wrapped in
    /// [`LogMatchError`](crate::error::LogMatchError)) for empty arguments,
    /// invalid regexes, and bijection conflicts.
    pub fn try_add_pattern(
        &self,
        owner: &str,
        event: &str,
        pattern: &str,
    ) -> LogMatchResult<InsertOutcome> {
        if owner.is_empty() {
            return Err(RegistryError::InvalidInput { field: "owner" }.into());
        }
        if event.is_empty() {
            return Err(RegistryError::InvalidInput { field: "event" }.into());
        }
        if pattern.is_empty() {
            return Err(RegistryError::InvalidInput { field: "pattern" }.into());
        }
        let compiled = MatchPattern::compile(pattern)?;
        self.registry.insert(event, compiled)
    }

    /// Remove the pattern responsible for calling `event`.
    ///
    /// Returns the previous pattern source, or `None` if `event` was never
    /// registered, which is an expected condition during script reloads and
    /// only noted at debug severity. Listener registrations are untouched.
    pub fn remove_pattern(&self, owner: &str, event: &str) -> Option<String> {
        match self.registry.remove(event) {
            Ok(Some(source)) => Some(source),
            Ok(None) => {
                debug!(owner, event, "tried to remove a match event that does not exist");
                None
            }
            Err(err) => {
                warn!(owner, event, %err, "pattern removal failed");
                None
            }
        }
    }

    /// Register `listener` under `owner` for `event`.
    ///
    /// The match contents are passed to the listener whenever the event
    /// fires. Duplicate registrations accumulate; script owners should call
    /// [`clear_listeners`](Self::clear_listeners) once near the start of
    /// their script so reloads do not stack stale listeners.
    pub fn register_listener(&self, owner: &str, event: &str, listener: Arc<dyn MatchListener>) {
        if let Err(err) = self.dispatcher.register(owner, event, listener) {
            warn!(owner, event, %err, "listener registration failed");
        }
    }

    /// Across all match events, clear the callbacks registered under `owner`.
    ///
    /// Idempotent; pattern registrations are untouched.
    pub fn clear_listeners(&self, owner: &str) {
        if let Err(err) = self.dispatcher.clear_owner(owner) {
            warn!(owner, %err, "clearing listeners failed");
        }
    }

    /// Contents of the last line that fired `event`, or `None` if the event
    /// has not been matched yet.
    #[must_use]
    pub fn get_last_match(&self, event: &str) -> Option<String> {
        self.dispatcher.last_match(event).unwrap_or_else(|err| {
            warn!(event, %err, "last-match lookup failed");
            None
        })
    }

    /// Last match for `event` together with its timestamp.
    #[must_use]
    pub fn last_match_info(&self, event: &str) -> Option<LastMatch> {
        self.dispatcher.last_match_info(event).unwrap_or_else(|err| {
            warn!(event, %err, "last-match lookup failed");
            None
        })
    }

    /// Snapshot of all registered match events and their pattern sources.
    #[must_use]
    pub fn registered_events(&self) -> Vec<PatternInfo> {
        self.registry.snapshot().unwrap_or_else(|err| {
            warn!(%err, "registry snapshot failed");
            Vec::new()
        })
    }

    /// Engine activity counters.
    #[must_use]
    pub fn metrics(&self) -> &EngineMetrics {
        &self.metrics
    }

    /// Poll the active log once and fire match events for new lines.
    ///
    /// Invoked by the host on its own cadence. Never panics and never
    /// raises: a missing target, an empty registry, an absent listener set,
    /// or any I/O failure all degrade to a no-op for this tick. Listener
    /// callbacks run synchronously on the calling thread, outside the
    /// engine's locks.
    pub fn check_log(&self) {
        let Some(path) = self.target.active_log() else {
            return;
        };
        if self.registry.is_empty().unwrap_or(true) {
            return;
        }
        if !self.dispatcher.has_listeners().unwrap_or(false) {
            return;
        }

        self.metrics.polls.fetch_add(1, Ordering::Relaxed);

        let new_contents = {
            // The tailer state is plain offsets; recover from a poisoned
            // lock rather than wedging the poller for the rest of the
            // session.
            let mut tailer = match self.tailer.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            tailer.poll_new_contents(&path)
        };
        if new_contents.is_empty() {
            return;
        }

        for line in new_contents.split('\n') {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            self.metrics.lines_scanned.fetch_add(1, Ordering::Relaxed);

            let events = match self.registry.matching_events(line) {
                Ok(events) => events,
                Err(err) => {
                    warn!(%err, "pattern matching unavailable this poll");
                    return;
                }
            };
            for event in events {
                match self.dispatcher.fire(&event, line) {
                    Ok(outcome) => {
                        self.metrics.events_fired.fetch_add(1, Ordering::Relaxed);
                        self.metrics
                            .listener_panics
                            .fetch_add(outcome.panicked as u64, Ordering::Relaxed);
                    }
                    Err(err) => {
                        warn!(event = %event, %err, "match event dispatch failed");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_target_reports_its_path() {
        let target = StaticLogTarget::new("/var/log/game/latest.log");
        assert_eq!(
            target.active_log(),
            Some(PathBuf::from("/var/log/game/latest.log"))
        );
    }

    #[test]
    fn add_pattern_rejects_empty_arguments() {
        let engine = LogMatchEngine::new(Arc::new(StaticLogTarget::new("unused.log")));
        assert!(!engine.add_pattern("", "evt", "p"));
        assert!(!engine.add_pattern("script", "", "p"));
        assert!(!engine.add_pattern("script", "evt", ""));
        assert!(engine.registered_events().is_empty());
    }

    #[test]
    fn add_pattern_rejects_invalid_regex() {
        let engine = LogMatchEngine::new(Arc::new(StaticLogTarget::new("unused.log")));
        assert!(!engine.add_pattern("script", "evt", "broken ["));
        assert!(engine.registered_events().is_empty());
    }

    #[test]
    fn add_pattern_boundary_policy() {
        let engine = LogMatchEngine::new(Arc::new(StaticLogTarget::new("unused.log")));

        assert!(engine.add_pattern("script", "evt1", "pattern A"));
        // Idempotent re-registration.
        assert!(engine.add_pattern("script", "evt1", "pattern A"));
        // Same name, different pattern.
        assert!(!engine.add_pattern("script", "evt1", "pattern B"));
        // Same pattern, different name.
        assert!(!engine.add_pattern("script", "evt2", "pattern A"));

        let events = engine.registered_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "evt1");
        assert_eq!(events[0].pattern, "pattern A");
    }

    #[test]
    fn remove_pattern_round_trip() {
        let engine = LogMatchEngine::new(Arc::new(StaticLogTarget::new("unused.log")));
        engine.add_pattern("script", "evt", r"\d+");

        assert_eq!(engine.remove_pattern("script", "evt").as_deref(), Some(r"\d+"));
        assert_eq!(engine.remove_pattern("script", "evt"), None);
        // Immediately re-addable.
        assert!(engine.add_pattern("script", "evt", r"\d+"));
    }

    #[test]
    fn check_log_without_target_is_a_noop() {
        struct NoTarget;
        impl LogTarget for NoTarget {
            fn active_log(&self) -> Option<PathBuf> {
                None
            }
        }

        let engine = LogMatchEngine::new(Arc::new(NoTarget));
        engine.add_pattern("script", "evt", ".*");
        engine.register_listener("script", "evt", Arc::new(|_: &str| {}));

        engine.check_log();
        assert_eq!(engine.metrics().polls(), 0);
    }

    #[test]
    fn check_log_fast_paths_skip_polling() {
        let engine = LogMatchEngine::new(Arc::new(StaticLogTarget::new("missing.log")));

        // No patterns at all.
        engine.check_log();
        assert_eq!(engine.metrics().polls(), 0);

        // Patterns but no listeners.
        engine.add_pattern("script", "evt", ".*");
        engine.check_log();
        assert_eq!(engine.metrics().polls(), 0);

        // Both present: the poll itself runs (and degrades on the missing file).
        engine.register_listener("script", "evt", Arc::new(|_: &str| {}));
        engine.check_log();
        assert_eq!(engine.metrics().polls(), 1);
    }
}
