//! # logmatch - incremental log tailing with named match events
//!
//! logmatch tails a growing, possibly-rotated text log file and dispatches
//! named match events when new lines full-match registered regular
//! expressions. It is the engine behind scriptable hosts that want to react
//! to log output: scripts and plugins register a pattern under a match event
//! name, subscribe listeners to that event, and the host polls
//! [`LogMatchEngine::check_log`] on its own cadence.
//!
//! ## Core concepts
//!
//! - **Match event**: a named trigger, backed by exactly one pattern, fired
//!   when its pattern full-matches a trimmed log line.
//! - **Owner**: the script or plugin name under which listeners are grouped
//!   for bulk removal on reload.
//! - **Progress**: the byte offset into the log already processed; the
//!   tailer baselines at end of file on first sight and after a detected
//!   rotation, so historic content is never replayed.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use logmatch::{LogMatchEngine, StaticLogTarget};
//!
//! let engine = Arc::new(LogMatchEngine::new(Arc::new(StaticLogTarget::new(
//!     "logs/latest.log",
//! ))));
//!
//! engine.clear_listeners("startup-script");
//! engine.add_pattern("startup-script", "spawn_progress", r"Preparing spawn area: \d+%");
//! engine.register_listener(
//!     "startup-script",
//!     "spawn_progress",
//!     Arc::new(|line: &str| println!("progress: {line}")),
//! );
//!
//! // Driven by the host's scheduler:
//! engine.check_log();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod pattern;
pub mod registry;
pub mod tailer;

// Re-export primary types at crate root for convenience
pub use dispatcher::{EventDispatcher, FireOutcome, LastMatch, MatchListener};
pub use engine::{EngineMetrics, LogMatchEngine, LogTarget, StaticLogTarget};
pub use error::{LogMatchError, LogMatchResult, RegistryError};
pub use pattern::MatchPattern;
pub use registry::{InsertOutcome, PatternInfo, PatternRegistry};
pub use tailer::LogTailer;
