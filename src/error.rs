//! Error types for the log match engine.
//!
//! All errors are strongly typed using thiserror. The boundary operations on
//! [`LogMatchEngine`](crate::engine::LogMatchEngine) absorb these into
//! boolean/optional return values so host and script callers can branch on
//! success without error-handling constructs; the typed variants remain
//! reachable through the `try_*` methods.

use thiserror::Error;

/// Errors raised while registering or removing match patterns.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A required argument was empty.
    #[error("Required argument '{field}' is empty")]
    InvalidInput {
        /// Name of the offending argument.
        field: &'static str,
    },

    /// The supplied pattern source failed to compile.
    #[error("Invalid pattern '{source_text}': {reason}")]
    InvalidPattern {
        /// The pattern source text as supplied.
        source_text: String,
        /// Compiler diagnostic.
        reason: String,
    },

    /// The match event name is already backed by a different pattern.
    #[error("Match event '{event}' is already registered with pattern '{existing}'")]
    EventNameTaken {
        /// The contested event name.
        event: String,
        /// Source text of the pattern already backing the event.
        existing: String,
    },

    /// The pattern source text already backs a different match event.
    #[error("Pattern '{pattern}' is already registered for match event '{event}'")]
    PatternTaken {
        /// The contested pattern source text.
        pattern: String,
        /// The event already using the pattern.
        event: String,
    },
}

/// Top-level error type for the log match engine.
#[derive(Debug, Error)]
pub enum LogMatchError {
    /// Pattern registration/removal error.
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Invariant violation inside the engine (poisoned lock and the like).
    #[error("Internal error: {message}")]
    Internal {
        /// Human-readable description.
        message: String,
    },
}

impl LogMatchError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a registry error.
    #[must_use]
    pub const fn is_registry(&self) -> bool {
        matches!(self, Self::Registry(_))
    }

    /// Returns true if this is an internal error.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }

    /// Returns true if the rejected registration conflicts with existing
    /// state (as opposed to being malformed input).
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::Registry(RegistryError::EventNameTaken { .. })
                | Self::Registry(RegistryError::PatternTaken { .. })
        )
    }
}

/// Result type alias for log match engine operations.
pub type LogMatchResult<T> = Result<T, LogMatchError>;
