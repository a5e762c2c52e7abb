//! Match pattern compilation and whole-line matching.
//!
//! A [`MatchPattern`] wraps a user-supplied regular expression and matches it
//! against entire log lines only: the pattern must consume the whole trimmed
//! line, not merely find a substring. Identity is the original pattern
//! source text, never the compiled automaton, so two patterns compare equal
//! exactly when their sources are byte-identical.

use std::fmt;
use std::hash::{Hash, Hasher};

use regex::Regex;

use crate::error::RegistryError;

/// A compiled whole-line match pattern.
#[derive(Debug, Clone)]
pub struct MatchPattern {
    source: String,
    regex: Regex,
}

impl MatchPattern {
    /// Compile a pattern from its source text.
    ///
    /// The source is wrapped as `^(?:source)$` before compilation so that
    /// [`is_match`](Self::is_match) only succeeds when the pattern covers an
    /// entire line.
    ///
    /// # Errors
    /// Returns [`RegistryError::InvalidPattern`] when the source is not a
    /// valid regular expression.
    pub fn compile(source: impl Into<String>) -> Result<Self, RegistryError> {
        let source = source.into();
        let anchored = format!("^(?:{source})$");
        let regex = Regex::new(&anchored).map_err(|e| RegistryError::InvalidPattern {
            source_text: source.clone(),
            reason: e.to_string(),
        })?;
        Ok(Self { source, regex })
    }

    /// The original (unanchored) pattern source text.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Test whether the pattern matches the entire line.
    #[must_use]
    pub fn is_match(&self, line: &str) -> bool {
        self.regex.is_match(line)
    }
}

impl PartialEq for MatchPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for MatchPattern {}

impl Hash for MatchPattern {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.source.hash(state);
    }
}

impl fmt::Display for MatchPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_valid_pattern() {
        let pattern = MatchPattern::compile(r"Preparing spawn area: \d+%").unwrap();
        assert_eq!(pattern.source(), r"Preparing spawn area: \d+%");
    }

    #[test]
    fn compile_invalid_pattern() {
        let err = MatchPattern::compile(r"unclosed (group").unwrap_err();
        let RegistryError::InvalidPattern { source_text, .. } = err else {
            panic!("expected InvalidPattern, got {err:?}");
        };
        assert_eq!(source_text, "unclosed (group");
    }

    #[test]
    fn full_line_matching_only() {
        let pattern = MatchPattern::compile(r"Preparing spawn area: \d+%").unwrap();
        assert!(pattern.is_match("Preparing spawn area: 42%"));
        // Substring hits must not count.
        assert!(!pattern.is_match("[Server] Preparing spawn area: 42%"));
        assert!(!pattern.is_match("Preparing spawn area: 42% done"));
    }

    #[test]
    fn alternation_is_anchored_as_a_group() {
        // Without the non-capturing group, `^a|b$` would match "apple".
        let pattern = MatchPattern::compile("a|b").unwrap();
        assert!(pattern.is_match("a"));
        assert!(pattern.is_match("b"));
        assert!(!pattern.is_match("apple"));
    }

    #[test]
    fn identity_is_source_text() {
        let a = MatchPattern::compile(r"\d+").unwrap();
        let b = MatchPattern::compile(r"\d+").unwrap();
        let c = MatchPattern::compile(r"[0-9]+").unwrap();
        assert_eq!(a, b);
        // Equivalent automaton, different source: distinct patterns.
        assert_ne!(a, c);
    }
}
