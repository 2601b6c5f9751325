// SPDX-License-Identifier: MIT

//! Multiplexed stdout pattern matcher.
//!
//! Holds `(owner, compiled regex, emit name)` triples. Compilation is
//! eager at registration; a malformed pattern rejects the registration.

use std::collections::BTreeSet;

use regex::Regex;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("invalid pattern '{pattern}' for '{owner}': {source}")]
pub struct PatternError {
    pub owner: String,
    pub pattern: String,
    #[source]
    pub source: regex::Error,
}

struct PatternEntry {
    owner: String,
    regex: Regex,
    emit: String,
}

/// Compiled regex set, scoped per owning process.
#[derive(Default)]
pub struct PatternMatcher {
    patterns: Vec<PatternEntry>,
}

impl PatternMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pattern for `owner`, compiling it eagerly.
    pub fn add_pattern(&mut self, owner: &str, pattern: &str, emit: &str) -> Result<(), PatternError> {
        let regex = Regex::new(pattern).map_err(|source| PatternError {
            owner: owner.to_string(),
            pattern: pattern.to_string(),
            source,
        })?;
        self.patterns.push(PatternEntry {
            owner: owner.to_string(),
            regex,
            emit: emit.to_string(),
        });
        Ok(())
    }

    /// Event names emitted by `owner`'s patterns matching `line`,
    /// deduplicated.
    pub fn matches(&self, owner: &str, line: &str) -> BTreeSet<String> {
        self.patterns
            .iter()
            .filter(|entry| entry.owner == owner && entry.regex.is_match(line))
            .map(|entry| entry.emit.clone())
            .collect()
    }

    /// Drop every pattern registered for `owner`.
    pub fn remove_patterns_for(&mut self, owner: &str) {
        self.patterns.retain(|entry| entry.owner != owner);
    }

    pub fn clear(&mut self) {
        self.patterns.clear();
    }

    pub fn count(&self) -> usize {
        self.patterns.len()
    }
}

#[cfg(test)]
#[path = "matcher_tests.rs"]
mod tests;
