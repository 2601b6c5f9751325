// SPDX-License-Identifier: MIT

//! Configuration validation.
//!
//! Structural errors are reported verbatim to the caller of [`load`];
//! the supervisor does not start on a validation failure.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::flatten::{flatten, FlattenedPipeline};
use crate::model::Config;
use crate::template;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },

    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("project_name must not be empty")]
    EmptyProjectName,

    #[error("pipeline must declare at least one entry")]
    EmptyPipeline,

    #[error("safety.max_ops_per_minute must be at least 1")]
    ZeroOpsPerMinute,

    #[error("safety.circuit_breaker.{0} must be greater than zero")]
    ZeroBreakerBound(&'static str),

    #[error("stage '{0}' has no steps")]
    EmptyStage(String),

    #[error("duplicate pipeline item name '{0}' after flattening")]
    DuplicateName(String),

    #[error("pipeline item '{item}' has an empty {field}")]
    EmptyField { item: String, field: &'static str },

    #[error("invalid pattern '{pattern}' on item '{item}': {source}")]
    BadPattern { item: String, pattern: String, source: regex::Error },

    #[error("unbalanced '{{{{' / '}}}}' in {what} of item '{item}'")]
    UnbalancedTemplate { item: String, what: String },
}

/// Read, parse, and validate a configuration file.
///
/// Returns the config together with its flattened pipeline so callers
/// never re-flatten.
pub fn load(path: &Path) -> Result<(Config, FlattenedPipeline), ConfigError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
    let config: Config = serde_json::from_str(&raw)?;
    let flattened = validate(&config)?;
    Ok((config, flattened))
}

/// Validate a parsed configuration and return its flattened pipeline.
pub fn validate(config: &Config) -> Result<FlattenedPipeline, ConfigError> {
    if config.project_name.is_empty() {
        return Err(ConfigError::EmptyProjectName);
    }
    if config.pipeline.is_empty() {
        return Err(ConfigError::EmptyPipeline);
    }
    if config.safety.max_ops_per_minute < 1 {
        return Err(ConfigError::ZeroOpsPerMinute);
    }
    if let Some(breaker) = &config.safety.circuit_breaker {
        if breaker.error_threshold == 0 {
            return Err(ConfigError::ZeroBreakerBound("error_threshold"));
        }
        if breaker.timeout_ms == 0 {
            return Err(ConfigError::ZeroBreakerBound("timeout_ms"));
        }
        if breaker.reset_timeout_ms == 0 {
            return Err(ConfigError::ZeroBreakerBound("reset_timeout_ms"));
        }
    }

    for entry in &config.pipeline {
        if let crate::model::PipelineEntry::Stage(stage) = entry {
            if stage.name.is_empty() {
                return Err(ConfigError::EmptyField {
                    item: "<stage>".to_string(),
                    field: "name",
                });
            }
            if stage.steps.is_empty() {
                return Err(ConfigError::EmptyStage(stage.name.clone()));
            }
        }
    }

    let flattened = flatten(&config.pipeline);
    let mut seen = HashSet::new();
    for item in &flattened.items {
        if item.name.is_empty() {
            return Err(ConfigError::EmptyField { item: "<unnamed>".to_string(), field: "name" });
        }
        if item.command.is_empty() {
            return Err(ConfigError::EmptyField { item: item.name.clone(), field: "command" });
        }
        if !seen.insert(item.name.clone()) {
            return Err(ConfigError::DuplicateName(item.name.clone()));
        }

        // Patterns compile eagerly so bad regexes fail the load, not a spawn
        for rule in &item.events.on_stdout {
            regex::Regex::new(&rule.pattern).map_err(|source| ConfigError::BadPattern {
                item: item.name.clone(),
                pattern: rule.pattern.clone(),
                source,
            })?;
        }

        if item.enable_event_templates {
            if !template::check_balanced(&item.command) {
                return Err(ConfigError::UnbalancedTemplate {
                    item: item.name.clone(),
                    what: "command".to_string(),
                });
            }
            for (key, value) in &item.env {
                if !template::check_balanced(value) {
                    return Err(ConfigError::UnbalancedTemplate {
                        item: item.name.clone(),
                        what: format!("env.{key}"),
                    });
                }
            }
        }
    }

    Ok(flattened)
}

#[cfg(test)]
#[path = "validate_tests.rs"]
mod tests;
