// SPDX-License-Identifier: MIT

//! Serde model of the configuration file.
//!
//! The file is a single JSON object; pipeline entries are discriminated
//! by `type` ∈ {service, task, stage}. The schema is strict: unknown
//! fields are rejected.

use clier_core::{ProcessKind, RestartPolicy};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

fn default_true() -> bool {
    true
}

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub project_name: String,
    /// Inherit the daemon's environment into children
    #[serde(default = "default_true")]
    pub global_env: bool,
    pub safety: SafetyConfig,
    pub pipeline: Vec<PipelineEntry>,
}

/// Spawn-safety bounds.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SafetyConfig {
    pub max_ops_per_minute: u32,
    pub debounce_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub circuit_breaker: Option<CircuitBreakerConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CircuitBreakerConfig {
    pub enabled: bool,
    /// Failure percentage over the sliding window that opens the circuit
    pub error_threshold: u32,
    pub timeout_ms: u64,
    pub reset_timeout_ms: u64,
}

/// A pipeline entry: an item or a stage, discriminated by `type`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum PipelineEntry {
    #[serde(rename = "service")]
    Service(ItemBody),
    #[serde(rename = "task")]
    Task(ItemBody),
    #[serde(rename = "stage")]
    Stage(StageBody),
}

/// A step inside a stage (item only; stages do not nest).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum StepEntry {
    #[serde(rename = "service")]
    Service(ItemBody),
    #[serde(rename = "task")]
    Task(ItemBody),
}

impl StepEntry {
    pub fn kind(&self) -> ProcessKind {
        match self {
            StepEntry::Service(_) => ProcessKind::Service,
            StepEntry::Task(_) => ProcessKind::Task,
        }
    }

    pub fn body(&self) -> &ItemBody {
        match self {
            StepEntry::Service(body) | StepEntry::Task(body) => body,
        }
    }
}

/// Declared fields of a pipeline item, before flattening.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ItemBody {
    pub name: String,
    /// Shell command string, interpreted as written
    pub command: String,
    /// Event names that must all have fired before the item starts
    #[serde(default)]
    pub trigger_on: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continue_on_failure: Option<bool>,
    #[serde(default)]
    pub env: IndexMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub events: Option<EventsConfig>,
    /// Enables `{{…}}` substitution in `command` and `env` at spawn time
    #[serde(default)]
    pub enable_event_templates: bool,
    /// Never auto-started; only by explicit trigger request
    #[serde(default)]
    pub manual: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<InputConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restart: Option<RestartPolicy>,
}

/// Stdout pattern rules plus stderr/crash event switches.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EventsConfig {
    #[serde(default)]
    pub on_stdout: Vec<PatternRule>,
    /// Publish `<name>:error` on stderr output
    #[serde(default = "default_true")]
    pub on_stderr: bool,
    /// Publish `<name>:crashed` on non-zero exit
    #[serde(default = "default_true")]
    pub on_crash: bool,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self { on_stdout: Vec::new(), on_stderr: true, on_crash: true }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PatternRule {
    pub pattern: String,
    pub emit: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct InputConfig {
    #[serde(default)]
    pub enabled: bool,
}

/// A named grouping of items with shared `manual` and `trigger_on`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StageBody {
    pub name: String,
    #[serde(default)]
    pub manual: bool,
    #[serde(default)]
    pub trigger_on: Vec<String>,
    pub steps: Vec<StepEntry>,
}

/// A flattened pipeline item — what the orchestrator schedules.
#[derive(Debug, Clone)]
pub struct Item {
    pub name: String,
    pub command: String,
    pub kind: ProcessKind,
    pub cwd: Option<PathBuf>,
    pub env: IndexMap<String, String>,
    pub trigger_on: Vec<String>,
    pub continue_on_failure: bool,
    pub events: EventsConfig,
    pub enable_event_templates: bool,
    pub manual: bool,
    pub input_enabled: bool,
    pub restart: RestartPolicy,
    /// Owning stage, when the item came from one
    pub stage: Option<String>,
}

impl Item {
    /// Build an item from a declared body, applying kind-based defaults.
    pub fn from_body(kind: ProcessKind, body: &ItemBody) -> Self {
        Self {
            name: body.name.clone(),
            command: body.command.clone(),
            kind,
            cwd: body.cwd.clone(),
            env: body.env.clone(),
            trigger_on: body.trigger_on.clone(),
            continue_on_failure: body.continue_on_failure.unwrap_or(false),
            events: body.events.clone().unwrap_or_default(),
            enable_event_templates: body.enable_event_templates,
            manual: body.manual,
            input_enabled: body.input.as_ref().is_some_and(|i| i.enabled),
            restart: body.restart.unwrap_or_else(|| RestartPolicy::default_for(kind)),
            stage: None,
        }
    }
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod tests;
