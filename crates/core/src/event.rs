// SPDX-License-Identifier: MIT

//! Typed pipeline events.
//!
//! Events are immutable records named `"<process>:<kind>"` by convention.
//! The orchestrator matches on `name`; `event_type` distinguishes how the
//! event was produced.

use serde::{Deserialize, Serialize};

/// How an event was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    /// Raw stdout line republished by the process manager
    Stdout,
    /// Raw stderr line republished by the process manager
    Stderr,
    /// Emitted by a stdout pattern match or `event.emit`
    Custom,
    /// Terminal zero exit of a task or terminal service
    Success,
    /// Stderr output from an item with `on_stderr` enabled
    Error,
    /// Non-zero exit from an item with `on_crash` enabled
    Crashed,
    /// Unconditional exit notification
    Exit,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Stdout => "stdout",
            EventType::Stderr => "stderr",
            EventType::Custom => "custom",
            EventType::Success => "success",
            EventType::Error => "error",
            EventType::Crashed => "crashed",
            EventType::Exit => "exit",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable pipeline event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Event name, typically `"<process>:<kind>"`
    pub name: String,
    /// Name of the emitting process
    pub process_name: String,
    #[serde(rename = "type")]
    pub event_type: EventType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// Milliseconds since the Unix epoch
    pub timestamp: u64,
}

impl Event {
    pub fn new(
        name: impl Into<String>,
        process_name: impl Into<String>,
        event_type: EventType,
        data: Option<serde_json::Value>,
        timestamp: u64,
    ) -> Self {
        Self { name: name.into(), process_name: process_name.into(), event_type, data, timestamp }
    }

    /// Custom event fired by a pattern match against `process_name`'s stdout.
    pub fn custom(name: impl Into<String>, process_name: impl Into<String>, timestamp: u64) -> Self {
        Self::new(name, process_name, EventType::Custom, None, timestamp)
    }

    /// `<name>:success` for a completed lifecycle with exit code 0.
    pub fn success(process_name: &str, timestamp: u64) -> Self {
        Self::new(format!("{process_name}:success"), process_name, EventType::Success, None, timestamp)
    }

    /// `<name>:error` for stderr output with `on_stderr` enabled.
    pub fn error(process_name: &str, data: Option<serde_json::Value>, timestamp: u64) -> Self {
        Self::new(format!("{process_name}:error"), process_name, EventType::Error, data, timestamp)
    }

    /// `<name>:crashed` for a non-zero exit with `on_crash` enabled.
    pub fn crashed(process_name: &str, data: Option<serde_json::Value>, timestamp: u64) -> Self {
        Self::new(format!("{process_name}:crashed"), process_name, EventType::Crashed, data, timestamp)
    }

    /// `<name>:exit` published for every process exit.
    pub fn exit(process_name: &str, data: Option<serde_json::Value>, timestamp: u64) -> Self {
        Self::new(format!("{process_name}:exit"), process_name, EventType::Exit, data, timestamp)
    }

    /// Whether this event represents a failure for trigger propagation.
    pub fn is_failure(&self) -> bool {
        matches!(self.event_type, EventType::Error | EventType::Crashed)
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
