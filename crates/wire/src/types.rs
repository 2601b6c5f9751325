// SPDX-License-Identifier: MIT

//! Typed method params and results carried inside the JSON-RPC envelope.

use std::collections::HashMap;

use clier_core::{Event, LogEntry, ProcessStatus};
use serde::{Deserialize, Serialize};

/// `daemon.status` result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResult {
    pub project: String,
    pub pid: u32,
    pub version: String,
    pub uptime_ms: u64,
    pub process_count: usize,
    pub running_count: usize,
}

/// `process.list` result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessListResult {
    pub processes: Vec<ProcessStatus>,
}

/// Params naming a single process (`process.start`, `process.delete`,
/// `process.inputEnabled`, `stage.trigger`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessParams {
    pub name: String,
}

/// `process.stop` / `process.restart` params.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopParams {
    pub name: String,
    #[serde(default)]
    pub force: bool,
}

/// `process.add` params: one pipeline item declaration
/// (`{"type": "service" | "task", ...}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessAddParams {
    pub item: serde_json::Value,
}

/// `process.input` params.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputParams {
    pub name: String,
    pub data: String,
}

/// `process.inputEnabled` result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputEnabledResult {
    pub enabled: bool,
}

/// `logs.query` params. `since` uses the duration grammar (`30s`, `5m`,
/// `2h`, `1d`); omitted `name` means all processes interleaved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct LogsQueryParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lines: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since: Option<String>,
}

/// `logs.query` result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogsResult {
    pub entries: Vec<LogEntry>,
}

/// `logs.clear` params.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct LogsClearParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// `daemon.logs` params.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DaemonLogsParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lines: Option<usize>,
}

/// `daemon.logs` result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaemonLogsResult {
    pub lines: Vec<String>,
}

/// `events.query` params.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EventsQueryParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since: Option<String>,
}

/// `events.query` result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventsResult {
    pub events: Vec<Event>,
}

/// `event.emit` params.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmitParams {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// `stages.map` result: step name → stage name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagesMapResult {
    pub stages: HashMap<String, String>,
}

/// `config.clearReload` params.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ClearReloadParams {
    #[serde(default)]
    pub restart_manual_services: bool,
}

#[cfg(test)]
#[path = "types_tests.rs"]
mod tests;
