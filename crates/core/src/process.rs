// SPDX-License-Identifier: MIT

//! Process classification and status reporting types.

use serde::{Deserialize, Serialize};

/// Whether a process is expected to run indefinitely or to exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessKind {
    /// Runs indefinitely; eligible for restart
    Service,
    /// Expected to exit; never auto-restarted
    Task,
}

impl ProcessKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessKind::Service => "service",
            ProcessKind::Task => "task",
        }
    }
}

impl std::fmt::Display for ProcessKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// When a process is restarted after exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RestartPolicy {
    #[serde(rename = "never")]
    Never,
    #[serde(rename = "on-failure")]
    OnFailure,
    #[serde(rename = "always")]
    Always,
}

impl RestartPolicy {
    /// Services default to `on-failure`, tasks to `never`.
    pub fn default_for(kind: ProcessKind) -> Self {
        match kind {
            ProcessKind::Service => RestartPolicy::OnFailure,
            ProcessKind::Task => RestartPolicy::Never,
        }
    }
}

/// Lifecycle state of a managed process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessState {
    Stopped,
    Running,
    Restarting,
    Crashed,
}

/// Point-in-time status snapshot of a managed process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessStatus {
    pub name: String,
    pub kind: ProcessKind,
    pub state: ProcessState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    /// Zero unless `state == Running`
    pub uptime_ms: u64,
    pub restart_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal: Option<i32>,
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
