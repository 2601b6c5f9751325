// SPDX-License-Identifier: MIT

//! Raw events republished by the process manager.
//!
//! These carry the owning process name so the event handler can
//! correlate them; typed pipeline events are derived downstream.

use clier_core::LogEntry;

/// Raw event from a managed child.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessEvent {
    Stdout {
        process: String,
        line: String,
        timestamp: u64,
    },
    Stderr {
        process: String,
        line: String,
        timestamp: u64,
    },
    /// Delivered after the OS exit notification and both stream closures
    /// (or after forced emission on stop timeout).
    Exit {
        process: String,
        code: Option<i32>,
        signal: Option<i32>,
        /// Pending output accumulated since the last spawn
        output: Vec<LogEntry>,
        timestamp: u64,
    },
}

impl ProcessEvent {
    pub fn process_name(&self) -> &str {
        match self {
            ProcessEvent::Stdout { process, .. }
            | ProcessEvent::Stderr { process, .. }
            | ProcessEvent::Exit { process, .. } => process,
        }
    }
}
