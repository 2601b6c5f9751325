// SPDX-License-Identifier: MIT

//! Log entry record shared by the ring store, the wire protocol, and
//! the exit pending buffer.

use serde::{Deserialize, Serialize};

/// Which stream a log entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStream {
    Stdout,
    Stderr,
    /// Command echo written at spawn time
    Command,
}

impl LogStream {
    /// Three-letter tag used in the log file line format.
    pub fn as_tag(&self) -> &'static str {
        match self {
            LogStream::Stdout => "OUT",
            LogStream::Stderr => "ERR",
            LogStream::Command => "CMD",
        }
    }
}

/// One captured log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Milliseconds since the Unix epoch, stamped at read time
    pub timestamp: u64,
    pub stream: LogStream,
    pub data: String,
    pub process_name: String,
}

impl LogEntry {
    pub fn new(
        timestamp: u64,
        stream: LogStream,
        data: impl Into<String>,
        process_name: impl Into<String>,
    ) -> Self {
        Self { timestamp, stream, data: data.into(), process_name: process_name.into() }
    }
}
