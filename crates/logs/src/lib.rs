// SPDX-License-Identifier: MIT

//! Snapshot log store: per-process bounded rings plus rotating
//! append-only files, and the rotating writer used for the daemon's
//! own log files.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod ring;
mod rotate;
mod store;
mod writer;

pub use ring::RingLog;
pub use rotate::{format_line, RotatingFile, DEFAULT_MAX_FILES, DEFAULT_MAX_FILE_SIZE};
pub use store::{LogStore, LogStoreConfig, LogStoreError, DEFAULT_MAX_MEMORY_ENTRIES};
pub use writer::RotatingWriter;
