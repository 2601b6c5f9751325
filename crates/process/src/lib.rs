// SPDX-License-Identifier: MIT

//! Process lifecycle: spawning, stream capture, signaling, and the
//! output-drain guarantee.
//!
//! [`ManagedProcess`] owns exactly one child; [`ProcessManager`] is the
//! by-name collection that republishes every stream line and exit as a
//! [`ProcessEvent`].

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod backoff;
mod event;
mod managed;
mod manager;

pub use backoff::{delay_for, BackoffConfig, BackoffStrategy};
pub use event::ProcessEvent;
pub use managed::{ManagedProcess, ProcessConfig, ProcessError, DEFAULT_STOP_TIMEOUT, STOP_GRACE};
pub use manager::{ProcessManager, EVENT_CHANNEL_CAPACITY};
