// SPDX-License-Identifier: MIT

//! Keyed debounce for restart triggers.
//!
//! Submitting against a key cancels any pending action for that key and
//! schedules the new one after the configured delay.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

/// Coalesces rapid-fire actions per key.
pub struct Debouncer {
    delay: Duration,
    pending: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self { delay, pending: Mutex::new(HashMap::new()) }
    }

    /// Schedule `action` to run after the delay, cancelling any action
    /// already pending for `key`.
    pub fn debounce<F>(&self, key: &str, action: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let delay = self.delay;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            action.await;
        });

        let mut pending = self.pending.lock();
        if let Some(old) = pending.insert(key.to_string(), handle) {
            old.abort();
        }
    }

    /// Cancel the pending action for `key`, if any. Returns whether one
    /// was cancelled before running.
    pub fn cancel(&self, key: &str) -> bool {
        match self.pending.lock().remove(key) {
            Some(handle) => {
                let live = !handle.is_finished();
                handle.abort();
                live
            }
            None => false,
        }
    }

    /// Cancel every pending action (shutdown).
    pub fn cancel_all(&self) {
        let mut pending = self.pending.lock();
        for (_, handle) in pending.drain() {
            handle.abort();
        }
    }
}

#[cfg(test)]
#[path = "debounce_tests.rs"]
mod tests;
