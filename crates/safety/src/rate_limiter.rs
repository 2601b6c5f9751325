// SPDX-License-Identifier: MIT

//! Token bucket over process-spawn operations.
//!
//! The bucket holds `capacity` tokens and is refilled to full every
//! window; tokens never accumulate beyond capacity. Callers that find
//! the bucket empty are queued FIFO and released on refill.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// The limiter was shut down while the caller waited for a token.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("rate limiter is shut down")]
pub struct RateLimitClosed;

struct State {
    tokens: u32,
    waiters: VecDeque<oneshot::Sender<()>>,
    closed: bool,
}

struct Inner {
    capacity: u32,
    state: Mutex<State>,
    shutdown: CancellationToken,
}

/// Token bucket limiting spawn operations per window.
#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<Inner>,
}

impl RateLimiter {
    /// Bucket of `capacity` tokens refilled every 60 seconds.
    pub fn new(capacity: u32) -> Self {
        Self::with_window(capacity, Duration::from_secs(60))
    }

    /// Bucket with a custom refill window.
    pub fn with_window(capacity: u32, window: Duration) -> Self {
        let inner = Arc::new(Inner {
            capacity,
            state: Mutex::new(State {
                tokens: capacity,
                waiters: VecDeque::new(),
                closed: false,
            }),
            shutdown: CancellationToken::new(),
        });

        let refill = Arc::clone(&inner);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(window);
            interval.tick().await; // consume the immediate first tick
            loop {
                tokio::select! {
                    _ = interval.tick() => refill_bucket(&refill),
                    _ = refill.shutdown.cancelled() => return,
                }
            }
        });

        Self { inner }
    }

    /// Wait for a token. Resolves immediately when one is available,
    /// otherwise when a refill releases this caller (FIFO).
    pub async fn acquire(&self) -> Result<(), RateLimitClosed> {
        let rx = {
            let mut state = self.inner.state.lock();
            if state.closed {
                return Err(RateLimitClosed);
            }
            if state.tokens > 0 {
                state.tokens -= 1;
                return Ok(());
            }
            let (tx, rx) = oneshot::channel();
            state.waiters.push_back(tx);
            debug!(queued = state.waiters.len(), "spawn rate limited; queued");
            rx
        };
        rx.await.map_err(|_| RateLimitClosed)
    }

    /// Run `op` once a token is available.
    pub async fn run<F, T>(&self, op: F) -> Result<T, RateLimitClosed>
    where
        F: std::future::Future<Output = T>,
    {
        self.acquire().await?;
        Ok(op.await)
    }

    /// Tokens currently available.
    pub fn available(&self) -> u32 {
        self.inner.state.lock().tokens
    }

    /// Stop the refill task and fail all queued waiters.
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
        let mut state = self.inner.state.lock();
        state.closed = true;
        // Dropping the senders resolves queued acquires with Closed
        state.waiters.clear();
    }
}

fn refill_bucket(inner: &Inner) {
    let mut state = inner.state.lock();
    if state.closed {
        return;
    }
    state.tokens = inner.capacity;
    while state.tokens > 0 {
        let Some(waiter) = state.waiters.pop_front() else {
            break;
        };
        // A send failure means the waiter gave up; its token stays
        if waiter.send(()).is_ok() {
            state.tokens -= 1;
        }
    }
}

#[cfg(test)]
#[path = "rate_limiter_tests.rs"]
mod tests;
