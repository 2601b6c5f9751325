// SPDX-License-Identifier: MIT

//! Circuit breaker over repeated spawn failures.
//!
//! Closed: work runs and outcomes accumulate in a sliding window.
//! Open: work is rejected immediately. After the reset timeout the next
//! call runs as a single half-open trial; its outcome closes or reopens
//! the circuit.

use std::collections::VecDeque;
use std::future::Future;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Failure percentage over the window that opens the circuit
    pub error_threshold: u32,
    /// Minimum observations before the ratio is evaluated
    pub volume_threshold: usize,
    /// Outcomes kept in the sliding window
    pub window_size: usize,
    /// Per-call timeout; a timeout counts as a failure
    pub timeout: Option<Duration>,
    /// How long the circuit stays open before a half-open trial
    pub reset_timeout: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            error_threshold: 50,
            volume_threshold: 10,
            window_size: 100,
            timeout: None,
            reset_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

/// Observations surfaced to operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerEvent {
    Open,
    Close,
    HalfOpen,
    Reject,
    Success,
    Failure,
    Timeout,
}

#[derive(Debug, Error)]
pub enum BreakerError<E> {
    #[error("circuit breaker is open")]
    Open,

    #[error("operation timed out")]
    Timeout,

    #[error("{0}")]
    Inner(E),
}

struct Inner {
    state: BreakerState,
    /// true = success, false = failure; oldest first
    window: VecDeque<bool>,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
}

/// Wraps units of work, rejecting them while the circuit is open.
pub struct CircuitBreaker {
    config: BreakerConfig,
    inner: Mutex<Inner>,
    events_tx: Option<mpsc::UnboundedSender<BreakerEvent>>,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                window: VecDeque::new(),
                opened_at: None,
                trial_in_flight: false,
            }),
            events_tx: None,
        }
    }

    /// Breaker plus a receiver of state observations.
    pub fn with_observer(config: BreakerConfig) -> (Self, mpsc::UnboundedReceiver<BreakerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut breaker = Self::new(config);
        breaker.events_tx = Some(tx);
        (breaker, rx)
    }

    pub fn state(&self) -> BreakerState {
        self.inner.lock().state
    }

    /// Run `op` through the breaker.
    pub async fn call<F, T, E>(&self, op: F) -> Result<T, BreakerError<E>>
    where
        F: Future<Output = Result<T, E>>,
    {
        self.admit().map_err(BreakerError::from_admission)?;

        let (result, timed_out) = match self.config.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, op).await {
                Ok(result) => (result.map_err(BreakerError::Inner), false),
                Err(_) => (Err(BreakerError::Timeout), true),
            },
            None => (op.await.map_err(BreakerError::Inner), false),
        };

        self.record(result.is_ok(), timed_out);
        result
    }

    fn admit(&self) -> Result<(), BreakerError<std::convert::Infallible>> {
        let mut inner = self.inner.lock();
        match inner.state {
            BreakerState::Closed => Ok(()),
            BreakerState::Open => {
                let expired = inner
                    .opened_at
                    .is_some_and(|at| at.elapsed() >= self.config.reset_timeout);
                if expired {
                    inner.state = BreakerState::HalfOpen;
                    inner.trial_in_flight = true;
                    self.observe(BreakerEvent::HalfOpen);
                    Ok(())
                } else {
                    self.observe(BreakerEvent::Reject);
                    Err(BreakerError::Open)
                }
            }
            BreakerState::HalfOpen => {
                if inner.trial_in_flight {
                    self.observe(BreakerEvent::Reject);
                    Err(BreakerError::Open)
                } else {
                    inner.trial_in_flight = true;
                    Ok(())
                }
            }
        }
    }

    fn record(&self, success: bool, timed_out: bool) {
        let mut inner = self.inner.lock();

        self.observe(match (success, timed_out) {
            (true, _) => BreakerEvent::Success,
            (false, true) => BreakerEvent::Timeout,
            (false, false) => BreakerEvent::Failure,
        });

        match inner.state {
            BreakerState::HalfOpen => {
                inner.trial_in_flight = false;
                if success {
                    inner.state = BreakerState::Closed;
                    inner.window.clear();
                    inner.opened_at = None;
                    self.observe(BreakerEvent::Close);
                } else {
                    inner.state = BreakerState::Open;
                    inner.opened_at = Some(Instant::now());
                    self.observe(BreakerEvent::Open);
                }
            }
            BreakerState::Closed => {
                inner.window.push_back(success);
                if inner.window.len() > self.config.window_size {
                    inner.window.pop_front();
                }
                if inner.window.len() >= self.config.volume_threshold {
                    let failures = inner.window.iter().filter(|ok| !**ok).count();
                    let ratio = failures * 100 / inner.window.len();
                    if ratio as u32 >= self.config.error_threshold {
                        inner.state = BreakerState::Open;
                        inner.opened_at = Some(Instant::now());
                        self.observe(BreakerEvent::Open);
                    }
                }
            }
            // A call admitted before the circuit opened; the outcome is
            // already observed, the window no longer matters
            BreakerState::Open => {}
        }
    }

    fn observe(&self, event: BreakerEvent) {
        if let Some(tx) = &self.events_tx {
            let _ = tx.send(event);
        }
    }
}

impl<E> BreakerError<E> {
    /// Admission checks never produce an inner error.
    fn from_admission(err: BreakerError<std::convert::Infallible>) -> Self {
        match err {
            BreakerError::Open => BreakerError::Open,
            BreakerError::Timeout => BreakerError::Timeout,
            BreakerError::Inner(never) => match never {},
        }
    }
}

#[cfg(test)]
#[path = "breaker_tests.rs"]
mod tests;
