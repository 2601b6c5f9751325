// SPDX-License-Identifier: MIT

//! By-name collection of managed processes.
//!
//! Starts go through the rate limiter, and service starts additionally
//! through the circuit breaker when one is configured. Every stream line
//! and exit from any child flows out of the single event receiver handed
//! back by [`ProcessManager::new`].

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{info, warn};

use clier_core::{ProcessKind, ProcessStatus};
use clier_safety::{BreakerError, CircuitBreaker, RateLimiter};

use crate::event::ProcessEvent;
use crate::managed::{ManagedProcess, ProcessConfig, ProcessError};

/// Capacity of the shared raw-event channel. Senders await when full,
/// so stream bursts back-pressure instead of dropping lines.
pub const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Collection of [`ManagedProcess`] by name.
pub struct ProcessManager {
    processes: Mutex<IndexMap<String, Arc<ManagedProcess>>>,
    /// Names with a start queued behind the rate limiter, so a second
    /// start of the same name is rejected before it spawns a duplicate
    starting: Mutex<HashSet<String>>,
    events_tx: mpsc::Sender<ProcessEvent>,
    rate: RateLimiter,
    breaker: Option<Arc<CircuitBreaker>>,
}

impl ProcessManager {
    /// Create a manager and the receiver of its raw event stream.
    pub fn new(
        rate: RateLimiter,
        breaker: Option<Arc<CircuitBreaker>>,
    ) -> (Self, mpsc::Receiver<ProcessEvent>) {
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        (Self::with_sender(events_tx, rate, breaker), events_rx)
    }

    /// Create a manager publishing into an existing event channel, so the
    /// channel can outlive a configuration reload.
    pub fn with_sender(
        events_tx: mpsc::Sender<ProcessEvent>,
        rate: RateLimiter,
        breaker: Option<Arc<CircuitBreaker>>,
    ) -> Self {
        Self {
            processes: Mutex::new(IndexMap::new()),
            starting: Mutex::new(HashSet::new()),
            events_tx,
            rate,
            breaker,
        }
    }

    /// Start a process, rejecting when the name is live.
    ///
    /// A previously-completed process of the same name is replaced.
    pub async fn start_process(&self, config: ProcessConfig) -> Result<(), ProcessError> {
        let name = config.name.clone();
        let process = {
            let mut processes = self.processes.lock();
            let mut starting = self.starting.lock();
            if starting.contains(&name) {
                return Err(ProcessError::AlreadyRunning(name));
            }
            if let Some(existing) = processes.get(&name) {
                if existing.is_live() {
                    return Err(ProcessError::AlreadyRunning(name));
                }
            }
            starting.insert(name.clone());
            let process = Arc::new(ManagedProcess::new(config, self.events_tx.clone()));
            processes.insert(name.clone(), Arc::clone(&process));
            process
        };

        let result = self
            .rate
            .run(async {
                match (&self.breaker, process.config().kind) {
                    (Some(breaker), ProcessKind::Service) => {
                        match breaker.call(process.start()).await {
                            Ok(()) => Ok(()),
                            Err(BreakerError::Open) => Err(ProcessError::CircuitOpen(name.clone())),
                            Err(BreakerError::Timeout) => Err(ProcessError::SpawnFailed {
                                name: name.clone(),
                                source: std::io::Error::new(
                                    std::io::ErrorKind::TimedOut,
                                    "spawn timed out",
                                ),
                            }),
                            Err(BreakerError::Inner(e)) => Err(e),
                        }
                    }
                    _ => process.start().await,
                }
            })
            .await
            .map_err(|_| ProcessError::LimiterClosed);

        self.starting.lock().remove(&name);
        let result = result?;
        if result.is_err() {
            // Leave the entry in place: status queries report the crash
            warn!(process = %name, "start failed");
        }
        result
    }

    /// Status snapshot of every known process, in insertion order.
    pub fn list_processes(&self) -> Vec<ProcessStatus> {
        self.processes.lock().values().map(|p| p.status()).collect()
    }

    pub fn status(&self, name: &str) -> Option<ProcessStatus> {
        self.processes.lock().get(name).map(|p| p.status())
    }

    pub fn is_running(&self, name: &str) -> bool {
        self.processes.lock().get(name).is_some_and(|p| p.is_running())
    }

    /// Running or pending restart.
    pub fn is_live(&self, name: &str) -> bool {
        self.processes.lock().get(name).is_some_and(|p| p.is_live())
    }

    pub fn has_input_enabled(&self, name: &str) -> Result<bool, ProcessError> {
        self.get(name).map(|p| p.input_enabled())
    }

    pub async fn write_input(&self, name: &str, data: &[u8]) -> Result<(), ProcessError> {
        self.get(name)?.write_input(data).await
    }

    pub async fn stop_process(
        &self,
        name: &str,
        force: bool,
        timeout: Duration,
    ) -> Result<(), ProcessError> {
        self.get(name)?.stop(force, timeout).await
    }

    pub async fn restart_process(
        &self,
        name: &str,
        force: bool,
        timeout: Duration,
    ) -> Result<(), ProcessError> {
        self.get(name)?.restart(force, timeout).await
    }

    /// Stop a process and forget it.
    pub async fn delete_process(
        &self,
        name: &str,
        force: bool,
        timeout: Duration,
    ) -> Result<(), ProcessError> {
        let process = self.get(name)?;
        process.stop(force, timeout).await?;
        self.processes.lock().shift_remove(name);
        info!(process = %name, "process deleted");
        Ok(())
    }

    /// Names of every known process, in insertion order.
    pub fn names(&self) -> Vec<String> {
        self.processes.lock().keys().cloned().collect()
    }

    /// Stop every running process concurrently under one deadline.
    pub async fn stop_all(&self, timeout: Duration) {
        let processes: Vec<Arc<ManagedProcess>> =
            self.processes.lock().values().map(Arc::clone).collect();

        let mut set = JoinSet::new();
        for process in processes {
            set.spawn(async move {
                if let Err(e) = process.stop(false, timeout).await {
                    warn!(process = %process.name(), error = %e, "stop failed during shutdown");
                }
            });
        }
        while set.join_next().await.is_some() {}
    }

    fn get(&self, name: &str) -> Result<Arc<ManagedProcess>, ProcessError> {
        self.processes
            .lock()
            .get(name)
            .map(Arc::clone)
            .ok_or_else(|| ProcessError::UnknownProcess(name.to_string()))
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
