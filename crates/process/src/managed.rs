// SPDX-License-Identifier: MIT

//! One managed child process.
//!
//! The exit event is released only when three conditions hold: the OS
//! exit notification arrived, stdout closed, and stderr closed. This is
//! the drain guarantee — exit consumers see the complete output tail.
//! When a stop was requested and the join has not completed within
//! `timeout + STOP_GRACE`, the exit is emitted with whatever output
//! accumulated and the streams are considered closed.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use indexmap::IndexMap;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use clier_core::{Clock, LogEntry, LogStream, ProcessKind, ProcessState, ProcessStatus, RestartPolicy, SystemClock};

use crate::backoff::{delay_for, BackoffConfig};
use crate::event::ProcessEvent;

/// Default graceful-stop window before SIGKILL escalation.
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Additional margin after escalation before forced exit emission.
pub const STOP_GRACE: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("process '{0}' is already running")]
    AlreadyRunning(String),

    #[error("process '{0}' is not running")]
    NotRunning(String),

    #[error("failed to spawn '{name}': {source}")]
    SpawnFailed { name: String, source: std::io::Error },

    #[error("stdin is not enabled for '{0}'")]
    InputDisabled(String),

    #[error("unknown process '{0}'")]
    UnknownProcess(String),

    #[error("spawn rate limiter is shut down")]
    LimiterClosed,

    #[error("circuit breaker is open; refusing to start '{0}'")]
    CircuitOpen(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Everything needed to spawn and supervise one child.
#[derive(Debug, Clone)]
pub struct ProcessConfig {
    pub name: String,
    /// Shell command string, run via `sh -c`
    pub command: String,
    pub kind: ProcessKind,
    pub cwd: Option<PathBuf>,
    pub env: IndexMap<String, String>,
    /// Start from an empty environment instead of inheriting the daemon's
    pub clear_env: bool,
    pub restart: RestartPolicy,
    pub input_enabled: bool,
    pub stop_timeout: Duration,
    pub backoff: BackoffConfig,
}

impl ProcessConfig {
    pub fn new(name: impl Into<String>, command: impl Into<String>, kind: ProcessKind) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            kind,
            cwd: None,
            env: IndexMap::new(),
            clear_env: false,
            restart: RestartPolicy::default_for(kind),
            input_enabled: false,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
            backoff: BackoffConfig::default(),
        }
    }
}

struct Inner {
    state: ProcessState,
    pid: Option<u32>,
    started_at: Option<Instant>,
    restart_count: u32,
    /// Automatic restart attempts since the last manual start
    attempt: u32,
    exit_code: Option<i32>,
    signal: Option<i32>,
    stop_requested: bool,
    /// Trips forced exit emission for the current child
    force_emit: Option<CancellationToken>,
    restart_timer: Option<JoinHandle<()>>,
}

/// Owns exactly one child process across its restarts.
pub struct ManagedProcess {
    config: ProcessConfig,
    events: mpsc::Sender<ProcessEvent>,
    inner: Mutex<Inner>,
    stdin: tokio::sync::Mutex<Option<ChildStdin>>,
    exited: Notify,
}

impl ManagedProcess {
    pub fn new(config: ProcessConfig, events: mpsc::Sender<ProcessEvent>) -> Self {
        Self {
            config,
            events,
            inner: Mutex::new(Inner {
                state: ProcessState::Stopped,
                pid: None,
                started_at: None,
                restart_count: 0,
                attempt: 0,
                exit_code: None,
                signal: None,
                stop_requested: false,
                force_emit: None,
                restart_timer: None,
            }),
            stdin: tokio::sync::Mutex::new(None),
            exited: Notify::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &ProcessConfig {
        &self.config
    }

    /// Manual start. Resets the automatic retry counter.
    pub async fn start(self: &Arc<Self>) -> Result<(), ProcessError> {
        self.inner.lock().attempt = 0;
        self.spawn_child().await
    }

    /// `stop` then `start`, resetting the retry counter.
    pub async fn restart(self: &Arc<Self>, force: bool, timeout: Duration) -> Result<(), ProcessError> {
        self.stop(force, timeout).await?;
        self.inner.lock().restart_count += 1;
        self.start().await
    }

    /// Signal the child and wait for its exit event.
    ///
    /// Graceful: SIGTERM, escalating to SIGKILL against the process group
    /// after `timeout`. Force: SIGKILL immediately. Resolves within
    /// `timeout + STOP_GRACE` regardless of stream state. Idempotent when
    /// not running.
    pub async fn stop(&self, force: bool, timeout: Duration) -> Result<(), ProcessError> {
        let (running, pid, force_token) = {
            let mut inner = self.inner.lock();
            inner.stop_requested = true;
            if let Some(timer) = inner.restart_timer.take() {
                timer.abort();
            }
            if inner.state == ProcessState::Restarting {
                inner.state = ProcessState::Stopped;
            }
            (inner.state == ProcessState::Running, inner.pid, inner.force_emit.clone())
        };

        if !running {
            return Ok(());
        }
        let Some(pid) = pid else {
            return Ok(());
        };

        let signal = if force { Signal::SIGKILL } else { Signal::SIGTERM };
        deliver_signal(pid, signal, &self.config.name);

        if tokio::time::timeout(timeout, self.wait_exited()).await.is_ok() {
            return Ok(());
        }

        if !force {
            warn!(
                process = %self.config.name,
                timeout_ms = timeout.as_millis() as u64,
                "graceful stop timed out; escalating to SIGKILL"
            );
            deliver_signal(pid, Signal::SIGKILL, &self.config.name);
        }

        if tokio::time::timeout(STOP_GRACE, self.wait_exited()).await.is_ok() {
            return Ok(());
        }

        // Streams never closed; force the exit emission
        warn!(process = %self.config.name, "streams did not close after kill; forcing exit emission");
        if let Some(token) = force_token {
            token.cancel();
        }
        let _ = tokio::time::timeout(Duration::from_secs(1), self.wait_exited()).await;
        Ok(())
    }

    /// Write raw bytes to the child's stdin.
    pub async fn write_input(&self, data: &[u8]) -> Result<(), ProcessError> {
        if !self.config.input_enabled {
            return Err(ProcessError::InputDisabled(self.config.name.clone()));
        }
        if self.inner.lock().state != ProcessState::Running {
            return Err(ProcessError::NotRunning(self.config.name.clone()));
        }
        let mut guard = self.stdin.lock().await;
        let stdin = guard
            .as_mut()
            .ok_or_else(|| ProcessError::NotRunning(self.config.name.clone()))?;
        stdin.write_all(data).await?;
        stdin.flush().await?;
        Ok(())
    }

    pub fn status(&self) -> ProcessStatus {
        let inner = self.inner.lock();
        let uptime_ms = match (inner.state, inner.started_at) {
            (ProcessState::Running, Some(at)) => at.elapsed().as_millis() as u64,
            _ => 0,
        };
        ProcessStatus {
            name: self.config.name.clone(),
            kind: self.config.kind,
            state: inner.state,
            pid: inner.pid,
            uptime_ms,
            restart_count: inner.restart_count,
            exit_code: inner.exit_code,
            signal: inner.signal,
        }
    }

    pub fn state(&self) -> ProcessState {
        self.inner.lock().state
    }

    pub fn is_running(&self) -> bool {
        self.inner.lock().state == ProcessState::Running
    }

    /// Running or waiting on a restart timer.
    pub fn is_live(&self) -> bool {
        matches!(self.inner.lock().state, ProcessState::Running | ProcessState::Restarting)
    }

    pub fn input_enabled(&self) -> bool {
        self.config.input_enabled
    }

    /// Spawn the child and wire stream capture plus the monitor task.
    ///
    /// Boxed because this function is indirectly recursive (a restart
    /// timer task calls back into it), which rustc cannot prove `Send`
    /// for as a plain `async fn` opaque type.
    fn spawn_child(
        self: &Arc<Self>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), ProcessError>> + Send + '_>> {
        Box::pin(async move {
            {
                let mut inner = self.inner.lock();
                if inner.state == ProcessState::Running {
                    return Err(ProcessError::AlreadyRunning(self.config.name.clone()));
                }
                inner.stop_requested = false;
                inner.exit_code = None;
                inner.signal = None;
            }

        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(&self.config.command);
        if let Some(cwd) = &self.config.cwd {
            cmd.current_dir(cwd);
        }
        if self.config.clear_env {
            cmd.env_clear();
        }
        for (key, value) in &self.config.env {
            cmd.env(key, value);
        }
        cmd.stdin(if self.config.input_enabled { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        // Own process group so signals reach the whole tree
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(source) => {
                self.inner.lock().state = ProcessState::Crashed;
                error!(process = %self.config.name, error = %source, "spawn failed");
                let _ = self
                    .events
                    .send(ProcessEvent::Exit {
                        process: self.config.name.clone(),
                        code: None,
                        signal: None,
                        output: Vec::new(),
                        timestamp: SystemClock.epoch_ms(),
                    })
                    .await;
                self.exited.notify_waiters();
                return Err(ProcessError::SpawnFailed { name: self.config.name.clone(), source });
            }
        };

        let pid = child.id();
        let force_emit = CancellationToken::new();
        {
            let mut inner = self.inner.lock();
            inner.state = ProcessState::Running;
            inner.pid = pid;
            inner.started_at = Some(Instant::now());
            inner.force_emit = Some(force_emit.clone());
        }
        info!(process = %self.config.name, pid, "process started");

        *self.stdin.lock().await = child.stdin.take();

        let pending: Arc<Mutex<Vec<LogEntry>>> = Arc::new(Mutex::new(Vec::new()));
        let stdout_task = spawn_reader(
            child.stdout.take(),
            LogStream::Stdout,
            self.config.name.clone(),
            self.events.clone(),
            Arc::clone(&pending),
        );
        let stderr_task = spawn_reader(
            child.stderr.take(),
            LogStream::Stderr,
            self.config.name.clone(),
            self.events.clone(),
            Arc::clone(&pending),
        );

        let this = Arc::clone(self);
        tokio::spawn(this.monitor(child, stdout_task, stderr_task, pending, force_emit));
            Ok(())
        })
    }

    /// Wait for the OS exit, join the stream drain, emit the exit event,
    /// then apply the restart policy.
    async fn monitor(
        self: Arc<Self>,
        mut child: Child,
        mut stdout_task: JoinHandle<()>,
        mut stderr_task: JoinHandle<()>,
        pending: Arc<Mutex<Vec<LogEntry>>>,
        force_emit: CancellationToken,
    ) {
        // The OS exit itself is raced against forced emission: when
        // signal delivery fails entirely, wait() may never return, and
        // the forced exit path must still unblock the monitor
        let status = tokio::select! {
            status = child.wait() => Some(status),
            _ = force_emit.cancelled() => {
                warn!(process = %self.config.name, "child did not report exit; forcing exit emission");
                None
            }
        };
        let (code, sig) = match &status {
            Some(Ok(status)) => {
                #[cfg(unix)]
                let sig = std::os::unix::process::ExitStatusExt::signal(status);
                #[cfg(not(unix))]
                let sig = None;
                (status.code(), sig)
            }
            Some(Err(e)) => {
                warn!(process = %self.config.name, error = %e, "wait on child failed");
                (None, None)
            }
            None => (None, None),
        };

        // Drain join: both streams must close before the exit is
        // released. On the forced path the token is already cancelled
        // and this resolves immediately.
        let drained = tokio::select! {
            _ = async {
                let _ = (&mut stdout_task).await;
                let _ = (&mut stderr_task).await;
            } => true,
            _ = force_emit.cancelled() => false,
        };
        if !drained {
            stdout_task.abort();
            stderr_task.abort();
            warn!(process = %self.config.name, "exit emitted before stream closure (forced)");
        }

        *self.stdin.lock().await = None;
        let output = std::mem::take(&mut *pending.lock());

        let action = {
            let mut inner = self.inner.lock();
            inner.pid = None;
            inner.started_at = None;
            inner.exit_code = code;
            inner.signal = sig;
            inner.force_emit = None;
            decide_exit_action(&mut inner, &self.config, code)
        };

        debug!(
            process = %self.config.name,
            code,
            signal = sig,
            lines = output.len(),
            "process exited"
        );
        let _ = self
            .events
            .send(ProcessEvent::Exit {
                process: self.config.name.clone(),
                code,
                signal: sig,
                output,
                timestamp: SystemClock.epoch_ms(),
            })
            .await;
        self.exited.notify_waiters();

        match action {
            ExitAction::None => {}
            ExitAction::GiveUp => {
                error!(
                    process = %self.config.name,
                    attempts = self.config.backoff.max_attempts,
                    "restart ceiling reached; giving up"
                );
            }
            ExitAction::Restart(delay) => {
                info!(
                    process = %self.config.name,
                    delay_ms = delay.as_millis() as u64,
                    "scheduling restart"
                );
                let this = Arc::clone(&self);
                let timer = tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let stop_requested = this.inner.lock().stop_requested;
                    if stop_requested {
                        return;
                    }
                    {
                        let mut inner = this.inner.lock();
                        inner.restart_count += 1;
                    }
                    if let Err(e) = this.spawn_child().await {
                        error!(process = %this.config.name, error = %e, "automatic restart failed");
                    }
                });
                self.inner.lock().restart_timer = Some(timer);
            }
        }
    }

    /// Resolve once the process is no longer running (exit emitted).
    async fn wait_exited(&self) {
        loop {
            let notified = self.exited.notified();
            if self.inner.lock().state != ProcessState::Running {
                return;
            }
            notified.await;
        }
    }
}

enum ExitAction {
    None,
    Restart(Duration),
    GiveUp,
}

/// Apply the restart policy to an exit and set the post-exit state.
fn decide_exit_action(inner: &mut Inner, config: &ProcessConfig, code: Option<i32>) -> ExitAction {
    let failed = code != Some(0);

    if inner.stop_requested {
        inner.state = ProcessState::Stopped;
        return ExitAction::None;
    }
    if config.kind == ProcessKind::Task {
        inner.state = if failed { ProcessState::Crashed } else { ProcessState::Stopped };
        return ExitAction::None;
    }
    let restart = match config.restart {
        RestartPolicy::Never => false,
        RestartPolicy::OnFailure => failed,
        RestartPolicy::Always => true,
    };
    if !restart {
        inner.state = if failed { ProcessState::Crashed } else { ProcessState::Stopped };
        return ExitAction::None;
    }

    inner.attempt += 1;
    if inner.attempt > config.backoff.max_attempts {
        inner.state = ProcessState::Crashed;
        return ExitAction::GiveUp;
    }
    inner.state = ProcessState::Restarting;
    ExitAction::Restart(delay_for(&config.backoff, inner.attempt))
}

/// Read a stream line by line, forwarding non-empty lines as events and
/// into the pending buffer. Returns when the stream closes or errors.
fn spawn_reader<R>(
    stream: Option<R>,
    stream_tag: LogStream,
    process: String,
    events: mpsc::Sender<ProcessEvent>,
    pending: Arc<Mutex<Vec<LogEntry>>>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let Some(stream) = stream else {
            return;
        };
        let mut lines = BufReader::new(stream).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if line.is_empty() {
                        continue;
                    }
                    let timestamp = SystemClock.epoch_ms();
                    pending.lock().push(LogEntry::new(timestamp, stream_tag, line.clone(), &process));
                    let event = match stream_tag {
                        LogStream::Stderr => {
                            ProcessEvent::Stderr { process: process.clone(), line, timestamp }
                        }
                        _ => ProcessEvent::Stdout { process: process.clone(), line, timestamp },
                    };
                    if events.send(event).await.is_err() {
                        return;
                    }
                }
                Ok(None) => return,
                Err(e) => {
                    // Treat a read failure as stream closure so the drain
                    // join can complete
                    warn!(process = %process, error = %e, "stream read failed");
                    return;
                }
            }
        }
    })
}

/// Signal the process group, falling back to the main child.
fn deliver_signal(pid: u32, signal: Signal, name: &str) {
    let target = Pid::from_raw(pid as i32);
    if let Err(group_err) = signal::killpg(target, signal) {
        debug!(process = %name, error = %group_err, "group signal failed; signaling child directly");
        if let Err(kill_err) = signal::kill(target, signal) {
            warn!(process = %name, error = %kill_err, "signal delivery failed; relying on forced exit");
        }
    }
}

#[cfg(test)]
#[path = "managed_tests.rs"]
mod tests;
