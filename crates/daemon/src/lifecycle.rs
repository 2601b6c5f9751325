// SPDX-License-Identifier: MIT

//! Daemon lifecycle: path layout, startup, shutdown, single-instance
//! enforcement.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use fs2::FileExt;
use thiserror::Error;
use tokio::net::UnixListener;
use tokio::sync::{mpsc, Notify};
use tracing::{info, warn};

use clier_config::ConfigError;
use clier_core::paths;
use clier_logs::RotatingWriter;
use clier_process::{ProcessEvent, EVENT_CHANNEL_CAPACITY};
use clier_wire::Client;

use crate::env;
use crate::supervisor::Supervisor;

/// Name of the configuration file under the project root.
pub const CONFIG_FILE_NAME: &str = "clier.json";

/// Persisted state layout for one project.
#[derive(Debug, Clone)]
pub struct DaemonPaths {
    pub project_root: PathBuf,
    pub state_dir: PathBuf,
    pub socket: PathBuf,
    pub pid_file: PathBuf,
    pub logs_dir: PathBuf,
    pub combined_log: PathBuf,
    pub error_log: PathBuf,
    pub config_file: PathBuf,
}

impl DaemonPaths {
    pub fn new(project_root: PathBuf) -> Self {
        let state_dir = paths::state_dir(&project_root);
        let logs_dir = paths::logs_dir(&project_root);
        Self {
            socket: paths::socket_path(&project_root),
            pid_file: paths::pid_path(&project_root),
            combined_log: logs_dir.join("combined.log"),
            error_log: logs_dir.join("error.log"),
            config_file: project_root.join(CONFIG_FILE_NAME),
            state_dir,
            logs_dir,
            project_root,
        }
    }
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("daemon already running for this project")]
    AlreadyRunning,

    #[error("failed to acquire pid lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("failed to bind socket at {0}: {1}")]
    BindFailed(PathBuf, std::io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Live daemon state during operation.
pub struct Daemon {
    pub paths: DaemonPaths,
    pub supervisor: Supervisor,
    pub start_time: Instant,
    /// Notified by `daemon.shutdown` to break the engine loop
    pub shutdown: Arc<Notify>,
    pub combined_writer: RotatingWriter,
    pub error_writer: RotatingWriter,
    // NOTE(lifetime): held to maintain the exclusive pid lock; released on drop
    #[allow(dead_code)]
    pid_lock: File,
}

/// Everything `startup` hands back to the engine loop.
pub struct StartupResult {
    pub daemon: Daemon,
    pub listener: UnixListener,
    pub events_rx: mpsc::Receiver<ProcessEvent>,
}

impl std::fmt::Debug for StartupResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StartupResult").finish_non_exhaustive()
    }
}

/// Start the daemon for one project.
pub async fn startup(
    daemon_paths: DaemonPaths,
    combined_writer: RotatingWriter,
    error_writer: RotatingWriter,
) -> Result<StartupResult, LifecycleError> {
    let cleanup = daemon_paths.clone();
    match startup_inner(daemon_paths, combined_writer, error_writer).await {
        Ok(result) => Ok(result),
        Err(e) => {
            // Files we failed to claim belong to the running daemon
            if !matches!(e, LifecycleError::AlreadyRunning | LifecycleError::LockFailed(_)) {
                cleanup_on_failure(&cleanup);
            }
            Err(e)
        }
    }
}

async fn startup_inner(
    daemon_paths: DaemonPaths,
    combined_writer: RotatingWriter,
    error_writer: RotatingWriter,
) -> Result<StartupResult, LifecycleError> {
    // 1. State directories
    std::fs::create_dir_all(&daemon_paths.state_dir)?;
    std::fs::create_dir_all(&daemon_paths.logs_dir)?;

    // 2. Exclusive pid lock FIRST: closes the race two concurrent
    // startups would otherwise win together, and a losing contender
    // never touches the winner's files. Open without truncating so the
    // loser does not wipe the winner's pid.
    let pid_lock = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&daemon_paths.pid_file)?;
    pid_lock.try_lock_exclusive().map_err(LifecycleError::LockFailed)?;
    let mut pid_lock = pid_lock;
    pid_lock.set_len(0)?;
    writeln!(pid_lock, "{}", std::process::id())?;
    let pid_lock = pid_lock;

    // 3. Stale socket: removed only after a liveness probe confirms no
    // daemon is listening (covers filesystems where the lock is
    // unreliable)
    if daemon_paths.socket.exists() {
        if probe_alive(&daemon_paths.socket).await {
            return Err(LifecycleError::AlreadyRunning);
        }
        info!(socket = %daemon_paths.socket.display(), "removing stale socket");
        std::fs::remove_file(&daemon_paths.socket)?;
    }

    // 4. Configuration; a validation error aborts startup verbatim
    let (config, flat) = clier_config::load(&daemon_paths.config_file)?;

    // 5. Supervisor and the shared raw-event channel
    let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let supervisor = Supervisor::new(
        daemon_paths.project_root.clone(),
        daemon_paths.config_file.clone(),
        config,
        flat,
        events_tx,
    );

    // 6. Bind last, once everything else is in place; restrict to owner
    let listener = UnixListener::bind(&daemon_paths.socket)
        .map_err(|e| LifecycleError::BindFailed(daemon_paths.socket.clone(), e))?;
    set_socket_permissions(&daemon_paths.socket)?;

    info!(project = %daemon_paths.project_root.display(), "daemon started");

    Ok(StartupResult {
        daemon: Daemon {
            paths: daemon_paths,
            supervisor,
            start_time: Instant::now(),
            shutdown: Arc::new(Notify::new()),
            combined_writer,
            error_writer,
            pid_lock,
        },
        listener,
        events_rx,
    })
}

impl Daemon {
    /// Ordered shutdown: supervisor teardown (stop orchestration, cancel
    /// debounced restarts, terminate children, flush logs), then unlink
    /// the socket and pid files.
    pub async fn shutdown_sequence(&mut self) {
        self.supervisor.stop().await;

        if let Err(e) = std::fs::remove_file(&self.paths.socket) {
            warn!(error = %e, "failed to remove socket file");
        }
        if let Err(e) = std::fs::remove_file(&self.paths.pid_file) {
            warn!(error = %e, "failed to remove pid file");
        }
        info!("daemon shutdown complete");
    }
}

/// True when a daemon answers `ping` on the socket.
pub async fn probe_alive(socket: &Path) -> bool {
    let timeout = env::probe_timeout();
    match Client::connect_with_timeout(socket, timeout).await {
        Ok(mut client) => {
            client.set_request_timeout(timeout);
            client.ping().await.is_ok()
        }
        Err(_) => false,
    }
}

fn set_socket_permissions(socket: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(socket, std::fs::Permissions::from_mode(0o600))
}

fn cleanup_on_failure(paths: &DaemonPaths) {
    let _ = std::fs::remove_file(&paths.socket);
    let _ = std::fs::remove_file(&paths.pid_file);
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
