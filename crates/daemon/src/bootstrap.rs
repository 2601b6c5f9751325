// SPDX-License-Identifier: MIT

//! Bootstrapper: starts `clierd` in the background for a project and
//! enforces single-instance.
//!
//! The client spawns a detached child, writes its pid under the project
//! directory, and polls the control socket until the daemon answers
//! `ping`. The daemon itself re-checks single-instance under an
//! exclusive pid lock, so two concurrent bootstraps race safely.

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::info;

use clier_core::paths;

use crate::env;
use crate::lifecycle::probe_alive;

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("daemon already running for this project")]
    AlreadyRunning,

    #[error("failed to spawn daemon: {0}")]
    SpawnFailed(std::io::Error),

    #[error("daemon did not become ready within {0:?}")]
    NotReady(Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Spawn a detached daemon for `project_root` and wait until it is
/// ready. Returns the daemon's pid.
pub async fn start_daemon(project_root: &Path, daemon_binary: &Path) -> Result<u32, BootstrapError> {
    let socket = paths::socket_path(project_root);
    if probe_alive(&socket).await {
        return Err(BootstrapError::AlreadyRunning);
    }
    std::fs::create_dir_all(paths::state_dir(project_root))?;

    let mut command = std::process::Command::new(daemon_binary);
    command
        .arg(project_root)
        .current_dir(project_root)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    // Detach from the client's process group so the daemon survives it
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }
    let child = command.spawn().map_err(BootstrapError::SpawnFailed)?;
    let pid = child.id();
    std::fs::write(paths::pid_path(project_root), format!("{pid}\n"))?;
    info!(pid, "daemon spawned; waiting for readiness");

    wait_until_ready(&socket).await?;
    Ok(pid)
}

/// Poll `ping` until the daemon answers or the ready deadline passes.
async fn wait_until_ready(socket: &Path) -> Result<(), BootstrapError> {
    let deadline = env::ready_wait();
    let started = Instant::now();
    loop {
        if probe_alive(socket).await {
            return Ok(());
        }
        if started.elapsed() >= deadline {
            return Err(BootstrapError::NotReady(deadline));
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}
