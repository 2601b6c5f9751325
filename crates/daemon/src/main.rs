// SPDX-License-Identifier: MIT

//! Clier daemon (clierd)
//!
//! Background process that supervises one project's pipeline.
//!
//! Architecture:
//! - Listener task: socket I/O, forwards requests to the engine loop
//! - Engine loop: single executor for control requests, raw process
//!   events, and shutdown signals

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use std::path::PathBuf;
use std::sync::Arc;

use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tracing::{error, info};

use clier_daemon::handlers;
use clier_daemon::lifecycle::{self, DaemonPaths, LifecycleError, StartupResult};
use clier_daemon::listener::ControlServer;
use clier_logs::{RotatingWriter, DEFAULT_MAX_FILES, DEFAULT_MAX_FILE_SIZE};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let project_root = match parse_args() {
        ParsedArgs::Run(root) => root,
        ParsedArgs::Exit(code) => std::process::exit(code),
    };
    let project_root = std::fs::canonicalize(&project_root).unwrap_or(project_root);
    let daemon_paths = DaemonPaths::new(project_root);

    // Daemon log writers rotate like per-process logs
    let combined_writer = RotatingWriter::new(
        daemon_paths.combined_log.clone(),
        DEFAULT_MAX_FILE_SIZE,
        DEFAULT_MAX_FILES,
    );
    let error_writer = RotatingWriter::new(
        daemon_paths.error_log.clone(),
        DEFAULT_MAX_FILE_SIZE,
        DEFAULT_MAX_FILES,
    );
    let log_guards = setup_logging(combined_writer.clone(), error_writer.clone());

    info!(project = %daemon_paths.project_root.display(), "starting daemon");

    let StartupResult { mut daemon, listener, mut events_rx } =
        match lifecycle::startup(daemon_paths, combined_writer, error_writer).await {
            Ok(result) => result,
            Err(LifecycleError::AlreadyRunning) | Err(LifecycleError::LockFailed(_)) => {
                eprintln!("clierd is already running for this project");
                std::process::exit(1);
            }
            Err(e) => {
                error!(error = %e, "failed to start daemon");
                eprintln!("error: {e}");
                drop(log_guards);
                std::process::exit(1);
            }
        };

    // Listener task: accepts connections, forwards requests
    let (control_tx, mut control_rx) = mpsc::unbounded_channel();
    let server_task = tokio::spawn(ControlServer::new(listener, control_tx).run());

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    let shutdown = Arc::clone(&daemon.shutdown);

    // Start entry points before announcing readiness
    daemon.supervisor.start().await;
    info!(socket = %daemon.paths.socket.display(), "daemon ready");
    println!("READY");

    // Engine loop: the single writer over orchestrator and handler state
    loop {
        tokio::select! {
            Some(msg) = control_rx.recv() => {
                let response = handlers::handle(&mut daemon, &mut events_rx, msg.request).await;
                let _ = msg.respond.send(response);
            }

            Some(event) = events_rx.recv() => {
                daemon.supervisor.handle_process_event(event).await;
            }

            _ = shutdown.notified() => {
                info!("shutdown requested via control socket");
                break;
            }

            _ = sigterm.recv() => {
                info!("received SIGTERM, shutting down");
                break;
            }

            _ = sigint.recv() => {
                info!("received SIGINT, shutting down");
                break;
            }
        }
    }

    // (1) stop accepting control requests; in-flight responses are
    // abandoned and clients see a connection-closed error
    server_task.abort();
    drop(control_rx);

    // (2)–(6) ordered teardown
    daemon.shutdown_sequence().await;
    info!("daemon stopped");
    drop(log_guards);
    Ok(())
}

enum ParsedArgs {
    Run(PathBuf),
    Exit(i32),
}

fn parse_args() -> ParsedArgs {
    let mut project_root = None;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("clierd {}", env!("CARGO_PKG_VERSION"));
                return ParsedArgs::Exit(0);
            }
            "--help" | "-h" => {
                println!("clierd {}", env!("CARGO_PKG_VERSION"));
                println!("Clier daemon - supervises one project's pipeline");
                println!();
                println!("USAGE:");
                println!("    clierd [project-root]");
                println!();
                println!("The daemon is typically started by the client CLI and should");
                println!("not be invoked directly. It listens on a Unix socket under");
                println!("<project-root>/.clier/ for control requests.");
                return ParsedArgs::Exit(0);
            }
            other if !other.starts_with('-') && project_root.is_none() => {
                project_root = Some(PathBuf::from(other));
            }
            other => {
                eprintln!("error: unexpected argument '{other}'");
                eprintln!("Usage: clierd [project-root]");
                return ParsedArgs::Exit(1);
            }
        }
    }
    match project_root {
        Some(root) => ParsedArgs::Run(root),
        None => match std::env::current_dir() {
            Ok(cwd) => ParsedArgs::Run(cwd),
            Err(e) => {
                eprintln!("error: cannot determine working directory: {e}");
                ParsedArgs::Exit(1)
            }
        },
    }
}

/// Two fmt layers through the rotating writers: everything to
/// `combined.log`, warnings and errors to `error.log`.
fn setup_logging(
    combined: RotatingWriter,
    errors: RotatingWriter,
) -> (tracing_appender::non_blocking::WorkerGuard, tracing_appender::non_blocking::WorkerGuard) {
    use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*, EnvFilter};

    let (combined_writer, combined_guard) = tracing_appender::non_blocking(combined);
    let (error_writer, error_guard) = tracing_appender::non_blocking(errors);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_ansi(false).with_writer(combined_writer))
        .with(fmt::layer().with_ansi(false).with_writer(error_writer).with_filter(LevelFilter::WARN))
        .init();

    (combined_guard, error_guard)
}
