// SPDX-License-Identifier: MIT

//! Persisted state layout under `<project-root>/.clier/`.

use std::path::{Path, PathBuf};

/// State directory name under the project root.
pub const STATE_DIR_NAME: &str = ".clier";

/// `<project-root>/.clier`
pub fn state_dir(project_root: &Path) -> PathBuf {
    project_root.join(STATE_DIR_NAME)
}

/// Control socket: `<project-root>/.clier/daemon.sock`
pub fn socket_path(project_root: &Path) -> PathBuf {
    state_dir(project_root).join("daemon.sock")
}

/// Pid file: `<project-root>/.clier/daemon.pid`
pub fn pid_path(project_root: &Path) -> PathBuf {
    state_dir(project_root).join("daemon.pid")
}

/// Per-process log directory: `<project-root>/.clier/logs`
pub fn logs_dir(project_root: &Path) -> PathBuf {
    state_dir(project_root).join("logs")
}

/// Replace every character outside `[A-Za-z0-9_-]` with `_`.
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect()
}

/// Current log file for a process: `logs/<sanitized-name>.log`
pub fn process_log_path(logs_dir: &Path, name: &str) -> PathBuf {
    logs_dir.join(format!("{}.log", sanitize_name(name)))
}

#[cfg(test)]
#[path = "paths_tests.rs"]
mod tests;
