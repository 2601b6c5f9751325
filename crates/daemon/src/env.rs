// SPDX-License-Identifier: MIT

//! Environment-variable overrides for daemon timings.

use std::time::Duration;

fn duration_ms(var: &str, default_ms: u64) -> Duration {
    let ms = std::env::var(var)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default_ms);
    Duration::from_millis(ms)
}

/// Graceful-stop window before SIGKILL escalation
/// (`CLIER_STOP_TIMEOUT_MS`, default 5000).
pub fn stop_timeout() -> Duration {
    duration_ms("CLIER_STOP_TIMEOUT_MS", 5000)
}

/// How long the bootstrapper waits for the daemon to answer `ping`
/// (`CLIER_READY_WAIT_MS`, default 2000).
pub fn ready_wait() -> Duration {
    duration_ms("CLIER_READY_WAIT_MS", 2000)
}

/// Timeout for the stale-socket liveness probe
/// (`CLIER_PROBE_TIMEOUT_MS`, default 500).
pub fn probe_timeout() -> Duration {
    duration_ms("CLIER_PROBE_TIMEOUT_MS", 500)
}
