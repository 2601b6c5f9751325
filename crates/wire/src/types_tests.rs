// SPDX-License-Identifier: MIT

use super::*;

#[test]
fn logs_query_params_default_to_empty() {
    let params: LogsQueryParams = serde_json::from_str("{}").unwrap();
    assert_eq!(params, LogsQueryParams::default());
}

#[test]
fn stop_params_force_defaults_false() {
    let params: crate::StopParams =
        serde_json::from_str(r#"{"name":"web"}"#).unwrap();
    assert!(!params.force);
}

#[test]
fn status_result_round_trips() {
    let status = StatusResult {
        project: "demo".to_string(),
        pid: 42,
        version: "0.1.0".to_string(),
        uptime_ms: 1000,
        process_count: 3,
        running_count: 2,
    };
    let json = serde_json::to_string(&status).unwrap();
    let back: StatusResult = serde_json::from_str(&json).unwrap();
    assert_eq!(back, status);
}
