// SPDX-License-Identifier: MIT

use super::*;

fn config_from(json: serde_json::Value) -> Config {
    serde_json::from_value(json).unwrap()
}

fn base_config(pipeline: serde_json::Value) -> Config {
    config_from(serde_json::json!({
        "project_name": "demo",
        "safety": { "max_ops_per_minute": 10, "debounce_ms": 0 },
        "pipeline": pipeline
    }))
}

#[test]
fn accepts_valid_config() {
    let config = base_config(serde_json::json!([
        { "type": "service", "name": "web", "command": "npm start" },
        { "type": "task", "name": "build", "command": "make" }
    ]));
    let flat = validate(&config).unwrap();
    assert_eq!(flat.items.len(), 2);
}

#[test]
fn rejects_empty_project_name() {
    let mut config = base_config(serde_json::json!([
        { "type": "task", "name": "t", "command": "true" }
    ]));
    config.project_name.clear();
    assert!(matches!(validate(&config), Err(ConfigError::EmptyProjectName)));
}

#[test]
fn rejects_empty_pipeline() {
    let config = config_from(serde_json::json!({
        "project_name": "demo",
        "safety": { "max_ops_per_minute": 1, "debounce_ms": 0 },
        "pipeline": []
    }));
    assert!(matches!(validate(&config), Err(ConfigError::EmptyPipeline)));
}

#[test]
fn rejects_zero_ops_per_minute() {
    let config = config_from(serde_json::json!({
        "project_name": "demo",
        "safety": { "max_ops_per_minute": 0, "debounce_ms": 0 },
        "pipeline": [ { "type": "task", "name": "t", "command": "true" } ]
    }));
    assert!(matches!(validate(&config), Err(ConfigError::ZeroOpsPerMinute)));
}

#[test]
fn rejects_zero_breaker_bounds() {
    let config = config_from(serde_json::json!({
        "project_name": "demo",
        "safety": {
            "max_ops_per_minute": 1,
            "debounce_ms": 0,
            "circuit_breaker": {
                "enabled": true, "error_threshold": 50,
                "timeout_ms": 0, "reset_timeout_ms": 1000
            }
        },
        "pipeline": [ { "type": "task", "name": "t", "command": "true" } ]
    }));
    assert!(matches!(validate(&config), Err(ConfigError::ZeroBreakerBound("timeout_ms"))));
}

#[test]
fn rejects_duplicate_names_after_flattening() {
    let config = base_config(serde_json::json!([
        { "type": "service", "name": "web", "command": "a" },
        { "type": "stage", "name": "s", "steps": [
            { "type": "task", "name": "web", "command": "b" }
        ]}
    ]));
    match validate(&config) {
        Err(ConfigError::DuplicateName(name)) => assert_eq!(name, "web"),
        other => panic!("expected duplicate name error, got {other:?}"),
    }
}

#[test]
fn rejects_empty_command() {
    let config = base_config(serde_json::json!([
        { "type": "task", "name": "t", "command": "" }
    ]));
    assert!(matches!(
        validate(&config),
        Err(ConfigError::EmptyField { field: "command", .. })
    ));
}

#[test]
fn rejects_empty_stage() {
    let config = base_config(serde_json::json!([
        { "type": "stage", "name": "empty", "steps": [] }
    ]));
    assert!(matches!(validate(&config), Err(ConfigError::EmptyStage(_))));
}

#[test]
fn rejects_malformed_pattern() {
    let config = base_config(serde_json::json!([
        { "type": "service", "name": "web", "command": "x",
          "events": { "on_stdout": [ { "pattern": "(unclosed", "emit": "web:x" } ] } }
    ]));
    assert!(matches!(validate(&config), Err(ConfigError::BadPattern { .. })));
}

#[test]
fn rejects_unbalanced_template_braces() {
    let config = base_config(serde_json::json!([
        { "type": "task", "name": "t", "command": "echo {{event.name",
          "enable_event_templates": true }
    ]));
    assert!(matches!(validate(&config), Err(ConfigError::UnbalancedTemplate { .. })));
}

#[test]
fn unbalanced_braces_allowed_without_template_flag() {
    let config = base_config(serde_json::json!([
        { "type": "task", "name": "t", "command": "awk '{print $1}' {{" }
    ]));
    assert!(validate(&config).is_ok());
}

#[test]
fn load_reports_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = load(&dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
}

#[test]
fn load_round_trips_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clier.json");
    std::fs::write(
        &path,
        serde_json::json!({
            "project_name": "demo",
            "safety": { "max_ops_per_minute": 5, "debounce_ms": 100 },
            "pipeline": [ { "type": "service", "name": "web", "command": "run" } ]
        })
        .to_string(),
    )
    .unwrap();
    let (config, flat) = load(&path).unwrap();
    assert_eq!(config.project_name, "demo");
    assert_eq!(flat.items[0].name, "web");
}
