// SPDX-License-Identifier: MIT

use super::*;
use clier_config::{flatten, Config, PipelineEntry};
use clier_core::EventType;

fn pipeline(entries: serde_json::Value) -> FlattenedPipeline {
    let entries: Vec<PipelineEntry> = serde_json::from_value(entries).unwrap();
    flatten(&entries)
}

fn loaded(entries: serde_json::Value) -> Orchestrator {
    let mut orchestrator = Orchestrator::new();
    orchestrator.load(pipeline(entries));
    orchestrator
}

fn custom(name: &str, process: &str) -> Event {
    Event::custom(name, process, 1)
}

fn crashed(process: &str) -> Event {
    Event::crashed(process, None, 1)
}

#[test]
fn entry_points_are_non_manual_trigger_free_items_in_order() {
    let mut orchestrator = loaded(serde_json::json!([
        { "type": "service", "name": "a", "command": "x" },
        { "type": "service", "name": "manual", "command": "x", "manual": true },
        { "type": "task", "name": "dependent", "command": "x", "trigger_on": ["a:ready"] },
        { "type": "task", "name": "b", "command": "x" }
    ]));

    let names: Vec<_> = orchestrator.entry_points().iter().map(|i| i.name.clone()).collect();
    assert_eq!(names, vec!["a", "b"]);

    // Entry points are marked started, so a later event does not restart them
    assert!(orchestrator.handle_event(&custom("a:ready", "a")).len() == 1);
    assert!(orchestrator.handle_event(&custom("a:ready", "a")).is_empty());
}

#[test]
fn trigger_and_semantics_requires_all_events() {
    let mut orchestrator = loaded(serde_json::json!([
        { "type": "service", "name": "a", "command": "x",
          "events": { "on_stdout": [ { "pattern": "up", "emit": "a:up" } ] } },
        { "type": "service", "name": "b", "command": "x",
          "events": { "on_stdout": [ { "pattern": "up", "emit": "b:up" } ] } },
        { "type": "task", "name": "both", "command": "x", "trigger_on": ["a:up", "b:up"] }
    ]));

    assert!(orchestrator.handle_event(&custom("a:up", "a")).is_empty());
    let decisions = orchestrator.handle_event(&custom("b:up", "b"));
    assert_eq!(decisions.len(), 1);
    assert_eq!(decisions[0].item.name, "both");
    assert_eq!(decisions[0].trigger.as_ref().unwrap().name, "b:up");

    // Idempotence: a repeat of either event does not start it again
    assert!(orchestrator.handle_event(&custom("a:up", "a")).is_empty());
    assert!(orchestrator.handle_event(&custom("b:up", "b")).is_empty());
}

#[test]
fn order_of_trigger_arrival_does_not_matter() {
    let mut orchestrator = loaded(serde_json::json!([
        { "type": "task", "name": "both", "command": "x", "trigger_on": ["x:a", "x:b"] }
    ]));
    assert!(orchestrator.handle_event(&custom("x:b", "x")).is_empty());
    assert_eq!(orchestrator.handle_event(&custom("x:a", "x")).len(), 1);
}

#[test]
fn manual_items_never_start_from_events() {
    let mut orchestrator = loaded(serde_json::json!([
        { "type": "task", "name": "gated", "command": "x", "manual": true,
          "trigger_on": ["x:ready"] }
    ]));
    assert!(orchestrator.handle_event(&custom("x:ready", "x")).is_empty());

    // But an explicit trigger starts it
    let item = orchestrator.trigger("gated", false).unwrap();
    assert_eq!(item.name, "gated");
    assert_eq!(orchestrator.manually_triggered(), vec!["gated".to_string()]);
}

#[test]
fn failure_event_skips_dependent_without_opt_in() {
    let mut orchestrator = loaded(serde_json::json!([
        { "type": "task", "name": "build", "command": "x" },
        { "type": "task", "name": "deploy", "command": "x", "trigger_on": ["build:crashed"] }
    ]));
    // build did not opt into continue_on_failure
    assert!(orchestrator.handle_event(&crashed("build")).is_empty());
}

#[test]
fn failure_event_starts_dependent_when_emitter_opted_in() {
    let mut orchestrator = loaded(serde_json::json!([
        { "type": "task", "name": "build", "command": "x", "continue_on_failure": true },
        { "type": "task", "name": "cleanup", "command": "x", "trigger_on": ["build:crashed"] }
    ]));
    assert_eq!(orchestrator.handle_event(&crashed("build")).len(), 1);
}

#[test]
fn mixed_triggers_with_any_poisoned_failure_skip_the_dependent() {
    let mut orchestrator = loaded(serde_json::json!([
        { "type": "task", "name": "a", "command": "x", "continue_on_failure": true },
        { "type": "task", "name": "b", "command": "x" },
        { "type": "task", "name": "dep", "command": "x",
          "trigger_on": ["a:crashed", "b:crashed"] }
    ]));
    // a opted in, b did not: the dependent must not start
    assert!(orchestrator.handle_event(&crashed("a")).is_empty());
    assert!(orchestrator.handle_event(&crashed("b")).is_empty());
}

#[test]
fn success_events_unblock_normally() {
    let mut orchestrator = loaded(serde_json::json!([
        { "type": "task", "name": "build", "command": "x" },
        { "type": "task", "name": "deploy", "command": "x", "trigger_on": ["build:success"] }
    ]));
    let event = Event::success("build", 1);
    assert_eq!(event.event_type, EventType::Success);
    assert_eq!(orchestrator.handle_event(&event).len(), 1);
}

#[test]
fn simultaneously_unblocked_items_follow_declaration_order() {
    let mut orchestrator = loaded(serde_json::json!([
        { "type": "task", "name": "second", "command": "x", "trigger_on": ["go"] },
        { "type": "task", "name": "first", "command": "x", "trigger_on": ["go"] }
    ]));
    let decisions = orchestrator.handle_event(&custom("go", "ext"));
    let names: Vec<_> = decisions.iter().map(|d| d.item.name.clone()).collect();
    assert_eq!(names, vec!["second", "first"]);
}

#[test]
fn trigger_rejects_running_and_unknown() {
    let mut orchestrator = loaded(serde_json::json!([
        { "type": "service", "name": "web", "command": "x", "manual": true }
    ]));
    assert!(matches!(
        orchestrator.trigger("web", true),
        Err(OrchestratorError::AlreadyRunning(_))
    ));
    assert!(matches!(
        orchestrator.trigger("ghost", false),
        Err(OrchestratorError::UnknownItem(_))
    ));
}

#[test]
fn completed_item_can_be_retriggered() {
    let mut orchestrator = loaded(serde_json::json!([
        { "type": "task", "name": "job", "command": "x", "manual": true }
    ]));
    orchestrator.trigger("job", false).unwrap();
    // Task finished; no longer running, so the trigger proceeds again
    orchestrator.trigger("job", false).unwrap();
}

#[test]
fn add_and_remove_items_adjust_the_graph() {
    let mut orchestrator = loaded(serde_json::json!([
        { "type": "service", "name": "web", "command": "x" }
    ]));

    let step: clier_config::StepEntry = serde_json::from_value(serde_json::json!({
        "type": "task", "name": "extra", "command": "y", "trigger_on": ["web:exit"]
    }))
    .unwrap();
    orchestrator.add_item(clier_config::flatten_step(&step)).unwrap();
    assert!(orchestrator.contains("extra"));

    // Duplicate names are rejected
    let dup: clier_config::StepEntry = serde_json::from_value(
        serde_json::json!({ "type": "task", "name": "extra", "command": "z" }),
    )
    .unwrap();
    assert!(matches!(
        orchestrator.add_item(clier_config::flatten_step(&dup)),
        Err(OrchestratorError::DuplicateName(_))
    ));

    orchestrator.remove_item("extra");
    assert!(!orchestrator.contains("extra"));
}

#[test]
fn stages_map_survives_flattening() {
    let mut orchestrator = Orchestrator::new();
    let config: Config = serde_json::from_value(serde_json::json!({
        "project_name": "demo",
        "safety": { "max_ops_per_minute": 10, "debounce_ms": 0 },
        "pipeline": [
            { "type": "stage", "name": "deploy", "steps": [
                { "type": "task", "name": "push", "command": "x" }
            ]}
        ]
    }))
    .unwrap();
    orchestrator.load(clier_config::validate(&config).unwrap());
    assert_eq!(orchestrator.stages_map().get("push").map(String::as_str), Some("deploy"));
}

#[test]
fn reload_clears_progress_but_manual_memory_can_be_restored() {
    let mut orchestrator = loaded(serde_json::json!([
        { "type": "task", "name": "job", "command": "x", "manual": true },
        { "type": "task", "name": "dep", "command": "x", "trigger_on": ["go"] }
    ]));
    orchestrator.trigger("job", false).unwrap();
    orchestrator.handle_event(&custom("go", "ext"));

    let manual = orchestrator.manually_triggered();
    orchestrator.load(pipeline(serde_json::json!([
        { "type": "task", "name": "dep", "command": "x", "trigger_on": ["go"] }
    ])));
    orchestrator.restore_manually_triggered(manual);

    // Progress sets were cleared: the same event unblocks dep again
    assert_eq!(orchestrator.handle_event(&custom("go", "ext")).len(), 1);
    assert_eq!(orchestrator.manually_triggered(), vec!["job".to_string()]);
}
