// SPDX-License-Identifier: MIT

use super::*;
use crate::model::{ItemBody, PipelineEntry, StageBody, StepEntry};

fn body(name: &str) -> ItemBody {
    serde_json::from_value(serde_json::json!({ "name": name, "command": "true" })).unwrap()
}

fn body_with(name: &str, extra: serde_json::Value) -> ItemBody {
    let mut base = serde_json::json!({ "name": name, "command": "true" });
    base.as_object_mut()
        .unwrap()
        .extend(extra.as_object().unwrap().clone());
    serde_json::from_value(base).unwrap()
}

#[test]
fn passes_plain_items_through_in_order() {
    let pipeline = vec![
        PipelineEntry::Service(body("a")),
        PipelineEntry::Task(body("b")),
    ];
    let flat = flatten(&pipeline);
    let names: Vec<_> = flat.items.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, vec!["a", "b"]);
    assert!(flat.stage_of.is_empty());
    assert_eq!(flat.items[0].kind, ProcessKind::Service);
    assert_eq!(flat.items[1].kind, ProcessKind::Task);
}

#[test]
fn stage_steps_inherit_triggers_and_manual() {
    let stage = StageBody {
        name: "deploy".to_string(),
        manual: false,
        trigger_on: vec!["build:success".to_string()],
        steps: vec![
            StepEntry::Task(body_with("push", serde_json::json!({ "trigger_on": ["lint:ok"] }))),
            StepEntry::Task(body_with("announce", serde_json::json!({ "manual": true }))),
        ],
    };
    let flat = flatten(&[PipelineEntry::Stage(stage)]);

    // Stage triggers prepend the step's own
    assert_eq!(flat.items[0].trigger_on, vec!["build:success", "lint:ok"]);
    assert!(!flat.items[0].manual);

    // Manual steps keep manual and skip trigger inheritance
    assert!(flat.items[1].manual);
    assert!(flat.items[1].trigger_on.is_empty());

    assert_eq!(flat.stage_of.get("push").map(String::as_str), Some("deploy"));
    assert_eq!(flat.stage_of.get("announce").map(String::as_str), Some("deploy"));
    assert_eq!(flat.items[0].stage.as_deref(), Some("deploy"));
}

#[test]
fn manual_stage_marks_every_step_manual() {
    let stage = StageBody {
        name: "ops".to_string(),
        manual: true,
        trigger_on: vec![],
        steps: vec![StepEntry::Task(body("cleanup"))],
    };
    let flat = flatten(&[PipelineEntry::Stage(stage)]);
    assert!(flat.items[0].manual);
}

#[test]
fn declaration_order_interleaves_stages_and_items() {
    let stage = StageBody {
        name: "mid".to_string(),
        manual: false,
        trigger_on: vec![],
        steps: vec![StepEntry::Task(body("s1")), StepEntry::Task(body("s2"))],
    };
    let pipeline = vec![
        PipelineEntry::Service(body("first")),
        PipelineEntry::Stage(stage),
        PipelineEntry::Task(body("last")),
    ];
    let names: Vec<_> = flatten(&pipeline).items.iter().map(|i| i.name.clone()).collect();
    assert_eq!(names, vec!["first", "s1", "s2", "last"]);
}
