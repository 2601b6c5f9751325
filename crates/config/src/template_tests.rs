// SPDX-License-Identifier: MIT

use super::*;
use clier_core::{Event, ProcessKind};

fn ctx_with_event<'a>(event: &'a Event) -> TemplateContext<'a> {
    TemplateContext {
        event: Some(event),
        process_name: "deploy",
        process_kind: ProcessKind::Task,
        project: "demo",
        now_ms: 42_000,
    }
}

#[test]
fn substitutes_event_tokens() {
    let event = Event::custom("build:done", "build", 1234);
    let ctx = ctx_with_event(&event);
    assert_eq!(
        substitute("notify {{event.name}} from {{event.source}} at {{event.timestamp}}", &ctx),
        "notify build:done from build at 1234"
    );
    assert_eq!(substitute("{{event.type}}", &ctx), "custom");
}

#[test]
fn substitutes_process_and_project_tokens() {
    let event = Event::custom("build:done", "build", 1);
    let ctx = ctx_with_event(&event);
    assert_eq!(
        substitute("{{process.name}}/{{process.type}}/{{clier.project}}/{{clier.timestamp}}", &ctx),
        "deploy/task/demo/42000"
    );
}

#[test]
fn unknown_tokens_left_in_place() {
    let event = Event::custom("x", "x", 1);
    let ctx = ctx_with_event(&event);
    assert_eq!(substitute("echo {{mystery.token}}", &ctx), "echo {{mystery.token}}");
}

#[test]
fn event_tokens_left_without_triggering_event() {
    let ctx = TemplateContext {
        event: None,
        process_name: "deploy",
        process_kind: ProcessKind::Task,
        project: "demo",
        now_ms: 1,
    };
    assert_eq!(substitute("{{event.name}} {{process.name}}", &ctx), "{{event.name}} deploy");
}

#[test]
fn repeated_tokens_all_substituted() {
    let event = Event::custom("a:b", "a", 7);
    let ctx = ctx_with_event(&event);
    assert_eq!(substitute("{{event.name}}+{{event.name}}", &ctx), "a:b+a:b");
}

#[test]
fn balanced_checker() {
    assert!(check_balanced("no tokens"));
    assert!(check_balanced("{{event.name}}"));
    assert!(check_balanced("a {{x}} b {{y}} c"));
    assert!(!check_balanced("a {{x"));
    assert!(!check_balanced("a }} b {{ c"));
    assert!(check_balanced(""));
}
