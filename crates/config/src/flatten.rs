// SPDX-License-Identifier: MIT

//! Stage flattening.
//!
//! A stage is sugar: each step inherits `manual = stage.manual OR
//! step.manual`, and non-manual steps prepend the stage's `trigger_on`
//! to their own. After flattening the orchestrator sees only items; the
//! step-name → stage-name mapping is retained for status grouping.

use std::collections::HashMap;

use crate::model::{Item, PipelineEntry, StepEntry};
use clier_core::ProcessKind;

/// Result of flattening: items in declaration order plus the
/// step → stage mapping.
#[derive(Debug, Clone, Default)]
pub struct FlattenedPipeline {
    pub items: Vec<Item>,
    pub stage_of: HashMap<String, String>,
}

/// Flatten stages into a flat item sequence. Pure; does not validate.
pub fn flatten(pipeline: &[PipelineEntry]) -> FlattenedPipeline {
    let mut out = FlattenedPipeline::default();

    for entry in pipeline {
        match entry {
            PipelineEntry::Service(body) => {
                out.items.push(Item::from_body(ProcessKind::Service, body));
            }
            PipelineEntry::Task(body) => {
                out.items.push(Item::from_body(ProcessKind::Task, body));
            }
            PipelineEntry::Stage(stage) => {
                for step in &stage.steps {
                    let body = step.body();
                    let mut item = Item::from_body(step.kind(), body);
                    item.manual = stage.manual || body.manual;
                    if !item.manual {
                        let mut triggers = stage.trigger_on.clone();
                        triggers.extend(body.trigger_on.iter().cloned());
                        item.trigger_on = triggers;
                    }
                    item.stage = Some(stage.name.clone());
                    out.stage_of.insert(body.name.clone(), stage.name.clone());
                    out.items.push(item);
                }
            }
        }
    }

    out
}

/// Flatten a single standalone step (used by `process.add`).
pub fn flatten_step(step: &StepEntry) -> Item {
    Item::from_body(step.kind(), step.body())
}

#[cfg(test)]
#[path = "flatten_tests.rs"]
mod tests;
