// SPDX-License-Identifier: MIT

//! Scheduling core: translates typed events into start decisions.
//!
//! Holds no process handles. Decisions come back to the supervisor,
//! which executes them through the process manager — keeping this core
//! synchronous and exhaustively testable.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use thiserror::Error;
use tracing::warn;

use clier_config::{FlattenedPipeline, Item};
use clier_core::Event;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("unknown pipeline item '{0}'")]
    UnknownItem(String),

    #[error("process '{0}' is already running")]
    AlreadyRunning(String),

    #[error("duplicate pipeline item name '{0}'")]
    DuplicateName(String),
}

/// An instruction to start `item`, possibly carrying the event that
/// unblocked it (for template substitution).
#[derive(Debug, Clone)]
pub struct StartDecision {
    pub item: Item,
    pub trigger: Option<Event>,
}

/// Owns the pipeline graph and its progress sets.
#[derive(Default)]
pub struct Orchestrator {
    items: IndexMap<String, Item>,
    stage_of: HashMap<String, String>,
    /// Names for which a start has been issued since load
    started: HashSet<String>,
    /// Event names observed since load
    received: HashSet<String>,
    /// Failure event names whose emitter did not opt into
    /// `continue_on_failure`
    poisoned: HashSet<String>,
    /// Names started through the explicit trigger request
    manually_triggered: HashSet<String>,
}

impl Orchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a flattened pipeline, clearing all progress sets.
    ///
    /// Warns about triggers no item is known to emit; a missing emitter
    /// may still come from `event.emit`, so warnings never fail the load.
    pub fn load(&mut self, flat: FlattenedPipeline) {
        self.items.clear();
        self.started.clear();
        self.received.clear();
        self.poisoned.clear();
        self.stage_of = flat.stage_of;

        let known = known_emits(&flat.items);
        for item in flat.items {
            for trigger in &item.trigger_on {
                if !known.contains(trigger) {
                    warn!(
                        item = %item.name,
                        trigger = %trigger,
                        "no pipeline item is known to emit this trigger"
                    );
                }
            }
            self.items.insert(item.name.clone(), item);
        }
    }

    /// Items that are not manual and have no triggers, in declaration
    /// order. Marked started.
    pub fn entry_points(&mut self) -> Vec<Item> {
        let entries: Vec<Item> = self
            .items
            .values()
            .filter(|item| !item.manual && item.trigger_on.is_empty())
            .cloned()
            .collect();
        for item in &entries {
            self.started.insert(item.name.clone());
        }
        entries
    }

    /// Record an event and return the items it unblocks, in declaration
    /// order.
    pub fn handle_event(&mut self, event: &Event) -> Vec<StartDecision> {
        self.received.insert(event.name.clone());
        if event.is_failure() && !self.emitter_continues_on_failure(&event.process_name) {
            self.poisoned.insert(event.name.clone());
        }

        let mut decisions = Vec::new();
        for item in self.items.values() {
            if item.manual || self.started.contains(&item.name) {
                continue;
            }
            if !item.trigger_on.iter().any(|t| t == &event.name) {
                continue;
            }
            // AND semantics: every trigger must have fired
            if !item.trigger_on.iter().all(|t| self.received.contains(t)) {
                continue;
            }
            // Fail fast unless every failed upstream opted in
            if item.trigger_on.iter().any(|t| self.poisoned.contains(t)) {
                continue;
            }
            decisions.push(StartDecision { item: item.clone(), trigger: Some(event.clone()) });
        }

        for decision in &decisions {
            self.started.insert(decision.item.name.clone());
        }
        decisions
    }

    /// Manual start by explicit control request.
    ///
    /// `currently_running` comes from the process manager; a previously
    /// started but no-longer-running item is re-armed so the start
    /// proceeds.
    pub fn trigger(
        &mut self,
        name: &str,
        currently_running: bool,
    ) -> Result<Item, OrchestratorError> {
        let item = self
            .items
            .get(name)
            .cloned()
            .ok_or_else(|| OrchestratorError::UnknownItem(name.to_string()))?;
        if currently_running {
            return Err(OrchestratorError::AlreadyRunning(name.to_string()));
        }
        self.started.insert(name.to_string());
        self.manually_triggered.insert(name.to_string());
        Ok(item)
    }

    /// Start an item by name without recording a manual trigger
    /// (`process.start`).
    pub fn start_item(
        &mut self,
        name: &str,
        currently_running: bool,
    ) -> Result<Item, OrchestratorError> {
        let item = self
            .items
            .get(name)
            .cloned()
            .ok_or_else(|| OrchestratorError::UnknownItem(name.to_string()))?;
        if currently_running {
            return Err(OrchestratorError::AlreadyRunning(name.to_string()));
        }
        self.started.insert(name.to_string());
        Ok(item)
    }

    /// Register a new item into the live pipeline (`process.add`).
    pub fn add_item(&mut self, item: Item) -> Result<(), OrchestratorError> {
        if self.items.contains_key(&item.name) {
            return Err(OrchestratorError::DuplicateName(item.name));
        }
        if let Some(stage) = &item.stage {
            self.stage_of.insert(item.name.clone(), stage.clone());
        }
        self.items.insert(item.name.clone(), item);
        Ok(())
    }

    /// Forget an item (`process.delete`).
    pub fn remove_item(&mut self, name: &str) {
        self.items.shift_remove(name);
        self.stage_of.remove(name);
        self.started.remove(name);
        self.manually_triggered.remove(name);
    }

    pub fn item(&self, name: &str) -> Option<&Item> {
        self.items.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.items.contains_key(name)
    }

    /// Step name → stage name mapping for status grouping.
    pub fn stages_map(&self) -> HashMap<String, String> {
        self.stage_of.clone()
    }

    pub fn manually_triggered(&self) -> Vec<String> {
        self.manually_triggered.iter().cloned().collect()
    }

    /// Carry manual-trigger memory across a reload.
    pub fn restore_manually_triggered(&mut self, names: Vec<String>) {
        self.manually_triggered = names.into_iter().collect();
    }

    pub fn clear_manually_triggered(&mut self) {
        self.manually_triggered.clear();
    }

    fn emitter_continues_on_failure(&self, emitter: &str) -> bool {
        self.items.get(emitter).is_some_and(|item| item.continue_on_failure)
    }
}

/// Event names the pipeline is statically known to emit: pattern emits
/// plus the per-item error/crashed/success/exit conventions.
fn known_emits(items: &[Item]) -> HashSet<String> {
    let mut known = HashSet::new();
    for item in items {
        for rule in &item.events.on_stdout {
            known.insert(rule.emit.clone());
        }
        for suffix in ["error", "crashed", "success", "exit"] {
            known.insert(format!("{}:{}", item.name, suffix));
        }
    }
    known
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
