// SPDX-License-Identifier: MIT

//! Translates raw process events into typed pipeline events.
//!
//! Keeps a bounded history of the last [`EVENT_HISTORY_LIMIT`] typed
//! events for snapshot queries. Raw stdout/stderr lines do not enter the
//! history; the events derived from them do.

use std::collections::{HashMap, VecDeque};

use clier_config::Item;
use clier_core::{Event, EventType, ProcessKind, RestartPolicy};
use clier_process::ProcessEvent;
use tracing::warn;

use crate::matcher::{PatternError, PatternMatcher};

/// Maximum typed events retained for `events.query`.
pub const EVENT_HISTORY_LIMIT: usize = 100;

/// Per-item switches the handler needs at dispatch time.
#[derive(Debug, Clone)]
struct ItemRules {
    kind: ProcessKind,
    restart: RestartPolicy,
    on_stderr: bool,
    on_crash: bool,
}

/// Consumes raw events, applies pattern matches, emits typed events.
#[derive(Default)]
pub struct EventHandler {
    matcher: PatternMatcher,
    rules: HashMap<String, ItemRules>,
    history: VecDeque<Event>,
}

impl EventHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace all registrations with the given pipeline items.
    ///
    /// Patterns were validated at config load, so a failure here is a
    /// programming error surfaced as a warning rather than a panic.
    pub fn load(&mut self, items: &[Item]) {
        self.matcher.clear();
        self.rules.clear();
        for item in items {
            if let Err(e) = self.register_item(item) {
                warn!(error = %e, "pattern rejected at load");
            }
        }
    }

    /// Register one item's patterns and event switches.
    pub fn register_item(&mut self, item: &Item) -> Result<(), PatternError> {
        for rule in &item.events.on_stdout {
            self.matcher.add_pattern(&item.name, &rule.pattern, &rule.emit)?;
        }
        self.rules.insert(
            item.name.clone(),
            ItemRules {
                kind: item.kind,
                restart: item.restart,
                on_stderr: item.events.on_stderr,
                on_crash: item.events.on_crash,
            },
        );
        Ok(())
    }

    /// Forget an item (`process.delete`).
    pub fn remove_item(&mut self, name: &str) {
        self.matcher.remove_patterns_for(name);
        self.rules.remove(name);
    }

    /// Translate one raw event into typed pipeline events, recording
    /// them in the history.
    pub fn handle(&mut self, raw: &ProcessEvent) -> Vec<Event> {
        let events = match raw {
            ProcessEvent::Stdout { process, line, timestamp } => {
                self.matcher
                    .matches(process, line)
                    .into_iter()
                    .map(|emit| {
                        Event::new(
                            emit,
                            process.clone(),
                            EventType::Custom,
                            Some(serde_json::Value::String(line.clone())),
                            *timestamp,
                        )
                    })
                    .collect()
            }
            ProcessEvent::Stderr { process, line, timestamp } => {
                let on_stderr = self.rules.get(process).is_none_or(|r| r.on_stderr);
                if on_stderr {
                    vec![Event::error(
                        process,
                        Some(serde_json::Value::String(line.clone())),
                        *timestamp,
                    )]
                } else {
                    Vec::new()
                }
            }
            ProcessEvent::Exit { process, code, signal, timestamp, .. } => {
                let data = serde_json::json!({ "code": code, "signal": signal });
                // Decode from the exit payload rather than the typed
                // field: a signal kill carries no code and falls back to
                // failure through the same path as any malformed shape
                let exit_code = decode_exit_code(&data);
                let rules = self.rules.get(process).cloned();
                let mut events = Vec::new();
                if exit_code == 0 {
                    if lifecycle_complete(rules.as_ref()) {
                        events.push(Event::success(process, *timestamp));
                    }
                } else if rules.as_ref().is_none_or(|r| r.on_crash) {
                    events.push(Event::crashed(process, Some(data.clone()), *timestamp));
                }
                events.push(Event::exit(process, Some(data), *timestamp));
                events
            }
        };

        for event in &events {
            self.record(event.clone());
        }
        events
    }

    /// Append an externally-produced event (`event.emit`) to history.
    pub fn record(&mut self, event: Event) {
        if self.history.len() == EVENT_HISTORY_LIMIT {
            self.history.pop_front();
        }
        self.history.push_back(event);
    }

    /// Snapshot of the event history, oldest-first.
    pub fn history(&self) -> Vec<Event> {
        self.history.iter().cloned().collect()
    }

    /// History entries with `timestamp >= since_ms`.
    pub fn history_since(&self, since_ms: u64) -> Vec<Event> {
        self.history.iter().filter(|e| e.timestamp >= since_ms).cloned().collect()
    }
}

/// A zero exit completes the lifecycle for tasks, and for services whose
/// policy will not restart them. A service on `always` restarts, so its
/// lifecycle is not complete and no success is published.
fn lifecycle_complete(rules: Option<&ItemRules>) -> bool {
    match rules {
        Some(rules) => match rules.kind {
            ProcessKind::Task => true,
            ProcessKind::Service => {
                matches!(rules.restart, RestartPolicy::Never | RestartPolicy::OnFailure)
            }
        },
        // Unregistered process (manager-level spawn): assume complete
        None => true,
    }
}

/// Decode an exit code from the shapes found in exit event payloads:
/// an integer, a stringified integer, or `{"code": …}`. Anything else
/// decodes to 1.
pub fn decode_exit_code(value: &serde_json::Value) -> i32 {
    match value {
        serde_json::Value::Number(n) => n.as_i64().map(|v| v as i32).unwrap_or(1),
        serde_json::Value::String(s) => s.parse().unwrap_or(1),
        serde_json::Value::Object(map) => match map.get("code") {
            Some(code) => decode_exit_code(code),
            None => 1,
        },
        _ => 1,
    }
}

#[cfg(test)]
#[path = "event_handler_tests.rs"]
mod tests;
