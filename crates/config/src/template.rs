// SPDX-License-Identifier: MIT

//! Event-template substitution.
//!
//! Pure textual substitution over a closed token set; not expression
//! evaluation. Unknown tokens are preserved verbatim so misconfigurations
//! remain visible to operators.

use std::sync::LazyLock;

use clier_core::{Event, ProcessKind};
use regex::Regex;
use tracing::warn;

/// `{{token}}` where token is dotted lowercase identifiers
// Allow expect here as the regex is compile-time verified to be valid
#[allow(clippy::expect_used)]
static TOKEN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{([a-z_][a-z0-9_]*(?:\.[a-z_][a-z0-9_]*)*)\}\}")
        .expect("constant regex pattern is valid")
});

/// Values available to template substitution at spawn time.
pub struct TemplateContext<'a> {
    /// The triggering event, when the spawn was event-driven
    pub event: Option<&'a Event>,
    /// Name of the item being spawned
    pub process_name: &'a str,
    pub process_kind: ProcessKind,
    /// Project name from config
    pub project: &'a str,
    /// Current time at spawn, milliseconds since epoch
    pub now_ms: u64,
}

/// Substitute recognized `{{…}}` tokens in `input`.
///
/// Unknown tokens are left literally in place and logged as warnings.
pub fn substitute(input: &str, ctx: &TemplateContext<'_>) -> String {
    TOKEN_PATTERN
        .replace_all(input, |caps: &regex::Captures| {
            let token = &caps[1];
            match resolve(token, ctx) {
                Some(value) => value,
                None => {
                    warn!(token, process = ctx.process_name, "unknown template token left in place");
                    caps[0].to_string()
                }
            }
        })
        .to_string()
}

fn resolve(token: &str, ctx: &TemplateContext<'_>) -> Option<String> {
    match token {
        "event.name" => ctx.event.map(|e| e.name.clone()),
        "event.type" => ctx.event.map(|e| e.event_type.to_string()),
        "event.timestamp" => ctx.event.map(|e| e.timestamp.to_string()),
        "event.source" => ctx.event.map(|e| e.process_name.clone()),
        "process.name" => Some(ctx.process_name.to_string()),
        "process.type" => Some(ctx.process_kind.to_string()),
        "clier.project" => Some(ctx.project.to_string()),
        "clier.timestamp" => Some(ctx.now_ms.to_string()),
        _ => None,
    }
}

/// Check that `{{` and `}}` pairs are balanced and properly ordered.
pub fn check_balanced(input: &str) -> bool {
    let bytes = input.as_bytes();
    let mut depth = 0i32;
    let mut i = 0;
    while i + 1 < bytes.len() {
        match &bytes[i..i + 2] {
            b"{{" => {
                depth += 1;
                i += 2;
            }
            b"}}" => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
                i += 2;
            }
            _ => i += 1,
        }
    }
    depth == 0
}

#[cfg(test)]
#[path = "template_tests.rs"]
mod tests;
