// SPDX-License-Identifier: MIT

use super::*;

#[test]
fn matches_scoped_to_owner() {
    let mut matcher = PatternMatcher::new();
    matcher.add_pattern("web", "listening", "web:ready").unwrap();
    matcher.add_pattern("db", "listening", "db:ready").unwrap();

    let emits = matcher.matches("web", "listening on 3000");
    assert_eq!(emits.into_iter().collect::<Vec<_>>(), vec!["web:ready"]);
    assert!(matcher.matches("worker", "listening on 3000").is_empty());
}

#[test]
fn multiple_patterns_fire_one_event_each() {
    let mut matcher = PatternMatcher::new();
    matcher.add_pattern("s", "Server", "s:server").unwrap();
    matcher.add_pattern("s", "listening", "s:listening").unwrap();
    matcher.add_pattern("s", "port", "s:port").unwrap();

    let emits = matcher.matches("s", "Server listening on port 3000");
    assert_eq!(emits.len(), 3);
    assert!(emits.contains("s:server"));
    assert!(emits.contains("s:listening"));
    assert!(emits.contains("s:port"));
}

#[test]
fn duplicate_emit_names_are_deduplicated() {
    let mut matcher = PatternMatcher::new();
    matcher.add_pattern("s", "foo", "s:hit").unwrap();
    matcher.add_pattern("s", "bar", "s:hit").unwrap();

    let emits = matcher.matches("s", "foo bar");
    assert_eq!(emits.len(), 1);
}

#[test]
fn non_matching_line_yields_empty_set() {
    let mut matcher = PatternMatcher::new();
    matcher.add_pattern("s", "^ready$", "s:ready").unwrap();
    assert!(matcher.matches("s", "not ready yet").is_empty());
}

#[test]
fn malformed_pattern_rejects_registration() {
    let mut matcher = PatternMatcher::new();
    let err = matcher.add_pattern("s", "(unclosed", "s:x").unwrap_err();
    assert_eq!(err.owner, "s");
    assert_eq!(matcher.count(), 0);
}

#[test]
fn remove_patterns_for_owner_only() {
    let mut matcher = PatternMatcher::new();
    matcher.add_pattern("a", "x", "a:x").unwrap();
    matcher.add_pattern("b", "x", "b:x").unwrap();
    matcher.remove_patterns_for("a");

    assert_eq!(matcher.count(), 1);
    assert!(matcher.matches("a", "x").is_empty());
    assert!(!matcher.matches("b", "x").is_empty());

    matcher.clear();
    assert_eq!(matcher.count(), 0);
}
