// SPDX-License-Identifier: MIT

use super::*;
use yare::parameterized;

#[parameterized(
    seconds = { "30s", 30 },
    minutes = { "5m", 300 },
    hours = { "2h", 7200 },
    days = { "1d", 86_400 },
    zero = { "0s", 0 },
    multi_digit = { "120m", 7200 },
)]
fn parses_valid_durations(input: &str, expected_secs: u64) {
    assert_eq!(parse_duration(input), Ok(Duration::from_secs(expected_secs)));
}

#[parameterized(
    no_unit = { "30" },
    unknown_unit = { "30w" },
    unit_only = { "s" },
    negative = { "-5s" },
    fractional = { "1.5h" },
    spaced = { "5 m" },
)]
fn rejects_invalid_durations(input: &str) {
    assert_eq!(parse_duration(input), Err(DurationError::Invalid(input.to_string())));
}

#[test]
fn rejects_empty_input() {
    assert_eq!(parse_duration(""), Err(DurationError::Empty));
}
