// SPDX-License-Identifier: MIT

//! Duration string grammar used in control-server queries.
//!
//! One or more digits followed by `s`, `m`, `h`, or `d`. No other units.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DurationError {
    #[error("empty duration")]
    Empty,

    #[error("invalid duration '{0}': expected digits followed by s, m, h, or d")]
    Invalid(String),
}

/// Parse a duration string like `30s`, `5m`, `2h`, or `1d`.
pub fn parse_duration(input: &str) -> Result<Duration, DurationError> {
    let Some(unit) = input.chars().last() else {
        return Err(DurationError::Empty);
    };

    let digits = &input[..input.len() - unit.len_utf8()];
    let value: u64 = digits
        .parse()
        .map_err(|_| DurationError::Invalid(input.to_string()))?;

    let secs = match unit {
        's' => value,
        'm' => value * 60,
        'h' => value * 3600,
        'd' => value * 86_400,
        _ => return Err(DurationError::Invalid(input.to_string())),
    };

    Ok(Duration::from_secs(secs))
}

#[cfg(test)]
#[path = "duration_tests.rs"]
mod tests;
