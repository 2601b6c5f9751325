// SPDX-License-Identifier: MIT

//! Spawn-safety primitives: token-bucket rate limiting, keyed debounce,
//! and a circuit breaker over repeated failures.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod breaker;
mod debounce;
mod rate_limiter;

pub use breaker::{
    BreakerConfig, BreakerError, BreakerEvent, BreakerState, CircuitBreaker,
};
pub use debounce::Debouncer;
pub use rate_limiter::{RateLimitClosed, RateLimiter};
