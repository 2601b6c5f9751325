// SPDX-License-Identifier: MIT

//! Pipeline configuration: serde model, validation, stage flattening,
//! and event-template substitution.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod flatten;
mod model;
mod template;
mod validate;

pub use flatten::{flatten, flatten_step, FlattenedPipeline};
pub use model::{
    CircuitBreakerConfig, Config, EventsConfig, InputConfig, Item, ItemBody, PatternRule,
    PipelineEntry, SafetyConfig, StageBody, StepEntry,
};
pub use template::{check_balanced, substitute, TemplateContext};
pub use validate::{load, validate, ConfigError};
