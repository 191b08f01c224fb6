//! Pipeline building and execution.
//!
//! This module provides:
//! - Stage specifications with dependencies derived from channel wiring
//! - A validating pipeline builder (unknown producers, unpublished
//!   channels, duplicate channels, cycles)
//! - The keyed dataflow scheduler
//! - The concrete variant-calling graph

mod builder;
mod calling;
mod scheduler;
mod spec;

pub use builder::PipelineBuilder;
pub use calling::{seed_raw_calls, variant_calling_graph, STAGE_NAMES};
pub use scheduler::{KeyRunResult, PipelineRunResult, StageGraph};
pub use spec::StageSpec;
