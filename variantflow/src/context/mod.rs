//! Context management for pipeline execution.
//!
//! This module provides:
//! - The run key that correlates every artifact of one sample/run
//! - The write-once artifact store stage instances publish into
//! - Key-checked input bindings for stage instances
//! - The pipeline- and stage-level execution contexts

mod execution;
mod identity;
mod inputs;
mod store;

pub use execution::{PipelineContext, StageContext};
pub use identity::RunKey;
pub use inputs::StageInputs;
pub use store::ArtifactStore;

/// Pseudo-stage name for pipeline-entry artifacts (the raw per-sample
/// call files seeded into the store before any stage runs).
pub const SOURCE_STAGE: &str = "source";
