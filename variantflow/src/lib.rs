//! # Variantflow
//!
//! A dataflow orchestrator that chains external genomics command-line
//! tools into a joint-genotyping, recalibration, and annotation
//! pipeline.
//!
//! The crate is organized around a small set of ideas:
//!
//! - **Keyed stage graph**: stages declare named input/output channels;
//!   instances are keyed by a per-sample run key and scheduled as soon as
//!   their inputs are bound
//! - **Opaque tool execution**: each stage shells out to one external
//!   tool, verifies its declared outputs, and preserves the tool's raw
//!   output for diagnosis
//! - **Resolved resource bundles**: genome/kit names map to read-only
//!   file-path bundles through configuration tables plus explicit
//!   overrides
//! - **Post-hoc aggregation**: logs and evaluation reports are collected
//!   into one consolidated summary after the correctness-path work ends
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use variantflow::prelude::*;
//!
//! let bundle = resolve_bundle(&tables, "GRCh37", Some("sureselect_v5"), &overrides)?;
//! let ctx = Arc::new(PipelineContext::new(bundle, "results"));
//! let graph = variant_calling_graph()?;
//! seed_raw_calls(&ctx, &reads)?;
//! let result = graph.execute(ctx, keys).await;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cli;
pub mod context;
pub mod core;
pub mod errors;
pub mod events;
pub mod pipeline;
pub mod report;
pub mod resources;
pub mod stages;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::context::{
        ArtifactStore, PipelineContext, RunKey, StageContext, StageInputs, SOURCE_STAGE,
    };
    pub use crate::core::{InputSlot, OutputSlot, StageArtifact, StageOutput, StageStatus};
    pub use crate::errors::{
        ConfigurationError, CycleDetectedError, PipelineError, PipelineValidationError,
    };
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::pipeline::{
        seed_raw_calls, variant_calling_graph, KeyRunResult, PipelineBuilder, PipelineRunResult,
        StageGraph, StageSpec,
    };
    pub use crate::report::{probe_versions, write_summary, VersionMap};
    pub use crate::resources::{
        resolve_bundle, Overrides, ResourceBundle, ResourceTables, ToolPaths,
    };
    pub use crate::stages::{CommandBuilder, CommandRequest, Invocation, Stage, ToolStage};
}
