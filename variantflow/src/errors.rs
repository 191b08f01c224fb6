//! Error types for the variantflow pipeline.
//!
//! Correctness-path errors (configuration, unbound inputs, tool failures)
//! abort the affected run key's remaining chain and are surfaced to the
//! operator. Reporting-path errors (version probing) are isolated in
//! [`crate::report`] and never abort correctness-path work.

use crate::context::RunKey;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for variantflow operations.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The kit/genome resource bundle could not be resolved.
    #[error("{0}")]
    Configuration(#[from] ConfigurationError),

    /// A pipeline validation error occurred while building the graph.
    #[error("{0}")]
    Validation(#[from] PipelineValidationError),

    /// A stage's declared input channel was never bound for its run key.
    #[error(
        "missing upstream artifact: stage '{stage}' (key '{key}') has no artifact bound to input channel '{channel}'"
    )]
    MissingUpstreamArtifact {
        /// The consuming stage.
        stage: String,
        /// The run key of the stage instance.
        key: RunKey,
        /// The unbound input channel.
        channel: String,
    },

    /// An invoked external tool exited nonzero.
    #[error(
        "external tool failure in stage '{stage}' (key '{key}'): exit code {}; tool output preserved at {}",
        .exit_code.map_or_else(|| "unknown (killed by signal)".to_string(), |c| c.to_string()),
        .log.display()
    )]
    ExternalToolFailure {
        /// The failing stage.
        stage: String,
        /// The run key of the stage instance.
        key: RunKey,
        /// The tool's exit code, if it exited normally.
        exit_code: Option<i32>,
        /// Path to the captured stdout/stderr log.
        log: PathBuf,
    },

    /// A tool exited zero but a declared output file was not produced.
    #[error(
        "stage '{stage}' (key '{key}') completed but declared output '{pattern}' matched no file in {}",
        .dir.display()
    )]
    MissingOutput {
        /// The stage that failed to produce the output.
        stage: String,
        /// The run key of the stage instance.
        key: RunKey,
        /// The declared output file pattern.
        pattern: String,
        /// The stage working directory that was searched.
        dir: PathBuf,
    },

    /// A second artifact was published to an already-bound channel.
    #[error("output conflict: channel '{channel}' already bound for key '{key}'")]
    OutputConflict {
        /// The run key.
        key: RunKey,
        /// The conflicting output channel.
        channel: String,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A generic internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// A pre-execution configuration failure.
///
/// Raised by the parameter resolver before any stage runs; the message
/// names the exact parameters that must be supplied.
#[derive(Debug, Clone, Error)]
pub enum ConfigurationError {
    /// The kit is absent from the kit table and required overrides are missing.
    #[error(
        "kit '{kit}' is not in the kit table; supply the missing parameters explicitly: {}",
        .missing.join(", ")
    )]
    MissingKitConfig {
        /// The unresolvable kit name.
        kit: String,
        /// The parameter names that must be supplied.
        missing: Vec<String>,
    },

    /// The genome is absent from the genome table and required overrides are missing.
    #[error(
        "genome '{genome}' is not in the genome table; supply the missing parameters explicitly: {}",
        .missing.join(", ")
    )]
    MissingGenomeConfig {
        /// The unresolvable genome name.
        genome: String,
        /// The parameter names that must be supplied.
        missing: Vec<String>,
    },

    /// The configuration file could not be read or parsed.
    #[error("unreadable configuration file {}: {message}", .path.display())]
    UnreadableConfig {
        /// The configuration file path.
        path: PathBuf,
        /// The underlying parse/read failure.
        message: String,
    },
}

impl ConfigurationError {
    /// The parameter names this error is asking for, if any.
    #[must_use]
    pub fn missing_parameters(&self) -> &[String] {
        match self {
            Self::MissingKitConfig { missing, .. } | Self::MissingGenomeConfig { missing, .. } => {
                missing
            }
            Self::UnreadableConfig { .. } => &[],
        }
    }
}

/// Error raised when graph construction fails validation.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct PipelineValidationError {
    /// The error message.
    pub message: String,
    /// The stages involved in the error.
    pub stages: Vec<String>,
}

impl PipelineValidationError {
    /// Creates a new pipeline validation error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stages: Vec::new(),
        }
    }

    /// Sets the stages involved.
    #[must_use]
    pub fn with_stages(mut self, stages: Vec<String>) -> Self {
        self.stages = stages;
        self
    }
}

/// Error raised when a dependency cycle is detected in the stage graph.
#[derive(Debug, Clone, Error)]
#[error("cycle detected in pipeline: {}", .cycle_path.join(" -> "))]
pub struct CycleDetectedError {
    /// The path of stages forming the cycle.
    pub cycle_path: Vec<String>,
}

impl CycleDetectedError {
    /// Creates a new cycle detected error.
    #[must_use]
    pub fn new(cycle_path: Vec<String>) -> Self {
        Self { cycle_path }
    }
}

impl From<CycleDetectedError> for PipelineValidationError {
    fn from(err: CycleDetectedError) -> Self {
        let stages = err.cycle_path.clone();
        Self {
            message: err.to_string(),
            stages,
        }
    }
}
