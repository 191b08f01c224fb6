//! Stage specifications.

use crate::context::SOURCE_STAGE;
use crate::errors::PipelineValidationError;
use crate::stages::Stage;
use std::collections::HashSet;
use std::sync::Arc;

/// Specification for a single stage in a pipeline.
///
/// Dependencies are derived from the stage's declared input slots; the
/// pseudo-producer [`SOURCE_STAGE`] (pipeline-entry artifacts) is not a
/// dependency.
#[derive(Debug, Clone)]
pub struct StageSpec {
    /// The unique name of the stage.
    pub name: String,
    /// The stage implementation.
    pub runner: Arc<dyn Stage>,
    /// Names of stages this stage depends on.
    pub dependencies: HashSet<String>,
}

impl StageSpec {
    /// Creates a specification from a stage, deriving dependencies from
    /// its input slots.
    #[must_use]
    pub fn from_stage(runner: Arc<dyn Stage>) -> Self {
        let dependencies = runner
            .input_slots()
            .iter()
            .filter(|slot| slot.from_stage != SOURCE_STAGE)
            .map(|slot| slot.from_stage.clone())
            .collect();

        Self {
            name: runner.name().to_string(),
            runner,
            dependencies,
        }
    }

    /// Adds an explicit dependency beyond the channel-derived ones.
    #[must_use]
    pub fn with_dependency(mut self, dep: impl Into<String>) -> Self {
        self.dependencies.insert(dep.into());
        self
    }

    /// Validates the specification.
    ///
    /// # Errors
    ///
    /// Returns an error if the stage depends on itself.
    pub fn validate(&self) -> Result<(), PipelineValidationError> {
        if self.dependencies.contains(&self.name) {
            return Err(PipelineValidationError::new(format!(
                "stage '{}' cannot depend on itself",
                self.name
            ))
            .with_stages(vec![self.name.clone()]));
        }
        Ok(())
    }
}
