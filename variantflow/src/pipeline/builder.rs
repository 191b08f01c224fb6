//! Pipeline builder with validation.

use super::{StageGraph, StageSpec};
use crate::context::SOURCE_STAGE;
use crate::errors::{CycleDetectedError, PipelineValidationError};
use crate::stages::Stage;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Builder for creating validated stage graphs.
///
/// Validation happens at registration time: a stage may only consume
/// channels its producer actually publishes, producers must be added
/// before their consumers, output channels are unique across the graph,
/// and cycles are rejected.
#[derive(Debug, Clone)]
pub struct PipelineBuilder {
    name: String,
    stages: HashMap<String, StageSpec>,
    stage_order: Vec<String>,
}

impl PipelineBuilder {
    /// Creates a new pipeline builder.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: HashMap::new(),
            stage_order: Vec::new(),
        }
    }

    /// Adds a stage, deriving its spec from the declared channels.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails.
    pub fn stage(mut self, runner: Arc<dyn Stage>) -> Result<Self, PipelineValidationError> {
        self.add_stage_spec(StageSpec::from_stage(runner))?;
        Ok(self)
    }

    /// Adds a stage specification.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails.
    pub fn add_stage_spec(&mut self, spec: StageSpec) -> Result<(), PipelineValidationError> {
        spec.validate()?;

        if self.stages.contains_key(&spec.name) {
            return Err(PipelineValidationError::new(format!(
                "duplicate stage name '{}'",
                spec.name
            ))
            .with_stages(vec![spec.name]));
        }

        for dep in &spec.dependencies {
            if !self.stages.contains_key(dep) {
                return Err(PipelineValidationError::new(format!(
                    "stage '{}' depends on unknown stage '{}'",
                    spec.name, dep
                ))
                .with_stages(vec![spec.name.clone(), dep.clone()]));
            }
        }

        for slot in spec.runner.input_slots() {
            if slot.from_stage == SOURCE_STAGE {
                continue;
            }
            let publishes = self
                .stages
                .get(&slot.from_stage)
                .is_some_and(|producer| {
                    producer
                        .runner
                        .output_slots()
                        .iter()
                        .any(|out| out.channel == slot.channel)
                });
            if !publishes {
                return Err(PipelineValidationError::new(format!(
                    "stage '{}' consumes channel '{}' which stage '{}' does not publish",
                    spec.name, slot.channel, slot.from_stage
                ))
                .with_stages(vec![spec.name.clone(), slot.from_stage.clone()]));
            }
        }

        for out in spec.runner.output_slots() {
            let taken = self.stages.values().any(|other| {
                other
                    .runner
                    .output_slots()
                    .iter()
                    .any(|existing| existing.channel == out.channel)
            });
            if taken {
                return Err(PipelineValidationError::new(format!(
                    "output channel '{}' is already published by another stage",
                    out.channel
                ))
                .with_stages(vec![spec.name.clone()]));
            }
        }

        self.stage_order.push(spec.name.clone());
        self.stages.insert(spec.name.clone(), spec);
        self.detect_cycles()?;

        Ok(())
    }

    /// Builds the stage graph.
    ///
    /// # Errors
    ///
    /// Returns an error if the builder has no stages.
    pub fn build(self) -> Result<StageGraph, PipelineValidationError> {
        if self.stages.is_empty() {
            return Err(PipelineValidationError::new("pipeline has no stages"));
        }
        Ok(StageGraph::new(self.name, self.stages, self.stage_order))
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    fn detect_cycles(&self) -> Result<(), PipelineValidationError> {
        let mut visited = HashSet::new();
        let mut rec_stack = HashSet::new();
        let mut path = Vec::new();

        for name in self.stages.keys() {
            if !visited.contains(name) {
                if let Some(cycle) = self.dfs_cycle(name, &mut visited, &mut rec_stack, &mut path) {
                    return Err(CycleDetectedError::new(cycle).into());
                }
            }
        }

        Ok(())
    }

    fn dfs_cycle(
        &self,
        node: &str,
        visited: &mut HashSet<String>,
        rec_stack: &mut HashSet<String>,
        path: &mut Vec<String>,
    ) -> Option<Vec<String>> {
        visited.insert(node.to_string());
        rec_stack.insert(node.to_string());
        path.push(node.to_string());

        if let Some(spec) = self.stages.get(node) {
            for dep in &spec.dependencies {
                if !visited.contains(dep) {
                    if let Some(cycle) = self.dfs_cycle(dep, visited, rec_stack, path) {
                        return Some(cycle);
                    }
                } else if rec_stack.contains(dep) {
                    let cycle_start = path.iter().position(|n| n == dep).unwrap_or(0);
                    let mut cycle: Vec<String> = path[cycle_start..].to_vec();
                    cycle.push(dep.clone());
                    return Some(cycle);
                }
            }
        }

        path.pop();
        rec_stack.remove(node);
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::NoOpStage;

    fn source_fed(name: &str, output: &str) -> Arc<dyn Stage> {
        Arc::new(
            NoOpStage::new(name)
                .with_input("raw_calls", SOURCE_STAGE)
                .with_output(output),
        )
    }

    #[test]
    fn test_builder_linear_chain() {
        let builder = PipelineBuilder::new("test")
            .stage(source_fed("genotype", "gvcf"))
            .unwrap()
            .stage(Arc::new(
                NoOpStage::new("select")
                    .with_input("gvcf", "genotype")
                    .with_output("snp_subset"),
            ))
            .unwrap();

        assert_eq!(builder.stage_count(), 2);
        assert!(builder.build().is_ok());
    }

    #[test]
    fn test_builder_unknown_producer() {
        let result = PipelineBuilder::new("test").stage(Arc::new(
            NoOpStage::new("select").with_input("gvcf", "genotype"),
        ));

        let err = result.unwrap_err();
        assert!(err.message.contains("unknown stage 'genotype'"));
    }

    #[test]
    fn test_builder_unpublished_channel() {
        let result = PipelineBuilder::new("test")
            .stage(source_fed("genotype", "gvcf"))
            .unwrap()
            .stage(Arc::new(
                NoOpStage::new("select").with_input("not_a_channel", "genotype"),
            ));

        let err = result.unwrap_err();
        assert!(err.message.contains("does not publish"));
    }

    #[test]
    fn test_builder_duplicate_stage_name() {
        let result = PipelineBuilder::new("test")
            .stage(source_fed("genotype", "gvcf"))
            .unwrap()
            .stage(source_fed("genotype", "gvcf2"));

        assert!(result.unwrap_err().message.contains("duplicate"));
    }

    #[test]
    fn test_builder_duplicate_channel() {
        let result = PipelineBuilder::new("test")
            .stage(source_fed("a", "gvcf"))
            .unwrap()
            .stage(source_fed("b", "gvcf"));

        assert!(result.unwrap_err().message.contains("already published"));
    }

    #[test]
    fn test_builder_empty_build() {
        assert!(PipelineBuilder::new("test").build().is_err());
    }
}
