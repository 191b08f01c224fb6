//! Keyed dataflow scheduler.
//!
//! Executes stage instances as soon as their input channels are bound,
//! allowing independent branches and independent run keys to run
//! concurrently. A failed instance fails fast for its own key: nothing
//! downstream of it is scheduled, while in-flight siblings drain and
//! other keys continue unaffected.

use super::StageSpec;
use crate::context::{PipelineContext, RunKey, StageContext, StageInputs};
use crate::core::{StageOutput, StageStatus};
use futures::future::join_all;
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

/// Result of running one key through the whole graph.
#[derive(Debug)]
pub struct KeyRunResult {
    /// The run key.
    pub key: RunKey,
    /// Terminal outputs per stage that was scheduled.
    pub outputs: HashMap<String, StageOutput>,
    /// First failure, if the chain failed.
    pub error: Option<String>,
    /// Stages never scheduled because an upstream instance failed.
    pub unscheduled: Vec<String>,
    /// Wall-clock duration for this key in milliseconds.
    pub duration_ms: f64,
}

impl KeyRunResult {
    /// True if every stage completed (or skipped) for this key.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.unscheduled.is_empty()
    }
}

/// Result of running the graph over all keys.
#[derive(Debug)]
pub struct PipelineRunResult {
    /// Per-key results, ordered by key.
    pub keys: Vec<KeyRunResult>,
    /// Total wall-clock duration in milliseconds.
    pub duration_ms: f64,
}

impl PipelineRunResult {
    /// True if every key succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.keys.iter().all(KeyRunResult::is_success)
    }

    /// The result for one key, if it was run.
    #[must_use]
    pub fn key(&self, key: &RunKey) -> Option<&KeyRunResult> {
        self.keys.iter().find(|r| &r.key == key)
    }
}

/// A validated, topologically ordered graph of stages.
#[derive(Debug)]
pub struct StageGraph {
    name: String,
    stages: HashMap<String, StageSpec>,
    execution_order: Vec<String>,
}

impl StageGraph {
    /// Creates a new stage graph.
    #[must_use]
    pub fn new(name: String, stages: HashMap<String, StageSpec>, stage_order: Vec<String>) -> Self {
        let execution_order = topological_sort(&stages, &stage_order);
        Self {
            name,
            stages,
            execution_order,
        }
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

    /// Returns the topological execution order.
    #[must_use]
    pub fn execution_order(&self) -> &[String] {
        &self.execution_order
    }

    /// Runs the graph for every key concurrently.
    pub async fn execute(
        &self,
        ctx: Arc<PipelineContext>,
        keys: Vec<RunKey>,
    ) -> PipelineRunResult {
        let start = Instant::now();

        let mut results = join_all(
            keys.into_iter()
                .map(|key| self.execute_key(ctx.clone(), key)),
        )
        .await;
        results.sort_by(|a, b| a.key.cmp(&b.key));

        PipelineRunResult {
            keys: results,
            duration_ms: start.elapsed().as_secs_f64() * 1000.0,
        }
    }

    /// Runs the graph for a single key.
    ///
    /// An instance is spawned once all of its dependencies have succeeded
    /// for this key; independent branches run concurrently. On the first
    /// failure no further instance of this key is scheduled, but in-flight
    /// siblings are drained.
    pub async fn execute_key(&self, ctx: Arc<PipelineContext>, key: RunKey) -> KeyRunResult {
        let start = Instant::now();
        let total = self.stages.len();

        let mut in_degree: HashMap<String, usize> = self
            .stages
            .iter()
            .map(|(name, spec)| (name.clone(), spec.dependencies.len()))
            .collect();

        let mut outputs: HashMap<String, StageOutput> = HashMap::new();
        let mut failed: Option<String> = None;
        let mut active: FuturesUnordered<tokio::task::JoinHandle<(String, StageOutput)>> =
            FuturesUnordered::new();

        let ready: Vec<String> = self
            .execution_order
            .iter()
            .filter(|name| in_degree.get(*name).copied() == Some(0))
            .cloned()
            .collect();
        for stage_name in ready {
            active.push(self.spawn_instance(stage_name, ctx.clone(), key.clone()));
        }

        while outputs.len() < total {
            let Some(joined) = active.next().await else {
                // Nothing in flight and nothing schedulable: either an
                // upstream failure cut the chain, or the graph deadlocked.
                if failed.is_none() {
                    failed = Some(format!(
                        "deadlocked stage graph for key '{key}'; remaining stages: {:?}",
                        self.remaining(&outputs)
                    ));
                }
                break;
            };

            let (stage_name, output) = match joined {
                Ok(pair) => pair,
                Err(e) => {
                    failed.get_or_insert(format!("stage task panicked: {e}"));
                    continue;
                }
            };

            let succeeded = output.is_success();
            if succeeded {
                for artifact in &output.artifacts {
                    if let Err(e) = ctx.artifacts.publish(artifact.clone()) {
                        failed.get_or_insert(e.to_string());
                    }
                }
            } else if failed.is_none() {
                let message = output
                    .error
                    .clone()
                    .unwrap_or_else(|| format!("stage '{stage_name}' failed"));
                ctx.try_emit_event(
                    "key.failed",
                    Some(serde_json::json!({
                        "key": key.as_str(),
                        "stage": &stage_name,
                        "error": &message,
                    })),
                );
                failed = Some(message);
            }

            outputs.insert(stage_name.clone(), output);

            if succeeded && failed.is_none() {
                for (child, spec) in &self.stages {
                    if !spec.dependencies.contains(&stage_name) {
                        continue;
                    }
                    if let Some(count) = in_degree.get_mut(child) {
                        *count = count.saturating_sub(1);
                        if *count == 0 && !outputs.contains_key(child) {
                            active.push(self.spawn_instance(
                                child.clone(),
                                ctx.clone(),
                                key.clone(),
                            ));
                        }
                    }
                }
            }
        }

        // Drain anything still in flight (siblings of a failed branch).
        while let Some(joined) = active.next().await {
            if let Ok((stage_name, output)) = joined {
                if output.is_success() {
                    for artifact in &output.artifacts {
                        if let Err(e) = ctx.artifacts.publish(artifact.clone()) {
                            warn!(key = %key, "late artifact publish failed: {e}");
                        }
                    }
                }
                outputs.insert(stage_name, output);
            }
        }

        let unscheduled = self.remaining(&outputs);

        if failed.is_none() && unscheduled.is_empty() && !ctx.keep_intermediates() {
            self.cleanup_intermediates(&ctx, &key);
        }

        KeyRunResult {
            key,
            outputs,
            error: failed,
            unscheduled,
            duration_ms: start.elapsed().as_secs_f64() * 1000.0,
        }
    }

    fn remaining(&self, outputs: &HashMap<String, StageOutput>) -> Vec<String> {
        let mut remaining: Vec<String> = self
            .stages
            .keys()
            .filter(|name| !outputs.contains_key(*name))
            .cloned()
            .collect();
        remaining.sort();
        remaining
    }

    fn spawn_instance(
        &self,
        stage_name: String,
        ctx: Arc<PipelineContext>,
        key: RunKey,
    ) -> tokio::task::JoinHandle<(String, StageOutput)> {
        // Registered names always resolve; guarded for the impossible case.
        let spec = self.stages.get(&stage_name).cloned();

        tokio::spawn(async move {
            let Some(spec) = spec else {
                return (
                    stage_name.clone(),
                    StageOutput::fail(format!("unknown stage '{stage_name}'")),
                );
            };

            let output = run_instance(&spec, &ctx, &key).await;
            (stage_name, output)
        })
    }

    fn cleanup_intermediates(&self, ctx: &Arc<PipelineContext>, key: &RunKey) {
        for spec in self.stages.values() {
            for slot in spec.runner.output_slots() {
                if !slot.intermediate {
                    continue;
                }
                if let Some(artifact) = ctx.artifacts.get(key, &slot.channel) {
                    if let Err(e) = std::fs::remove_file(&artifact.path) {
                        warn!(
                            key = %key,
                            path = %artifact.path.display(),
                            "could not remove intermediate: {e}"
                        );
                    }
                }
            }
        }
    }
}

async fn run_instance(
    spec: &StageSpec,
    ctx: &Arc<PipelineContext>,
    key: &RunKey,
) -> StageOutput {
    let stage_dir = match ctx.ensure_stage_dir(&spec.name) {
        Ok(dir) => dir,
        Err(e) => return StageOutput::fail(format!("cannot create stage directory: {e}")),
    };

    let inputs = match StageInputs::bind(&spec.name, key, &spec.runner.input_slots(), &ctx.artifacts)
    {
        Ok(inputs) => inputs,
        Err(e) => return StageOutput::fail(e.to_string()),
    };

    let stage_ctx = StageContext::new(ctx.clone(), &spec.name, key.clone(), inputs, stage_dir);
    stage_ctx.try_emit_event("stage.started", None);

    let started = Instant::now();
    let output = spec.runner.execute(&stage_ctx).await;
    let duration_ms = started.elapsed().as_secs_f64() * 1000.0;

    match output.status {
        StageStatus::Ok => stage_ctx.try_emit_event(
            "stage.completed",
            Some(serde_json::json!({ "duration_ms": duration_ms })),
        ),
        StageStatus::Skip => stage_ctx.try_emit_event(
            "stage.skipped",
            Some(serde_json::json!({ "reason": output.skip_reason })),
        ),
        StageStatus::Fail | StageStatus::Cancel => stage_ctx.try_emit_event(
            "stage.failed",
            Some(serde_json::json!({
                "error": output.error,
                "duration_ms": duration_ms,
            })),
        ),
        StageStatus::Pending | StageStatus::Running => {}
    }

    output
}

/// Performs a topological sort of the stage graph.
fn topological_sort(stages: &HashMap<String, StageSpec>, stage_order: &[String]) -> Vec<String> {
    let mut result = Vec::new();
    let mut visited = HashSet::new();
    let mut temp = HashSet::new();

    fn visit(
        node: &str,
        stages: &HashMap<String, StageSpec>,
        visited: &mut HashSet<String>,
        temp: &mut HashSet<String>,
        result: &mut Vec<String>,
    ) {
        if visited.contains(node) || temp.contains(node) {
            return;
        }
        temp.insert(node.to_string());

        if let Some(spec) = stages.get(node) {
            let mut deps: Vec<&String> = spec.dependencies.iter().collect();
            deps.sort();
            for dep in deps {
                visit(dep, stages, visited, temp, result);
            }
        }

        temp.remove(node);
        visited.insert(node.to_string());
        result.push(node.to_string());
    }

    for name in stage_order {
        visit(name, stages, &mut visited, &mut temp, &mut result);
    }

    result
}
