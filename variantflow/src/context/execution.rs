//! Execution contexts for pipeline and stage execution.

use super::{ArtifactStore, RunKey, StageInputs};
use crate::events::{EventSink, LoggingEventSink};
use crate::resources::{ResourceBundle, ToolPaths};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use uuid::Uuid;

/// The shared context of one pipeline invocation.
///
/// Holds the read-only resource bundle, the write-once artifact store,
/// the global core budget, and the event sink. Stage instances receive it
/// behind an `Arc` and communicate only through the store.
pub struct PipelineContext {
    run_id: Uuid,
    resources: ResourceBundle,
    tools: ToolPaths,
    out_dir: PathBuf,
    keep_intermediates: bool,
    total_cores: u32,
    core_budget: Arc<Semaphore>,
    /// Artifact channels, write-once.
    pub artifacts: ArtifactStore,
    event_sink: Arc<dyn EventSink>,
    cancelled: AtomicBool,
}

impl std::fmt::Debug for PipelineContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineContext")
            .field("run_id", &self.run_id)
            .field("out_dir", &self.out_dir)
            .field("total_cores", &self.total_cores)
            .finish_non_exhaustive()
    }
}

impl PipelineContext {
    /// Creates a new pipeline context.
    #[must_use]
    pub fn new(resources: ResourceBundle, out_dir: impl Into<PathBuf>) -> Self {
        let total_cores = std::thread::available_parallelism()
            .map(|n| u32::try_from(n.get()).unwrap_or(1))
            .unwrap_or(1);

        Self {
            run_id: Uuid::new_v4(),
            resources,
            tools: ToolPaths::default(),
            out_dir: out_dir.into(),
            keep_intermediates: false,
            total_cores,
            core_budget: Arc::new(Semaphore::new(total_cores as usize)),
            artifacts: ArtifactStore::new(),
            event_sink: Arc::new(LoggingEventSink::default()),
            cancelled: AtomicBool::new(false),
        }
    }

    /// Sets the external tool executables.
    #[must_use]
    pub fn with_tools(mut self, tools: ToolPaths) -> Self {
        self.tools = tools;
        self
    }

    /// Sets the global core budget.
    #[must_use]
    pub fn with_cores(mut self, cores: u32) -> Self {
        self.total_cores = cores.max(1);
        self.core_budget = Arc::new(Semaphore::new(self.total_cores as usize));
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Retains intermediate artifacts after a key's chain completes.
    #[must_use]
    pub fn with_keep_intermediates(mut self, keep: bool) -> Self {
        self.keep_intermediates = keep;
        self
    }

    /// The unique id of this pipeline invocation.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// The resolved resource bundle.
    #[must_use]
    pub fn resources(&self) -> &ResourceBundle {
        &self.resources
    }

    /// The external tool executables.
    #[must_use]
    pub fn tools(&self) -> &ToolPaths {
        &self.tools
    }

    /// The root results directory.
    #[must_use]
    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// Whether intermediate artifacts are retained.
    #[must_use]
    pub fn keep_intermediates(&self) -> bool {
        self.keep_intermediates
    }

    /// The global core budget.
    #[must_use]
    pub fn total_cores(&self) -> u32 {
        self.total_cores
    }

    /// The per-stage output directory for a logical stage name.
    #[must_use]
    pub fn stage_dir(&self, stage: &str) -> PathBuf {
        self.out_dir.join(stage)
    }

    /// Creates and returns the per-stage output directory.
    ///
    /// # Errors
    ///
    /// Returns the underlying IO error if the directory cannot be created.
    pub fn ensure_stage_dir(&self, stage: &str) -> std::io::Result<PathBuf> {
        let dir = self.stage_dir(stage);
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Acquires `cores` permits from the global budget, waiting until the
    /// budget allows. Requests above the total budget are clamped so a
    /// single greedy stage cannot deadlock the scheduler.
    ///
    /// # Errors
    ///
    /// Never fails in practice; the semaphore is not closed while the
    /// context is alive.
    pub async fn acquire_cores(
        &self,
        cores: u32,
    ) -> Result<OwnedSemaphorePermit, tokio::sync::AcquireError> {
        let n = cores.clamp(1, self.total_cores);
        self.core_budget.clone().acquire_many_owned(n).await
    }

    /// Emits an event enriched with the invocation id.
    pub fn try_emit_event(&self, event_type: &str, data: Option<serde_json::Value>) {
        let mut enriched = data.unwrap_or_else(|| serde_json::json!({}));
        if let serde_json::Value::Object(ref mut map) = enriched {
            map.insert(
                "pipeline_run_id".to_string(),
                serde_json::json!(self.run_id.to_string()),
            );
        }
        self.event_sink.emit(event_type, Some(enriched));
    }

    /// Marks the whole invocation as cancelled.
    pub fn mark_cancelled(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Checks whether the invocation was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// The context of a single stage instance (one stage, one run key).
#[derive(Debug)]
pub struct StageContext {
    pipeline: Arc<PipelineContext>,
    stage_name: String,
    key: RunKey,
    inputs: StageInputs,
    stage_dir: PathBuf,
}

impl StageContext {
    /// Creates a new stage context.
    #[must_use]
    pub fn new(
        pipeline: Arc<PipelineContext>,
        stage_name: impl Into<String>,
        key: RunKey,
        inputs: StageInputs,
        stage_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            pipeline,
            stage_name: stage_name.into(),
            key,
            inputs,
            stage_dir: stage_dir.into(),
        }
    }

    /// The stage name.
    #[must_use]
    pub fn stage_name(&self) -> &str {
        &self.stage_name
    }

    /// The run key of this instance.
    #[must_use]
    pub fn key(&self) -> &RunKey {
        &self.key
    }

    /// The bound input channels.
    #[must_use]
    pub fn inputs(&self) -> &StageInputs {
        &self.inputs
    }

    /// The instance's working directory.
    #[must_use]
    pub fn stage_dir(&self) -> &Path {
        &self.stage_dir
    }

    /// The pipeline context.
    #[must_use]
    pub fn pipeline(&self) -> &Arc<PipelineContext> {
        &self.pipeline
    }

    /// The resolved resource bundle.
    #[must_use]
    pub fn resources(&self) -> &ResourceBundle {
        self.pipeline.resources()
    }

    /// The external tool executables.
    #[must_use]
    pub fn tools(&self) -> &ToolPaths {
        self.pipeline.tools()
    }

    /// Emits an event enriched with the stage name and run key.
    pub fn try_emit_event(&self, event_type: &str, data: Option<serde_json::Value>) {
        let mut enriched = data.unwrap_or_else(|| serde_json::json!({}));
        if let serde_json::Value::Object(ref mut map) = enriched {
            map.insert("stage".to_string(), serde_json::json!(&self.stage_name));
            map.insert("key".to_string(), serde_json::json!(self.key.as_str()));
        }
        self.pipeline.try_emit_event(event_type, Some(enriched));
    }

    /// Checks whether the invocation was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.pipeline.is_cancelled()
    }
}
