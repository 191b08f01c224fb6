//! Generic external-tool stage: command construction, process execution,
//! and declared-output verification.

use super::Stage;
use crate::context::{RunKey, StageContext, StageInputs};
use crate::core::{InputSlot, OutputSlot, StageArtifact, StageOutput};
use crate::errors::PipelineError;
use crate::resources::{ResourceBundle, ToolPaths};
use async_trait::async_trait;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// One external-process invocation planned by a command builder.
///
/// Every file path in `argv` is substituted verbatim. By default the
/// child's stdout and stderr are appended to the instance log; a tool
/// that writes its result to stdout sets `stdout_to` instead.
#[derive(Debug, Clone)]
pub struct Invocation {
    /// The full command line, program first.
    pub argv: Vec<String>,
    /// Redirect the child's stdout into this file instead of the log.
    pub stdout_to: Option<PathBuf>,
}

impl Invocation {
    /// Creates an invocation whose output streams go to the log.
    #[must_use]
    pub fn new(argv: Vec<String>) -> Self {
        Self {
            argv,
            stdout_to: None,
        }
    }

    /// Redirects stdout to a file.
    #[must_use]
    pub fn with_stdout_to(mut self, path: impl Into<PathBuf>) -> Self {
        self.stdout_to = Some(path.into());
        self
    }
}

/// Everything a command builder may consult when planning its argv.
#[derive(Debug)]
pub struct CommandRequest<'a> {
    /// The resolved resource bundle.
    pub resources: &'a ResourceBundle,
    /// External tool executables.
    pub tools: &'a ToolPaths,
    /// The run key of the instance.
    pub key: &'a RunKey,
    /// The artifacts bound to the stage's input channels.
    pub inputs: &'a StageInputs,
    /// The instance's working directory.
    pub stage_dir: &'a Path,
}

/// Plans the exact command lines for one stage instance.
///
/// Builders are pure: they read the request and return invocations, with
/// no side effects. Output files named by an invocation must match the
/// stage's declared output slots.
pub trait CommandBuilder: Send + Sync + Debug {
    /// Plans the invocations for this instance, in execution order.
    ///
    /// # Errors
    ///
    /// Returns an error if a required input channel is unbound.
    fn plan(&self, req: &CommandRequest<'_>) -> Result<Vec<Invocation>, PipelineError>;
}

/// A stage that shells out to an external tool.
///
/// Execution contract per instance: plan the argv, acquire the declared
/// cores from the global budget, run each invocation to completion, then
/// verify that every declared output pattern matched at least one file.
/// A nonzero exit or a missing output fails the instance; the raw tool
/// output is preserved in `<stage_dir>/<key>.log`.
#[derive(Debug)]
pub struct ToolStage {
    name: String,
    inputs: Vec<InputSlot>,
    outputs: Vec<OutputSlot>,
    cores: u32,
    command: Arc<dyn CommandBuilder>,
}

impl ToolStage {
    /// Creates a new tool stage.
    #[must_use]
    pub fn new(name: impl Into<String>, command: Arc<dyn CommandBuilder>) -> Self {
        Self {
            name: name.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            cores: 1,
            command,
        }
    }

    /// Declares an input channel bound from a producer stage.
    #[must_use]
    pub fn with_input(mut self, channel: impl Into<String>, from_stage: impl Into<String>) -> Self {
        self.inputs.push(InputSlot::new(channel, from_stage));
        self
    }

    /// Declares an output channel.
    #[must_use]
    pub fn with_output(mut self, slot: OutputSlot) -> Self {
        self.outputs.push(slot);
        self
    }

    /// Sets the cores the tool demands.
    #[must_use]
    pub fn with_cores(mut self, cores: u32) -> Self {
        self.cores = cores.max(1);
        self
    }

    /// The instance log path for a key.
    #[must_use]
    pub fn log_path(&self, stage_dir: &Path, key: &RunKey) -> PathBuf {
        stage_dir.join(format!("{key}.log"))
    }

    /// Collects artifacts for all declared output slots, or reports the
    /// first slot that matched nothing.
    fn collect_outputs(&self, ctx: &StageContext) -> Result<Vec<StageArtifact>, PipelineError> {
        let mut artifacts = Vec::with_capacity(self.outputs.len());

        for slot in &self.outputs {
            let matched = slot.matches(ctx.stage_dir(), ctx.key())?;
            let Some(primary) = matched.first() else {
                return Err(PipelineError::MissingOutput {
                    stage: self.name.clone(),
                    key: ctx.key().clone(),
                    pattern: slot.resolve(ctx.key()),
                    dir: ctx.stage_dir().to_path_buf(),
                });
            };
            artifacts.push(StageArtifact::new(
                slot.channel.clone(),
                ctx.key().clone(),
                primary.clone(),
                self.name.clone(),
            ));
        }

        Ok(artifacts)
    }

    /// True if every declared output already exists on disk.
    fn outputs_up_to_date(&self, ctx: &StageContext) -> bool {
        !self.outputs.is_empty()
            && self.outputs.iter().all(|slot| {
                slot.matches(ctx.stage_dir(), ctx.key())
                    .map(|m| !m.is_empty())
                    .unwrap_or(false)
            })
    }

    async fn run_invocation(
        &self,
        ctx: &StageContext,
        invocation: &Invocation,
        log_path: &Path,
    ) -> Result<(), PipelineError> {
        let Some((program, args)) = invocation.argv.split_first() else {
            return Err(PipelineError::Internal(format!(
                "stage '{}' planned an empty command line",
                self.name
            )));
        };

        let mut log = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;
        {
            use std::io::Write as _;
            writeln!(log, "$ {}", invocation.argv.join(" "))?;
        }

        let stdout: Stdio = match &invocation.stdout_to {
            Some(path) => std::fs::File::create(path)?.into(),
            None => log.try_clone()?.into(),
        };
        let stderr: Stdio = log.try_clone()?.into();

        debug!(stage = %self.name, key = %ctx.key(), program = %program, "spawning external tool");

        let status = tokio::process::Command::new(program)
            .args(args)
            .current_dir(ctx.stage_dir())
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .spawn()?
            .wait()
            .await?;

        if !status.success() {
            return Err(PipelineError::ExternalToolFailure {
                stage: self.name.clone(),
                key: ctx.key().clone(),
                exit_code: status.code(),
                log: log_path.to_path_buf(),
            });
        }

        Ok(())
    }
}

#[async_trait]
impl Stage for ToolStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_slots(&self) -> Vec<InputSlot> {
        self.inputs.clone()
    }

    fn output_slots(&self) -> Vec<OutputSlot> {
        self.outputs.clone()
    }

    fn cores(&self) -> u32 {
        self.cores
    }

    async fn execute(&self, ctx: &StageContext) -> StageOutput {
        let started = Instant::now();

        if ctx.is_cancelled() {
            return StageOutput::cancel("pipeline cancelled");
        }

        // Declared outputs already on disk from an earlier run: re-publish
        // them instead of re-invoking the tool.
        if self.outputs_up_to_date(ctx) {
            return match self.collect_outputs(ctx) {
                Ok(artifacts) => StageOutput::skip("outputs up to date", artifacts)
                    .with_duration_ms(elapsed_ms(started)),
                Err(e) => StageOutput::fail(e.to_string()),
            };
        }

        let req = CommandRequest {
            resources: ctx.resources(),
            tools: ctx.tools(),
            key: ctx.key(),
            inputs: ctx.inputs(),
            stage_dir: ctx.stage_dir(),
        };
        let invocations = match self.command.plan(&req) {
            Ok(invocations) => invocations,
            Err(e) => return StageOutput::fail(e.to_string()),
        };

        let log_path = self.log_path(ctx.stage_dir(), ctx.key());

        let permit = match ctx.pipeline().acquire_cores(self.cores).await {
            Ok(permit) => permit,
            Err(e) => return StageOutput::fail(format!("core budget closed: {e}")),
        };

        for invocation in &invocations {
            if let Err(e) = self.run_invocation(ctx, invocation, &log_path).await {
                drop(permit);
                return StageOutput::fail(e.to_string())
                    .with_log(log_path)
                    .with_duration_ms(elapsed_ms(started));
            }
        }
        drop(permit);

        match self.collect_outputs(ctx) {
            Ok(artifacts) => StageOutput::ok(artifacts)
                .with_log(log_path)
                .with_duration_ms(elapsed_ms(started)),
            Err(e) => StageOutput::fail(e.to_string())
                .with_log(log_path)
                .with_duration_ms(elapsed_ms(started)),
        }
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}
