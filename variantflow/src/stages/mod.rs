//! Stage trait and the external-tool stages built on it.
//!
//! A stage is one step of the dataflow graph: it declares the input
//! channels it consumes (by producer stage), the output channels it
//! publishes, and the number of cores its tool demands. Instances are
//! keyed by run key and executed by the scheduler in
//! [`crate::pipeline`].

mod gatk;
mod snpeff;
mod tool;

pub use gatk::{
    CombineVariants, GenotypeGvcfs, SelectVariants, VariantAnnotator, VariantEval,
    VariantKind, VariantRecalibrate,
};
pub use snpeff::SnpEffAnnotate;
pub use tool::{CommandBuilder, CommandRequest, Invocation, ToolStage};

use crate::context::StageContext;
use crate::core::{InputSlot, OutputSlot, StageOutput};
use async_trait::async_trait;
use std::fmt::Debug;

/// The named artifact channels of the variant-calling pipeline.
pub mod channels {
    /// Raw per-sample variant calls seeded at pipeline entry.
    pub const RAW_CALLS: &str = "raw_calls";
    /// Jointly genotyped GVCF.
    pub const GVCF: &str = "gvcf";
    /// SNP-only subset of the GVCF.
    pub const SNP_SUBSET: &str = "snp_subset";
    /// Indel-only subset of the GVCF.
    pub const INDEL_SUBSET: &str = "indel_subset";
    /// Recalibrated, filtered SNPs.
    pub const FILTERED_SNP: &str = "filtered_snp";
    /// Recalibrated, filtered indels.
    pub const FILTERED_INDEL: &str = "filtered_indel";
    /// Re-joined variant set.
    pub const COMBINED: &str = "combined";
    /// Effect-annotated variants from the external database.
    pub const SNPEFF_VCF: &str = "snpeff_vcf";
    /// Fully annotated final variant set.
    pub const ANNOTATED: &str = "annotated";
    /// Evaluation report.
    pub const EVAL_REPORT: &str = "eval_report";
}

/// Trait for pipeline stages.
#[async_trait]
pub trait Stage: Send + Sync + Debug {
    /// The unique name of the stage.
    fn name(&self) -> &str;

    /// The input channels this stage binds, with their producers.
    fn input_slots(&self) -> Vec<InputSlot> {
        Vec::new()
    }

    /// The output channels this stage publishes.
    fn output_slots(&self) -> Vec<OutputSlot> {
        Vec::new()
    }

    /// Cores the stage's tool demands from the global budget.
    fn cores(&self) -> u32 {
        1
    }

    /// Executes one instance of the stage.
    async fn execute(&self, ctx: &StageContext) -> StageOutput;
}

/// A stage that publishes placeholder artifacts without running a tool.
///
/// Used in scheduler tests and as a wiring probe; real pipelines use
/// [`ToolStage`].
#[derive(Debug, Clone)]
pub struct NoOpStage {
    name: String,
    inputs: Vec<InputSlot>,
    outputs: Vec<OutputSlot>,
}

impl NoOpStage {
    /// Creates a new no-op stage.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// Declares an input channel.
    #[must_use]
    pub fn with_input(mut self, channel: impl Into<String>, from_stage: impl Into<String>) -> Self {
        self.inputs.push(InputSlot::new(channel, from_stage));
        self
    }

    /// Declares an output channel.
    #[must_use]
    pub fn with_output(mut self, channel: impl Into<String>) -> Self {
        let channel = channel.into();
        let pattern = format!("{{key}}_{channel}");
        self.outputs.push(OutputSlot::intermediate(channel, pattern));
        self
    }
}

#[async_trait]
impl Stage for NoOpStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_slots(&self) -> Vec<InputSlot> {
        self.inputs.clone()
    }

    fn output_slots(&self) -> Vec<OutputSlot> {
        self.outputs.clone()
    }

    async fn execute(&self, ctx: &StageContext) -> StageOutput {
        let artifacts = self
            .outputs
            .iter()
            .map(|slot| {
                crate::core::StageArtifact::new(
                    slot.channel.clone(),
                    ctx.key().clone(),
                    ctx.stage_dir().join(slot.resolve(ctx.key())),
                    self.name.clone(),
                )
            })
            .collect();

        StageOutput::ok(artifacts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{PipelineContext, RunKey, StageInputs};
    use crate::resources::ResourceBundle;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn test_bundle() -> ResourceBundle {
        ResourceBundle {
            genome: "GRCh37".to_string(),
            kit: None,
            gfasta: PathBuf::from("/ref/seq.fa"),
            bwa_index: PathBuf::from("/ref/bwa"),
            dbsnp: PathBuf::from("/ref/dbsnp.vcf"),
            thousandg: PathBuf::from("/ref/1000g.vcf"),
            mills: PathBuf::from("/ref/mills.vcf"),
            omni: PathBuf::from("/ref/omni.vcf"),
            bait: PathBuf::from("/kit/baits"),
            target: PathBuf::from("/kit/targets"),
            target_bed: None,
        }
    }

    #[tokio::test]
    async fn test_noop_stage_publishes_declared_channels() {
        let stage = NoOpStage::new("genotype")
            .with_input("raw_calls", crate::context::SOURCE_STAGE)
            .with_output("gvcf");

        assert_eq!(stage.input_slots().len(), 1);

        let ctx = Arc::new(PipelineContext::new(test_bundle(), "/results"));
        let key = RunKey::new("s1");
        let inputs = StageInputs::from_artifacts("genotype", &key, Vec::new()).unwrap();
        let stage_ctx = StageContext::new(ctx, "genotype", key, inputs, "/results/genotype");

        let output = stage.execute(&stage_ctx).await;
        assert!(output.is_success());
        assert_eq!(output.artifacts.len(), 1);
        assert_eq!(output.artifacts[0].channel, "gvcf");
    }
}
