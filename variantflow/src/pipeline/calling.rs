//! The variant-calling stage graph.
//!
//! Wires the eight processing stages into the dataflow graph:
//! genotype -> select (SNP/indel fan-out) -> per-type recalibration ->
//! combine (keyed fan-in) -> snpeff / annotate / evaluate.

use super::{PipelineBuilder, StageGraph};
use crate::context::{PipelineContext, RunKey, SOURCE_STAGE};
use crate::core::{OutputSlot, StageArtifact};
use crate::errors::{PipelineError, PipelineValidationError};
use crate::stages::{
    channels, CombineVariants, GenotypeGvcfs, SelectVariants, SnpEffAnnotate, ToolStage,
    VariantAnnotator, VariantEval, VariantKind, VariantRecalibrate,
};
use std::path::PathBuf;
use std::sync::Arc;

/// The logical stage names, in pipeline order.
pub const STAGE_NAMES: [&str; 8] = [
    "genotype",
    "select",
    "recal_snp",
    "recal_indel",
    "combine",
    "snpeff",
    "annotate",
    "evaluate",
];

/// Builds the variant-calling graph.
///
/// # Errors
///
/// Returns a validation error if the wiring is inconsistent; with the
/// fixed stage set this only fires on a programming error.
pub fn variant_calling_graph() -> Result<StageGraph, PipelineValidationError> {
    PipelineBuilder::new("variant_calling")
        .stage(Arc::new(
            ToolStage::new("genotype", Arc::new(GenotypeGvcfs))
                .with_input(channels::RAW_CALLS, SOURCE_STAGE)
                .with_output(OutputSlot::intermediate(channels::GVCF, "{key}_gvcf.vcf")),
        ))?
        .stage(Arc::new(
            ToolStage::new("select", Arc::new(SelectVariants))
                .with_input(channels::GVCF, "genotype")
                .with_output(OutputSlot::intermediate(
                    channels::SNP_SUBSET,
                    "{key}_snp.vcf",
                ))
                .with_output(OutputSlot::intermediate(
                    channels::INDEL_SUBSET,
                    "{key}_indel.vcf",
                )),
        ))?
        .stage(Arc::new(
            ToolStage::new(
                "recal_snp",
                Arc::new(VariantRecalibrate {
                    kind: VariantKind::Snp,
                }),
            )
            .with_input(channels::SNP_SUBSET, "select")
            .with_output(OutputSlot::intermediate(
                channels::FILTERED_SNP,
                "{key}_filtered_snp.vcf",
            )),
        ))?
        .stage(Arc::new(
            ToolStage::new(
                "recal_indel",
                Arc::new(VariantRecalibrate {
                    kind: VariantKind::Indel,
                }),
            )
            .with_input(channels::INDEL_SUBSET, "select")
            .with_output(OutputSlot::intermediate(
                channels::FILTERED_INDEL,
                "{key}_filtered_indel.vcf",
            )),
        ))?
        .stage(Arc::new(
            ToolStage::new("combine", Arc::new(CombineVariants))
                .with_input(channels::FILTERED_SNP, "recal_snp")
                .with_input(channels::FILTERED_INDEL, "recal_indel")
                .with_output(OutputSlot::new(channels::COMBINED, "{key}_combined.vcf")),
        ))?
        .stage(Arc::new(
            ToolStage::new("snpeff", Arc::new(SnpEffAnnotate))
                .with_input(channels::COMBINED, "combine")
                .with_output(OutputSlot::intermediate(
                    channels::SNPEFF_VCF,
                    "{key}_effects.vcf",
                )),
        ))?
        .stage(Arc::new(
            ToolStage::new("annotate", Arc::new(VariantAnnotator))
                .with_input(channels::COMBINED, "combine")
                .with_input(channels::SNPEFF_VCF, "snpeff")
                .with_output(OutputSlot::new(channels::ANNOTATED, "{key}_annotated.vcf")),
        ))?
        .stage(Arc::new(
            ToolStage::new("evaluate", Arc::new(VariantEval))
                .with_input(channels::COMBINED, "combine")
                .with_output(OutputSlot::new(channels::EVAL_REPORT, "{key}_eval.txt")),
        ))?
        .build()
}

/// Seeds the raw per-sample call files into the artifact store, one run
/// key per file.
///
/// # Errors
///
/// Returns [`PipelineError::OutputConflict`] on duplicate keys.
pub fn seed_raw_calls(
    ctx: &PipelineContext,
    reads: &[(RunKey, PathBuf)],
) -> Result<(), PipelineError> {
    for (key, path) in reads {
        ctx.artifacts.publish(StageArtifact::new(
            channels::RAW_CALLS,
            key.clone(),
            path.clone(),
            SOURCE_STAGE,
        ))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::ResourceBundle;

    fn bundle() -> ResourceBundle {
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

    #[test]
    fn test_graph_builds_with_all_stages() {
        let graph = variant_calling_graph().unwrap();
        assert_eq!(graph.stage_count(), STAGE_NAMES.len());
        for name in STAGE_NAMES {
            assert!(
                graph.execution_order().iter().any(|n| n == name),
                "missing stage {name}"
            );
        }
    }

    #[test]
    fn test_graph_order_encodes_dependencies() {
        let graph = variant_calling_graph().unwrap();
        let order = graph.execution_order();
        let pos = |name: &str| order.iter().position(|n| n == name).unwrap();

        assert!(pos("genotype") < pos("select"));
        assert!(pos("select") < pos("recal_snp"));
        assert!(pos("select") < pos("recal_indel"));
        assert!(pos("recal_snp") < pos("combine"));
        assert!(pos("recal_indel") < pos("combine"));
        assert!(pos("combine") < pos("snpeff"));
        assert!(pos("snpeff") < pos("annotate"));
        assert!(pos("combine") < pos("evaluate"));
    }

    #[test]
    fn test_seed_raw_calls_rejects_duplicate_keys() {
        let ctx = PipelineContext::new(bundle(), "/tmp/x");
        let reads = vec![
            (RunKey::new("s1"), PathBuf::from("/data/s1.vcf")),
            (RunKey::new("s1"), PathBuf::from("/data/other/s1.vcf")),
        ];

        let err = seed_raw_calls(&ctx, &reads).unwrap_err();
        assert!(matches!(err, PipelineError::OutputConflict { .. }));
    }
}
