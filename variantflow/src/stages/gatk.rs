//! GATK command builders.
//!
//! Each builder plans the exact argv for one pipeline stage, with every
//! resource and artifact path passed through verbatim.

use super::channels;
use super::tool::{CommandBuilder, CommandRequest, Invocation};
use crate::errors::PipelineError;
use std::path::Path;

pub(crate) fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// SNP or indel branch selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantKind {
    /// Single-nucleotide variants.
    Snp,
    /// Insertions/deletions.
    Indel,
}

impl VariantKind {
    /// The GATK `-mode` / `--selectTypeToInclude` value.
    #[must_use]
    pub fn mode(self) -> &'static str {
        match self {
            Self::Snp => "SNP",
            Self::Indel => "INDEL",
        }
    }

    /// Lowercase label used in channel and file names.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Snp => "snp",
            Self::Indel => "indel",
        }
    }

    /// The subset channel this branch consumes.
    #[must_use]
    pub fn subset_channel(self) -> &'static str {
        match self {
            Self::Snp => channels::SNP_SUBSET,
            Self::Indel => channels::INDEL_SUBSET,
        }
    }

    /// The filtered channel this branch publishes.
    #[must_use]
    pub fn filtered_channel(self) -> &'static str {
        match self {
            Self::Snp => channels::FILTERED_SNP,
            Self::Indel => channels::FILTERED_INDEL,
        }
    }
}

/// Joint genotyping of the raw per-sample calls.
#[derive(Debug, Clone, Copy)]
pub struct GenotypeGvcfs;

impl CommandBuilder for GenotypeGvcfs {
    fn plan(&self, req: &CommandRequest<'_>) -> Result<Vec<Invocation>, PipelineError> {
        let out = req.stage_dir.join(format!("{}_gvcf.vcf", req.key));

        Ok(vec![Invocation::new(vec![
            req.tools.gatk.clone(),
            "-T".to_string(),
            "GenotypeGVCFs".to_string(),
            "-R".to_string(),
            path_arg(&req.resources.gfasta),
            "--variant".to_string(),
            path_arg(req.inputs.path(channels::RAW_CALLS)?),
            "--dbsnp".to_string(),
            path_arg(&req.resources.dbsnp),
            "-o".to_string(),
            path_arg(&out),
        ])])
    }
}

/// Splits the genotyped set into SNP-only and indel-only subsets.
///
/// One stage, two tool invocations, two published channels; both
/// downstream recalibration branches derive from it.
#[derive(Debug, Clone, Copy)]
pub struct SelectVariants;

impl CommandBuilder for SelectVariants {
    fn plan(&self, req: &CommandRequest<'_>) -> Result<Vec<Invocation>, PipelineError> {
        let gvcf = path_arg(req.inputs.path(channels::GVCF)?);

        let mut invocations = Vec::with_capacity(2);
        for kind in [VariantKind::Snp, VariantKind::Indel] {
            let out = req
                .stage_dir
                .join(format!("{}_{}.vcf", req.key, kind.label()));
            invocations.push(Invocation::new(vec![
                req.tools.gatk.clone(),
                "-T".to_string(),
                "SelectVariants".to_string(),
                "-R".to_string(),
                path_arg(&req.resources.gfasta),
                "--variant".to_string(),
                gvcf.clone(),
                "--selectTypeToInclude".to_string(),
                kind.mode().to_string(),
                "-o".to_string(),
                path_arg(&out),
            ]));
        }

        Ok(invocations)
    }
}

/// Variant quality score recalibration for one branch: model building
/// followed by filter application.
#[derive(Debug, Clone, Copy)]
pub struct VariantRecalibrate {
    /// Which branch this recalibration runs on.
    pub kind: VariantKind,
}

impl VariantRecalibrate {
    fn training_resources(self, req: &CommandRequest<'_>) -> Vec<String> {
        match self.kind {
            VariantKind::Snp => vec![
                "-resource:omni,known=false,training=true,truth=true,prior=12.0".to_string(),
                path_arg(&req.resources.omni),
                "-resource:1000G,known=false,training=true,truth=false,prior=10.0".to_string(),
                path_arg(&req.resources.thousandg),
                "-resource:dbsnp,known=true,training=false,truth=false,prior=2.0".to_string(),
                path_arg(&req.resources.dbsnp),
            ],
            VariantKind::Indel => vec![
                "-resource:mills,known=false,training=true,truth=true,prior=12.0".to_string(),
                path_arg(&req.resources.mills),
                "-resource:dbsnp,known=true,training=false,truth=false,prior=2.0".to_string(),
                path_arg(&req.resources.dbsnp),
            ],
        }
    }

    fn annotations(self) -> &'static [&'static str] {
        match self.kind {
            VariantKind::Snp => &["QD", "MQ", "FS"],
            VariantKind::Indel => &["QD", "FS", "ReadPosRankSum"],
        }
    }
}

impl CommandBuilder for VariantRecalibrate {
    fn plan(&self, req: &CommandRequest<'_>) -> Result<Vec<Invocation>, PipelineError> {
        let subset = path_arg(req.inputs.path(self.kind.subset_channel())?);
        let label = self.kind.label();
        let recal = req.stage_dir.join(format!("{}_{label}.recal", req.key));
        let tranches = req.stage_dir.join(format!("{}_{label}.tranches", req.key));
        let out = req
            .stage_dir
            .join(format!("{}_filtered_{label}.vcf", req.key));

        let mut train = vec![
            req.tools.gatk.clone(),
            "-T".to_string(),
            "VariantRecalibrator".to_string(),
            "-R".to_string(),
            path_arg(&req.resources.gfasta),
            "-input".to_string(),
            subset.clone(),
            "-recalFile".to_string(),
            path_arg(&recal),
            "-tranchesFile".to_string(),
            path_arg(&tranches),
        ];
        train.extend(self.training_resources(req));
        for annotation in self.annotations() {
            train.push("-an".to_string());
            train.push((*annotation).to_string());
        }
        train.push("-mode".to_string());
        train.push(self.kind.mode().to_string());

        let apply = vec![
            req.tools.gatk.clone(),
            "-T".to_string(),
            "ApplyRecalibration".to_string(),
            "-R".to_string(),
            path_arg(&req.resources.gfasta),
            "-input".to_string(),
            subset,
            "-recalFile".to_string(),
            path_arg(&recal),
            "-tranchesFile".to_string(),
            path_arg(&tranches),
            "--ts_filter_level".to_string(),
            "99.0".to_string(),
            "-mode".to_string(),
            self.kind.mode().to_string(),
            "-o".to_string(),
            path_arg(&out),
        ];

        Ok(vec![Invocation::new(train), Invocation::new(apply)])
    }
}

/// Keyed fan-in join of the recalibrated SNP and indel halves.
#[derive(Debug, Clone, Copy)]
pub struct CombineVariants;

impl CommandBuilder for CombineVariants {
    fn plan(&self, req: &CommandRequest<'_>) -> Result<Vec<Invocation>, PipelineError> {
        let out = req.stage_dir.join(format!("{}_combined.vcf", req.key));

        Ok(vec![Invocation::new(vec![
            req.tools.gatk.clone(),
            "-T".to_string(),
            "CombineVariants".to_string(),
            "-R".to_string(),
            path_arg(&req.resources.gfasta),
            "--variant:snp".to_string(),
            path_arg(req.inputs.path(channels::FILTERED_SNP)?),
            "--variant:indel".to_string(),
            path_arg(req.inputs.path(channels::FILTERED_INDEL)?),
            "-genotypeMergeOptions".to_string(),
            "PRIORITIZE".to_string(),
            "-priority".to_string(),
            "snp,indel".to_string(),
            "-o".to_string(),
            path_arg(&out),
        ])])
    }
}

/// Folds the external-database effect annotations back into the caller's
/// variant set.
#[derive(Debug, Clone, Copy)]
pub struct VariantAnnotator;

impl CommandBuilder for VariantAnnotator {
    fn plan(&self, req: &CommandRequest<'_>) -> Result<Vec<Invocation>, PipelineError> {
        let out = req.stage_dir.join(format!("{}_annotated.vcf", req.key));

        Ok(vec![Invocation::new(vec![
            req.tools.gatk.clone(),
            "-T".to_string(),
            "VariantAnnotator".to_string(),
            "-R".to_string(),
            path_arg(&req.resources.gfasta),
            "-A".to_string(),
            "SnpEff".to_string(),
            "--variant".to_string(),
            path_arg(req.inputs.path(channels::COMBINED)?),
            "--snpEffFile".to_string(),
            path_arg(req.inputs.path(channels::SNPEFF_VCF)?),
            "-o".to_string(),
            path_arg(&out),
        ])])
    }
}

/// Evaluation of the combined set against dbSNP over the kit targets.
#[derive(Debug, Clone, Copy)]
pub struct VariantEval;

impl CommandBuilder for VariantEval {
    fn plan(&self, req: &CommandRequest<'_>) -> Result<Vec<Invocation>, PipelineError> {
        let out = req.stage_dir.join(format!("{}_eval.txt", req.key));

        Ok(vec![Invocation::new(vec![
            req.tools.gatk.clone(),
            "-T".to_string(),
            "VariantEval".to_string(),
            "-R".to_string(),
            path_arg(&req.resources.gfasta),
            "--eval".to_string(),
            path_arg(req.inputs.path(channels::COMBINED)?),
            "--dbsnp".to_string(),
            path_arg(&req.resources.dbsnp),
            "-L".to_string(),
            path_arg(&req.resources.target),
            "-o".to_string(),
            path_arg(&out),
        ])])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{RunKey, StageInputs};
    use crate::core::StageArtifact;
    use crate::resources::{ResourceBundle, ToolPaths};
    use std::path::PathBuf;

    fn bundle() -> ResourceBundle {
        ResourceBundle {
            genome: "GRCh37".to_string(),
            kit: None,
            gfasta: PathBuf::from("/ref/with space/seq.fa"),
            bwa_index: PathBuf::from("/ref/bwa"),
            dbsnp: PathBuf::from("/ref/dbsnp.vcf"),
            thousandg: PathBuf::from("/ref/1000g.vcf"),
            mills: PathBuf::from("/ref/mills.vcf"),
            omni: PathBuf::from("/ref/omni.vcf"),
            bait: PathBuf::from("/kit/baits"),
            target: PathBuf::from("/kit/targets.interval_list"),
            target_bed: None,
        }
    }

    fn inputs(stage: &str, key: &RunKey, pairs: &[(&str, &str)]) -> StageInputs {
        let artifacts = pairs
            .iter()
            .map(|(channel, path)| StageArtifact::new(*channel, key.clone(), *path, "up"))
            .collect();
        StageInputs::from_artifacts(stage, key, artifacts).unwrap()
    }

    fn request<'a>(
        resources: &'a ResourceBundle,
        tools: &'a ToolPaths,
        key: &'a RunKey,
        inputs: &'a StageInputs,
        stage_dir: &'a Path,
    ) -> CommandRequest<'a> {
        CommandRequest {
            resources,
            tools,
            key,
            inputs,
            stage_dir,
        }
    }

    #[test]
    fn test_genotype_gvcfs_argv() {
        let resources = bundle();
        let tools = ToolPaths::default();
        let key = RunKey::new("patient1");
        let inputs = inputs(
            "genotype",
            &key,
            &[(channels::RAW_CALLS, "/data/patient1.vcf")],
        );
        let dir = PathBuf::from("/results/genotype");

        let plan = GenotypeGvcfs
            .plan(&request(&resources, &tools, &key, &inputs, &dir))
            .unwrap();

        assert_eq!(plan.len(), 1);
        let argv = &plan[0].argv;
        assert_eq!(argv[0], "gatk");
        assert_eq!(argv[1..3], ["-T", "GenotypeGVCFs"]);
        // Paths pass through verbatim, spaces included, as single tokens.
        assert!(argv.contains(&"/ref/with space/seq.fa".to_string()));
        assert!(argv.contains(&"/data/patient1.vcf".to_string()));
        assert!(argv.contains(&"/results/genotype/patient1_gvcf.vcf".to_string()));
    }

    #[test]
    fn test_select_variants_plans_both_subsets() {
        let resources = bundle();
        let tools = ToolPaths::default();
        let key = RunKey::new("s1");
        let inputs = inputs("select", &key, &[(channels::GVCF, "/r/s1_gvcf.vcf")]);
        let dir = PathBuf::from("/r/select");

        let plan = SelectVariants
            .plan(&request(&resources, &tools, &key, &inputs, &dir))
            .unwrap();

        assert_eq!(plan.len(), 2);
        assert!(plan[0].argv.contains(&"SNP".to_string()));
        assert!(plan[0].argv.contains(&"/r/select/s1_snp.vcf".to_string()));
        assert!(plan[1].argv.contains(&"INDEL".to_string()));
        assert!(plan[1].argv.contains(&"/r/select/s1_indel.vcf".to_string()));
    }

    #[test]
    fn test_recalibrate_snp_uses_snp_training_resources() {
        let resources = bundle();
        let tools = ToolPaths::default();
        let key = RunKey::new("s1");
        let inputs = inputs(
            "recal_snp",
            &key,
            &[(channels::SNP_SUBSET, "/r/select/s1_snp.vcf")],
        );
        let dir = PathBuf::from("/r/recal_snp");

        let plan = VariantRecalibrate {
            kind: VariantKind::Snp,
        }
        .plan(&request(&resources, &tools, &key, &inputs, &dir))
        .unwrap();

        assert_eq!(plan.len(), 2);
        let train = &plan[0].argv;
        assert!(train.contains(&"VariantRecalibrator".to_string()));
        assert!(train.contains(&"/ref/omni.vcf".to_string()));
        assert!(train.contains(&"/ref/1000g.vcf".to_string()));
        assert!(!train.contains(&"/ref/mills.vcf".to_string()));

        let apply = &plan[1].argv;
        assert!(apply.contains(&"ApplyRecalibration".to_string()));
        assert!(apply.contains(&"/r/recal_snp/s1_filtered_snp.vcf".to_string()));
        assert!(apply.contains(&"SNP".to_string()));
    }

    #[test]
    fn test_recalibrate_indel_uses_mills() {
        let resources = bundle();
        let tools = ToolPaths::default();
        let key = RunKey::new("s1");
        let inputs = inputs(
            "recal_indel",
            &key,
            &[(channels::INDEL_SUBSET, "/r/select/s1_indel.vcf")],
        );
        let dir = PathBuf::from("/r/recal_indel");

        let plan = VariantRecalibrate {
            kind: VariantKind::Indel,
        }
        .plan(&request(&resources, &tools, &key, &inputs, &dir))
        .unwrap();

        let train = &plan[0].argv;
        assert!(train.contains(&"/ref/mills.vcf".to_string()));
        assert!(!train.contains(&"/ref/omni.vcf".to_string()));
        assert!(plan[1].argv.contains(&"INDEL".to_string()));
    }

    #[test]
    fn test_combine_variants_requires_both_halves() {
        let resources = bundle();
        let tools = ToolPaths::default();
        let key = RunKey::new("s1");
        let only_snp = inputs(
            "combine",
            &key,
            &[(channels::FILTERED_SNP, "/r/s1_filtered_snp.vcf")],
        );
        let dir = PathBuf::from("/r/combine");

        let err = CombineVariants
            .plan(&request(&resources, &tools, &key, &only_snp, &dir))
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::MissingUpstreamArtifact { .. }
        ));
    }

    #[test]
    fn test_variant_eval_targets_kit_intervals() {
        let resources = bundle();
        let tools = ToolPaths::default();
        let key = RunKey::new("s1");
        let inputs = inputs(
            "evaluate",
            &key,
            &[(channels::COMBINED, "/r/combine/s1_combined.vcf")],
        );
        let dir = PathBuf::from("/r/evaluate");

        let plan = VariantEval
            .plan(&request(&resources, &tools, &key, &inputs, &dir))
            .unwrap();

        let argv = &plan[0].argv;
        assert!(argv.contains(&"-L".to_string()));
        assert!(argv.contains(&"/kit/targets.interval_list".to_string()));
        assert!(argv.contains(&"/ref/dbsnp.vcf".to_string()));
    }
}
