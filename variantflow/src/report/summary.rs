//! Consolidated run summary.

use super::VersionMap;
use crate::context::PipelineContext;
use crate::errors::PipelineError;
use crate::pipeline::PipelineRunResult;
use crate::stages::channels;
use std::fmt::Write as _;
use std::path::PathBuf;

/// Paths of the written summary artifacts.
#[derive(Debug, Clone)]
pub struct SummaryPaths {
    /// Human-readable run report.
    pub report: PathBuf,
    /// Machine-readable version map.
    pub versions: PathBuf,
}

/// Writes the consolidated run report and the version summary under
/// `<out_dir>/summary/`.
///
/// The report lists every stage instance of every key with its status
/// and duration, the detected tool versions, and the evaluation report
/// of each completed key.
///
/// # Errors
///
/// Returns an IO error if the summary directory cannot be written.
pub fn write_summary(
    ctx: &PipelineContext,
    stage_order: &[String],
    result: &PipelineRunResult,
    versions: &VersionMap,
) -> Result<SummaryPaths, PipelineError> {
    let summary_dir = ctx.out_dir().join("summary");
    std::fs::create_dir_all(&summary_dir)?;

    let mut report = String::new();
    let failed = result.keys.iter().filter(|k| !k.is_success()).count();

    let _ = writeln!(report, "variantflow run summary");
    let _ = writeln!(report, "generated: {}", chrono::Utc::now().to_rfc3339());
    let _ = writeln!(report, "genome: {}", ctx.resources().genome);
    if let Some(kit) = &ctx.resources().kit {
        let _ = writeln!(report, "kit: {kit}");
    }
    let _ = writeln!(
        report,
        "keys: {} ({} failed)",
        result.keys.len(),
        failed
    );

    for key_result in &result.keys {
        let _ = writeln!(report, "\n== {} ==", key_result.key);
        for stage in stage_order {
            if let Some(output) = key_result.outputs.get(stage) {
                let _ = writeln!(
                    report,
                    "  {stage:<12} {:<6} {:>9.1} ms",
                    output.status.to_string(),
                    output.duration_ms
                );
            }
        }
        for stage in &key_result.unscheduled {
            let _ = writeln!(report, "  {stage:<12} not run");
        }
        if let Some(error) = &key_result.error {
            let _ = writeln!(report, "  error: {error}");
        }
    }

    let _ = writeln!(report, "\n== program versions ==");
    for (tool, version) in versions.iter() {
        let _ = writeln!(report, "  {tool}: {version}");
    }

    for key_result in &result.keys {
        let Some(eval) = ctx.artifacts.get(&key_result.key, channels::EVAL_REPORT) else {
            continue;
        };
        if let Ok(contents) = std::fs::read_to_string(&eval.path) {
            let _ = writeln!(report, "\n== evaluation: {} ==", key_result.key);
            report.push_str(&contents);
        }
    }

    let report_path = summary_dir.join("pipeline_summary.txt");
    std::fs::write(&report_path, &report)?;

    let versions_path = summary_dir.join("program_versions.json");
    std::fs::write(&versions_path, serde_json::to_string_pretty(versions)?)?;

    Ok(SummaryPaths {
        report: report_path,
        versions: versions_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RunKey;
    use crate::core::{StageArtifact, StageOutput};
    use crate::pipeline::KeyRunResult;
    use crate::report::probe_versions;
    use crate::resources::ResourceBundle;
    use std::collections::HashMap;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn bundle() -> ResourceBundle {
        ResourceBundle {
            genome: "GRCh37".to_string(),
            kit: Some("sureselect_v5".to_string()),
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
    fn test_write_summary() {
        let root = TempDir::new().unwrap();
        let ctx = PipelineContext::new(bundle(), root.path());

        // A completed evaluation artifact for patient1.
        let eval_dir = root.path().join("evaluate");
        std::fs::create_dir_all(&eval_dir).unwrap();
        let eval_path = eval_dir.join("patient1_eval.txt");
        std::fs::write(&eval_path, "nVariants: 3\nnovel: 1\n").unwrap();
        ctx.artifacts
            .publish(StageArtifact::new(
                channels::EVAL_REPORT,
                RunKey::new("patient1"),
                eval_path,
                "evaluate",
            ))
            .unwrap();

        let mut outputs = HashMap::new();
        outputs.insert(
            "genotype".to_string(),
            StageOutput::ok(Vec::new()).with_duration_ms(42.0),
        );
        let result = PipelineRunResult {
            keys: vec![KeyRunResult {
                key: RunKey::new("patient1"),
                outputs,
                error: None,
                unscheduled: Vec::new(),
                duration_ms: 42.0,
            }],
            duration_ms: 42.0,
        };

        let versions = probe_versions(root.path());
        let order = vec!["genotype".to_string()];
        let paths = write_summary(&ctx, &order, &result, &versions).unwrap();

        let report = std::fs::read_to_string(&paths.report).unwrap();
        assert!(report.contains("genome: GRCh37"));
        assert!(report.contains("kit: sureselect_v5"));
        assert!(report.contains("== patient1 =="));
        assert!(report.contains("genotype"));
        assert!(report.contains("nVariants: 3"));
        assert!(report.contains("gatk: N/A"));

        let versions_json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&paths.versions).unwrap()).unwrap();
        assert_eq!(versions_json["snpeff"], "N/A");
    }

    #[test]
    fn test_summary_reports_failed_key() {
        let root = TempDir::new().unwrap();
        let ctx = PipelineContext::new(bundle(), root.path());

        let mut outputs = HashMap::new();
        outputs.insert(
            "recal_snp".to_string(),
            StageOutput::fail("exit code 3"),
        );
        let result = PipelineRunResult {
            keys: vec![KeyRunResult {
                key: RunKey::new("sampleA"),
                outputs,
                error: Some("exit code 3".to_string()),
                unscheduled: vec!["combine".to_string()],
                duration_ms: 1.0,
            }],
            duration_ms: 1.0,
        };

        let versions = VersionMap::default();
        let order: Vec<String> = vec!["recal_snp".to_string(), "combine".to_string()];
        let paths = write_summary(&ctx, &order, &result, &versions).unwrap();

        let report = std::fs::read_to_string(&paths.report).unwrap();
        assert!(report.contains("keys: 1 (1 failed)"));
        assert!(report.contains("error: exit code 3"));
        assert!(report.contains("combine"));
        assert!(report.contains("not run"));
    }
}
