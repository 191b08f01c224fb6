//! Command-line interface.

use crate::context::RunKey;
use crate::resources::Overrides;
use clap::Parser;
use std::path::PathBuf;
use tracing::error;

/// Joint genotyping, recalibration, and annotation of variant calls.
#[derive(Parser, Debug, Clone)]
#[command(name = "variantflow")]
#[command(about = "Chain genotyping, recalibration, and annotation tools over per-sample variant calls")]
#[command(version)]
pub struct Args {
    /// Raw per-sample variant call files; each file becomes one run key
    #[arg(short, long, required = true, num_args = 1.., help_heading = "I/O")]
    pub reads: Vec<PathBuf>,

    /// Genome identifier to resolve reference resources for
    #[arg(short, long, help_heading = "I/O")]
    pub genome: String,

    /// Capture kit identifier
    #[arg(short, long, help_heading = "I/O")]
    pub kit: Option<String>,

    /// Resource table configuration file (JSON)
    #[arg(short, long, help_heading = "I/O")]
    pub config: Option<PathBuf>,

    /// Results directory
    #[arg(short, long, default_value = "results", help_heading = "I/O")]
    pub out_dir: PathBuf,

    /// Reference fasta
    #[arg(long, help_heading = "Resource overrides")]
    pub gfasta: Option<PathBuf>,

    /// BWA index prefix
    #[arg(long, help_heading = "Resource overrides")]
    pub bwa_index: Option<PathBuf>,

    /// dbSNP known variants
    #[arg(long, help_heading = "Resource overrides")]
    pub dbsnp: Option<PathBuf>,

    /// 1000 Genomes known variants
    #[arg(long, help_heading = "Resource overrides")]
    pub thousandg: Option<PathBuf>,

    /// Mills gold-standard indels
    #[arg(long, help_heading = "Resource overrides")]
    pub mills: Option<PathBuf>,

    /// Omni SNP resource
    #[arg(long, help_heading = "Resource overrides")]
    pub omni: Option<PathBuf>,

    /// Capture bait intervals
    #[arg(long, help_heading = "Resource overrides")]
    pub bait: Option<PathBuf>,

    /// Capture target intervals
    #[arg(long, help_heading = "Resource overrides")]
    pub target: Option<PathBuf>,

    /// Target regions in BED form
    #[arg(long, help_heading = "Resource overrides")]
    pub target_bed: Option<PathBuf>,

    /// Global core budget for concurrently running tools
    #[arg(long, help_heading = "Execution")]
    pub cores: Option<u32>,

    /// Keep intermediate artifacts after each key completes
    #[arg(long, default_value_t = false, help_heading = "Execution")]
    pub keep_intermediates: bool,

    /// Verbose logging
    #[arg(long, default_value_t = false)]
    pub debug: bool,
}

impl Args {
    /// The explicit resource overrides supplied on the command line.
    #[must_use]
    pub fn overrides(&self) -> Overrides {
        Overrides {
            gfasta: self.gfasta.clone(),
            bwa_index: self.bwa_index.clone(),
            dbsnp: self.dbsnp.clone(),
            thousandg: self.thousandg.clone(),
            mills: self.mills.clone(),
            omni: self.omni.clone(),
            bait: self.bait.clone(),
            target: self.target.clone(),
            target_bed: self.target_bed.clone(),
        }
    }

    /// Run keys derived from the input file stems, paired with their
    /// files.
    #[must_use]
    pub fn run_keys(&self) -> Vec<(RunKey, PathBuf)> {
        self.reads
            .iter()
            .map(|path| (RunKey::from_path(path), path.clone()))
            .collect()
    }

    /// Pre-execution validation of the invocation. Logs every problem
    /// and returns false if any was found.
    #[must_use]
    pub fn validate(&self) -> bool {
        let mut is_ok = true;

        for path in &self.reads {
            if !path.is_file() {
                error!("--reads file does not exist: {}", path.display());
                is_ok = false;
            }
        }

        let keys = self.run_keys();
        for (i, (key, path)) in keys.iter().enumerate() {
            if keys[..i].iter().any(|(other, _)| other == key) {
                error!(
                    "duplicate run key '{key}' from {}; rename the input file",
                    path.display()
                );
                is_ok = false;
            }
        }

        if let Some(config) = &self.config {
            if !config.is_file() {
                error!("--config file does not exist: {}", config.display());
                is_ok = false;
            }
        }

        is_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_minimal_invocation() {
        let args = parse(&[
            "variantflow",
            "--reads",
            "patient1.vcf",
            "--genome",
            "GRCh37",
        ]);

        assert_eq!(args.genome, "GRCh37");
        assert_eq!(args.reads.len(), 1);
        assert_eq!(args.out_dir, PathBuf::from("results"));
        assert!(!args.keep_intermediates);
    }

    #[test]
    fn test_missing_required_fails() {
        assert!(Args::try_parse_from(["variantflow", "--genome", "GRCh37"]).is_err());
        assert!(Args::try_parse_from(["variantflow", "--reads", "a.vcf"]).is_err());
    }

    #[test]
    fn test_multiple_reads_derive_keys() {
        let args = parse(&[
            "variantflow",
            "--reads",
            "/data/patient1.g.vcf",
            "/data/patient2.g.vcf",
            "--genome",
            "GRCh37",
        ]);

        let keys = args.run_keys();
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0].0.as_str(), "patient1");
        assert_eq!(keys[1].0.as_str(), "patient2");
    }

    #[test]
    fn test_overrides_mapping() {
        let args = parse(&[
            "variantflow",
            "--reads",
            "a.vcf",
            "--genome",
            "hg_custom",
            "--dbsnp",
            "/custom/dbsnp.vcf",
            "--bait",
            "/custom/baits",
        ]);

        let overrides = args.overrides();
        assert_eq!(overrides.dbsnp, Some(PathBuf::from("/custom/dbsnp.vcf")));
        assert_eq!(overrides.bait, Some(PathBuf::from("/custom/baits")));
        assert_eq!(overrides.omni, None);
    }
}
