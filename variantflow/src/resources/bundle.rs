//! The resolved resource bundle handed to every stage.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The fully resolved set of reference/resource file paths for one run.
///
/// Resolved once at startup and read-only thereafter. Paths are passed to
/// external tools verbatim; they are never re-interpreted or reformatted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceBundle {
    /// The logical genome name the bundle was resolved for.
    pub genome: String,

    /// The logical kit name, if one was given.
    pub kit: Option<String>,

    /// Reference genome fasta.
    pub gfasta: PathBuf,

    /// BWA index prefix for the reference.
    pub bwa_index: PathBuf,

    /// dbSNP known-variants file.
    pub dbsnp: PathBuf,

    /// 1000 Genomes known-variants file.
    pub thousandg: PathBuf,

    /// Mills gold-standard indels file.
    pub mills: PathBuf,

    /// Omni SNP resource file.
    pub omni: PathBuf,

    /// Capture-kit bait intervals.
    pub bait: PathBuf,

    /// Capture-kit target intervals.
    pub target: PathBuf,

    /// Target regions in BED form, when the kit ships one.
    pub target_bed: Option<PathBuf>,
}

impl ResourceBundle {
    /// Path of a bundle field by its parameter name, as accepted on the
    /// command line.
    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<&PathBuf> {
        match name {
            "gfasta" => Some(&self.gfasta),
            "bwa_index" => Some(&self.bwa_index),
            "dbsnp" => Some(&self.dbsnp),
            "thousandg" => Some(&self.thousandg),
            "mills" => Some(&self.mills),
            "omni" => Some(&self.omni),
            "bait" => Some(&self.bait),
            "target" => Some(&self.target),
            "target_bed" => self.target_bed.as_ref(),
            _ => None,
        }
    }
}

/// Executable names (or paths) of the wrapped external tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolPaths {
    /// The GATK driver executable.
    #[serde(default = "default_gatk")]
    pub gatk: String,

    /// The SnpEff driver executable.
    #[serde(default = "default_snpeff")]
    pub snpeff: String,
}

fn default_gatk() -> String {
    "gatk".to_string()
}

fn default_snpeff() -> String {
    "snpEff".to_string()
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            gatk: default_gatk(),
            snpeff: default_snpeff(),
        }
    }
}
