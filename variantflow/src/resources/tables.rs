//! Configuration tables for kits, genomes, and tool executables.

use super::ToolPaths;
use crate::errors::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// One capture-kit entry in the kit table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KitEntry {
    /// Bait intervals file.
    pub bait: PathBuf,
    /// Target intervals file.
    pub target: PathBuf,
    /// Target regions in BED form, if the kit ships one.
    #[serde(default)]
    pub target_bed: Option<PathBuf>,
}

/// One genome entry in the genome table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenomeEntry {
    /// Reference fasta.
    pub gfasta: PathBuf,
    /// BWA index prefix.
    pub bwa_index: PathBuf,
    /// dbSNP known variants.
    pub dbsnp: PathBuf,
    /// 1000 Genomes known variants.
    pub thousandg: PathBuf,
    /// Mills gold-standard indels.
    pub mills: PathBuf,
    /// Omni SNP resource.
    pub omni: PathBuf,
}

/// The lookup tables the resolver consults, loaded from a JSON file.
///
/// With no configuration file both tables are empty and the full bundle
/// must come from explicit per-file overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceTables {
    /// Kit name -> interval files.
    #[serde(default)]
    pub kits: HashMap<String, KitEntry>,

    /// Genome name -> reference/resource files.
    #[serde(default)]
    pub genomes: HashMap<String, GenomeEntry>,

    /// External tool executables.
    #[serde(default)]
    pub tools: ToolPaths,
}

impl ResourceTables {
    /// Loads tables from a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::UnreadableConfig`] if the file cannot
    /// be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigurationError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ConfigurationError::UnreadableConfig {
                path: path.to_path_buf(),
                message: e.to_string(),
            }
        })?;

        serde_json::from_str(&raw).map_err(|e| ConfigurationError::UnreadableConfig {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}
