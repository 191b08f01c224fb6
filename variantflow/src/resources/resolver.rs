//! Bundle resolution from tables plus explicit overrides.

use super::{ResourceBundle, ResourceTables};
use crate::errors::ConfigurationError;
use std::path::PathBuf;

/// Explicitly supplied per-file path overrides.
///
/// An override always takes precedence over the corresponding table value.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    /// Reference fasta override.
    pub gfasta: Option<PathBuf>,
    /// BWA index override.
    pub bwa_index: Option<PathBuf>,
    /// dbSNP override.
    pub dbsnp: Option<PathBuf>,
    /// 1000 Genomes override.
    pub thousandg: Option<PathBuf>,
    /// Mills indels override.
    pub mills: Option<PathBuf>,
    /// Omni override.
    pub omni: Option<PathBuf>,
    /// Bait intervals override.
    pub bait: Option<PathBuf>,
    /// Target intervals override.
    pub target: Option<PathBuf>,
    /// Target BED override.
    pub target_bed: Option<PathBuf>,
}

/// Resolves the full resource bundle for a genome/kit pair.
///
/// Table lookups fill in whatever the overrides leave unset. An unknown
/// kit requires explicit `bait` and `target`; an unknown genome requires
/// all six genome paths. The error names exactly the parameters that are
/// still missing.
///
/// # Errors
///
/// Returns [`ConfigurationError`] if the bundle cannot be completed.
pub fn resolve_bundle(
    tables: &ResourceTables,
    genome: &str,
    kit: Option<&str>,
    overrides: &Overrides,
) -> Result<ResourceBundle, ConfigurationError> {
    let kit_entry = kit.and_then(|k| tables.kits.get(k));

    let bait = overrides
        .bait
        .clone()
        .or_else(|| kit_entry.map(|e| e.bait.clone()));
    let target = overrides
        .target
        .clone()
        .or_else(|| kit_entry.map(|e| e.target.clone()));
    let target_bed = overrides
        .target_bed
        .clone()
        .or_else(|| kit_entry.and_then(|e| e.target_bed.clone()));

    let kit_missing: Vec<String> = [("bait", &bait), ("target", &target)]
        .iter()
        .filter(|(_, v)| v.is_none())
        .map(|(name, _)| (*name).to_string())
        .collect();
    if !kit_missing.is_empty() {
        return Err(ConfigurationError::MissingKitConfig {
            kit: kit.unwrap_or("(none)").to_string(),
            missing: kit_missing,
        });
    }

    let genome_entry = tables.genomes.get(genome);

    let gfasta = overrides
        .gfasta
        .clone()
        .or_else(|| genome_entry.map(|e| e.gfasta.clone()));
    let bwa_index = overrides
        .bwa_index
        .clone()
        .or_else(|| genome_entry.map(|e| e.bwa_index.clone()));
    let dbsnp = overrides
        .dbsnp
        .clone()
        .or_else(|| genome_entry.map(|e| e.dbsnp.clone()));
    let thousandg = overrides
        .thousandg
        .clone()
        .or_else(|| genome_entry.map(|e| e.thousandg.clone()));
    let mills = overrides
        .mills
        .clone()
        .or_else(|| genome_entry.map(|e| e.mills.clone()));
    let omni = overrides
        .omni
        .clone()
        .or_else(|| genome_entry.map(|e| e.omni.clone()));

    let genome_missing: Vec<String> = [
        ("gfasta", &gfasta),
        ("bwa_index", &bwa_index),
        ("dbsnp", &dbsnp),
        ("thousandg", &thousandg),
        ("mills", &mills),
        ("omni", &omni),
    ]
    .iter()
    .filter(|(_, v)| v.is_none())
    .map(|(name, _)| (*name).to_string())
    .collect();
    if !genome_missing.is_empty() {
        return Err(ConfigurationError::MissingGenomeConfig {
            genome: genome.to_string(),
            missing: genome_missing,
        });
    }

    // All fields checked non-empty above.
    Ok(ResourceBundle {
        genome: genome.to_string(),
        kit: kit.map(String::from),
        gfasta: gfasta.unwrap_or_default(),
        bwa_index: bwa_index.unwrap_or_default(),
        dbsnp: dbsnp.unwrap_or_default(),
        thousandg: thousandg.unwrap_or_default(),
        mills: mills.unwrap_or_default(),
        omni: omni.unwrap_or_default(),
        bait: bait.unwrap_or_default(),
        target: target.unwrap_or_default(),
        target_bed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::{GenomeEntry, KitEntry};
    use pretty_assertions::assert_eq;

    fn tables() -> ResourceTables {
        let mut t = ResourceTables::default();
        t.kits.insert(
            "sureselect_v5".to_string(),
            KitEntry {
                bait: PathBuf::from("/kits/baits.interval_list"),
                target: PathBuf::from("/kits/targets.interval_list"),
                target_bed: Some(PathBuf::from("/kits/targets.bed")),
            },
        );
        t.genomes.insert(
            "GRCh37".to_string(),
            GenomeEntry {
                gfasta: PathBuf::from("/ref/seq.fa"),
                bwa_index: PathBuf::from("/ref/bwa"),
                dbsnp: PathBuf::from("/ref/dbsnp.vcf"),
                thousandg: PathBuf::from("/ref/1000g.vcf"),
                mills: PathBuf::from("/ref/mills.vcf"),
                omni: PathBuf::from("/ref/omni.vcf"),
            },
        );
        t
    }

    #[test]
    fn test_known_kit_and_genome_resolve() {
        let bundle = resolve_bundle(
            &tables(),
            "GRCh37",
            Some("sureselect_v5"),
            &Overrides::default(),
        )
        .unwrap();

        assert_eq!(bundle.bait, PathBuf::from("/kits/baits.interval_list"));
        assert_eq!(bundle.target, PathBuf::from("/kits/targets.interval_list"));
        assert_eq!(bundle.dbsnp, PathBuf::from("/ref/dbsnp.vcf"));
        assert_eq!(bundle.target_bed, Some(PathBuf::from("/kits/targets.bed")));
        assert_eq!(bundle.genome, "GRCh37");
    }

    #[test]
    fn test_unknown_kit_requires_bait_and_target() {
        let err = resolve_bundle(
            &tables(),
            "GRCh37",
            Some("mystery_kit"),
            &Overrides::default(),
        )
        .unwrap_err();

        match err {
            ConfigurationError::MissingKitConfig { kit, missing } => {
                assert_eq!(kit, "mystery_kit");
                assert_eq!(missing, vec!["bait".to_string(), "target".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unknown_kit_with_explicit_paths_resolves() {
        let overrides = Overrides {
            bait: Some(PathBuf::from("/custom/baits")),
            target: Some(PathBuf::from("/custom/targets")),
            ..Overrides::default()
        };

        let bundle = resolve_bundle(&tables(), "GRCh37", Some("mystery_kit"), &overrides).unwrap();
        assert_eq!(bundle.bait, PathBuf::from("/custom/baits"));
        assert_eq!(bundle.target_bed, None);
    }

    #[test]
    fn test_unknown_genome_lists_all_missing() {
        let overrides = Overrides {
            bait: Some(PathBuf::from("/b")),
            target: Some(PathBuf::from("/t")),
            dbsnp: Some(PathBuf::from("/custom/dbsnp.vcf")),
            ..Overrides::default()
        };

        let err = resolve_bundle(&tables(), "hg_custom", None, &overrides).unwrap_err();
        match err {
            ConfigurationError::MissingGenomeConfig { genome, missing } => {
                assert_eq!(genome, "hg_custom");
                assert_eq!(
                    missing,
                    vec!["gfasta", "bwa_index", "thousandg", "mills", "omni"]
                        .into_iter()
                        .map(String::from)
                        .collect::<Vec<_>>()
                );
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unknown_genome_fully_overridden_resolves() {
        let overrides = Overrides {
            gfasta: Some(PathBuf::from("/c/seq.fa")),
            bwa_index: Some(PathBuf::from("/c/bwa")),
            dbsnp: Some(PathBuf::from("/c/dbsnp.vcf")),
            thousandg: Some(PathBuf::from("/c/1000g.vcf")),
            mills: Some(PathBuf::from("/c/mills.vcf")),
            omni: Some(PathBuf::from("/c/omni.vcf")),
            bait: Some(PathBuf::from("/c/baits")),
            target: Some(PathBuf::from("/c/targets")),
            target_bed: None,
        };

        let bundle = resolve_bundle(&tables(), "hg_custom", None, &overrides).unwrap();
        assert_eq!(bundle.genome, "hg_custom");
        assert_eq!(bundle.kit, None);
    }

    #[test]
    fn test_override_beats_table() {
        let overrides = Overrides {
            dbsnp: Some(PathBuf::from("/newer/dbsnp.vcf")),
            ..Overrides::default()
        };

        let bundle =
            resolve_bundle(&tables(), "GRCh37", Some("sureselect_v5"), &overrides).unwrap();
        assert_eq!(bundle.dbsnp, PathBuf::from("/newer/dbsnp.vcf"));
        assert_eq!(bundle.omni, PathBuf::from("/ref/omni.vcf"));
    }
}
