//! Tool version probing from stage logs.
//!
//! External tools print version banners into their stdout/stderr, which
//! the executor preserves in the per-instance logs. The probe scans those
//! logs after the run; a tool whose banner is absent or unparseable
//! degrades to "N/A" and never fails the run.

use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Marker for "no version detected".
pub const UNKNOWN_VERSION: &str = "N/A";

/// A log scrape found no version string for a tool. Non-fatal; the
/// caller degrades the field to [`UNKNOWN_VERSION`].
#[derive(Debug, Clone, Error)]
#[error("no version string for '{tool}' found in stage logs")]
pub struct VersionProbeFailure {
    /// The tool that could not be probed.
    pub tool: String,
}

/// Mapping from tool name to detected version string (or "N/A").
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct VersionMap {
    versions: BTreeMap<String, String>,
}

impl VersionMap {
    /// The detected version for a tool, or [`UNKNOWN_VERSION`].
    #[must_use]
    pub fn get(&self, tool: &str) -> &str {
        self.versions.get(tool).map_or(UNKNOWN_VERSION, String::as_str)
    }

    /// Iterates over (tool, version) pairs in tool order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.versions.iter()
    }
}

// The patterns are fixed literals; compilation cannot fail.
#[allow(clippy::unwrap_used)]
fn probe_patterns() -> Vec<(&'static str, Regex)> {
    vec![
        (
            "gatk",
            Regex::new(r"Genome Analysis Toolkit \(GATK\)[,]?\s+v?([0-9][\w.\-]*)").unwrap(),
        ),
        (
            "snpeff",
            Regex::new(r"SnpEff\s+(?:version\s+)?([0-9][\w.]*)").unwrap(),
        ),
    ]
}

/// Scans every per-instance log under the results directory and builds
/// the version map for all known tools.
#[must_use]
pub fn probe_versions(out_dir: &Path) -> VersionMap {
    let logs = collect_logs(out_dir);
    let mut versions = BTreeMap::new();

    for (tool, pattern) in probe_patterns() {
        match probe_tool(tool, &pattern, &logs) {
            Ok(version) => {
                versions.insert(tool.to_string(), version);
            }
            Err(failure) => {
                debug!("{failure}; reporting {UNKNOWN_VERSION}");
                versions.insert(tool.to_string(), UNKNOWN_VERSION.to_string());
            }
        }
    }

    VersionMap { versions }
}

fn probe_tool(
    tool: &str,
    pattern: &Regex,
    logs: &[String],
) -> Result<String, VersionProbeFailure> {
    logs.iter()
        .find_map(|log| pattern.captures(log))
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| VersionProbeFailure {
            tool: tool.to_string(),
        })
}

/// Reads the contents of every `*.log` file one level below the results
/// root (one directory per logical stage). Unreadable files are skipped.
fn collect_logs(out_dir: &Path) -> Vec<String> {
    let Ok(stage_dirs) = std::fs::read_dir(out_dir) else {
        return Vec::new();
    };

    let mut logs = Vec::new();
    for stage_dir in stage_dirs.filter_map(Result::ok) {
        let Ok(entries) = std::fs::read_dir(stage_dir.path()) else {
            continue;
        };
        for entry in entries.filter_map(Result::ok) {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("log") {
                if let Ok(contents) = std::fs::read_to_string(&path) {
                    logs.push(contents);
                }
            }
        }
    }
    logs
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn write_log(root: &Path, stage: &str, key: &str, contents: &str) {
        let dir = root.join(stage);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(format!("{key}.log")), contents).unwrap();
    }

    #[test]
    fn test_probe_detects_gatk_and_snpeff() {
        let root = TempDir::new().unwrap();
        write_log(
            root.path(),
            "genotype",
            "s1",
            "INFO  The Genome Analysis Toolkit (GATK) v3.8-1-0, Compiled 2018\n",
        );
        write_log(root.path(), "snpeff", "s1", "SnpEff version 4.3t (build X)\n");

        let versions = probe_versions(root.path());
        assert_eq!(versions.get("gatk"), "3.8-1-0");
        assert_eq!(versions.get("snpeff"), "4.3t");
    }

    #[test]
    fn test_probe_degrades_to_unknown() {
        let root = TempDir::new().unwrap();
        write_log(root.path(), "genotype", "s1", "no banner here\n");

        let versions = probe_versions(root.path());
        assert_eq!(versions.get("gatk"), UNKNOWN_VERSION);
        assert_eq!(versions.get("snpeff"), UNKNOWN_VERSION);
    }

    #[test]
    fn test_probe_empty_results_dir() {
        let versions = probe_versions(Path::new("/nonexistent/results"));
        assert_eq!(versions.get("gatk"), UNKNOWN_VERSION);
    }

    #[test]
    fn test_version_map_serializes_flat() {
        let root = TempDir::new().unwrap();
        write_log(
            root.path(),
            "genotype",
            "s1",
            "The Genome Analysis Toolkit (GATK) v3.8-1-0\n",
        );

        let versions = probe_versions(root.path());
        let json = serde_json::to_value(&versions).unwrap();
        assert_eq!(json["gatk"], "3.8-1-0");
        assert_eq!(json["snpeff"], "N/A");
    }
}
