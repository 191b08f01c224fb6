//! File artifacts produced by stage instances.

use crate::context::RunKey;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A file artifact published on a named output channel.
///
/// Artifacts are write-once: once a stage instance publishes an artifact
/// for a (key, channel) pair it is never mutated, only consumed by the
/// stages declared downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageArtifact {
    /// The output channel this artifact is bound to (e.g. "gvcf").
    pub channel: String,

    /// The run key the artifact belongs to.
    pub key: RunKey,

    /// Path of the produced file.
    pub path: PathBuf,

    /// Name of the stage that produced the artifact.
    pub produced_by: String,

    /// When the artifact was published (RFC 3339).
    pub created_at: String,
}

impl StageArtifact {
    /// Creates a new stage artifact.
    #[must_use]
    pub fn new(
        channel: impl Into<String>,
        key: RunKey,
        path: impl Into<PathBuf>,
        produced_by: impl Into<String>,
    ) -> Self {
        Self {
            channel: channel.into(),
            key,
            path: path.into(),
            produced_by: produced_by.into(),
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// The artifact's file name, if the path has one.
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|n| n.to_str())
    }
}

/// Declaration of one input channel of a stage.
///
/// `from_stage` names the producer; the builder validates that the
/// producer exists and actually declares the channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputSlot {
    /// The channel name to bind.
    pub channel: String,

    /// The stage that publishes the channel.
    pub from_stage: String,
}

impl InputSlot {
    /// Creates a new input slot.
    #[must_use]
    pub fn new(channel: impl Into<String>, from_stage: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            from_stage: from_stage.into(),
        }
    }
}

/// Declaration of one output channel of a stage.
///
/// The `pattern` is a file-name pattern relative to the stage's working
/// directory. `{key}` is substituted with the run key; a `*` matches any
/// run of characters. After the tool exits, the pattern must match at
/// least one file or the stage instance fails.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSlot {
    /// The channel name downstream stages consume by.
    pub channel: String,

    /// File-name pattern relative to the stage directory.
    pub pattern: String,

    /// Whether the file is an intermediate, eligible for cleanup once the
    /// key's chain has completed.
    pub intermediate: bool,
}

impl OutputSlot {
    /// Creates a final (retained) output slot.
    #[must_use]
    pub fn new(channel: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            pattern: pattern.into(),
            intermediate: false,
        }
    }

    /// Creates an intermediate output slot.
    #[must_use]
    pub fn intermediate(channel: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            pattern: pattern.into(),
            intermediate: true,
        }
    }

    /// Resolves the pattern for a run key.
    #[must_use]
    pub fn resolve(&self, key: &RunKey) -> String {
        self.pattern.replace("{key}", key.as_str())
    }

    /// Finds files in `dir` whose names match the resolved pattern.
    ///
    /// # Errors
    ///
    /// Returns the underlying IO error if `dir` cannot be read.
    pub fn matches(&self, dir: &Path, key: &RunKey) -> std::io::Result<Vec<PathBuf>> {
        let resolved = self.resolve(key);
        if !resolved.contains('*') {
            let candidate = dir.join(&resolved);
            return Ok(if candidate.is_file() {
                vec![candidate]
            } else {
                Vec::new()
            });
        }

        let mut found: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| {
                p.is_file()
                    && p.file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|name| glob_match(&resolved, name))
            })
            .collect();
        found.sort();
        Ok(found)
    }
}

/// Matches a file name against a pattern where `*` matches any substring.
fn glob_match(pattern: &str, name: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == name;
    }

    let mut rest = name;

    let first = parts[0];
    if !first.is_empty() {
        match rest.strip_prefix(first) {
            Some(r) => rest = r,
            None => return false,
        }
    }

    let last = parts[parts.len() - 1];
    if !last.is_empty() {
        match rest.strip_suffix(last) {
            Some(r) => rest = r,
            None => return false,
        }
    }

    for part in &parts[1..parts.len() - 1] {
        if part.is_empty() {
            continue;
        }
        match rest.find(part) {
            Some(pos) => rest = &rest[pos + part.len()..],
            None => return false,
        }
    }

    true
}
