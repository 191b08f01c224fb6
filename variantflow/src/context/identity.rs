//! Run keys.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Identifier correlating all artifacts belonging to one sample/run.
///
/// Assigned once at pipeline entry and threaded explicitly through every
/// stage input and output record; stages never read it from ambient state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunKey(String);

impl RunKey {
    /// Creates a run key from a name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Derives a run key from an input file, stripping the variant-call
    /// extensions (`.vcf`, `.g.vcf`, optionally `.gz`).
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();

        let mut stem = name;
        for ext in [".gz", ".vcf", ".g"] {
            if let Some(s) = stem.strip_suffix(ext) {
                stem = s;
            }
        }

        Self(stem.to_string())
    }

    /// The key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
