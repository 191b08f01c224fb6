//! Stage output type with factory methods.

use super::{StageArtifact, StageStatus};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The result of one stage instance.
///
/// `StageOutput` is immutable once created. On success it carries the
/// artifacts published on the stage's declared output channels, keyed by
/// the instance's run key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageOutput {
    /// The status of the instance.
    pub status: StageStatus,

    /// Artifacts bound to the stage's output channels.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<StageArtifact>,

    /// Error message (for failed instances).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Skip reason (for skipped instances).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,

    /// Path of the captured tool stdout/stderr log, if one was written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log: Option<PathBuf>,

    /// Wall-clock duration of the instance in milliseconds.
    #[serde(default)]
    pub duration_ms: f64,
}

impl StageOutput {
    /// Creates a successful output with published artifacts.
    #[must_use]
    pub fn ok(artifacts: Vec<StageArtifact>) -> Self {
        Self {
            status: StageStatus::Ok,
            artifacts,
            error: None,
            skip_reason: None,
            log: None,
            duration_ms: 0.0,
        }
    }

    /// Creates a skip output; existing artifacts are re-published so that
    /// downstream stages can still bind them.
    #[must_use]
    pub fn skip(reason: impl Into<String>, artifacts: Vec<StageArtifact>) -> Self {
        Self {
            status: StageStatus::Skip,
            artifacts,
            error: None,
            skip_reason: Some(reason.into()),
            log: None,
            duration_ms: 0.0,
        }
    }

    /// Creates a failure output with an error message.
    #[must_use]
    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            status: StageStatus::Fail,
            artifacts: Vec::new(),
            error: Some(error.into()),
            skip_reason: None,
            log: None,
            duration_ms: 0.0,
        }
    }

    /// Creates a cancel output.
    #[must_use]
    pub fn cancel(reason: impl Into<String>) -> Self {
        Self {
            status: StageStatus::Cancel,
            artifacts: Vec::new(),
            error: Some(reason.into()),
            skip_reason: None,
            log: None,
            duration_ms: 0.0,
        }
    }

    /// Attaches the tool log path.
    #[must_use]
    pub fn with_log(mut self, log: impl Into<PathBuf>) -> Self {
        self.log = Some(log.into());
        self
    }

    /// Sets the instance duration.
    #[must_use]
    pub fn with_duration_ms(mut self, duration_ms: f64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    /// Returns true if the output indicates success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Returns true if the output indicates failure.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.status.is_failure()
    }

    /// Returns the artifact published on a channel, if any.
    #[must_use]
    pub fn artifact(&self, channel: &str) -> Option<&StageArtifact> {
        self.artifacts.iter().find(|a| a.channel == channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RunKey;

    fn artifact(channel: &str) -> StageArtifact {
        StageArtifact::new(channel, RunKey::new("s1"), "/tmp/f.vcf", "stage")
    }

    #[test]
    fn test_ok_output() {
        let output = StageOutput::ok(vec![artifact("gvcf")]);
        assert_eq!(output.status, StageStatus::Ok);
        assert!(output.is_success());
        assert!(output.artifact("gvcf").is_some());
        assert!(output.artifact("combined").is_none());
    }

    #[test]
    fn test_skip_output_keeps_artifacts() {
        let output = StageOutput::skip("outputs up to date", vec![artifact("gvcf")]);
        assert_eq!(output.status, StageStatus::Skip);
        assert!(output.is_success());
        assert_eq!(output.artifacts.len(), 1);
        assert_eq!(output.skip_reason.as_deref(), Some("outputs up to date"));
    }

    #[test]
    fn test_fail_output() {
        let output = StageOutput::fail("exit code 2").with_log("/tmp/s1.log");
        assert!(output.is_failure());
        assert_eq!(output.error.as_deref(), Some("exit code 2"));
        assert_eq!(output.log, Some(PathBuf::from("/tmp/s1.log")));
    }

    #[test]
    fn test_serialization_round_trip() {
        let output = StageOutput::ok(vec![artifact("combined")]).with_duration_ms(12.5);
        let json = serde_json::to_string(&output).unwrap();
        let back: StageOutput = serde_json::from_str(&json).unwrap();

        assert_eq!(back.status, StageStatus::Ok);
        assert_eq!(back.artifacts.len(), 1);
    }
}
