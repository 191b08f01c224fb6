//! Write-once artifact store.

use super::RunKey;
use crate::core::StageArtifact;
use crate::errors::PipelineError;
use parking_lot::RwLock;
use std::collections::HashMap;

/// The channel store stage instances publish artifacts into.
///
/// Entries are keyed by (run key, channel name) and are write-once:
/// publishing to an already-bound pair is an [`PipelineError::OutputConflict`].
/// All inter-stage communication goes through this store; there is no
/// other shared mutable state between instances.
#[derive(Debug, Default)]
pub struct ArtifactStore {
    inner: RwLock<HashMap<(RunKey, String), StageArtifact>>,
}

impl ArtifactStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes an artifact on its channel.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::OutputConflict`] if the (key, channel)
    /// pair is already bound.
    pub fn publish(&self, artifact: StageArtifact) -> Result<(), PipelineError> {
        let slot = (artifact.key.clone(), artifact.channel.clone());
        let mut inner = self.inner.write();

        if inner.contains_key(&slot) {
            return Err(PipelineError::OutputConflict {
                key: slot.0,
                channel: slot.1,
            });
        }

        inner.insert(slot, artifact);
        Ok(())
    }

    /// Returns the artifact bound to a (key, channel) pair, if any.
    #[must_use]
    pub fn get(&self, key: &RunKey, channel: &str) -> Option<StageArtifact> {
        self.inner
            .read()
            .get(&(key.clone(), channel.to_string()))
            .cloned()
    }

    /// Returns all artifacts published for one run key.
    #[must_use]
    pub fn for_key(&self, key: &RunKey) -> Vec<StageArtifact> {
        let mut artifacts: Vec<StageArtifact> = self
            .inner
            .read()
            .values()
            .filter(|a| &a.key == key)
            .cloned()
            .collect();
        artifacts.sort_by(|a, b| a.channel.cmp(&b.channel));
        artifacts
    }

    /// Number of published artifacts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Returns true if nothing has been published.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact(key: &str, channel: &str) -> StageArtifact {
        StageArtifact::new(channel, RunKey::new(key), "/tmp/x.vcf", "stage")
    }

    #[test]
    fn test_publish_and_get() {
        let store = ArtifactStore::new();
        store.publish(artifact("s1", "gvcf")).unwrap();

        assert!(store.get(&RunKey::new("s1"), "gvcf").is_some());
        assert!(store.get(&RunKey::new("s2"), "gvcf").is_none());
        assert!(store.get(&RunKey::new("s1"), "combined").is_none());
    }

    #[test]
    fn test_write_once() {
        let store = ArtifactStore::new();
        store.publish(artifact("s1", "gvcf")).unwrap();

        let err = store.publish(artifact("s1", "gvcf")).unwrap_err();
        assert!(matches!(err, PipelineError::OutputConflict { .. }));
    }

    #[test]
    fn test_same_channel_different_keys() {
        let store = ArtifactStore::new();
        store.publish(artifact("s1", "gvcf")).unwrap();
        store.publish(artifact("s2", "gvcf")).unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.for_key(&RunKey::new("s1")).len(), 1);
    }
}
