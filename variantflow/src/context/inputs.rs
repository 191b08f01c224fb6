//! Key-checked input bindings for stage instances.

use super::{ArtifactStore, RunKey};
use crate::core::{InputSlot, StageArtifact};
use crate::errors::PipelineError;
use std::collections::HashMap;
use std::path::Path;

/// The concrete artifacts bound to a stage instance's input channels.
///
/// Binding happens before the instance is scheduled; every declared
/// channel must be bound and every bound artifact must carry the
/// instance's own run key. Joining sibling branches therefore pairs by
/// key equality, never by position.
#[derive(Debug, Clone)]
pub struct StageInputs {
    stage_name: String,
    key: RunKey,
    bound: HashMap<String, StageArtifact>,
}

impl StageInputs {
    /// Binds the declared input slots of a stage instance from the store.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::MissingUpstreamArtifact`] if a channel is
    /// unbound for the key, or bound to an artifact of a different key.
    pub fn bind(
        stage_name: &str,
        key: &RunKey,
        slots: &[InputSlot],
        store: &ArtifactStore,
    ) -> Result<Self, PipelineError> {
        let mut bound = HashMap::new();

        for slot in slots {
            let artifact = store.get(key, &slot.channel).ok_or_else(|| {
                PipelineError::MissingUpstreamArtifact {
                    stage: stage_name.to_string(),
                    key: key.clone(),
                    channel: slot.channel.clone(),
                }
            })?;

            if &artifact.key != key {
                return Err(PipelineError::MissingUpstreamArtifact {
                    stage: stage_name.to_string(),
                    key: key.clone(),
                    channel: slot.channel.clone(),
                });
            }

            bound.insert(slot.channel.clone(), artifact);
        }

        Ok(Self {
            stage_name: stage_name.to_string(),
            key: key.clone(),
            bound,
        })
    }

    /// Builds inputs directly from artifacts, key-checking each one.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::MissingUpstreamArtifact`] on a key
    /// mismatch.
    pub fn from_artifacts(
        stage_name: &str,
        key: &RunKey,
        artifacts: Vec<StageArtifact>,
    ) -> Result<Self, PipelineError> {
        let mut bound = HashMap::new();
        for artifact in artifacts {
            if &artifact.key != key {
                return Err(PipelineError::MissingUpstreamArtifact {
                    stage: stage_name.to_string(),
                    key: key.clone(),
                    channel: artifact.channel,
                });
            }
            bound.insert(artifact.channel.clone(), artifact);
        }

        Ok(Self {
            stage_name: stage_name.to_string(),
            key: key.clone(),
            bound,
        })
    }

    /// The run key of the instance.
    #[must_use]
    pub fn key(&self) -> &RunKey {
        &self.key
    }

    /// The path bound to a channel.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::MissingUpstreamArtifact`] if the channel
    /// was not declared/bound for this instance.
    pub fn path(&self, channel: &str) -> Result<&Path, PipelineError> {
        self.bound
            .get(channel)
            .map(|a| a.path.as_path())
            .ok_or_else(|| PipelineError::MissingUpstreamArtifact {
                stage: self.stage_name.clone(),
                key: self.key.clone(),
                channel: channel.to_string(),
            })
    }

    /// The artifact bound to a channel, if any.
    #[must_use]
    pub fn get(&self, channel: &str) -> Option<&StageArtifact> {
        self.bound.get(channel)
    }

    /// Number of bound channels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bound.len()
    }

    /// Returns true if no channels are bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bound.is_empty()
    }
}
