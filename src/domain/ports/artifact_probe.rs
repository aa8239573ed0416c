//! Port for verifying phase artifacts.

use async_trait::async_trait;

/// Confirms that an artifact listed in the checkpoint is really present.
///
/// The gate never trusts the checkpoint's artifact list alone; every listed
/// path is checked through a probe before a phase may be left.
#[async_trait]
pub trait ArtifactProbe: Send + Sync {
    /// Whether `artifact` (a path relative to the artifact root) exists and is usable.
    async fn exists(&self, artifact: &str) -> bool;
}

/// Probe that accepts every recorded artifact.
///
/// For hosts whose artifacts do not live on a local filesystem and are
/// verified by the agent before being recorded.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordedArtifactProbe;

#[async_trait]
impl ArtifactProbe for RecordedArtifactProbe {
    async fn exists(&self, _artifact: &str) -> bool {
        true
    }
}
