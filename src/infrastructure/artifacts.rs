//! Filesystem-backed artifact probe.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::domain::ports::ArtifactProbe;

/// Checks artifacts as non-empty regular files under a root directory.
#[derive(Debug, Clone)]
pub struct FsArtifactProbe {
    root: PathBuf,
}

impl FsArtifactProbe {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve `artifact` under the root; paths escaping the root are refused.
    fn resolve(&self, artifact: &str) -> Option<PathBuf> {
        let relative = Path::new(artifact);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if artifact.is_empty() || escapes {
            return None;
        }
        Some(self.root.join(relative))
    }
}

#[async_trait]
impl ArtifactProbe for FsArtifactProbe {
    async fn exists(&self, artifact: &str) -> bool {
        let Some(path) = self.resolve(artifact) else {
            debug!(artifact, "artifact path rejected");
            return false;
        };
        match tokio::fs::metadata(&path).await {
            Ok(meta) => meta.is_file() && meta.len() > 0,
            Err(_) => false,
        }
    }
}
