//! Port trait definitions
//!
//! Traits the services depend on, implemented by infrastructure adapters:
//! - ArtifactProbe: confirms a recorded artifact really exists

pub mod artifact_probe;

pub use artifact_probe::{ArtifactProbe, RecordedArtifactProbe};
