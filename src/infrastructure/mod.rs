//! Infrastructure layer module
//!
//! Adapters and plumbing behind the services:
//! - Atomic JSON documents and append-only JSONL files
//! - Configuration management
//! - Logging infrastructure
//! - Filesystem artifact probe
//! - Project setup
//!
//! Infrastructure implementations satisfy the port traits defined in the domain layer.

pub mod artifacts;
pub mod config;
pub mod layout;
pub mod logging;
pub mod persistence;
pub mod setup;

pub use artifacts::FsArtifactProbe;
pub use layout::DataLayout;
