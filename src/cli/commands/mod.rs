//! CLI command implementations.

pub mod checkpoint;
pub mod constraint;
pub mod evolution;
pub mod gate;
pub mod hook;
pub mod init;
pub mod score;
