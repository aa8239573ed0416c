//! File-backed persistence primitives shared by every store.

pub mod atomic;
pub mod jsonl;
pub mod retry;

pub use atomic::{JsonDocument, LoadOutcome};
pub use jsonl::{read_all, JsonlWriter};
pub use retry::WriteRetry;
