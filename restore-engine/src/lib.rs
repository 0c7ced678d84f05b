//! Restore Engine Library
//!
//! Rebuilds the files of a backup generation from its reverse-delta chain
//! and streams them to a restoring peer, or verifies them against the
//! checksums recorded in the manifest.

pub mod config;
pub mod daemon;
pub mod manifest;
pub mod net;
pub mod protocol;
pub mod restore;
pub mod storage;
pub mod sync;
pub mod utils;

#[cfg(test)]
mod testutil;

// Re-export commonly used types
pub use config::Config;
pub use utils::errors::RestoreError;
pub use utils::Result;
