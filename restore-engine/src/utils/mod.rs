//! Utility modules for the restore engine.

pub mod errors;
pub mod logger;
pub mod pathcmp;

pub use errors::{EntryWarning, RestoreError, Result};
