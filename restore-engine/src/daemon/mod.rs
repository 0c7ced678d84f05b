//! Process-level concerns of the restore daemon.

pub mod shutdown;
