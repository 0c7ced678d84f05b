//! Error types for the restore engine.
//!
//! `RestoreError` aborts a whole session. `EntryWarning` is reported to the
//! peer and the local log, and the session carries on with the next entry.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RestoreError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Corrupt manifest at record {record}: {reason}")]
    CorruptManifest { record: u64, reason: String },

    #[error("Duplicate directory entry: {0}")]
    DuplicateEntry(String),

    #[error("Scratch file error on {path}: {source}")]
    ScratchIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The peer already holds part of the file, so it cannot be skipped.
    #[error("Read failed on {path} after its transfer started: {source}")]
    SourceRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("Peer connection closed")]
    PeerClosed,

    #[error("Invalid regex: {0}")]
    Regex(#[from] regex::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RestoreError {
    pub fn corrupt(record: u64, reason: impl Into<String>) -> Self {
        RestoreError::CorruptManifest {
            record,
            reason: reason.into(),
        }
    }

    pub fn scratch(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RestoreError::ScratchIo {
            path: path.into(),
            source,
        }
    }
}

/// Per-entry problems. The `Display` text is what the peer receives in a
/// warning frame.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EntryWarning {
    #[error("restore could not find {path} ({datapath})")]
    BaseNotFound { path: String, datapath: String },

    #[error("Got filedata entry with no datapath: {kind}:{path}")]
    MissingDatapath { kind: char, path: String },

    #[error("error when reconstructing {path}: {reason}")]
    ReconstructFailed { path: String, reason: String },

    #[error("md5sum for '{path} ({datapath})' did not match!")]
    ChecksumMismatch { path: String, datapath: String },

    #[error("{datapath} has no md5sum!")]
    MissingChecksum { datapath: String },

    #[error("could not read {path}: {reason}")]
    Unreadable { path: String, reason: String },

    #[error("restore found {path} in {generation}")]
    FoundInOtherGeneration { path: String, generation: String },
}

pub type Result<T> = std::result::Result<T, RestoreError>;
