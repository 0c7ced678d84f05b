//! Deferred directory restoration.
//!
//! Entries arrive in path order, so a directory's children follow it
//! directly. Directories are held back until the stream leaves them; then
//! they come out deepest first, after everything beneath them, so their
//! permissions and timestamps are the last thing written.

use crate::manifest::ManifestEntry;
use crate::utils::pathcmp::is_subdir;
use crate::utils::{RestoreError, Result};

#[derive(Debug, Default)]
pub struct DirectoryOrderBuffer {
    pending: Vec<ManifestEntry>,
}

impl DirectoryOrderBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Feed the next entry; returns the entries that can be restored now,
    /// in restore order.
    pub fn observe(&mut self, entry: ManifestEntry) -> Result<Vec<ManifestEntry>> {
        let mut ready = Vec::new();
        while let Some(top) = self.pending.last() {
            if is_subdir(&top.path, &entry.path) {
                break;
            }
            ready.extend(self.pending.pop());
        }

        if entry.is_directory() {
            if let Some(top) = self.pending.last() {
                if top.path == entry.path && top.kind == entry.kind {
                    return Err(RestoreError::DuplicateEntry(entry.path.to_string()));
                }
            }
            self.pending.push(entry);
        } else {
            ready.push(entry);
        }
        Ok(ready)
    }

    /// Drain every pending directory, deepest first.
    pub fn flush(&mut self) -> Vec<ManifestEntry> {
        let mut ready = std::mem::take(&mut self.pending);
        ready.reverse();
        ready
    }
}
