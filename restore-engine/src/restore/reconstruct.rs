//! Replaying a delta chain into the session's scratch slots.

use crate::restore::chain::Resolution;
use crate::storage::Compression;
use crate::sync::apply::{apply_delta_file, PatchError};
use crate::utils::{RestoreError, Result};
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

const COPY_CHUNK: usize = 64 * 1024;

/// The two scratch files a session reconstructs into. Allocated once per
/// session and cleared before every file so nothing leaks between files.
#[derive(Debug)]
pub struct ScratchSpace {
    slots: [PathBuf; 2],
}

impl ScratchSpace {
    pub fn new(dir: &Path) -> Self {
        Self {
            slots: [dir.join("tmp1"), dir.join("tmp2")],
        }
    }

    pub fn slot(&self, index: usize) -> &Path {
        &self.slots[index]
    }

    /// Remove both slots.
    pub fn clear(&mut self) -> Result<()> {
        for index in 0..self.slots.len() {
            self.release(index)?;
        }
        Ok(())
    }

    fn release(&self, index: usize) -> Result<()> {
        let slot = &self.slots[index];
        match fs::remove_file(slot) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(RestoreError::scratch(slot, e)),
        }
    }
}

/// Reconstructed bytes, ready for transmission or verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconstructed {
    pub path: PathBuf,
    pub patches_applied: usize,
    /// Codec of the bytes at `path`; patched output is always uncompressed
    pub compression: Compression,
}

impl Reconstructed {
    pub fn patched(&self) -> bool {
        self.patches_applied > 0
    }
}

#[derive(Error, Debug)]
pub enum ReconstructError {
    #[error("error when inflating {path}: {source}")]
    Inflate {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("error when patching {path}: {source}")]
    Patch {
        path: String,
        #[source]
        source: PatchError,
    },

    /// Scratch slot I/O; aborts the session
    #[error(transparent)]
    Fatal(#[from] RestoreError),
}

/// Produce the content described by `resolution`.
///
/// With no deltas the stored base is used in place. Otherwise the base is
/// inflated into a slot (if compressed) and each delta is applied into the
/// other slot in turn, releasing the previous one.
pub fn reconstruct(
    scratch: &mut ScratchSpace,
    resolution: &Resolution,
    compression: Compression,
) -> std::result::Result<Reconstructed, ReconstructError> {
    scratch.clear()?;

    if resolution.deltas.is_empty() {
        return Ok(Reconstructed {
            path: resolution.base_path.clone(),
            patches_applied: 0,
            compression,
        });
    }

    let mut best = resolution.base_path.clone();
    let mut next = 0;
    if compression.is_compressed() {
        inflate_into(compression, &best, scratch.slot(next))?;
        best = scratch.slot(next).to_path_buf();
        next = 1 - next;
    }

    for (applied, step) in resolution.deltas.iter().enumerate() {
        let out = scratch.slot(next).to_path_buf();
        let written = apply_delta_file(&best, &step.path, &out).map_err(|e| match e {
            PatchError::Output(_, source) => {
                ReconstructError::Fatal(RestoreError::scratch(&out, source))
            }
            other => ReconstructError::Patch {
                path: step.path.display().to_string(),
                source: other,
            },
        })?;
        debug!(
            "Applied delta {}/{} from generation {} ({} bytes)",
            applied + 1,
            resolution.deltas.len(),
            step.generation,
            written
        );

        best = out;
        next = 1 - next;
        scratch.release(next)?;
    }

    Ok(Reconstructed {
        path: best,
        patches_applied: resolution.deltas.len(),
        compression: Compression::None,
    })
}

/// Decompress `src` into `dst`. Read/decode failures belong to the entry;
/// failures writing `dst` are fatal.
fn inflate_into(
    codec: Compression,
    src: &Path,
    dst: &Path,
) -> std::result::Result<u64, ReconstructError> {
    let inflate_err = |source| ReconstructError::Inflate {
        path: src.display().to_string(),
        source,
    };
    let mut reader = codec.open_reader(src).map_err(inflate_err)?;
    let mut out = File::create(dst).map_err(|e| RestoreError::scratch(dst, e))?;

    let mut buf = vec![0u8; COPY_CHUNK];
    let mut total = 0u64;
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(inflate_err(e)),
        };
        out.write_all(&buf[..n])
            .map_err(|e| RestoreError::scratch(dst, e))?;
        total += n as u64;
    }
    Ok(total)
}
