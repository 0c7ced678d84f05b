//! Delta application to reconstruct files.
//!
//! Deltas are librsync-format patches (as produced by `fast_rsync::diff`)
//! and may be stored gzip or zstd compressed. Output is always written
//! uncompressed.

use crate::storage::compression::read_delta;
use fast_rsync::apply;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PatchError {
    /// Reading the source or delta failed
    #[error("could not read {0}: {1}")]
    Input(String, #[source] io::Error),

    #[error("delta does not apply: {0}")]
    Apply(String),

    /// Writing the result failed
    #[error("could not write {0}: {1}")]
    Output(String, #[source] io::Error),
}

/// Apply a delta to baseline data to reconstruct the new content
pub fn apply_delta_to_bytes(baseline_data: &[u8], delta: &[u8]) -> Result<Vec<u8>, PatchError> {
    let mut output = Vec::new();
    apply(baseline_data, delta, &mut output).map_err(|e| PatchError::Apply(e.to_string()))?;
    Ok(output)
}

/// Apply the delta stored at `delta_path` to `baseline_path`, writing the
/// result to a fresh file at `output_path`. The baseline is only read.
///
/// # Returns
/// * `Ok(u64)` - Number of bytes written
pub fn apply_delta_file(
    baseline_path: &Path,
    delta_path: &Path,
    output_path: &Path,
) -> Result<u64, PatchError> {
    let baseline_data = fs::read(baseline_path)
        .map_err(|e| PatchError::Input(baseline_path.display().to_string(), e))?;
    let delta =
        read_delta(delta_path).map_err(|e| PatchError::Input(delta_path.display().to_string(), e))?;

    let reconstructed = apply_delta_to_bytes(&baseline_data, &delta)?;

    let output_err = |e| PatchError::Output(output_path.display().to_string(), e);
    let mut output_file = fs::File::create(output_path).map_err(output_err)?;
    output_file.write_all(&reconstructed).map_err(output_err)?;

    Ok(reconstructed.len() as u64)
}
