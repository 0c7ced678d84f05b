//! Backup generations and the ordered chain a restore walks.
//!
//! Each generation is a directory under the client directory:
//!
//! ```text
//! <client_dir>/0000003 2024-05-01 10:00:00/
//!     timestamp          "0000003 2024-05-01 10:00:00"
//!     hardlinked         (optional marker)
//!     manifest.gz
//!     data/<datapath>            full content
//!     deltas.reverse/<datapath>  delta producing this generation from the next newer one
//! ```

use crate::storage::datapath::Datapath;
use crate::utils::{RestoreError, Result};
use chrono::NaiveDateTime;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const TIMESTAMP_FILE: &str = "timestamp";
const HARDLINKED_FILE: &str = "hardlinked";
const MANIFEST_FILE: &str = "manifest.gz";
const DATA_DIR: &str = "data";
const DELTA_DIR: &str = "deltas.reverse";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone)]
pub struct BackupGeneration {
    /// Backup number; newer generations have higher numbers
    pub index: u64,
    pub created: NaiveDateTime,
    pub root: PathBuf,
    pub hardlinked_archive: bool,
}

impl BackupGeneration {
    /// Read a generation directory's `timestamp` file.
    pub fn load(root: &Path) -> Result<Self> {
        let raw = fs::read_to_string(root.join(TIMESTAMP_FILE))?;
        let (index, created) = parse_timestamp(raw.trim()).ok_or_else(|| {
            RestoreError::Storage(format!(
                "bad timestamp '{}' in {}",
                raw.trim(),
                root.display()
            ))
        })?;
        Ok(Self {
            index,
            created,
            root: root.to_path_buf(),
            hardlinked_archive: root.join(HARDLINKED_FILE).exists(),
        })
    }

    pub fn name(&self) -> String {
        self.root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.index.to_string())
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    pub fn data_path(&self, datapath: &Datapath) -> PathBuf {
        self.root.join(DATA_DIR).join(datapath)
    }

    pub fn delta_path(&self, datapath: &Datapath) -> PathBuf {
        self.root.join(DELTA_DIR).join(datapath)
    }

    /// Full content for `datapath`, if this generation holds it as a regular file.
    pub fn base_object(&self, datapath: &Datapath) -> Option<PathBuf> {
        regular_file(self.data_path(datapath))
    }

    /// Delta for `datapath`, if this generation holds one as a regular file.
    pub fn delta_object(&self, datapath: &Datapath) -> Option<PathBuf> {
        regular_file(self.delta_path(datapath))
    }
}

fn regular_file(path: PathBuf) -> Option<PathBuf> {
    // lstat: a symlink planted in the store is not content
    match fs::symlink_metadata(&path) {
        Ok(meta) if meta.file_type().is_file() => Some(path),
        _ => None,
    }
}

/// `"<index> <YYYY-MM-DD HH:MM:SS>"`
pub fn parse_timestamp(s: &str) -> Option<(u64, NaiveDateTime)> {
    let (index, when) = s.split_once(' ')?;
    let index = index.parse().ok()?;
    let created = NaiveDateTime::parse_from_str(when.trim(), TIMESTAMP_FORMAT).ok()?;
    Some((index, created))
}

pub fn format_timestamp(index: u64, created: &NaiveDateTime) -> String {
    format!("{:07} {}", index, created.format(TIMESTAMP_FORMAT))
}

/// All generations of one client, oldest first. Neighbours are found by
/// index arithmetic; the chain never changes during a session.
#[derive(Debug, Clone)]
pub struct GenerationChain {
    generations: Vec<BackupGeneration>,
}

impl GenerationChain {
    pub fn new(mut generations: Vec<BackupGeneration>) -> Self {
        generations.sort_by_key(|g| g.index);
        Self { generations }
    }

    /// Scan `client_dir` for generation directories.
    pub fn load(client_dir: &Path) -> Result<Self> {
        let mut generations = Vec::new();
        for entry in fs::read_dir(client_dir)? {
            let entry = entry?;
            let path = entry.path();
            if !entry.file_type()?.is_dir() || !path.join(TIMESTAMP_FILE).is_file() {
                continue;
            }
            match BackupGeneration::load(&path) {
                Ok(generation) => {
                    debug!(
                        "Found generation {} ({}){}",
                        generation.index,
                        generation.created,
                        if generation.hardlinked_archive { " [hardlinked]" } else { "" }
                    );
                    generations.push(generation);
                }
                Err(e) => warn!("Skipping {}: {}", path.display(), e),
            }
        }
        if generations.is_empty() {
            return Err(RestoreError::Storage(format!(
                "no backup generations found in {}",
                client_dir.display()
            )));
        }
        Ok(Self::new(generations))
    }

    pub fn len(&self) -> usize {
        self.generations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.generations.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<&BackupGeneration> {
        self.generations.get(position)
    }

    pub fn generations(&self) -> &[BackupGeneration] {
        &self.generations
    }

    /// Position of the generation with backup number `index`, or of the
    /// newest generation when `index` is `None`.
    pub fn position(&self, index: Option<u64>) -> Result<usize> {
        match index {
            None => self
                .generations
                .len()
                .checked_sub(1)
                .ok_or_else(|| RestoreError::Storage("empty generation chain".to_string())),
            Some(wanted) => self
                .generations
                .iter()
                .position(|g| g.index == wanted)
                .ok_or_else(|| RestoreError::Storage(format!("no generation {}", wanted))),
        }
    }
}

impl std::ops::Index<usize> for GenerationChain {
    type Output = BackupGeneration;

    fn index(&self, position: usize) -> &BackupGeneration {
        &self.generations[position]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn make_generation(client: &Path, index: u64, when: &str, hardlinked: bool) -> PathBuf {
        let dir = client.join(format!("{:07} {}", index, when));
        fs::create_dir_all(dir.join("data")).unwrap();
        fs::write(dir.join("timestamp"), format!("{:07} {}\n", index, when)).unwrap();
        if hardlinked {
            fs::write(dir.join("hardlinked"), b"").unwrap();
        }
        dir
    }

    #[test]
    fn test_parse_timestamp() {
        let (index, created) = parse_timestamp("0000012 2024-03-01 08:30:00").unwrap();
        assert_eq!(index, 12);
        assert_eq!(format_timestamp(index, &created), "0000012 2024-03-01 08:30:00");
        assert!(parse_timestamp("garbage").is_none());
        assert!(parse_timestamp("12 yesterday").is_none());
    }

    #[test]
    fn test_load_orders_oldest_first() -> Result<()> {
        let client = TempDir::new()?;
        make_generation(client.path(), 3, "2024-01-03 00:00:00", true);
        make_generation(client.path(), 1, "2024-01-01 00:00:00", false);
        make_generation(client.path(), 2, "2024-01-02 00:00:00", false);
        fs::create_dir(client.path().join("not-a-generation"))?;
        fs::write(client.path().join("tmp1"), b"scratch")?;

        let chain = GenerationChain::load(client.path())?;

        let indexes: Vec<u64> = chain.generations().iter().map(|g| g.index).collect();
        assert_eq!(indexes, vec![1, 2, 3]);
        assert!(chain[2].hardlinked_archive);
        assert!(!chain[0].hardlinked_archive);
        assert_eq!(chain.position(None)?, 2);
        assert_eq!(chain.position(Some(1))?, 0);
        assert!(chain.position(Some(9)).is_err());
        Ok(())
    }

    #[test]
    fn test_empty_client_dir_is_an_error() {
        let client = TempDir::new().unwrap();
        assert!(matches!(
            GenerationChain::load(client.path()),
            Err(RestoreError::Storage(_))
        ));
    }

    #[test]
    fn test_objects_must_be_regular_files() -> Result<()> {
        let client = TempDir::new()?;
        let dir = make_generation(client.path(), 1, "2024-01-01 00:00:00", false);
        let generation = BackupGeneration::load(&dir)?;
        let file = Datapath::parse("0000/0001").unwrap();
        let subdir = Datapath::parse("0000/0002").unwrap();

        fs::create_dir_all(dir.join("data/0000/0002"))?;
        assert!(generation.base_object(&file).is_none());

        fs::write(dir.join("data/0000/0001"), b"content")?;
        assert_eq!(generation.base_object(&file), Some(dir.join("data/0000/0001")));
        assert!(generation.base_object(&subdir).is_none());
        assert!(generation.delta_object(&file).is_none());
        Ok(())
    }
}
