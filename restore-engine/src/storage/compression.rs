//! Compression codecs for stored objects and on-the-fly wire compression.
//!
//! Stored full-content objects are gzip (the historical default) or zstd;
//! the codec is decided by the manifest's compression indicator and the
//! datapath suffix. Delta files are recognised by their magic bytes.

use crate::utils::RestoreError;
use flate2::read::GzDecoder;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::Path;
use std::str::FromStr;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const ZSTD_MAGIC: [u8; 4] = [0x28, 0xb5, 0x2f, 0xfd];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    None,
    Gzip,
    Zstd,
}

impl FromStr for Compression {
    type Err = RestoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Compression::None),
            "gzip" | "gz" => Ok(Compression::Gzip),
            "zstd" | "zst" => Ok(Compression::Zstd),
            other => Err(RestoreError::Config(format!(
                "unknown compression '{}' (expected gzip, zstd or none)",
                other
            ))),
        }
    }
}

impl Compression {
    /// Codec of a stored full-content object.
    ///
    /// A positive manifest indicator means the object was gzipped at backup
    /// time even when the datapath carries no suffix.
    pub fn for_object(indicator: i32, datapath: &str) -> Self {
        if datapath.ends_with(".zst") {
            Compression::Zstd
        } else if indicator > 0 || datapath.ends_with(".gz") {
            Compression::Gzip
        } else {
            Compression::None
        }
    }

    /// Detect the codec from the first bytes of a file.
    pub fn sniff(path: &Path) -> io::Result<Self> {
        let mut magic = [0u8; 4];
        let mut file = File::open(path)?;
        let mut filled = 0;
        while filled < magic.len() {
            match file.read(&mut magic[filled..])? {
                0 => break,
                n => filled += n,
            }
        }
        Ok(if filled >= 4 && magic == ZSTD_MAGIC {
            Compression::Zstd
        } else if filled >= 2 && magic[..2] == GZIP_MAGIC {
            Compression::Gzip
        } else {
            Compression::None
        })
    }

    pub fn is_compressed(self) -> bool {
        self != Compression::None
    }

    /// Open `path` and return a reader yielding the decompressed bytes.
    /// A zero-length compressed object decompresses to nothing.
    pub fn open_reader(self, path: &Path) -> io::Result<Box<dyn Read>> {
        let file = File::open(path)?;
        if self.is_compressed() && file.metadata()?.len() == 0 {
            return Ok(Box::new(io::empty()));
        }
        Ok(match self {
            Compression::None => Box::new(BufReader::new(file)),
            Compression::Gzip => Box::new(GzDecoder::new(BufReader::new(file))),
            Compression::Zstd => Box::new(zstd::stream::read::Decoder::new(file)?),
        })
    }
}

/// Read a delta file, transparently decompressing it.
pub fn read_delta(path: &Path) -> io::Result<Vec<u8>> {
    let codec = Compression::sniff(path)?;
    if codec == Compression::None {
        return fs::read(path);
    }
    let mut data = Vec::new();
    codec.open_reader(path)?.read_to_end(&mut data)?;
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use std::io::Write;
    use tempfile::TempDir;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut enc = GzEncoder::new(Vec::new(), flate2::Compression::new(9));
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    #[test]
    fn test_for_object() {
        assert_eq!(Compression::for_object(-1, "0000/0001/0002"), Compression::None);
        assert_eq!(Compression::for_object(9, "0000/0001/0002"), Compression::Gzip);
        assert_eq!(Compression::for_object(0, "0000/0001/0002.gz"), Compression::Gzip);
        assert_eq!(Compression::for_object(0, "0000/0001/0002.zst"), Compression::Zstd);
    }

    #[test]
    fn test_sniff_and_read_delta() -> io::Result<()> {
        let dir = TempDir::new()?;
        let raw = dir.path().join("raw");
        let gz = dir.path().join("gz");
        let zst = dir.path().join("zst");
        fs::write(&raw, b"plain delta")?;
        fs::write(&gz, gzip(b"gzipped delta"))?;
        fs::write(&zst, zstd::encode_all(&b"zstd delta"[..], 3)?)?;

        assert_eq!(Compression::sniff(&raw)?, Compression::None);
        assert_eq!(Compression::sniff(&gz)?, Compression::Gzip);
        assert_eq!(Compression::sniff(&zst)?, Compression::Zstd);

        assert_eq!(read_delta(&raw)?, b"plain delta");
        assert_eq!(read_delta(&gz)?, b"gzipped delta");
        assert_eq!(read_delta(&zst)?, b"zstd delta");
        Ok(())
    }

    #[test]
    fn test_zero_length_object_inflates_to_empty() -> io::Result<()> {
        let dir = TempDir::new()?;
        let src = dir.path().join("empty.gz");
        fs::write(&src, b"")?;

        let mut out = Vec::new();
        Compression::Gzip.open_reader(&src)?.read_to_end(&mut out)?;
        assert!(out.is_empty());
        Ok(())
    }

    #[test]
    fn test_inflate_garbage_fails() -> io::Result<()> {
        let dir = TempDir::new()?;
        let src = dir.path().join("bad.gz");
        fs::write(&src, b"definitely not gzip")?;

        let mut out = Vec::new();
        assert!(Compression::Gzip.open_reader(&src)?.read_to_end(&mut out).is_err());
        Ok(())
    }
}
