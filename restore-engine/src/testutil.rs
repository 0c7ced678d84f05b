//! Test fixtures: a throwaway backup store and a scripted peer.

use crate::manifest::entry::{Attributes, EntryKind};
use crate::manifest::path::EntryPath;
use crate::manifest::record::{cmd, Record};
use crate::protocol::frame::{Frame, RESTORE_END, RESTORE_END_OK};
use crate::protocol::Peer;
use crate::storage::GenerationChain;
use crate::utils::{RestoreError, Result};
use bytes::BytesMut;
use fast_rsync::{diff, Signature, SignatureOptions};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use md5::{Digest, Md5};
use std::collections::VecDeque;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// librsync-format delta turning `base` into `target`.
pub fn make_delta(base: &[u8], target: &[u8]) -> Vec<u8> {
    let signature = Signature::calculate(
        base,
        SignatureOptions {
            block_size: 64,
            crypto_hash_size: 8,
        },
    );
    let mut delta = Vec::new();
    diff(&signature.index(), target, &mut delta).expect("delta computation failed");
    delta
}

pub fn gzip(data: &[u8]) -> Vec<u8> {
    let mut enc = GzEncoder::new(Vec::new(), flate2::Compression::new(9));
    enc.write_all(data).unwrap();
    enc.finish().unwrap()
}

pub fn gunzip(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    GzDecoder::new(data).read_to_end(&mut out).unwrap();
    out
}

pub fn md5_hex(data: &[u8]) -> String {
    hex::encode(Md5::digest(data))
}

/// Records making up one manifest entry.
pub struct EntryRecords(Vec<Record>);

impl EntryRecords {
    pub fn without_datapath(mut self) -> Self {
        self.0.retain(|r| r.cmd != cmd::DATAPATH);
        self
    }
}

pub fn dir_entry(path: impl AsRef<[u8]>) -> EntryRecords {
    EntryRecords(vec![
        Record::new(cmd::ATTRIBUTES, Attributes::encode(0o40755, 0, 0, 4096, 1_700_000_000, -1)),
        Record::new(cmd::DIRECTORY, path.as_ref().to_vec()),
    ])
}

/// A data-carrying entry whose plaintext is `content`.
pub fn file_entry(kind: EntryKind, path: impl AsRef<[u8]>, datapath: &str, content: &[u8], compression: i32) -> EntryRecords {
    let end = format!("{}:{}", content.len(), md5_hex(content));
    file_entry_with_end(kind, path, datapath, content.len() as u64, compression, &end)
}

pub fn file_entry_with_end(
    kind: EntryKind,
    path: impl AsRef<[u8]>,
    datapath: &str,
    size: u64,
    compression: i32,
    end: &str,
) -> EntryRecords {
    EntryRecords(vec![
        Record::new(cmd::DATAPATH, datapath.to_string()),
        Record::new(
            cmd::ATTRIBUTES,
            Attributes::encode(0o100644, 1000, 1000, size, 1_700_000_000, compression),
        ),
        Record::new(kind.tag(), path.as_ref().to_vec()),
        Record::new(cmd::END_FILE, end.to_string()),
    ])
}

pub fn link_entry(path: impl AsRef<[u8]>, target: impl AsRef<[u8]>) -> EntryRecords {
    EntryRecords(vec![
        Record::new(cmd::ATTRIBUTES, Attributes::encode(0o120777, 0, 0, 0, 1_700_000_000, -1)),
        Record::new(cmd::SOFT_LINK, path.as_ref().to_vec()),
        Record::new(cmd::SOFT_LINK, target.as_ref().to_vec()),
    ])
}

/// Client directory with generations numbered from 1 (oldest).
pub struct StoreFixture {
    dir: TempDir,
}

impl StoreFixture {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn client_dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn generation_dir(&self, index: u64) -> PathBuf {
        self.dir
            .path()
            .join(format!("{:07} 2024-01-{:02} 00:00:00", index, index))
    }

    pub fn add_generation(&self, index: u64, hardlinked: bool) -> PathBuf {
        let dir = self.generation_dir(index);
        fs::create_dir_all(dir.join("data")).unwrap();
        fs::create_dir_all(dir.join("deltas.reverse")).unwrap();
        fs::write(
            dir.join("timestamp"),
            format!("{:07} 2024-01-{:02} 00:00:00\n", index, index),
        )
        .unwrap();
        if hardlinked {
            fs::write(dir.join("hardlinked"), b"").unwrap();
        }
        dir
    }

    pub fn put_base(&self, index: u64, datapath: &str, stored: &[u8]) {
        write_creating_parents(&self.generation_dir(index).join("data").join(datapath), stored);
    }

    pub fn put_delta(&self, index: u64, datapath: &str, delta: &[u8]) {
        write_creating_parents(
            &self.generation_dir(index).join("deltas.reverse").join(datapath),
            delta,
        );
    }

    pub fn write_manifest(&self, index: u64, entries: &[EntryRecords]) {
        let mut buf = BytesMut::new();
        for entry in entries {
            for record in &entry.0 {
                record.encode(&mut buf).unwrap();
                buf.extend_from_slice(b"\n");
            }
        }
        self.write_raw_manifest(index, &buf);
    }

    /// Manifest made of exactly `plain`, gzipped.
    pub fn write_raw_manifest(&self, index: u64, plain: &[u8]) {
        fs::write(self.generation_dir(index).join("manifest.gz"), gzip(plain)).unwrap();
    }

    pub fn chain(&self) -> GenerationChain {
        GenerationChain::load(self.client_dir()).unwrap()
    }
}

fn write_creating_parents(path: &Path, data: &[u8]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, data).unwrap();
}

/// In-memory peer. Queued frames are handed out by `try_recv`; the
/// restore-end request is acknowledged automatically unless disabled.
#[derive(Default)]
pub struct ScriptedPeer {
    pub inbound: VecDeque<Frame>,
    pub sent: Vec<Frame>,
    pub withhold_ack: bool,
    end_requested: bool,
}

impl ScriptedPeer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_inbound(frames: Vec<Frame>) -> Self {
        Self {
            inbound: frames.into(),
            ..Self::default()
        }
    }

    pub fn warnings(&self) -> Vec<&str> {
        self.sent
            .iter()
            .filter_map(|f| match f {
                Frame::Warning(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Paths in the order their path frames were sent.
    pub fn paths(&self) -> Vec<&EntryPath> {
        let mut paths = Vec::new();
        let mut previous_was_link = false;
        for frame in &self.sent {
            if let Frame::Path { kind, path } = frame {
                // second frame of a link carries the target
                if previous_was_link {
                    previous_was_link = false;
                    continue;
                }
                previous_was_link = kind.is_link();
                paths.push(path);
            }
        }
        paths
    }

    /// Concatenated content chunks sent after the path frame for `path`.
    pub fn content(&self, path: impl AsRef<[u8]>) -> Option<Vec<u8>> {
        let path = path.as_ref();
        let start = self
            .sent
            .iter()
            .position(|f| matches!(f, Frame::Path { path: p, .. } if p.as_bytes() == path))?;
        let mut data = Vec::new();
        for frame in &self.sent[start + 1..] {
            match frame {
                Frame::Append(chunk) => data.extend_from_slice(chunk),
                _ => break,
            }
        }
        Some(data)
    }
}

impl Peer for ScriptedPeer {
    fn try_recv(&mut self) -> Result<Option<Frame>> {
        Ok(self.inbound.pop_front())
    }

    fn recv(&mut self) -> Result<Frame> {
        if let Some(frame) = self.inbound.pop_front() {
            return Ok(frame);
        }
        if self.end_requested && !self.withhold_ack {
            self.end_requested = false;
            return Ok(Frame::Gen(RESTORE_END_OK.to_string()));
        }
        Err(RestoreError::PeerClosed)
    }

    fn send(&mut self, frame: Frame) -> Result<()> {
        if frame == Frame::Gen(RESTORE_END.to_string()) {
            self.end_requested = true;
        }
        self.sent.push(frame);
        Ok(())
    }
}
