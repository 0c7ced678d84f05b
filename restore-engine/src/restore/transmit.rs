//! Putting reconstructed content on the wire, or checking it against the
//! manifest checksum.

use crate::manifest::ManifestEntry;
use crate::protocol::{Frame, Peer};
use crate::restore::reconstruct::Reconstructed;
use crate::storage::Compression;
use crate::utils::{EntryWarning, RestoreError, Result};
use bytes::Bytes;
use flate2::write::GzEncoder;
use md5::{Digest, Md5};
use std::io::{self, Read, Write};
use thiserror::Error;

const READ_CHUNK: usize = 64 * 1024;

/// How content is framed when sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireOptions {
    /// Codec applied to content that is not already compressed
    pub compression: Compression,
    pub level: i32,
    pub chunk_size: usize,
}

#[derive(Error, Debug)]
pub enum TransmitError {
    #[error(transparent)]
    Entry(EntryWarning),

    #[error(transparent)]
    Fatal(#[from] RestoreError),
}

/// Datapath (when present) and attributes frames that open every entry.
pub fn send_header<P: Peer>(peer: &mut P, entry: &ManifestEntry) -> Result<()> {
    if let Some(datapath) = &entry.datapath {
        peer.send(Frame::Datapath(datapath.to_string()))?;
    }
    peer.send(Frame::Attributes(entry.attributes.raw().to_string()))
}

/// Send a data-carrying entry: header, path, content chunks and the
/// `<bytes>:<md5>` end marker. Returns the number of content bytes sent.
///
/// Encrypted content and content that is already compressed go out as
/// stored; everything else is compressed with the wire codec. Patched
/// content is always rebuilt uncompressed, so it is compressed on the fly
/// here whatever codec the stored base used.
///
/// Failures to open the source are per-entry and nothing is sent. Once the
/// path frame is out the peer is mid-file, and a read failure is fatal.
pub fn send<P: Peer>(
    peer: &mut P,
    entry: &ManifestEntry,
    content: &Reconstructed,
    options: WireOptions,
) -> std::result::Result<u64, TransmitError> {
    let mut source = open_source(entry, content, Compression::None)?;

    let compress = !entry.kind.is_encrypted() && !content.compression.is_compressed();
    let codec = if compress {
        options.compression
    } else {
        Compression::None
    };

    send_header(peer, entry)?;
    peer.send(Frame::Path {
        kind: entry.kind,
        path: entry.path.clone(),
    })?;

    let path = entry.path.to_string();
    let writer = FrameWriter::new(peer, options.chunk_size);
    let mut sink = ChunkSink::new(codec, options.level, writer).map_err(RestoreError::Io)?;
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        let n = match source.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(RestoreError::SourceRead { path, source: e }.into()),
        };
        if let Err(e) = sink.write_all(&buf[..n]) {
            return Err(sink.fatal(e).into());
        }
    }

    let writer = sink.finish()?;
    let (sent, checksum, peer) = writer.finish()?;
    peer.send(Frame::EndFile(format!("{}:{}", sent, checksum)))?;
    Ok(sent)
}

/// Hash the plaintext of `content` and compare it with the checksum in the
/// entry's end marker.
pub fn verify(
    entry: &ManifestEntry,
    content: &Reconstructed,
) -> std::result::Result<(), EntryWarning> {
    let datapath = entry
        .datapath
        .as_ref()
        .map(|d| d.to_string())
        .unwrap_or_default();
    let expected = match entry.end.as_ref().and_then(|end| end.checksum.as_deref()) {
        Some(checksum) => checksum,
        None => return Err(EntryWarning::MissingChecksum { datapath }),
    };

    let codec = if entry.kind.is_encrypted() || content.patched() {
        Compression::None
    } else {
        content.compression
    };
    let mut source = match open_source(entry, content, codec) {
        Ok(source) => source,
        Err(TransmitError::Entry(warning)) => return Err(warning),
        Err(TransmitError::Fatal(e)) => {
            return Err(EntryWarning::Unreadable {
                path: entry.path.to_string(),
                reason: e.to_string(),
            })
        }
    };

    let mut digest = Md5::new();
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        match source.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => digest.update(&buf[..n]),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(EntryWarning::Unreadable {
                    path: entry.path.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }

    if hex::encode(digest.finalize()) == expected {
        Ok(())
    } else {
        Err(EntryWarning::ChecksumMismatch {
            path: entry.path.to_string(),
            datapath,
        })
    }
}

fn open_source(
    entry: &ManifestEntry,
    content: &Reconstructed,
    codec: Compression,
) -> std::result::Result<Box<dyn Read>, TransmitError> {
    // only regular files are ever stored; anything else at the path is stale
    let regular = std::fs::symlink_metadata(&content.path)
        .map(|m| m.file_type().is_file())
        .map_err(|e| unreadable(entry, e))?;
    if !regular {
        return Err(TransmitError::Entry(EntryWarning::Unreadable {
            path: entry.path.to_string(),
            reason: format!("{} is not a regular file", content.path.display()),
        }));
    }
    codec
        .open_reader(&content.path)
        .map_err(|e| unreadable(entry, e))
}

fn unreadable(entry: &ManifestEntry, e: io::Error) -> TransmitError {
    TransmitError::Entry(EntryWarning::Unreadable {
        path: entry.path.to_string(),
        reason: e.to_string(),
    })
}

/// Cuts the byte stream into `Append` frames and keeps the running digest.
/// A failed send is parked in `failure` since `Write` can only report an
/// `io::Error`.
struct FrameWriter<'a, P: Peer> {
    peer: &'a mut P,
    buf: Vec<u8>,
    chunk_size: usize,
    digest: Md5,
    sent: u64,
    failure: Option<RestoreError>,
}

impl<'a, P: Peer> FrameWriter<'a, P> {
    fn new(peer: &'a mut P, chunk_size: usize) -> Self {
        Self {
            peer,
            buf: Vec::with_capacity(chunk_size),
            chunk_size,
            digest: Md5::new(),
            sent: 0,
            failure: None,
        }
    }

    fn emit(&mut self, len: usize) -> io::Result<()> {
        let chunk: Vec<u8> = self.buf.drain(..len).collect();
        self.digest.update(&chunk);
        self.sent += chunk.len() as u64;
        if let Err(e) = self.peer.send(Frame::Append(Bytes::from(chunk))) {
            let message = e.to_string();
            self.failure = Some(e);
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, message));
        }
        Ok(())
    }

    fn finish(mut self) -> Result<(u64, String, &'a mut P)> {
        if !self.buf.is_empty() {
            let len = self.buf.len();
            if let Err(e) = self.emit(len) {
                return Err(self.failure.take().unwrap_or(RestoreError::Io(e)));
            }
        }
        Ok((self.sent, hex::encode(self.digest.finalize()), self.peer))
    }
}

impl<P: Peer> Write for FrameWriter<'_, P> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        while self.buf.len() >= self.chunk_size {
            self.emit(self.chunk_size)?;
        }
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

enum ChunkSink<'a, P: Peer> {
    Plain(FrameWriter<'a, P>),
    Gzip(GzEncoder<FrameWriter<'a, P>>),
    Zstd(zstd::stream::write::Encoder<'static, FrameWriter<'a, P>>),
}

impl<'a, P: Peer> ChunkSink<'a, P> {
    fn new(codec: Compression, level: i32, writer: FrameWriter<'a, P>) -> io::Result<Self> {
        Ok(match codec {
            Compression::None => ChunkSink::Plain(writer),
            Compression::Gzip => {
                let level = flate2::Compression::new(level.clamp(0, 9) as u32);
                ChunkSink::Gzip(GzEncoder::new(writer, level))
            }
            Compression::Zstd => ChunkSink::Zstd(zstd::stream::write::Encoder::new(writer, level)?),
        })
    }

    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        match self {
            ChunkSink::Plain(w) => w.write_all(data),
            ChunkSink::Gzip(w) => w.write_all(data),
            ChunkSink::Zstd(w) => w.write_all(data),
        }
    }

    /// Turn a write error into the session-level failure behind it.
    fn fatal(&mut self, e: io::Error) -> RestoreError {
        let writer = match self {
            ChunkSink::Plain(w) => w,
            ChunkSink::Gzip(w) => w.get_mut(),
            ChunkSink::Zstd(w) => w.get_mut(),
        };
        writer.failure.take().unwrap_or(RestoreError::Io(e))
    }

    fn finish(self) -> Result<FrameWriter<'a, P>> {
        let finished = match self {
            ChunkSink::Plain(w) => Ok(w),
            ChunkSink::Gzip(w) => w.finish(),
            ChunkSink::Zstd(w) => w.finish(),
        };
        finished.map_err(RestoreError::Io)
    }
}
