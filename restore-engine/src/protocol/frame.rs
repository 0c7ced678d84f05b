//! Frames exchanged with the restoring peer, plus the `tokio_util` codec
//! that puts them on the wire.

use crate::manifest::entry::EntryKind;
use crate::manifest::path::EntryPath;
use crate::manifest::record::{cmd, Record, HEADER_LEN};
use crate::utils::RestoreError;
use bytes::{Buf, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Sent to the peer once every entry has been restored.
pub const RESTORE_END: &str = "restoreend";
/// Expected reply to [`RESTORE_END`].
pub const RESTORE_END_OK: &str = "restoreend ok";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Datapath(String),
    Attributes(String),
    /// Path of an entry; link targets travel in a second frame of the same kind
    Path { kind: EntryKind, path: EntryPath },
    Append(Bytes),
    EndFile(String),
    Warning(String),
    /// The peer gave up on the file it was receiving
    Interrupt(String),
    Error(String),
    Gen(String),
    Unknown(Record),
}

impl Frame {
    pub fn into_record(self) -> Record {
        match self {
            Frame::Datapath(s) => Record::new(cmd::DATAPATH, s),
            Frame::Attributes(s) => Record::new(cmd::ATTRIBUTES, s),
            Frame::Path { kind, path } => Record::new(kind.tag(), path.into_bytes()),
            Frame::Append(data) => Record::new(cmd::APPEND, data),
            Frame::EndFile(s) => Record::new(cmd::END_FILE, s),
            Frame::Warning(s) => Record::new(cmd::WARNING, s),
            Frame::Interrupt(s) => Record::new(cmd::INTERRUPT, s),
            Frame::Error(s) => Record::new(cmd::ERROR, s),
            Frame::Gen(s) => Record::new(cmd::GEN, s),
            Frame::Unknown(record) => record,
        }
    }

    pub fn from_record(record: Record) -> Frame {
        if record.cmd == cmd::APPEND {
            return Frame::Append(record.data);
        }
        if let Some(kind) = EntryKind::from_tag(record.cmd) {
            return Frame::Path {
                kind,
                path: EntryPath::from(record.data),
            };
        }
        let text = match record.text() {
            Some(text) => text.to_string(),
            None => return Frame::Unknown(record),
        };
        match record.cmd {
            cmd::DATAPATH => Frame::Datapath(text),
            cmd::ATTRIBUTES => Frame::Attributes(text),
            cmd::END_FILE => Frame::EndFile(text),
            cmd::WARNING => Frame::Warning(text),
            cmd::INTERRUPT => Frame::Interrupt(text),
            cmd::ERROR => Frame::Error(text),
            cmd::GEN => Frame::Gen(text),
            _ => Frame::Unknown(record),
        }
    }

    /// Short name for log lines
    pub fn describe(&self) -> String {
        match self {
            Frame::Unknown(record) => format!("unknown frame '{}'", record.cmd as char),
            Frame::Append(data) => format!("append ({} bytes)", data.len()),
            other => format!("{:?}", other),
        }
    }
}

#[derive(Debug, Default)]
pub struct FrameCodec;

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = RestoreError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, RestoreError> {
        if src.len() < HEADER_LEN {
            return Ok(None);
        }
        let (tag, len) = Record::parse_header(&src[..HEADER_LEN])
            .map_err(|e| RestoreError::ProtocolViolation(e.to_string()))?;
        if src.len() < HEADER_LEN + len {
            src.reserve(HEADER_LEN + len - src.len());
            return Ok(None);
        }
        src.advance(HEADER_LEN);
        let data = src.split_to(len).freeze();
        Ok(Some(Frame::from_record(Record { cmd: tag, data })))
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = RestoreError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), RestoreError> {
        frame.into_record().encode(dst)?;
        Ok(())
    }
}
