//! The record format shared by manifests and the peer connection:
//! one command byte, a four digit upper-case hex length, then the payload.
//! Manifest records are additionally terminated by a newline.

use bytes::{BufMut, Bytes, BytesMut};
use std::io::{self, BufRead, Read};

pub const HEADER_LEN: usize = 5;
pub const MAX_PAYLOAD: usize = 0xFFFF;

pub mod cmd {
    pub const DATAPATH: u8 = b't';
    pub const ATTRIBUTES: u8 = b'r';
    pub const FILE: u8 = b'f';
    pub const ENC_FILE: u8 = b'y';
    pub const METADATA: u8 = b'm';
    pub const ENC_METADATA: u8 = b'n';
    pub const EFS_FILE: u8 = b'k';
    pub const VSS: u8 = b'S';
    pub const ENC_VSS: u8 = b'T';
    pub const VSS_T: u8 = b'V';
    pub const ENC_VSS_T: u8 = b'W';
    pub const DIRECTORY: u8 = b'd';
    pub const SOFT_LINK: u8 = b'L';
    pub const HARD_LINK: u8 = b'l';
    pub const SPECIAL: u8 = b's';
    pub const END_FILE: u8 = b'x';
    pub const APPEND: u8 = b'a';
    pub const WARNING: u8 = b'w';
    pub const INTERRUPT: u8 = b'i';
    pub const ERROR: u8 = b'e';
    pub const GEN: u8 = b'c';
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub cmd: u8,
    pub data: Bytes,
}

impl Record {
    pub fn new(cmd: u8, data: impl Into<Bytes>) -> Self {
        Self {
            cmd,
            data: data.into(),
        }
    }

    /// Payload as text, for records carrying tokens and messages. Paths are
    /// raw bytes and never go through here.
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.data).ok()
    }

    pub fn encoded_len(&self) -> usize {
        HEADER_LEN + self.data.len()
    }

    pub fn encode(&self, dst: &mut BytesMut) -> io::Result<()> {
        if self.data.len() > MAX_PAYLOAD {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("record payload of {} bytes exceeds {}", self.data.len(), MAX_PAYLOAD),
            ));
        }
        dst.reserve(self.encoded_len());
        dst.put_u8(self.cmd);
        dst.put_slice(format!("{:04X}", self.data.len()).as_bytes());
        dst.put_slice(&self.data);
        Ok(())
    }

    /// Parse the header, returning the command and payload length.
    pub fn parse_header(header: &[u8]) -> io::Result<(u8, usize)> {
        let len = std::str::from_utf8(&header[1..HEADER_LEN])
            .ok()
            .and_then(|s| usize::from_str_radix(s, 16).ok())
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("bad record length field {:?}", String::from_utf8_lossy(&header[1..])),
                )
            })?;
        Ok((header[0], len))
    }

    /// Read one newline-terminated record. `Ok(None)` only at a clean end
    /// of input, i.e. before the first header byte.
    pub fn read_line<R: BufRead>(reader: &mut R) -> io::Result<Option<Record>> {
        let mut header = [0u8; HEADER_LEN];
        if reader.fill_buf()?.is_empty() {
            return Ok(None);
        }
        reader.read_exact(&mut header)?;
        let (cmd, len) = Self::parse_header(&header)?;

        let mut data = vec![0u8; len + 1];
        reader.read_exact(&mut data)?;
        if data.pop() != Some(b'\n') {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "record is not newline terminated",
            ));
        }
        Ok(Some(Record::new(cmd, data)))
    }
}
