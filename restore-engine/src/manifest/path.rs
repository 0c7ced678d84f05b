//! Entry paths exactly as the manifest stores them. Filenames are bytes on
//! the client and need not be UTF-8.

use bytes::Bytes;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct EntryPath(Bytes);

impl EntryPath {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        EntryPath(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Bytes {
        self.0
    }
}

/// Lossy; for logs and warning text only.
impl fmt::Display for EntryPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

impl AsRef<[u8]> for EntryPath {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Bytes> for EntryPath {
    fn from(bytes: Bytes) -> Self {
        EntryPath(bytes)
    }
}

impl From<Vec<u8>> for EntryPath {
    fn from(bytes: Vec<u8>) -> Self {
        EntryPath(Bytes::from(bytes))
    }
}

impl From<&str> for EntryPath {
    fn from(s: &str) -> Self {
        EntryPath(Bytes::copy_from_slice(s.as_bytes()))
    }
}

impl From<String> for EntryPath {
    fn from(s: String) -> Self {
        EntryPath(Bytes::from(s))
    }
}

impl PartialEq<str> for EntryPath {
    fn eq(&self, other: &str) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl PartialEq<&str> for EntryPath {
    fn eq(&self, other: &&str) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}
