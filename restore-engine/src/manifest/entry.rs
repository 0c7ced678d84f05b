//! Manifest entry types: one filesystem object of a backup generation.

use crate::manifest::path::EntryPath;
use crate::manifest::record::cmd;
use crate::storage::Datapath;
use std::fmt;

const S_IFMT: u32 = 0o170000;
const S_IFDIR: u32 = 0o040000;

/// Encrypted variants are opaque to the restore engine: their bytes are
/// sent exactly as stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EncryptedKind {
    File,
    Metadata,
    EfsFile,
    Vss,
    VssTerminator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntryKind {
    File,
    /// Extended attributes / ACL blob attached to a path
    Metadata,
    Vss,
    VssTerminator,
    Encrypted(EncryptedKind),
    Directory,
    SoftLink,
    HardLink,
    /// Fifos, devices and sockets: restored from attributes alone
    Special,
}

impl EntryKind {
    pub fn from_tag(tag: u8) -> Option<Self> {
        Some(match tag {
            cmd::FILE => EntryKind::File,
            cmd::METADATA => EntryKind::Metadata,
            cmd::VSS => EntryKind::Vss,
            cmd::VSS_T => EntryKind::VssTerminator,
            cmd::ENC_FILE => EntryKind::Encrypted(EncryptedKind::File),
            cmd::ENC_METADATA => EntryKind::Encrypted(EncryptedKind::Metadata),
            cmd::EFS_FILE => EntryKind::Encrypted(EncryptedKind::EfsFile),
            cmd::ENC_VSS => EntryKind::Encrypted(EncryptedKind::Vss),
            cmd::ENC_VSS_T => EntryKind::Encrypted(EncryptedKind::VssTerminator),
            cmd::DIRECTORY => EntryKind::Directory,
            cmd::SOFT_LINK => EntryKind::SoftLink,
            cmd::HARD_LINK => EntryKind::HardLink,
            cmd::SPECIAL => EntryKind::Special,
            _ => return None,
        })
    }

    pub fn tag(self) -> u8 {
        match self {
            EntryKind::File => cmd::FILE,
            EntryKind::Metadata => cmd::METADATA,
            EntryKind::Vss => cmd::VSS,
            EntryKind::VssTerminator => cmd::VSS_T,
            EntryKind::Encrypted(EncryptedKind::File) => cmd::ENC_FILE,
            EntryKind::Encrypted(EncryptedKind::Metadata) => cmd::ENC_METADATA,
            EntryKind::Encrypted(EncryptedKind::EfsFile) => cmd::EFS_FILE,
            EntryKind::Encrypted(EncryptedKind::Vss) => cmd::ENC_VSS,
            EntryKind::Encrypted(EncryptedKind::VssTerminator) => cmd::ENC_VSS_T,
            EntryKind::Directory => cmd::DIRECTORY,
            EntryKind::SoftLink => cmd::SOFT_LINK,
            EntryKind::HardLink => cmd::HARD_LINK,
            EntryKind::Special => cmd::SPECIAL,
        }
    }

    /// Kinds whose content is stored under a datapath.
    pub fn carries_data(self) -> bool {
        match self {
            EntryKind::File
            | EntryKind::Metadata
            | EntryKind::Vss
            | EntryKind::VssTerminator
            | EntryKind::Encrypted(_) => true,
            EntryKind::Directory
            | EntryKind::SoftLink
            | EntryKind::HardLink
            | EntryKind::Special => false,
        }
    }

    pub fn is_link(self) -> bool {
        matches!(self, EntryKind::SoftLink | EntryKind::HardLink)
    }

    pub fn is_encrypted(self) -> bool {
        matches!(self, EntryKind::Encrypted(_))
    }

    pub fn label(self) -> &'static str {
        match self {
            EntryKind::File => "files",
            EntryKind::Metadata => "meta_data",
            EntryKind::Vss => "vss_headers",
            EntryKind::VssTerminator => "vss_footers",
            EntryKind::Encrypted(EncryptedKind::File) => "files_encrypted",
            EntryKind::Encrypted(EncryptedKind::Metadata) => "meta_data_encrypted",
            EntryKind::Encrypted(EncryptedKind::EfsFile) => "efs_files",
            EntryKind::Encrypted(EncryptedKind::Vss) => "vss_headers_encrypted",
            EntryKind::Encrypted(EncryptedKind::VssTerminator) => "vss_footers_encrypted",
            EntryKind::Directory => "directories",
            EntryKind::SoftLink => "soft_links",
            EntryKind::HardLink => "hard_links",
            EntryKind::Special => "special_files",
        }
    }
}

/// Stat-equivalent attributes. The raw record text is kept so it can be
/// forwarded to the peer untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attributes {
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub size: u64,
    pub mtime: i64,
    /// Compression level used when the object was stored; negative means unknown
    pub compression: i32,
    raw: String,
}

impl Attributes {
    /// `<mode-octal> <uid> <gid> <size> <mtime> <compression>`
    pub fn parse(raw: &str) -> Option<Self> {
        let mut fields = raw.split_ascii_whitespace();
        let mode = u32::from_str_radix(fields.next()?, 8).ok()?;
        let uid = fields.next()?.parse().ok()?;
        let gid = fields.next()?.parse().ok()?;
        let size = fields.next()?.parse().ok()?;
        let mtime = fields.next()?.parse().ok()?;
        let compression = fields.next()?.parse().ok()?;
        if fields.next().is_some() {
            return None;
        }
        Some(Self {
            mode,
            uid,
            gid,
            size,
            mtime,
            compression,
            raw: raw.to_string(),
        })
    }

    pub fn encode(mode: u32, uid: u32, gid: u32, size: u64, mtime: i64, compression: i32) -> String {
        format!("{:o} {} {} {} {} {}", mode, uid, gid, size, mtime, compression)
    }

    pub fn is_dir(&self) -> bool {
        self.mode & S_IFMT == S_IFDIR
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }
}

/// `<decimal-size>[:<hex-md5>]` trailing every data-carrying entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndMarker {
    pub size: u64,
    pub checksum: Option<String>,
}

impl EndMarker {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.rsplit_once(':') {
            Some((size, sum)) => {
                let sum = sum.trim();
                Some(Self {
                    size: size.parse().ok()?,
                    checksum: (!sum.is_empty()).then(|| sum.to_ascii_lowercase()),
                })
            }
            None => Some(Self {
                size: raw.parse().ok()?,
                checksum: None,
            }),
        }
    }
}

impl fmt::Display for EndMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.checksum {
            Some(sum) => write!(f, "{}:{}", self.size, sum),
            None => write!(f, "{}", self.size),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub kind: EntryKind,
    pub path: EntryPath,
    pub attributes: Attributes,
    pub link_target: Option<EntryPath>,
    pub datapath: Option<Datapath>,
    pub end: Option<EndMarker>,
}

impl ManifestEntry {
    /// Directories, and any entry whose attributes describe a directory
    /// (metadata attached to one), are restored after their contents.
    pub fn is_directory(&self) -> bool {
        self.kind == EntryKind::Directory || self.attributes.is_dir()
    }

    /// Size declared in the end marker, zero when absent.
    pub fn declared_size(&self) -> u64 {
        self.end.as_ref().map(|e| e.size).unwrap_or(0)
    }
}
