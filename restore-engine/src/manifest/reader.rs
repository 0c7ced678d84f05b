//! Sequential decoder for a generation's gzip-compressed manifest.
//!
//! Each entry is a short run of records:
//! `[t datapath] r attributes <kind> path [<kind> link-target] [x end-marker]`.

use crate::manifest::entry::{Attributes, EndMarker, EntryKind, ManifestEntry};
use crate::manifest::path::EntryPath;
use crate::manifest::record::{cmd, Record};
use crate::storage::Datapath;
use crate::utils::pathcmp::pathcmp;
use crate::utils::{RestoreError, Result};
use flate2::read::GzDecoder;
use std::cmp::Ordering;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

/// Forward-only and single-pass: the underlying stream cannot be rewound.
pub struct ManifestReader<R> {
    reader: R,
    records: u64,
    last_path: Option<EntryPath>,
}

impl ManifestReader<BufReader<GzDecoder<File>>> {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(GzDecoder::new(file))))
    }
}

impl<R: BufRead> ManifestReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            records: 0,
            last_path: None,
        }
    }

    /// Number of records consumed so far.
    pub fn records_read(&self) -> u64 {
        self.records
    }

    /// Next entry, or `None` at the end of the manifest.
    pub fn next_entry(&mut self) -> Result<Option<ManifestEntry>> {
        let mut record = match self.read_record()? {
            Some(record) => record,
            None => return Ok(None),
        };

        let mut datapath = None;
        if record.cmd == cmd::DATAPATH {
            let token = self.text(&record)?;
            datapath = Some(
                Datapath::parse(token)
                    .ok_or_else(|| self.corrupt(format!("invalid datapath '{}'", token)))?,
            );
            record = self.require("attributes")?;
        }

        if record.cmd != cmd::ATTRIBUTES {
            return Err(self.corrupt(format!(
                "expected attributes record, got '{}'",
                record.cmd as char
            )));
        }
        let raw_attrs = self.text(&record)?;
        let attributes = Attributes::parse(raw_attrs)
            .ok_or_else(|| self.corrupt(format!("unparseable attributes '{}'", raw_attrs)))?;

        let record = self.require("path")?;
        let kind = EntryKind::from_tag(record.cmd)
            .ok_or_else(|| self.corrupt(format!("unknown entry kind '{}'", record.cmd as char)))?;
        let path = EntryPath::from(record.data);

        let link_target = if kind.is_link() {
            let record = self.require("link target")?;
            if record.cmd != kind.tag() {
                return Err(self.corrupt(format!("missing link target for {}", path)));
            }
            Some(EntryPath::from(record.data))
        } else {
            None
        };

        let end = if kind.carries_data() {
            let record = self.require("end marker")?;
            if record.cmd != cmd::END_FILE {
                return Err(self.corrupt(format!("missing end marker for {}", path)));
            }
            let raw = self.text(&record)?;
            Some(
                EndMarker::parse(raw)
                    .ok_or_else(|| self.corrupt(format!("bad end marker '{}'", raw)))?,
            )
        } else {
            if datapath.is_some() {
                return Err(self.corrupt(format!("datapath on entry without data: {}", path)));
            }
            None
        };

        if let Some(last) = &self.last_path {
            if pathcmp(last, &path) == Ordering::Greater {
                return Err(self.corrupt(format!("{} sorts before {}", path, last)));
            }
        }
        self.last_path = Some(path.clone());

        Ok(Some(ManifestEntry {
            kind,
            path,
            attributes,
            link_target,
            datapath,
            end,
        }))
    }

    fn read_record(&mut self) -> Result<Option<Record>> {
        match Record::read_line(&mut self.reader) {
            Ok(Some(record)) => {
                self.records += 1;
                Ok(Some(record))
            }
            Ok(None) => Ok(None),
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::UnexpectedEof
                        | io::ErrorKind::InvalidData
                        | io::ErrorKind::InvalidInput
                ) =>
            {
                Err(self.corrupt(e.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn require(&mut self, what: &str) -> Result<Record> {
        self.read_record()?
            .ok_or_else(|| self.corrupt(format!("manifest ends where {} was expected", what)))
    }

    fn text<'a>(&self, record: &'a Record) -> Result<&'a str> {
        record
            .text()
            .ok_or_else(|| self.corrupt("record payload is not UTF-8"))
    }

    fn corrupt(&self, reason: impl Into<String>) -> RestoreError {
        RestoreError::corrupt(self.records, reason)
    }
}
