//! One restore (or verify) of a backup generation to a connected peer.

use crate::config::Config;
use crate::manifest::{ManifestEntry, ManifestReader};
use crate::protocol::frame::{RESTORE_END, RESTORE_END_OK};
use crate::protocol::{Frame, Peer};
use crate::restore::chain::{self, NotFound};
use crate::restore::counters::{Counters, SessionReport};
use crate::restore::dirbuf::DirectoryOrderBuffer;
use crate::restore::filter::RestoreFilter;
use crate::restore::reconstruct::{reconstruct, ReconstructError, ScratchSpace};
use crate::restore::transmit::{self, TransmitError, WireOptions};
use crate::restore::Mode;
use crate::storage::{Compression, GenerationChain};
use crate::utils::{EntryWarning, RestoreError, Result};
use chrono::Utc;
use std::path::PathBuf;
use tracing::{debug, error, info, info_span, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct SessionParams {
    /// Position of the generation to restore in the chain
    pub target: usize,
    pub filter: RestoreFilter,
    pub mode: Mode,
    pub wire: WireOptions,
    pub scratch_dir: PathBuf,
    pub write_stats: bool,
}

pub struct RestoreSession {
    id: Uuid,
    chain: GenerationChain,
    params: SessionParams,
    scratch: ScratchSpace,
    counters: Counters,
}

impl RestoreSession {
    pub fn new(chain: GenerationChain, params: SessionParams) -> Result<Self> {
        if params.target >= chain.len() {
            return Err(RestoreError::Storage(format!(
                "generation position {} out of range ({} generations)",
                params.target,
                chain.len()
            )));
        }
        let scratch = ScratchSpace::new(&params.scratch_dir);
        Ok(Self {
            id: Uuid::new_v4(),
            chain,
            params,
            scratch,
            counters: Counters::default(),
        })
    }

    /// Session for backup number `generation` (newest when `None`), with
    /// wire and scratch settings taken from `config`.
    pub fn from_config(
        config: &Config,
        chain: GenerationChain,
        generation: Option<u64>,
        filter: RestoreFilter,
        mode: Mode,
    ) -> Result<Self> {
        let target = chain.position(generation)?;
        let params = SessionParams {
            target,
            filter,
            mode,
            wire: WireOptions {
                compression: config.wire_compression()?,
                level: config.restore.compression_level,
                chunk_size: config.restore.chunk_size,
            },
            scratch_dir: config.scratch_dir().to_path_buf(),
            write_stats: config.restore.write_stats,
        };
        Self::new(chain, params)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Drive the whole session. Per-entry problems are reported to the peer
    /// and counted; any error returned here means the session was aborted.
    pub fn run<P: Peer>(mut self, peer: &mut P) -> Result<SessionReport> {
        let generation = &self.chain[self.params.target];
        let span = info_span!("restore", session = %self.id, generation = generation.index);
        let _enter = span.enter();

        let started = Utc::now();
        let generation_dir = generation.root.clone();
        info!(
            "Starting {:?} of generation {}",
            self.params.mode,
            generation.name()
        );

        let outcome = self
            .restore_entries(peer)
            .and_then(|()| self.scratch.clear());
        if let Err(e) = outcome {
            error!("Restore aborted: {}", e);
            let _ = self.scratch.clear();
            return Err(e);
        }

        let report = SessionReport {
            session_id: self.id,
            mode: self.params.mode,
            generation: self.chain[self.params.target].index,
            started,
            finished: Utc::now(),
            counters: self.counters,
        };
        report.log_summary();

        if self.params.write_stats {
            match report.write_stats(&generation_dir) {
                Ok(path) => debug!("Wrote {}", path.display()),
                Err(e) => warn!("Failed to write session statistics: {}", e),
            }
        }
        Ok(report)
    }

    fn restore_entries<P: Peer>(&mut self, peer: &mut P) -> Result<()> {
        let manifest = self.chain[self.params.target].manifest_path();
        let mut reader = ManifestReader::open(&manifest)?;
        let mut directories = DirectoryOrderBuffer::new();

        loop {
            // the peer's frames are handled before a bad manifest aborts us
            self.drain(peer)?;
            let Some(entry) = reader.next_entry()? else {
                break;
            };
            if !self.params.filter.accepts(&entry.path) {
                continue;
            }
            for ready in directories.observe(entry)? {
                self.dispatch(peer, ready)?;
            }
        }
        debug!("Manifest exhausted after {} records", reader.records_read());

        for ready in directories.flush() {
            self.dispatch(peer, ready)?;
        }
        self.finish(peer)
    }

    /// Consume whatever control frames the peer has queued. Never waits.
    fn drain<P: Peer>(&mut self, peer: &mut P) -> Result<()> {
        while let Some(frame) = peer.try_recv()? {
            self.control_frame(frame)?;
        }
        Ok(())
    }

    fn control_frame(&mut self, frame: Frame) -> Result<()> {
        match frame {
            Frame::Warning(text) => {
                warn!("Peer warning: {}", text);
                self.counters.peer_warnings += 1;
                Ok(())
            }
            // the loop has already moved past the file the peer gave up on
            Frame::Interrupt(path) => {
                debug!("Peer interrupted {}", path);
                Ok(())
            }
            other => Err(RestoreError::ProtocolViolation(format!(
                "unexpected {}",
                other.describe()
            ))),
        }
    }

    fn dispatch<P: Peer>(&mut self, peer: &mut P, entry: ManifestEntry) -> Result<()> {
        if entry.kind.carries_data() {
            return self.dispatch_data(peer, entry);
        }

        if self.params.mode == Mode::Restore {
            transmit::send_header(peer, &entry)?;
            peer.send(Frame::Path {
                kind: entry.kind,
                path: entry.path.clone(),
            })?;
            if let Some(target) = &entry.link_target {
                peer.send(Frame::Path {
                    kind: entry.kind,
                    path: target.clone(),
                })?;
            }
        }
        self.counters.add_record(entry.kind.label());
        Ok(())
    }

    fn dispatch_data<P: Peer>(&mut self, peer: &mut P, entry: ManifestEntry) -> Result<()> {
        let Some(datapath) = entry.datapath.as_ref() else {
            return self.report(
                peer,
                EntryWarning::MissingDatapath {
                    kind: entry.kind.tag() as char,
                    path: entry.path.to_string(),
                },
            );
        };

        let resolution = match chain::resolve(&self.chain, self.params.target, datapath) {
            Ok(resolution) => resolution,
            Err(NotFound) => {
                return self.report(
                    peer,
                    EntryWarning::BaseNotFound {
                        path: entry.path.to_string(),
                        datapath: datapath.to_string(),
                    },
                )
            }
        };

        let compression = Compression::for_object(entry.attributes.compression, datapath.as_str());
        let content = match reconstruct(&mut self.scratch, &resolution, compression) {
            Ok(content) => content,
            Err(ReconstructError::Fatal(e)) => return Err(e),
            Err(e) => {
                return self.report(
                    peer,
                    EntryWarning::ReconstructFailed {
                        path: entry.path.to_string(),
                        reason: e.to_string(),
                    },
                )
            }
        };
        debug!(
            "{} from generation {} with {} deltas",
            entry.path,
            self.chain[resolution.base].index,
            content.patches_applied
        );

        match self.params.mode {
            Mode::Restore => match transmit::send(peer, &entry, &content, self.params.wire) {
                Ok(sent) => self.counters.sent_bytes += sent,
                Err(TransmitError::Entry(warning)) => return self.report(peer, warning),
                Err(TransmitError::Fatal(e)) => return Err(e),
            },
            Mode::Verify => match transmit::verify(&entry, &content) {
                Ok(()) => peer.send(Frame::Path {
                    kind: entry.kind,
                    path: entry.path.clone(),
                })?,
                Err(warning) => return self.report(peer, warning),
            },
        }
        self.counters.add_record(entry.kind.label());
        self.counters.bytes += entry.declared_size();

        if let Some(found) = resolution.found_elsewhere {
            let advisory = EntryWarning::FoundInOtherGeneration {
                path: entry.path.to_string(),
                generation: self.chain[found].name(),
            };
            info!("{}", advisory);
            peer.send(Frame::Warning(advisory.to_string()))?;
        }
        Ok(())
    }

    /// Log a per-entry problem, count it and pass it on to the peer.
    fn report<P: Peer>(&mut self, peer: &mut P, warning: EntryWarning) -> Result<()> {
        warn!("{}", warning);
        self.counters.warnings += 1;
        peer.send(Frame::Warning(warning.to_string()))
    }

    fn finish<P: Peer>(&mut self, peer: &mut P) -> Result<()> {
        peer.send(Frame::Gen(RESTORE_END.to_string()))?;
        loop {
            match peer.recv()? {
                Frame::Gen(text) if text == RESTORE_END_OK => return Ok(()),
                frame => self.control_frame(frame)?,
            }
        }
    }
}
