//! Session counters and the end-of-session summary.

use crate::restore::Mode;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Counters {
    /// Entries handled, keyed by entry kind label
    pub records: BTreeMap<&'static str, u64>,
    /// Declared size of files restored or verified
    pub bytes: u64,
    /// Bytes put on the wire
    pub sent_bytes: u64,
    /// Per-entry problems reported to the peer
    pub warnings: u64,
    /// Warnings the peer reported to us
    pub peer_warnings: u64,
}

impl Counters {
    pub fn add_record(&mut self, label: &'static str) {
        *self.records.entry(label).or_insert(0) += 1;
    }

    pub fn record_count(&self, label: &str) -> u64 {
        self.records.get(label).copied().unwrap_or(0)
    }

    pub fn total_records(&self) -> u64 {
        self.records.values().sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Clean,
    CompletedWithWarnings,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub session_id: Uuid,
    pub mode: Mode,
    pub generation: u64,
    pub started: DateTime<Utc>,
    pub finished: DateTime<Utc>,
    pub counters: Counters,
}

impl SessionReport {
    pub fn status(&self) -> SessionStatus {
        if self.counters.warnings > 0 || self.counters.peer_warnings > 0 {
            SessionStatus::CompletedWithWarnings
        } else {
            SessionStatus::Clean
        }
    }

    pub fn elapsed(&self) -> Duration {
        (self.finished - self.started).to_std().unwrap_or_default()
    }

    pub fn log_summary(&self) {
        let counters = &self.counters;
        for (label, count) in &counters.records {
            info!("{:>22}: {}", label, count);
        }
        info!(
            "{} {} entries ({}), {} sent, {} warnings, {} from peer, in {}",
            match self.mode {
                Mode::Restore => "Restored",
                Mode::Verify => "Verified",
            },
            counters.total_records(),
            format_bytes(counters.bytes),
            format_bytes(counters.sent_bytes),
            counters.warnings,
            counters.peer_warnings,
            format_duration(self.elapsed().as_secs())
        );
    }

    /// `<generation_dir>/restorestats` or `<generation_dir>/verifystats`
    pub fn stats_path(&self, generation_dir: &Path) -> PathBuf {
        generation_dir.join(match self.mode {
            Mode::Restore => "restorestats",
            Mode::Verify => "verifystats",
        })
    }

    pub fn write_stats(&self, generation_dir: &Path) -> std::io::Result<PathBuf> {
        let path = self.stats_path(generation_dir);
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)?;
        Ok(path)
    }
}

/// Format bytes as human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_index])
}

/// Format duration as human-readable string
pub fn format_duration(seconds: u64) -> String {
    if seconds < 60 {
        format!("{}s", seconds)
    } else if seconds < 3600 {
        format!("{}m {}s", seconds / 60, seconds % 60)
    } else {
        format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn report(counters: Counters) -> SessionReport {
        let now = Utc::now();
        SessionReport {
            session_id: Uuid::new_v4(),
            mode: Mode::Verify,
            generation: 3,
            started: now,
            finished: now,
            counters,
        }
    }

    #[test]
    fn test_record_counts() {
        let mut counters = Counters::default();
        counters.add_record("files");
        counters.add_record("files");
        counters.add_record("directories");

        assert_eq!(counters.record_count("files"), 2);
        assert_eq!(counters.record_count("soft_links"), 0);
        assert_eq!(counters.total_records(), 3);
    }

    #[test]
    fn test_status() {
        assert_eq!(report(Counters::default()).status(), SessionStatus::Clean);

        let warned = Counters {
            warnings: 1,
            ..Counters::default()
        };
        assert_eq!(report(warned).status(), SessionStatus::CompletedWithWarnings);

        let peer_warned = Counters {
            peer_warnings: 2,
            ..Counters::default()
        };
        assert_eq!(report(peer_warned).status(), SessionStatus::CompletedWithWarnings);
    }

    #[test]
    fn test_write_stats() -> std::io::Result<()> {
        let dir = TempDir::new()?;
        let mut counters = Counters::default();
        counters.add_record("files");
        counters.bytes = 4096;

        let path = report(counters).write_stats(dir.path())?;

        assert_eq!(path, dir.path().join("verifystats"));
        let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
        assert_eq!(json["mode"], "verify");
        assert_eq!(json["counters"]["bytes"], 4096);
        assert_eq!(json["counters"]["records"]["files"], 1);
        Ok(())
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0.00 B");
        assert_eq!(format_bytes(1023), "1023.00 B");
        assert_eq!(format_bytes(1024), "1.00 KB");
        assert_eq!(format_bytes(1024 * 1024 * 1024), "1.00 GB");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(30), "30s");
        assert_eq!(format_duration(90), "1m 30s");
        assert_eq!(format_duration(3665), "1h 1m");
    }
}
