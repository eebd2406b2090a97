//! Decision audit log.
//!
//! Every processed submission can be recorded as one JSON object per line.
//! The sink rotates by size and keeps a bounded set of numbered backups;
//! the newest backup can optionally be gzipped.  A failing sink never fails
//! the submission; write errors are counted and logged.

use crate::validator::Verdict;
use crate::FormId;
use chrono::Utc;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::Deserialize;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Sink settings, usually deserialized as part of [`crate::FilterConfig`].
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionLogConfig {
    /// Path of the live log file.
    pub path: String,
    /// Rotate once the live file reaches this size.  `None` disables
    /// rotation.
    #[serde(default)]
    pub max_bytes: Option<u64>,
    /// Number of rotated backups to keep.  `0` truncates in place.
    #[serde(default = "default_keep")]
    pub keep: usize,
    /// Gzip the newest backup after each rotation.
    #[serde(default)]
    pub compress: bool,
}

fn default_keep() -> usize {
    1
}

/// Append-only file that rotates itself by size.
///
/// Backups are numbered `decisions.1` (newest) through `decisions.N`
/// (oldest); with compression enabled the newest backup becomes
/// `decisions.1.gz` instead.
pub struct RotatingLog {
    path: PathBuf,
    file: fs::File,
    max_bytes: Option<u64>,
    keep: usize,
    compress: bool,
}

impl RotatingLog {
    pub fn open(config: &DecisionLogConfig) -> io::Result<Self> {
        let path = PathBuf::from(&config.path);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file,
            max_bytes: config.max_bytes,
            keep: config.keep,
            compress: config.compress,
        })
    }

    /// Append one line, rotating first when the live file is full.
    pub fn append_line(&mut self, line: &str) -> io::Result<()> {
        if self.due_for_rotation() {
            self.rotate()?;
        }
        writeln!(self.file, "{line}")
    }

    pub fn current_size(&self) -> u64 {
        self.file.metadata().map(|m| m.len()).unwrap_or(0)
    }

    fn due_for_rotation(&self) -> bool {
        let Some(limit) = self.max_bytes else {
            return false;
        };
        self.file
            .metadata()
            .map(|m| m.len() >= limit)
            .unwrap_or(false)
    }

    fn rotate(&mut self) -> io::Result<()> {
        if self.keep > 0 {
            // Shift older backups out of the way, oldest first.  A failed
            // rename leaves a gap rather than stopping the rotation.
            for idx in (1..=self.keep).rev() {
                let from = if idx == 1 {
                    self.path.clone()
                } else {
                    backup_path(&self.path, idx - 1)
                };
                let _ = fs::rename(&from, backup_path(&self.path, idx));
            }
            if self.compress {
                let _ = self.compress_newest_backup();
            }
        }
        self.file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)?;
        Ok(())
    }

    fn compress_newest_backup(&self) -> io::Result<()> {
        let newest = backup_path(&self.path, 1);
        let raw = fs::read(&newest)?;
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&raw)?;
        let compressed = encoder.finish()?;
        fs::write(self.path.with_extension("1.gz"), compressed)?;
        fs::remove_file(&newest)
    }
}

/// `decisions.log` rotates to `decisions.1`, `decisions.2`, ...
fn backup_path(base: &Path, idx: usize) -> PathBuf {
    base.with_extension(format!("{idx}"))
}

/// Shared handle to the decision sink.  Cloning shares the underlying file
/// and counters.
#[derive(Clone)]
pub struct DecisionLog {
    writer: Arc<Mutex<RotatingLog>>,
    lines_total: Arc<AtomicU64>,
    write_errors_total: Arc<AtomicU64>,
    file_size_bytes: Arc<AtomicU64>,
}

impl DecisionLog {
    pub fn open(config: &DecisionLogConfig) -> io::Result<Self> {
        let writer = RotatingLog::open(config)?;
        Ok(Self {
            writer: Arc::new(Mutex::new(writer)),
            lines_total: Arc::new(AtomicU64::new(0)),
            write_errors_total: Arc::new(AtomicU64::new(0)),
            file_size_bytes: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Record one decision.  Failures are contained: the error is logged
    /// and counted, and the caller's verdict stands.
    pub fn record(&self, form: FormId, verdict: &Verdict, latency_ms: u128) {
        let (outcome, domain, reason) = match verdict {
            Verdict::Accept => ("accept", None, None),
            Verdict::Reject { domain, reason } => {
                ("reject", Some(domain.as_str()), Some(reason.as_str()))
            }
            Verdict::ConfigError { reason } => ("configError", None, Some(reason.as_str())),
        };
        let line = serde_json::json!({
            "schemaVersion": 1,
            "ts": Utc::now().to_rfc3339(),
            "formId": form,
            "outcome": outcome,
            "domain": domain,
            "reason": reason,
            "latencyMs": latency_ms as u64,
        });
        self.write_line(&line.to_string());
    }

    fn write_line(&self, line: &str) {
        let mut writer = self
            .writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match writer.append_line(line) {
            Ok(()) => {
                self.lines_total.fetch_add(1, Ordering::Relaxed);
                self.file_size_bytes
                    .store(writer.current_size(), Ordering::Relaxed);
            }
            Err(e) => {
                self.write_errors_total.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(error=%e, "failed to write decision record");
            }
        }
    }

    pub fn lines_total(&self) -> u64 {
        self.lines_total.load(Ordering::Relaxed)
    }

    pub fn write_errors_total(&self) -> u64 {
        self.write_errors_total.load(Ordering::Relaxed)
    }

    /// Size of the live file after the most recent write.
    pub fn file_size_bytes(&self) -> u64 {
        self.file_size_bytes.load(Ordering::Relaxed)
    }
}
