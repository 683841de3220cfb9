//! Size-bounded log rotation.
//!
//! A file at or above the threshold is renamed to
//! `<stem>_<YYYY-MM-DD>[_<n>]<.ext>` and replaced by a file holding only its
//! header. The fresh file is staged before the rename; if it cannot be
//! installed the archive is moved back, so a failed rotation leaves the
//! original file where it was.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};
use serde::Deserialize;
use tempfile::{NamedTempFile, PersistError};
use tracing::{error, info, info_span, warn};

use crate::{AppError, Result};

/// Default rotation threshold (1 MiB).
pub const DEFAULT_MAX_BYTES: u64 = 1024 * 1024;

const MAX_ARCHIVE_SUFFIX: u32 = 10_000;

/// A log file and the header it is recreated with.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct LogTarget {
    /// Log file path.
    pub path: PathBuf,
    /// Content of the fresh file written after rotation.
    #[serde(default)]
    pub header: String,
}

impl LogTarget {
    /// Pair a path with its header template.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, header: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            header: header.into(),
        }
    }
}

/// Result of checking one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RotationOutcome {
    /// Below threshold (absent files count as size 0).
    Kept {
        /// Current size in bytes.
        size: u64,
    },
    /// Archived and recreated.
    Rotated {
        /// Path of the archive holding the prior content.
        archive: PathBuf,
        /// Size of the archived content in bytes.
        size: u64,
    },
}

/// Summary of one rotation pass.
#[derive(Debug, Default)]
pub struct RotationReport {
    /// Number of targets checked.
    pub checked: usize,
    /// Archives produced, one per rotated target.
    pub rotated: Vec<PathBuf>,
    /// Targets whose rotation failed, with the failure message.
    pub failed: Vec<(PathBuf, String)>,
}

/// Checks a fixed list of log files against a size threshold.
#[derive(Debug, Clone)]
pub struct LogRotator {
    max_bytes: u64,
    targets: Vec<LogTarget>,
}

impl LogRotator {
    /// Rotator over `targets` with the given threshold.
    #[must_use]
    pub fn new(max_bytes: u64, targets: Vec<LogTarget>) -> Self {
        Self { max_bytes, targets }
    }

    /// Check every target, rotating those at or above the threshold.
    ///
    /// Failures are collected in the report and never abort the pass.
    pub fn run(&self) -> RotationReport {
        let _span = info_span!("log_rotation", targets = self.targets.len()).entered();
        info!(limit = %format_size(self.max_bytes), "checking log files");

        let today = Local::now().date_naive();
        let mut report = RotationReport::default();
        for target in &self.targets {
            report.checked += 1;
            match self.rotate(target, today) {
                Ok(RotationOutcome::Rotated { archive, .. }) => report.rotated.push(archive),
                Ok(RotationOutcome::Kept { .. }) => {}
                Err(err) => {
                    error!(path = %target.path.display(), %err, "rotation failed");
                    report.failed.push((target.path.clone(), err.to_string()));
                }
            }
        }

        if report.rotated.is_empty() {
            info!("no rotation needed");
        } else {
            info!(rotated = report.rotated.len(), "log rotation complete");
        }
        report
    }

    /// Rotate a single target using `date` for the archive name.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Rotation` if the size cannot be read, the archive
    /// rename fails, or the fresh file cannot be installed.
    pub fn rotate(&self, target: &LogTarget, date: NaiveDate) -> Result<RotationOutcome> {
        self.rotate_with(target, date, |fresh, path| fresh.persist(path).map(drop))
    }

    fn rotate_with<F>(
        &self,
        target: &LogTarget,
        date: NaiveDate,
        install: F,
    ) -> Result<RotationOutcome>
    where
        F: FnOnce(NamedTempFile, &Path) -> std::result::Result<(), PersistError>,
    {
        let size = file_size(&target.path)?;
        let name = target.path.display();
        if size < self.max_bytes {
            info!(file = %name, size = %format_size(size), "size ok");
            return Ok(RotationOutcome::Kept { size });
        }

        info!(file = %name, size = %format_size(size), "exceeds limit, rotating");
        let parent = target
            .path
            .parent()
            .ok_or_else(|| AppError::Rotation(format!("{name} has no parent directory")))?;

        let mut fresh = NamedTempFile::new_in(parent)
            .map_err(|err| AppError::Rotation(format!("failed to stage fresh {name}: {err}")))?;
        fresh
            .write_all(target.header.as_bytes())
            .and_then(|()| fresh.flush())
            .map_err(|err| AppError::Rotation(format!("failed to stage fresh {name}: {err}")))?;

        let archive = archive_path(&target.path, date)?;
        fs::rename(&target.path, &archive)
            .map_err(|err| AppError::Rotation(format!("failed to archive {name}: {err}")))?;

        if let Err(err) = install(fresh, &target.path) {
            warn!(file = %name, error = %err.error, "fresh file install failed, restoring");
            if let Err(restore_err) = fs::rename(&archive, &target.path) {
                return Err(AppError::Rotation(format!(
                    "failed to recreate {name} ({}) and restore from {}: {restore_err}",
                    err.error,
                    archive.display()
                )));
            }
            return Err(AppError::Rotation(format!(
                "failed to recreate {name}: {}",
                err.error
            )));
        }

        info!(file = %name, archive = %archive.display(), "rotated");
        Ok(RotationOutcome::Rotated { archive, size })
    }
}

fn file_size(path: &Path) -> Result<u64> {
    match fs::metadata(path) {
        Ok(meta) => Ok(meta.len()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(0),
        Err(err) => Err(AppError::Rotation(format!(
            "failed to stat {}: {err}",
            path.display()
        ))),
    }
}

/// First free `<stem>_<date>[_<n>]<.ext>` path next to `path`.
///
/// # Errors
///
/// Returns `AppError::Rotation` if the path has no file name or every
/// candidate is taken.
pub fn archive_path(path: &Path, date: NaiveDate) -> Result<PathBuf> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| AppError::Rotation(format!("{} has no file name", path.display())))?;
    let (stem, ext) = match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, format!(".{ext}")),
        _ => (file_name, String::new()),
    };
    let stamp = date.format("%Y-%m-%d");

    for counter in 0..=MAX_ARCHIVE_SUFFIX {
        let candidate = if counter == 0 {
            format!("{stem}_{stamp}{ext}")
        } else {
            format!("{stem}_{stamp}_{counter}{ext}")
        };
        let candidate = path.with_file_name(candidate);
        if !candidate.exists() {
            return Ok(candidate);
        }
    }
    Err(AppError::Rotation(format!(
        "no free archive name for {}",
        path.display()
    )))
}

/// Human-readable byte count (`bytes`, `KB`, `MB`).
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_size(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = 1024 * 1024;
    if bytes < KIB {
        format!("{bytes} bytes")
    } else if bytes < MIB {
        format!("{:.1} KB", bytes as f64 / KIB as f64)
    } else {
        format!("{:.2} MB", bytes as f64 / MIB as f64)
    }
}
