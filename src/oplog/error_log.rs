//! Append-only, line-oriented error log.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::error;

use crate::Result;

/// Appends `[YYYY-MM-DD HH:MM:SS] ERROR: <message>` lines to a file.
#[derive(Debug, Clone)]
pub struct ErrorLog {
    path: PathBuf,
}

impl ErrorLog {
    /// Error log stored at `path`; the file and its directory are created
    /// on first append.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Log file location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one timestamped error line.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if the directory or file cannot be written.
    pub fn append(&self, message: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let stamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "[{stamp}] ERROR: {}", single_line(message))?;
        Ok(())
    }

    /// Emit `message` through `tracing` and append it to the file.
    ///
    /// A failed append is reported through `tracing` only.
    pub fn report(&self, message: &str) {
        error!("{message}");
        if let Err(err) = self.append(message) {
            error!(
                log = %self.path.display(),
                %err,
                original = message,
                "could not write to error log"
            );
        }
    }
}

fn single_line(message: &str) -> String {
    message.replace(['\r', '\n'], " ")
}
