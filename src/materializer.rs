//! Collision-free task record writer.
//!
//! Renders a [`TaskRecord`] into the queue directory under
//! `task_<slug>[_<n>].md`. The content is staged in a temporary file in the
//! same directory and installed with `persist_noclobber`, so an existing
//! record is never overwritten, even if a name is claimed between the
//! existence check and the rename.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::classify::ActionClassifier;
use crate::models::{ItemPayload, TaskRecord};
use crate::{AppError, Result};

/// Extension of task record files.
pub const TASK_EXTENSION: &str = "md";

/// Maximum characters kept from a slug source.
pub const MAX_SLUG_CHARS: usize = 50;

/// Placeholder used when a slug source sanitizes to nothing.
pub const EMPTY_SLUG: &str = "no_subject";

const MAX_COLLISION_SUFFIX: u32 = 10_000;

/// Location of a freshly written task record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRecordHandle {
    /// Absolute path of the record.
    pub path: PathBuf,
    /// File name within the queue directory.
    pub file_name: String,
    /// Number of bytes written.
    pub bytes_written: usize,
}

/// Writes task records into a queue directory.
#[derive(Debug, Clone)]
pub struct TaskMaterializer {
    queue_dir: PathBuf,
    inbox_label: String,
    classifier: ActionClassifier,
}

impl TaskMaterializer {
    /// Create a materializer for `queue_dir` with the default vocabulary.
    #[must_use]
    pub fn new(queue_dir: impl Into<PathBuf>) -> Self {
        Self {
            queue_dir: queue_dir.into(),
            inbox_label: "Inbox".into(),
            classifier: ActionClassifier::default(),
        }
    }

    /// Replace the keyword classifier.
    #[must_use]
    pub fn with_classifier(mut self, classifier: ActionClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Folder label used in `related_files` of file-review tasks.
    #[must_use]
    pub fn with_inbox_label(mut self, label: impl Into<String>) -> Self {
        self.inbox_label = label.into();
        self
    }

    /// Queue directory this materializer writes to.
    #[must_use]
    pub fn queue_dir(&self) -> &Path {
        &self.queue_dir
    }

    /// Render and write the task record for one item payload.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Materialization` if the record cannot be written.
    pub fn create(&self, payload: &ItemPayload) -> Result<TaskRecordHandle> {
        let now = Local::now();
        let (stem, record) = match payload {
            ItemPayload::File(file) => {
                let mut record = TaskRecord::file_review(file, &self.inbox_label, now);
                if let Some(text) = file.text() {
                    let verdict = self.classifier.classify(text);
                    record = record.with_flags(verdict.approval_needed, verdict.actions);
                }
                (format!("task_{}", slugify(&file.name)), record)
            }
            ItemPayload::Mail(msg) => {
                let verdict = self.classifier.classify(&msg.body);
                let record = TaskRecord::email_response(msg, now)
                    .with_flags(verdict.approval_needed, verdict.actions);
                (format!("task_email_{}", slugify(&msg.subject)), record)
            }
        };
        self.write_record(&stem, &record)
    }

    /// Write `record` as `<stem>[_<n>].md`, picking the first free name.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Materialization` on any I/O failure or when no
    /// free name is found.
    pub fn write_record(&self, stem: &str, record: &TaskRecord) -> Result<TaskRecordHandle> {
        fs::create_dir_all(&self.queue_dir).map_err(|err| {
            AppError::Materialization(format!(
                "failed to create queue directory {}: {err}",
                self.queue_dir.display()
            ))
        })?;

        let content = record.render();
        let mut tmp = NamedTempFile::new_in(&self.queue_dir).map_err(|err| {
            AppError::Materialization(format!("failed to create temporary file: {err}"))
        })?;
        tmp.write_all(content.as_bytes())
            .and_then(|()| tmp.flush())
            .map_err(|err| {
                AppError::Materialization(format!("failed to write temporary file: {err}"))
            })?;

        let mut counter = 0;
        while counter <= MAX_COLLISION_SUFFIX {
            let file_name = candidate_name(stem, counter);
            let path = self.queue_dir.join(&file_name);
            counter += 1;

            if path.exists() {
                continue;
            }
            match tmp.persist_noclobber(&path) {
                Ok(_) => {
                    info!(file = %file_name, kind = ?record.kind, "task record created");
                    return Ok(TaskRecordHandle {
                        path,
                        file_name,
                        bytes_written: content.len(),
                    });
                }
                Err(err) if err.error.kind() == ErrorKind::AlreadyExists => {
                    debug!(file = %file_name, "task name claimed concurrently, retrying");
                    tmp = err.file;
                }
                Err(err) => {
                    return Err(AppError::Materialization(format!(
                        "failed to persist {}: {}",
                        path.display(),
                        err.error
                    )));
                }
            }
        }

        Err(AppError::Materialization(format!(
            "no free task name for {stem} after {MAX_COLLISION_SUFFIX} attempts"
        )))
    }
}

/// Sanitize `source` into a filename-safe slug.
///
/// Letters and digits in any script, space, `_` and `-` are kept; everything
/// else becomes `_`.
/// The result is trimmed and bounded to [`MAX_SLUG_CHARS`]; an empty
/// result yields [`EMPTY_SLUG`].
#[must_use]
pub fn slugify(source: &str) -> String {
    let sanitized: String = source
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, ' ' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let bounded: String = sanitized.trim().chars().take(MAX_SLUG_CHARS).collect();
    let bounded = bounded.trim_end();
    if bounded.is_empty() {
        EMPTY_SLUG.to_owned()
    } else {
        bounded.to_owned()
    }
}

fn candidate_name(stem: &str, counter: u32) -> String {
    if counter == 0 {
        format!("{stem}.{TASK_EXTENSION}")
    } else {
        format!("{stem}_{counter}.{TASK_EXTENSION}")
    }
}
