//! Operational logs: per-component error logs, the shared activity log,
//! and size-based rotation of both.

pub mod activity;
pub mod error_log;
pub mod rotation;

use std::path::Path;

use tracing::warn;

pub use activity::{ActivityLog, ActivityRow};
pub use error_log::ErrorLog;
pub use rotation::{LogRotator, LogTarget, RotationOutcome, RotationReport};

/// Shared activity log file name.
pub const SYSTEM_LOG: &str = "System_Log.md";
/// File watcher error log file name.
pub const FILE_WATCHER_ERRORS: &str = "watcher_errors.log";
/// Mail watcher error log file name.
pub const MAIL_WATCHER_ERRORS: &str = "mail_watcher_errors.log";
/// Scheduler error log file name.
pub const SCHEDULER_ERRORS: &str = "scheduler_errors.log";

/// Header written into a fresh error log.
#[must_use]
pub fn error_log_header(component: &str) -> String {
    format!("# {component} Error Log\n# This file records errors from the {component}.\n\n")
}

/// Rotation targets for every log this crate writes under `logs_dir`.
#[must_use]
pub fn default_targets(logs_dir: &Path) -> Vec<LogTarget> {
    vec![
        LogTarget::new(logs_dir.join(SYSTEM_LOG), activity::default_header()),
        LogTarget::new(
            logs_dir.join(FILE_WATCHER_ERRORS),
            error_log_header("file watcher"),
        ),
        LogTarget::new(
            logs_dir.join(MAIL_WATCHER_ERRORS),
            error_log_header("mail watcher"),
        ),
        LogTarget::new(
            logs_dir.join(SCHEDULER_ERRORS),
            error_log_header("scheduler"),
        ),
    ]
}

/// Error log plus activity log handle for one component.
#[derive(Debug, Clone)]
pub struct OperationalLog {
    errors: ErrorLog,
    activity: ActivityLog,
}

impl OperationalLog {
    /// Component log writing errors to `logs_dir/<error_file>` and
    /// activity to `logs_dir/System_Log.md`.
    #[must_use]
    pub fn new(logs_dir: &Path, error_file: &str) -> Self {
        Self {
            errors: ErrorLog::new(logs_dir.join(error_file)),
            activity: ActivityLog::new(logs_dir.join(SYSTEM_LOG)),
        }
    }

    /// Activity log handle.
    #[must_use]
    pub fn activity(&self) -> &ActivityLog {
        &self.activity
    }

    /// Report an error to `tracing` and the error log.
    pub fn error(&self, message: &str) {
        self.errors.report(message);
    }

    /// Record an activity row; failures go to the error log.
    pub fn record(&self, action: &str, details: &str) {
        if let Err(err) = self.activity.record(ActivityRow::now(action, details)) {
            warn!(%err, action, "could not update activity log");
            self.errors
                .report(&format!("could not update activity log: {err}"));
        }
    }
}
