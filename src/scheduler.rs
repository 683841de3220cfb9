//! Periodic planning trigger.
//!
//! Each check counts pending task records in the queue. When work is waiting
//! and no plan task exists yet, exactly one plan task is written.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use chrono::Local;
use tracing::{info, info_span, Instrument};

use crate::materializer::{TaskMaterializer, TaskRecordHandle, TASK_EXTENSION};
use crate::models::{declared_kind, TaskKind, TaskRecord};
use crate::oplog::OperationalLog;
use crate::poll::{PollWorker, TickReport, WorkerFuture};
use crate::Result;

/// File name prefix of plan tasks.
pub const PLAN_PREFIX: &str = "task_generate_plan";

const PLAN_STAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// A queued record is a plan when its name carries the plan prefix and its
/// front matter, if any, declares `planning`.
fn is_plan(queue_dir: &Path, file_name: &str) -> bool {
    if !file_name.to_lowercase().starts_with(PLAN_PREFIX) {
        return false;
    }
    match fs::read_to_string(queue_dir.join(file_name)) {
        Ok(text) => declared_kind(&text).unwrap_or(TaskKind::Planning) == TaskKind::Planning,
        Err(_) => true,
    }
}

/// Result of one scheduler check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleOutcome {
    /// Queue empty.
    Idle,
    /// Work waiting, plan task already present.
    PlanPending {
        /// Task records in the queue.
        pending: usize,
    },
    /// A plan task was written.
    Created {
        /// Task records in the queue before the plan task was added.
        pending: usize,
        /// The new plan task.
        handle: TaskRecordHandle,
    },
}

/// Injects a plan task when the queue holds unplanned work.
#[derive(Debug, Clone)]
pub struct PlanScheduler {
    materializer: TaskMaterializer,
    log: OperationalLog,
    created: usize,
}

impl PlanScheduler {
    /// Scheduler writing plan tasks through `materializer`.
    #[must_use]
    pub fn new(materializer: TaskMaterializer, log: OperationalLog) -> Self {
        Self {
            materializer,
            log,
            created: 0,
        }
    }

    /// Task record file names in the queue; a missing queue is empty.
    fn task_names(&self) -> Result<Vec<String>> {
        let entries = match fs::read_dir(self.materializer.queue_dir()) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            let is_task = Path::new(&name)
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(TASK_EXTENSION));
            if is_task {
                names.push(name);
            }
        }
        Ok(names)
    }

    /// Number of task records waiting in the queue.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if the queue cannot be listed.
    pub fn count_pending(&self) -> Result<usize> {
        Ok(self.task_names()?.len())
    }

    /// Whether a plan task is already queued.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if the queue cannot be listed.
    pub fn plan_exists(&self) -> Result<bool> {
        let queue = self.materializer.queue_dir();
        Ok(self.task_names()?.iter().any(|name| is_plan(queue, name)))
    }

    /// Run one check.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue cannot be listed or the plan task
    /// cannot be written.
    pub fn check(&self) -> Result<ScheduleOutcome> {
        let names = self.task_names()?;
        let pending = names.len();
        if pending == 0 {
            return Ok(ScheduleOutcome::Idle);
        }
        let queue = self.materializer.queue_dir();
        if names.iter().any(|name| is_plan(queue, name)) {
            return Ok(ScheduleOutcome::PlanPending { pending });
        }

        let now = Local::now();
        let stem = format!("{PLAN_PREFIX}_{}", now.format(PLAN_STAMP_FORMAT));
        let handle = self
            .materializer
            .write_record(&stem, &TaskRecord::plan(pending, now))?;
        Ok(ScheduleOutcome::Created { pending, handle })
    }

    fn run_check(&mut self) -> Result<TickReport> {
        match self.check() {
            Ok(ScheduleOutcome::Idle) => {
                info!("no pending tasks");
                self.log.record("Scheduler Check", "No pending tasks found");
                Ok(TickReport::default())
            }
            Ok(ScheduleOutcome::PlanPending { pending }) => {
                info!(pending, "plan task already queued");
                self.log.record(
                    "Scheduler Check",
                    &format!("{pending} pending task(s), plan already queued"),
                );
                Ok(TickReport {
                    observed: pending,
                    ..TickReport::default()
                })
            }
            Ok(ScheduleOutcome::Created { pending, handle }) => {
                self.created += 1;
                self.log.record(
                    "Scheduler Task Created",
                    &format!("{} for {pending} pending task(s)", handle.file_name),
                );
                Ok(TickReport {
                    observed: pending,
                    created: 1,
                    failed: 0,
                })
            }
            Err(err) => {
                self.log.record("Scheduler Error", &err.to_string());
                Err(err)
            }
        }
    }
}

impl PollWorker for PlanScheduler {
    fn name(&self) -> &str {
        "Scheduler"
    }

    fn tick(&mut self) -> WorkerFuture<'_, TickReport> {
        let span = info_span!("scheduler_check", queue = %self.materializer.queue_dir().display());
        Box::pin(async move { self.run_check() }.instrument(span))
    }

    fn summary(&self) -> String {
        format!("created {} plan task(s) this session", self.created)
    }
}
