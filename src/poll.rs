//! Fixed-interval poll loop shared by every watcher and the scheduler.
//!
//! A [`PollLoop`] drives one [`PollWorker`] through
//! `Init → Running ⇄ Recovering → Stopped`. An error escaping a tick moves
//! the loop to `Recovering` for one fixed backoff sleep; only cancellation
//! stops it. Cancellation is observed before each tick and during sleeps,
//! never in the middle of a tick.

use std::fmt;
use std::fs;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::dedup::Deduplicator;
use crate::materializer::TaskMaterializer;
use crate::oplog::OperationalLog;
use crate::source::EventSource;
use crate::{AppError, Result};

/// Boxed future returned by worker operations.
pub type WorkerFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Loop lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Preparing directories and seeding.
    Init,
    /// Ticking on the normal interval.
    Running,
    /// Sleeping the backoff after a failed tick.
    Recovering,
    /// Terminal; reached only through cancellation.
    Stopped,
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::Running => "running",
            Self::Recovering => "recovering",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Outcome of one successful tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Items reported by the source (or task records counted).
    pub observed: usize,
    /// Task records written.
    pub created: usize,
    /// Items skipped after a fetch or write failure.
    pub failed: usize,
}

/// One unit of periodic work.
pub trait PollWorker: Send {
    /// Component name used in logs.
    fn name(&self) -> &str;

    /// One-time preparation before the first tick.
    ///
    /// # Errors
    ///
    /// Errors are logged; the loop proceeds in degraded mode.
    fn init(&mut self) -> WorkerFuture<'_, ()> {
        Box::pin(async { Ok(()) })
    }

    /// Perform one iteration.
    ///
    /// # Errors
    ///
    /// An error moves the loop to `Recovering`.
    fn tick(&mut self) -> WorkerFuture<'_, TickReport>;

    /// Summary line for the final log entry.
    fn summary(&self) -> String;
}

/// Interval and backoff for a loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopTiming {
    /// Sleep after a successful tick.
    pub interval: Duration,
    /// Sleep after a failed tick; longer than `interval`.
    pub backoff: Duration,
}

impl LoopTiming {
    /// Timing from whole seconds.
    #[must_use]
    pub fn from_secs(interval: u64, backoff: u64) -> Self {
        Self {
            interval: Duration::from_secs(interval),
            backoff: Duration::from_secs(backoff),
        }
    }
}

/// Counters returned when a loop stops.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoopSummary {
    /// Successful ticks.
    pub ticks: u64,
    /// Ticks that failed and triggered a backoff.
    pub recoveries: u64,
    /// Task records written over the loop's lifetime.
    pub created: usize,
}

/// Drives a [`PollWorker`] until cancelled.
pub struct PollLoop<W> {
    worker: W,
    timing: LoopTiming,
    log: OperationalLog,
    dirs: Vec<PathBuf>,
    state: LoopState,
}

impl<W: PollWorker> PollLoop<W> {
    /// Loop over `worker` reporting to `log`.
    #[must_use]
    pub fn new(worker: W, timing: LoopTiming, log: OperationalLog) -> Self {
        Self {
            worker,
            timing,
            log,
            dirs: Vec::new(),
            state: LoopState::Init,
        }
    }

    /// Directories created best-effort during `Init`.
    #[must_use]
    pub fn with_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.dirs = dirs;
        self
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> LoopState {
        self.state
    }

    /// The driven worker.
    #[must_use]
    pub fn worker(&self) -> &W {
        &self.worker
    }

    /// Run until `cancel` fires, then return the lifetime counters.
    ///
    /// The loop ends in [`LoopState::Stopped`] and cannot be restarted.
    pub async fn run(&mut self, cancel: CancellationToken) -> LoopSummary {
        let span = info_span!("poll_loop", worker = %self.worker.name());
        self.run_inner(cancel).instrument(span).await
    }

    async fn run_inner(&mut self, cancel: CancellationToken) -> LoopSummary {
        if self.state == LoopState::Stopped {
            return LoopSummary::default();
        }
        let name = self.worker.name().to_owned();
        let mut summary = LoopSummary::default();

        self.prepare_dirs();
        if let Err(err) = self.worker.init().await {
            self.log.error(&format!("{name} initialization incomplete: {err}"));
        }
        self.log.record(
            &format!("{name} Started"),
            &format!("checking every {}s", self.timing.interval.as_secs()),
        );
        self.transition(LoopState::Running);

        while !cancel.is_cancelled() {
            let delay = match self.worker.tick().await {
                Ok(report) => {
                    summary.ticks += 1;
                    summary.created += report.created;
                    if report.created > 0 || report.failed > 0 {
                        info!(
                            observed = report.observed,
                            created = report.created,
                            failed = report.failed,
                            "tick complete"
                        );
                    } else {
                        debug!(observed = report.observed, "tick complete");
                    }
                    self.timing.interval
                }
                Err(err) => {
                    summary.recoveries += 1;
                    self.transition(LoopState::Recovering);
                    self.log
                        .error(&format!("unexpected error in {name} loop: {err}"));
                    warn!(
                        backoff_secs = self.timing.backoff.as_secs(),
                        "waiting before retrying"
                    );
                    self.timing.backoff
                }
            };

            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(delay) => {}
            }
            self.transition(LoopState::Running);
        }

        self.transition(LoopState::Stopped);
        let detail = self.worker.summary();
        info!(
            ticks = summary.ticks,
            recoveries = summary.recoveries,
            created = summary.created,
            "{name} stopped: {detail}"
        );
        self.log.record(&format!("{name} Stopped"), &detail);
        summary
    }

    fn prepare_dirs(&self) {
        for dir in &self.dirs {
            if dir.is_dir() {
                continue;
            }
            match fs::create_dir_all(dir) {
                Ok(()) => info!(dir = %dir.display(), "created folder"),
                Err(err) => self.log.error(&format!(
                    "failed to create folder {}: {err}; continuing in degraded mode",
                    dir.display()
                )),
            }
        }
    }

    fn transition(&mut self, next: LoopState) {
        if self.state != next {
            debug!(from = %self.state, to = %next, "loop state change");
            self.state = next;
        }
    }
}

/// Worker turning new items from an [`EventSource`] into task records.
pub struct SourceWorker<S> {
    name: String,
    source: S,
    dedup: Deduplicator,
    materializer: TaskMaterializer,
    log: OperationalLog,
    processed: usize,
}

impl<S: EventSource> SourceWorker<S> {
    /// Worker with an empty, memory-only seen-set.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        source: S,
        materializer: TaskMaterializer,
        log: OperationalLog,
    ) -> Self {
        Self {
            name: name.into(),
            source,
            dedup: Deduplicator::new(),
            materializer,
            log,
            processed: 0,
        }
    }

    /// Replace the seen-set (e.g. one hydrated from a snapshot).
    #[must_use]
    pub fn with_dedup(mut self, dedup: Deduplicator) -> Self {
        self.dedup = dedup;
        self
    }

    /// The worker's seen-set.
    #[must_use]
    pub fn dedup(&self) -> &Deduplicator {
        &self.dedup
    }

    /// The driven source.
    #[must_use]
    pub fn source(&self) -> &S {
        &self.source
    }

    async fn seed(&mut self) -> Result<()> {
        if !self.source.seed_on_start() {
            return Ok(());
        }
        if self.dedup.is_restored() {
            info!(
                known = self.dedup.len(),
                "seen-set restored from snapshot, skipping seed"
            );
            return Ok(());
        }
        let existing = self.source.list_current_items().await?;
        self.source.end_tick().await;
        if !existing.is_empty() {
            info!(count = existing.len(), "existing items will be ignored");
        }
        self.dedup.seed(existing);
        Ok(())
    }

    async fn run_tick(&mut self) -> Result<TickReport> {
        let current = match self.source.list_current_items().await {
            Ok(current) => current,
            Err(err @ AppError::SourceUnavailable(_)) => {
                self.log.error(&err.to_string());
                self.source.end_tick().await;
                return Ok(TickReport::default());
            }
            Err(err) => {
                self.source.end_tick().await;
                return Err(err);
            }
        };

        let mut report = TickReport {
            observed: current.len(),
            ..TickReport::default()
        };
        for id in self.dedup.diff(&current) {
            if self.process(&id).await {
                report.created += 1;
            } else {
                report.failed += 1;
            }
        }
        self.source.end_tick().await;
        Ok(report)
    }

    /// Fetch, write, mark, acknowledge. Returns whether a record was written.
    async fn process(&mut self, id: &str) -> bool {
        info!(item = %id, "new item detected");
        let payload = match self.source.fetch(id).await {
            Ok(payload) => payload,
            Err(err) => {
                self.log.error(&format!("failed to fetch {id}: {err}"));
                return false;
            }
        };

        let handle = match self.materializer.create(&payload) {
            Ok(handle) => handle,
            Err(err) => {
                self.log
                    .error(&format!("failed to create task for {id}: {err}"));
                return false;
            }
        };
        self.dedup.mark(id.to_owned());
        self.processed += 1;
        self.log.record(
            &format!("{} Task Created", self.name),
            &format!("{} for {id}", handle.file_name),
        );

        if let Err(err) = self.source.acknowledge(id).await {
            self.log
                .error(&format!("failed to acknowledge {id}: {err}"));
        }
        true
    }
}

impl<S: EventSource> PollWorker for SourceWorker<S> {
    fn name(&self) -> &str {
        &self.name
    }

    fn init(&mut self) -> WorkerFuture<'_, ()> {
        info!(source = %self.source.describe(), "watching source");
        Box::pin(self.seed())
    }

    fn tick(&mut self) -> WorkerFuture<'_, TickReport> {
        Box::pin(self.run_tick())
    }

    fn summary(&self) -> String {
        format!("processed {} item(s) this session", self.processed)
    }
}
