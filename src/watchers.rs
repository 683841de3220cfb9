//! Assembly of the ready-to-run loops from a [`GlobalConfig`].

use std::path::Path;

use tracing::{info, warn};

use crate::config::GlobalConfig;
use crate::dedup::{Deduplicator, JsonSeenStore};
use crate::materializer::TaskMaterializer;
use crate::oplog::{self, LogRotator, OperationalLog, RotationReport};
use crate::poll::{PollLoop, SourceWorker};
use crate::scheduler::PlanScheduler;
use crate::source::{DirectoryListing, EventSource};

/// Poll loop over the drop folder.
pub type FileWatcher = PollLoop<SourceWorker<DirectoryListing>>;

/// Materializer writing into the configured queue with the configured rules.
#[must_use]
pub fn materializer(config: &GlobalConfig) -> TaskMaterializer {
    TaskMaterializer::new(config.queue_dir())
        .with_classifier(config.classifier())
        .with_inbox_label(config.files.inbox_label.clone())
}

fn dedup_for(snapshot: Option<&Path>, component: &str) -> Deduplicator {
    match snapshot {
        Some(path) => {
            let store = JsonSeenStore::new(path);
            info!(component, snapshot = %store.path().display(), "seen-set snapshot attached");
            Deduplicator::new().with_store(Box::new(store))
        }
        None => {
            info!(component, "no seen-set snapshot configured; dedup is per process");
            Deduplicator::new()
        }
    }
}

/// File watcher over `<inbox_dir>`.
#[must_use]
pub fn file_watcher(config: &GlobalConfig) -> FileWatcher {
    let logs_dir = config.logs_dir();
    let log = OperationalLog::new(&logs_dir, oplog::FILE_WATCHER_ERRORS);
    let worker = SourceWorker::new(
        "File Watcher",
        DirectoryListing::new(config.inbox_dir()),
        materializer(config),
        log.clone(),
    )
    .with_dedup(dedup_for(config.files.seen_store.as_deref(), "files"));

    PollLoop::new(worker, config.files.timing(), log).with_dirs(vec![
        config.inbox_dir(),
        config.queue_dir(),
        logs_dir,
    ])
}

/// Mail watcher over an already-built mail source (live or fixture).
#[must_use]
pub fn mail_watcher<S: EventSource>(config: &GlobalConfig, source: S) -> PollLoop<SourceWorker<S>> {
    let logs_dir = config.logs_dir();
    let log = OperationalLog::new(&logs_dir, oplog::MAIL_WATCHER_ERRORS);
    let worker = SourceWorker::new("Mail Watcher", source, materializer(config), log.clone())
        .with_dedup(dedup_for(config.mail.seen_store.as_deref(), "mail"));
    if !worker.dedup().is_persistent() {
        warn!("mail watcher has no seen-set snapshot; the remote read flag is the only guard across restarts");
    }

    PollLoop::new(worker, config.mail.timing(), log)
        .with_dirs(vec![config.queue_dir(), logs_dir])
}

/// Plan scheduler over `<queue_dir>`.
#[must_use]
pub fn plan_scheduler(config: &GlobalConfig) -> PollLoop<PlanScheduler> {
    let logs_dir = config.logs_dir();
    let log = OperationalLog::new(&logs_dir, oplog::SCHEDULER_ERRORS);
    let scheduler = PlanScheduler::new(materializer(config), log.clone());

    PollLoop::new(scheduler, config.scheduler.timing(), log)
        .with_dirs(vec![config.queue_dir(), logs_dir])
}

/// One rotation pass over the configured logs.
#[must_use]
pub fn rotate_logs(config: &GlobalConfig) -> RotationReport {
    LogRotator::new(config.rotation.max_bytes, config.rotation_targets()).run()
}
