//! Poll loop lifecycle.
//!
//! Validates:
//! - A failing tick enters recovery and the loop keeps running
//! - Cancellation stops the loop with a summary
//! - Start and stop are recorded in the activity log
//! - Required directories are created during init

use std::fs;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use inbox_relay::oplog::{self, OperationalLog};
use inbox_relay::poll::{LoopState, LoopTiming, PollLoop};

use super::test_helpers::ScriptedWorker;

fn fast() -> LoopTiming {
    LoopTiming {
        interval: Duration::from_millis(1),
        backoff: Duration::from_millis(2),
    }
}

#[tokio::test]
async fn failing_tick_recovers_and_loop_continues() {
    let temp = tempfile::tempdir().expect("tempdir");
    let token = CancellationToken::new();
    let mut worker = ScriptedWorker::new(token.clone(), 4);
    worker.fail_on.insert(2);
    let log = OperationalLog::new(temp.path(), oplog::SCHEDULER_ERRORS);
    let mut poll = PollLoop::new(worker, fast(), log);

    let summary = poll.run(token).await;

    assert_eq!(summary.ticks, 3);
    assert_eq!(summary.recoveries, 1);
    assert_eq!(summary.created, 3);
    assert_eq!(poll.state(), LoopState::Stopped);
    assert_eq!(poll.worker().ticks, 4);

    let errors = fs::read_to_string(temp.path().join(oplog::SCHEDULER_ERRORS)).expect("errors");
    assert!(errors.contains("ERROR: unexpected error in Scripted loop: io: boom"));
}

#[tokio::test]
async fn cancelled_before_start_runs_no_ticks() {
    let temp = tempfile::tempdir().expect("tempdir");
    let token = CancellationToken::new();
    token.cancel();
    let worker = ScriptedWorker::new(token.clone(), usize::MAX);
    let log = OperationalLog::new(temp.path(), oplog::SCHEDULER_ERRORS);
    let mut poll = PollLoop::new(worker, fast(), log);

    let summary = poll.run(token).await;

    assert_eq!(summary.ticks, 0);
    assert_eq!(poll.worker().ticks, 0);
    assert_eq!(poll.state(), LoopState::Stopped);
}

#[tokio::test]
async fn cancellation_interrupts_long_sleep() {
    let temp = tempfile::tempdir().expect("tempdir");
    let token = CancellationToken::new();
    let worker = ScriptedWorker::new(token.clone(), usize::MAX);
    let log = OperationalLog::new(temp.path(), oplog::SCHEDULER_ERRORS);
    let mut poll = PollLoop::new(worker, LoopTiming::from_secs(3600, 7200), log);

    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });
    let summary = tokio::time::timeout(Duration::from_secs(10), poll.run(token))
        .await
        .expect("loop stops promptly");

    assert_eq!(summary.ticks, 1, "one immediate tick, then the sleep is cut short");
}

#[tokio::test]
async fn lifecycle_is_recorded_in_activity_log() {
    let temp = tempfile::tempdir().expect("tempdir");
    let token = CancellationToken::new();
    let worker = ScriptedWorker::new(token.clone(), 2);
    let log = OperationalLog::new(temp.path(), oplog::SCHEDULER_ERRORS);
    let mut poll = PollLoop::new(worker, fast(), log.clone());

    poll.run(token).await;

    let actions: Vec<_> = log
        .activity()
        .entries()
        .expect("activity log")
        .into_iter()
        .map(|row| (row.action, row.details))
        .collect();
    assert_eq!(
        actions,
        vec![
            ("Scripted Stopped".to_owned(), "ran 2 tick(s)".to_owned()),
            ("Scripted Started".to_owned(), "checking every 0s".to_owned()),
        ]
    );
}

#[tokio::test]
async fn init_creates_directories_and_tolerates_init_errors() {
    let temp = tempfile::tempdir().expect("tempdir");
    let token = CancellationToken::new();
    let mut worker = ScriptedWorker::new(token.clone(), 1);
    worker.init_error = true;
    let logs = temp.path().join("Logs");
    let queue = temp.path().join("Needs_Action");
    let blocked = temp.path().join("blocker").join("child");
    fs::write(temp.path().join("blocker"), "file").expect("blocker");
    let log = OperationalLog::new(&logs, oplog::FILE_WATCHER_ERRORS);
    let mut poll =
        PollLoop::new(worker, fast(), log).with_dirs(vec![queue.clone(), logs.clone(), blocked]);

    let summary = poll.run(token).await;

    assert!(queue.is_dir());
    assert!(logs.is_dir());
    assert_eq!(summary.ticks, 1, "degraded mode still ticks");
    let errors = fs::read_to_string(logs.join(oplog::FILE_WATCHER_ERRORS)).expect("errors");
    assert!(errors.contains("failed to create folder"));
    assert!(errors.contains("Scripted initialization incomplete"));
}
