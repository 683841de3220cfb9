//! Loops assembled from configuration.
//!
//! Validates:
//! - The scheduler checks immediately at startup and writes one plan task
//! - The file watcher prepares the vault layout and seeds existing files
//! - A rotation pass covers every configured log

use std::fs;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use inbox_relay::config::GlobalConfig;
use inbox_relay::oplog::{self, ActivityLog};
use inbox_relay::poll::LoopState;
use inbox_relay::source::FixtureReplay;
use inbox_relay::watchers;

use super::test_helpers::task_names;

fn config_for(root: &std::path::Path) -> GlobalConfig {
    let toml = format!(
        "root = '{}'\n[rotation]\nmax_bytes = 64\n",
        root.to_str().expect("utf8 path")
    );
    GlobalConfig::from_toml_str(&toml).expect("config parses")
}

async fn wait_for<F: Fn() -> bool>(condition: F) {
    tokio::time::timeout(Duration::from_secs(10), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("condition reached in time");
}

#[tokio::test]
async fn scheduler_checks_immediately_on_start() {
    let temp = tempfile::tempdir().expect("tempdir");
    let config = config_for(temp.path());
    let queue = config.queue_dir();
    fs::create_dir_all(&queue).expect("mkdir queue");
    for name in ["task_a.md", "task_b.md", "task_c.md"] {
        fs::write(queue.join(name), "pending").expect("seed task");
    }

    let mut poll = watchers::plan_scheduler(&config);
    let token = CancellationToken::new();
    let loop_token = token.clone();
    let handle = tokio::spawn(async move {
        let summary = poll.run(loop_token).await;
        (poll, summary)
    });

    let probe = queue.clone();
    wait_for(move || task_names(&probe).len() == 4).await;
    token.cancel();
    let (poll, summary) = handle.await.expect("loop task");

    assert_eq!(poll.state(), LoopState::Stopped);
    assert_eq!(summary.created, 1);
    let plans: Vec<_> = task_names(&queue)
        .into_iter()
        .filter(|n| n.starts_with("task_generate_plan_"))
        .collect();
    assert_eq!(plans.len(), 1);

    let activity = ActivityLog::new(config.logs_dir().join(oplog::SYSTEM_LOG))
        .entries()
        .expect("activity log");
    let actions: Vec<_> = activity.iter().map(|row| row.action.as_str()).collect();
    assert!(actions.contains(&"Scheduler Started"));
    assert!(actions.contains(&"Scheduler Task Created"));
    assert_eq!(actions[0], "Scheduler Stopped");
}

#[tokio::test]
async fn scheduler_on_empty_queue_records_check() {
    let temp = tempfile::tempdir().expect("tempdir");
    let config = config_for(temp.path());

    let mut poll = watchers::plan_scheduler(&config);
    let token = CancellationToken::new();
    let loop_token = token.clone();
    let handle = tokio::spawn(async move { poll.run(loop_token).await });

    let log_path = config.logs_dir().join(oplog::SYSTEM_LOG);
    let probe = log_path.clone();
    wait_for(move || {
        ActivityLog::new(&probe)
            .entries()
            .map(|rows| rows.iter().any(|r| r.action == "Scheduler Check"))
            .unwrap_or(false)
    })
    .await;
    token.cancel();
    let summary = handle.await.expect("loop task");

    assert_eq!(summary.created, 0);
    assert!(config.queue_dir().is_dir(), "queue prepared during init");
    assert!(task_names(&config.queue_dir()).is_empty());
}

#[tokio::test]
async fn file_watcher_prepares_layout_and_seeds() {
    let temp = tempfile::tempdir().expect("tempdir");
    let config = config_for(temp.path());
    fs::create_dir_all(config.inbox_dir()).expect("mkdir inbox");
    fs::write(config.inbox_dir().join("before.txt"), "x").expect("seed file");

    let mut poll = watchers::file_watcher(&config);
    let token = CancellationToken::new();
    token.cancel();
    let summary = poll.run(token).await;

    assert_eq!(summary.ticks, 0);
    assert!(config.queue_dir().is_dir());
    assert!(config.logs_dir().is_dir());
    assert!(poll.worker().dedup().is_seen("before.txt"));
}

#[tokio::test]
async fn mail_watcher_over_fixtures_stops_cleanly() {
    let temp = tempfile::tempdir().expect("tempdir");
    let config = config_for(temp.path());

    let mut poll = watchers::mail_watcher(&config, FixtureReplay::demo());
    let token = CancellationToken::new();
    let loop_token = token.clone();
    let handle = tokio::spawn(async move {
        let summary = poll.run(loop_token).await;
        (poll, summary)
    });

    let queue = config.queue_dir();
    wait_for(move || task_names(&queue).len() == 1).await;
    token.cancel();
    let (poll, summary) = handle.await.expect("loop task");

    assert_eq!(summary.created, 1, "one demo message per tick");
    assert_eq!(poll.worker().source().remaining(), 2);
}

#[test]
fn rotation_pass_covers_all_logs() {
    let temp = tempfile::tempdir().expect("tempdir");
    let config = config_for(temp.path());
    let logs = config.logs_dir();
    fs::create_dir_all(&logs).expect("mkdir logs");
    fs::write(logs.join(oplog::SYSTEM_LOG), "y".repeat(100)).expect("seed");
    fs::write(logs.join(oplog::FILE_WATCHER_ERRORS), "short").expect("seed");

    let report = watchers::rotate_logs(&config);

    assert_eq!(report.checked, 4);
    assert_eq!(report.rotated.len(), 1);
    assert!(report.failed.is_empty());
    let fresh = fs::read_to_string(logs.join(oplog::SYSTEM_LOG)).expect("fresh log");
    assert!(fresh.contains("<!-- activity-log:v1 -->"));
    assert_eq!(
        fs::read_to_string(logs.join(oplog::FILE_WATCHER_ERRORS)).expect("kept"),
        "short"
    );
}
