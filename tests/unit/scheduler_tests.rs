use std::fs;

use inbox_relay::materializer::TaskMaterializer;
use inbox_relay::models::{FileItem, ItemPayload};
use inbox_relay::oplog::{self, OperationalLog};
use inbox_relay::scheduler::{PlanScheduler, ScheduleOutcome, PLAN_PREFIX};

fn scheduler(root: &std::path::Path) -> PlanScheduler {
    let logs = root.join("Logs");
    PlanScheduler::new(
        TaskMaterializer::new(root.join("Needs_Action")),
        OperationalLog::new(&logs, oplog::SCHEDULER_ERRORS),
    )
}

fn seed_tasks(root: &std::path::Path, names: &[&str]) {
    let queue = root.join("Needs_Action");
    fs::create_dir_all(&queue).expect("mkdir queue");
    for name in names {
        fs::write(queue.join(name), "---\ntype: file_review\n---\n").expect("seed task");
    }
}

#[test]
fn empty_queue_is_idle() {
    let temp = tempfile::tempdir().expect("tempdir");
    seed_tasks(temp.path(), &[]);
    let scheduler = scheduler(temp.path());

    assert_eq!(scheduler.check().expect("check"), ScheduleOutcome::Idle);
    assert_eq!(
        fs::read_dir(temp.path().join("Needs_Action")).expect("list").count(),
        0
    );
}

#[test]
fn missing_queue_counts_as_empty() {
    let temp = tempfile::tempdir().expect("tempdir");
    let scheduler = scheduler(temp.path());

    assert_eq!(scheduler.count_pending().expect("count"), 0);
    assert!(!scheduler.plan_exists().expect("exists"));
    assert_eq!(scheduler.check().expect("check"), ScheduleOutcome::Idle);
}

#[test]
fn three_tasks_produce_one_plan() {
    let temp = tempfile::tempdir().expect("tempdir");
    seed_tasks(temp.path(), &["task_a.md", "task_b.md", "task_email_c.md"]);
    let scheduler = scheduler(temp.path());

    let ScheduleOutcome::Created { pending, handle } = scheduler.check().expect("check") else {
        panic!("expected a plan task");
    };

    assert_eq!(pending, 3);
    assert!(handle.file_name.starts_with("task_generate_plan_"));
    assert!(handle.file_name.ends_with(".md"));
    // task_generate_plan_YYYY-MM-DD_HH-MM-SS.md
    assert_eq!(handle.file_name.len(), PLAN_PREFIX.len() + 1 + 19 + 3);
    let content = fs::read_to_string(&handle.path).expect("read plan");
    assert!(content.contains("type: planning"));
    assert!(content.contains("priority: high"));
    assert!(content.contains("source: scheduler"));
    assert!(content.contains("pending_tasks: \"3\""));
}

#[test]
fn existing_plan_makes_check_idempotent() {
    let temp = tempfile::tempdir().expect("tempdir");
    seed_tasks(temp.path(), &["task_a.md"]);
    let scheduler = scheduler(temp.path());

    assert!(matches!(
        scheduler.check().expect("first check"),
        ScheduleOutcome::Created { pending: 1, .. }
    ));
    assert_eq!(
        scheduler.check().expect("second check"),
        ScheduleOutcome::PlanPending { pending: 2 }
    );
    assert_eq!(scheduler.count_pending().expect("count"), 2);
}

#[test]
fn plan_prefix_match_is_case_insensitive() {
    let temp = tempfile::tempdir().expect("tempdir");
    seed_tasks(temp.path(), &["task_a.md"]);
    fs::write(
        temp.path().join("Needs_Action").join("TASK_GENERATE_PLAN_manual.md"),
        "# Plan written by hand\n",
    )
    .expect("seed manual plan");
    let scheduler = scheduler(temp.path());

    assert!(scheduler.plan_exists().expect("exists"));
    assert_eq!(
        scheduler.check().expect("check"),
        ScheduleOutcome::PlanPending { pending: 2 }
    );
}

#[test]
fn non_task_entries_are_ignored() {
    let temp = tempfile::tempdir().expect("tempdir");
    seed_tasks(temp.path(), &["readme.txt", "task_a.MD"]);
    fs::create_dir_all(temp.path().join("Needs_Action").join("archive.md")).expect("mkdir");
    let scheduler = scheduler(temp.path());

    assert_eq!(scheduler.count_pending().expect("count"), 1);
}

#[test]
fn dropped_file_named_like_a_plan_is_not_a_plan() {
    let temp = tempfile::tempdir().expect("tempdir");
    let materializer = TaskMaterializer::new(temp.path().join("Needs_Action"));
    let dropped = ItemPayload::File(FileItem {
        name: "generate_plan.txt".into(),
        bytes: b"notes".to_vec(),
    });
    let review = materializer.create(&dropped).expect("file task");
    assert_eq!(review.file_name, "task_generate_plan_txt.md");
    let scheduler = scheduler(temp.path());

    assert!(!scheduler.plan_exists().expect("exists"));
    let ScheduleOutcome::Created { pending, .. } = scheduler.check().expect("check") else {
        panic!("expected a plan task");
    };
    assert_eq!(pending, 1);
    assert!(scheduler.plan_exists().expect("exists"));
    assert_eq!(
        scheduler.check().expect("check"),
        ScheduleOutcome::PlanPending { pending: 2 }
    );
}
