use std::fs;

use inbox_relay::materializer::{slugify, TaskMaterializer};
use inbox_relay::models::{FileItem, ItemPayload, MailMessage, Priority, TaskKind, TaskRecord};
use inbox_relay::AppError;

fn file(name: &str, body: &str) -> ItemPayload {
    ItemPayload::File(FileItem {
        name: name.into(),
        bytes: body.as_bytes().to_vec(),
    })
}

fn mail(id: &str, subject: &str, body: &str) -> ItemPayload {
    ItemPayload::Mail(MailMessage::new(
        id,
        "client@example.com",
        subject,
        "Mon, 6 Apr 2026 09:00:00 +0000",
        body,
    ))
}

#[test]
fn file_task_uses_prefixed_slug() {
    let temp = tempfile::tempdir().expect("tempdir");
    let materializer = TaskMaterializer::new(temp.path());

    let handle = materializer
        .create(&file("notes.txt", "meeting notes"))
        .expect("task written");

    assert_eq!(handle.file_name, "task_notes_txt.md");
    assert_eq!(handle.path, temp.path().join("task_notes_txt.md"));
    let content = fs::read_to_string(&handle.path).expect("read task");
    assert_eq!(content.len(), handle.bytes_written);
    assert!(content.starts_with("---\ntype: file_review\nstatus: pending\n"));
    assert!(content.contains("approved: false"));
    assert!(content.contains("source: file_watcher"));
}

#[test]
fn collision_appends_counter() {
    let temp = tempfile::tempdir().expect("tempdir");
    let materializer = TaskMaterializer::new(temp.path());

    let first = materializer.create(&file("x", "one")).expect("first");
    let second = materializer.create(&file("x", "second")).expect("second");
    let third = materializer.create(&file("x", "third!!")).expect("third");

    assert_eq!(first.file_name, "task_x.md");
    assert_eq!(second.file_name, "task_x_1.md");
    assert_eq!(third.file_name, "task_x_2.md");
    let original = fs::read_to_string(&first.path).expect("read first");
    assert!(
        original.contains("size_bytes: \"3\""),
        "first record is never overwritten"
    );
}

#[test]
fn existing_foreign_file_is_never_overwritten() {
    let temp = tempfile::tempdir().expect("tempdir");
    fs::write(temp.path().join("task_email_Hello.md"), "operator notes").expect("seed");
    let materializer = TaskMaterializer::new(temp.path());

    let handle = materializer
        .create(&mail("<a@x>", "Hello", "hi"))
        .expect("task written");

    assert_eq!(handle.file_name, "task_email_Hello_1.md");
    assert_eq!(
        fs::read_to_string(temp.path().join("task_email_Hello.md")).expect("read"),
        "operator notes"
    );
}

#[test]
fn mail_task_carries_source_fields() {
    let temp = tempfile::tempdir().expect("tempdir");
    let materializer = TaskMaterializer::new(temp.path());

    let handle = materializer
        .create(&mail(
            "<42@example.com>",
            "Re: Q2 budget?",
            "Could you reply with the numbers?",
        ))
        .expect("task written");

    assert_eq!(handle.file_name, "task_email_Re_ Q2 budget_.md");
    let content = fs::read_to_string(&handle.path).expect("read task");
    assert!(content.contains("type: email_response"));
    assert!(content.contains("message_id: \"<42@example.com>\""));
    assert!(content.contains("sender: \"client@example.com\""));
    assert!(content.contains("approval_needed: true"));
    assert!(content.contains("flagged_actions: [\"send_email\"]"));
}

#[test]
fn empty_subject_uses_placeholder_slug() {
    let temp = tempfile::tempdir().expect("tempdir");
    let materializer = TaskMaterializer::new(temp.path());

    let handle = materializer
        .create(&ItemPayload::Mail(MailMessage::new("<b@x>", "", "???", "", "")))
        .expect("task written");

    assert_eq!(handle.file_name, "task_email____.md");

    let handle = materializer
        .create(&ItemPayload::Mail(MailMessage::new("<c@x>", "", "   ", "", "")))
        .expect("task written");
    assert_eq!(handle.file_name, "task_email__No Subject_.md");
}

#[test]
fn binary_file_is_not_classified() {
    let temp = tempfile::tempdir().expect("tempdir");
    let materializer = TaskMaterializer::new(temp.path());

    let handle = materializer
        .create(&ItemPayload::File(FileItem {
            name: "blob.bin".into(),
            bytes: vec![0xff, 0xfe, b'r', b'e', b'p', b'l', b'y'],
        }))
        .expect("task written");

    let content = fs::read_to_string(&handle.path).expect("read task");
    assert!(content.contains("approval_needed: false"));
    assert!(content.contains("flagged_actions: []"));
}

#[test]
fn missing_queue_directory_is_created() {
    let temp = tempfile::tempdir().expect("tempdir");
    let queue = temp.path().join("Needs_Action");
    let materializer = TaskMaterializer::new(&queue);

    materializer.create(&file("a.md", "x")).expect("task written");
    assert!(queue.join("task_a_md.md").is_file());
}

#[test]
fn unwritable_queue_is_materialization_error() {
    let temp = tempfile::tempdir().expect("tempdir");
    let blocker = temp.path().join("queue");
    fs::write(&blocker, "not a directory").expect("write blocker");
    let materializer = TaskMaterializer::new(&blocker);

    let err = materializer
        .create(&file("a.txt", "x"))
        .expect_err("queue path is a file");
    assert!(matches!(err, AppError::Materialization(_)));
}

#[test]
fn plan_record_is_written_verbatim_stem() {
    let temp = tempfile::tempdir().expect("tempdir");
    let materializer = TaskMaterializer::new(temp.path());
    let record = TaskRecord::plan(3, chrono::Local::now());

    let handle = materializer
        .write_record("task_generate_plan_2026-04-06_09-00-00", &record)
        .expect("plan written");

    assert_eq!(handle.file_name, "task_generate_plan_2026-04-06_09-00-00.md");
    assert_eq!(record.kind, TaskKind::Planning);
    assert_eq!(record.priority, Priority::High);
}

#[test]
fn slug_keeps_letters_in_any_script() {
    assert_eq!(slugify("café menu"), "café menu");
    assert_eq!(slugify("Отчёт за май"), "Отчёт за май");
    assert_eq!(slugify("会議のメモ!"), "会議のメモ_");
    assert_eq!(slugify("report-2026_final"), "report-2026_final");
    assert_eq!(slugify("a/b\\c:d"), "a_b_c_d");
}

#[test]
fn non_latin_subject_keeps_its_name() {
    let temp = tempfile::tempdir().expect("tempdir");
    let materializer = TaskMaterializer::new(temp.path());
    let msg = MailMessage::new("<ru@x>", "a@x", "Счёт на оплату", "Mon", "body");

    let handle = materializer
        .create(&ItemPayload::Mail(msg))
        .expect("create");

    assert_eq!(handle.file_name, "task_email_Счёт на оплату.md");
}
