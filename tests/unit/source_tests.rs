use std::fs;

use inbox_relay::models::ItemPayload;
use inbox_relay::source::{DirectoryListing, EventSource, FixtureReplay};
use inbox_relay::AppError;

#[tokio::test]
async fn directory_lists_regular_files_only() {
    let temp = tempfile::tempdir().expect("tempdir");
    fs::write(temp.path().join("a.txt"), "alpha").expect("write");
    fs::write(temp.path().join("b.pdf"), [0_u8, 1, 2]).expect("write");
    fs::create_dir(temp.path().join("nested")).expect("mkdir");
    let mut source = DirectoryListing::new(temp.path());

    let items = source.list_current_items().await.expect("list");

    assert_eq!(
        items.into_iter().collect::<Vec<_>>(),
        vec!["a.txt".to_owned(), "b.pdf".to_owned()]
    );
    assert!(source.seed_on_start());
}

#[tokio::test]
async fn missing_directory_is_created_and_empty() {
    let temp = tempfile::tempdir().expect("tempdir");
    let inbox = temp.path().join("Inbox");
    let mut source = DirectoryListing::new(&inbox);

    let items = source.list_current_items().await.expect("list");

    assert!(items.is_empty());
    assert!(inbox.is_dir());
}

#[tokio::test]
async fn directory_fetch_reads_bytes() {
    let temp = tempfile::tempdir().expect("tempdir");
    fs::write(temp.path().join("a.txt"), "alpha").expect("write");
    let mut source = DirectoryListing::new(temp.path());

    let payload = source.fetch("a.txt").await.expect("fetch");
    let ItemPayload::File(file) = payload else {
        panic!("expected a file payload");
    };
    assert_eq!(file.name, "a.txt");
    assert_eq!(file.text(), Some("alpha"));
}

#[tokio::test]
async fn vanished_file_is_fetch_error() {
    let temp = tempfile::tempdir().expect("tempdir");
    let mut source = DirectoryListing::new(temp.path());

    let err = source.fetch("gone.txt").await.expect_err("file absent");
    assert!(matches!(err, AppError::Fetch(_)));
}

#[tokio::test]
async fn fixture_releases_one_item_per_listing() {
    let mut source = FixtureReplay::demo();
    assert_eq!(source.remaining(), 3);
    assert!(!source.seed_on_start());

    let first = source.list_current_items().await.expect("list");
    assert_eq!(
        first.iter().map(String::as_str).collect::<Vec<_>>(),
        vec!["<demo-1@inbox-relay.demo>"]
    );

    // Unacknowledged items stay listed.
    let second = source.list_current_items().await.expect("list");
    assert_eq!(second.len(), 2);
    assert_eq!(source.remaining(), 1);
}

#[tokio::test]
async fn fixture_is_exhausted_after_acknowledgement() {
    let mut source = FixtureReplay::demo();

    for _ in 0..3 {
        let ids = source.list_current_items().await.expect("list");
        for id in ids {
            let ItemPayload::Mail(msg) = source.fetch(&id).await.expect("fetch") else {
                panic!("expected mail payload");
            };
            assert_eq!(msg.labels, vec!["INBOX", "UNREAD"]);
            source.acknowledge(&id).await.expect("ack");
        }
    }

    assert!(source.is_exhausted());
    for _ in 0..3 {
        assert!(source.list_current_items().await.expect("list").is_empty());
    }
}

#[tokio::test]
async fn fixture_fetch_of_unreleased_item_fails() {
    let mut source = FixtureReplay::demo();
    let err = source
        .fetch("<demo-3@inbox-relay.demo>")
        .await
        .expect_err("not released yet");
    assert!(matches!(err, AppError::Fetch(_)));
}
