//! Full service: native watchers feeding the queue
//!
//! These tests touch real source trees and wait for the mirror to catch up,
//! so every assertion polls with a generous timeout.

use std::fs;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use treemirror_sync::service::MirrorService;

use crate::common::{self, Roots};

const SETTLE: Duration = Duration::from_secs(10);

async fn start(roots: &Roots) -> (MirrorService, std::sync::Arc<common::RecordingDisplay>) {
    let display = common::display();
    let service = MirrorService::start(
        &roots.config(100),
        roots.descriptors(),
        display.clone(),
        CancellationToken::new(),
    );
    let count = roots.dirs.len();
    let started = common::wait_for(SETTLE, || {
        (1..=count).all(|i| display.has_event(&format!("started {i}")))
    })
    .await;
    assert!(started, "watchers did not start: {:?}", display.events());
    (service, display)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_startup_reports_watch_mode() {
    let roots = Roots::new(1);
    fs::create_dir_all(roots.source(1).join("a/b")).unwrap();

    let (service, display) = start(&roots).await;

    assert!(display.text().contains("1 Watching"), "{}", display.text());
    assert!(!display.has_event("error"));
    service.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_new_file_is_mirrored_into_its_own_root_only() {
    let roots = Roots::new(2);
    let (service, display) = start(&roots).await;

    common::write(roots.source(1), "hello.txt", "hi");

    let copied = common::wait_for(SETTLE, || roots.target(1).join("hello.txt").exists()).await;
    assert!(copied, "display: {}", display.text());
    assert_eq!(
        fs::read_to_string(roots.target(1).join("hello.txt")).unwrap(),
        "hi"
    );
    assert_eq!(fs::read_dir(roots.target(2)).unwrap().count(), 0);

    service.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_new_directory_of_many_files_is_recreated() {
    let roots = Roots::new(1);
    let (service, display) = start(&roots).await;

    let staging = tempfile::TempDir::new().unwrap();
    for i in 0..150 {
        common::write(staging.path(), &format!("bulk/file{i:03}.txt"), "x");
    }
    // Moving the finished tree in makes it appear at once
    let moved = fs::rename(staging.path().join("bulk"), roots.source(1).join("bulk"));
    if moved.is_err() {
        for i in 0..150 {
            common::write(roots.source(1), &format!("bulk/file{i:03}.txt"), "x");
        }
    }

    let complete = common::wait_for(SETTLE, || {
        common::count_files(&roots.target(1).join("bulk")) == 150 && display.is_idle()
    })
    .await;
    assert!(complete, "display: {}", display.text());

    service.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_file_deleted_right_after_creation_is_not_left_behind() {
    let roots = Roots::new(1);
    let (service, display) = start(&roots).await;

    let path = roots.source(1).join("brief.txt");
    fs::write(&path, "short-lived").unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    fs::remove_file(&path).unwrap();

    let settled = common::wait_for(SETTLE, || display.is_idle()).await;
    assert!(settled, "display: {}", display.text());
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(!roots.target(1).join("brief.txt").exists());

    service.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_wipe_recopies_whole_root() {
    let roots = Roots::new(1);
    common::write(roots.source(1), "a.txt", "a");
    common::write(roots.target(1), "orphan.txt", "o");
    let (service, display) = start(&roots).await;

    assert_eq!(service.roots().len(), 1);
    assert!(service.wipe(1));
    assert!(!service.wipe(7));

    let done = common::wait_for(SETTLE, || {
        roots.target(1).join("a.txt").exists() && !roots.target(1).join("orphan.txt").exists()
    })
    .await;
    assert!(done, "display: {}", display.text());
    assert!(display.text().contains("1 Recopy"));

    service.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_missing_source_fails_only_that_root() {
    let roots = Roots::new(2);
    let mut descriptors = roots.descriptors();
    descriptors[0].source = roots.source(1).join("does-not-exist");
    let display = common::display();
    let service = MirrorService::start(
        &roots.config(100),
        descriptors,
        display.clone(),
        CancellationToken::new(),
    );

    let started = common::wait_for(SETTLE, || {
        display.has_event("started 1") && display.has_event("started 2")
    })
    .await;
    assert!(started);
    assert!(display.has_event("error"));
    assert!(display.text().contains("Error starting watcher"));

    common::write(roots.source(2), "ok.txt", "ok");
    let copied = common::wait_for(SETTLE, || roots.target(2).join("ok.txt").exists()).await;
    assert!(copied, "display: {}", display.text());

    service.shutdown().await.unwrap();
}
