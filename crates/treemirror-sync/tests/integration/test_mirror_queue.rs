//! Queue and mirror engine together, without native watchers
//!
//! Actions are submitted directly, the way a watcher would, and the
//! resulting target trees are checked once the worker has drained.

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use treemirror_core::domain::RelativePath;
use treemirror_sync::mirror::{MirrorRoot, MirrorSettings};
use treemirror_sync::queue::{ActionQueue, QueueWorker};

use crate::common::{self, RecordingDisplay, Roots};

fn rel(s: &str) -> RelativePath {
    RelativePath::new(s).unwrap()
}

fn mirror_roots(roots: &Roots, display: &Arc<RecordingDisplay>) -> Vec<Arc<MirrorRoot>> {
    roots
        .descriptors()
        .into_iter()
        .map(|d| Arc::new(MirrorRoot::new(d, MirrorSettings::default(), display.clone())))
        .collect()
}

async fn drain(queue: ActionQueue, worker: QueueWorker) {
    drop(queue);
    tokio::time::timeout(Duration::from_secs(10), worker.run())
        .await
        .expect("worker did not drain")
        .expect("worker failed");
}

#[tokio::test]
async fn test_copy_twice_gives_identical_target() {
    let roots = Roots::new(1);
    let display = common::display();
    let mirrors = mirror_roots(&roots, &display);
    common::write(roots.source(1), "docs/a.txt", "alpha");
    common::write(roots.source(1), "docs/nested/b.txt", "beta");

    for _ in 0..2 {
        let (queue, worker) = ActionQueue::new(Duration::from_millis(10), display.clone());
        queue.copy(&mirrors[0], rel("docs"));
        drain(queue, worker).await;
    }

    assert_eq!(
        fs::read_to_string(roots.target(1).join("docs/a.txt")).unwrap(),
        "alpha"
    );
    assert_eq!(
        fs::read_to_string(roots.target(1).join("docs/nested/b.txt")).unwrap(),
        "beta"
    );
    assert_eq!(common::count_files(roots.target(1)), 2);
    assert!(!display.has_event("error"));
}

#[tokio::test]
async fn test_queued_delete_of_ancestor_discards_copy() {
    let roots = Roots::new(1);
    let display = common::display();
    let mirrors = mirror_roots(&roots, &display);
    common::write(roots.source(1), "a/b/c.txt", "c");
    common::write(roots.target(1), "a/old.txt", "old");

    let (queue, worker) = ActionQueue::new(Duration::from_millis(10), display.clone());
    queue.copy(&mirrors[0], rel("a/b/c.txt"));
    queue.delete(&mirrors[0], rel("a"));
    drain(queue, worker).await;

    assert!(!roots.target(1).join("a").exists());
    assert!(!display.text().contains("Copy"));
}

#[tokio::test]
async fn test_copy_removes_queued_actions_below_it() {
    let roots = Roots::new(1);
    let display = common::display();
    let mirrors = mirror_roots(&roots, &display);
    common::write(roots.source(1), "top/one.txt", "1");
    common::write(roots.source(1), "top/sub/two.txt", "2");

    let (queue, worker) = ActionQueue::new(Duration::from_millis(10), display.clone());
    queue.copy(&mirrors[0], rel("top"));
    queue.copy(&mirrors[0], rel("top/one.txt"));
    queue.copy(&mirrors[0], rel("top/sub"));
    queue.delete(&mirrors[0], rel("top/sub/two.txt"));
    queue.copy(&mirrors[0], rel("top"));
    drain(queue, worker).await;

    // The first copy of "top" swallows everything queued at or below it,
    // including the repeated copy of "top" itself
    assert_eq!(display.text().lines().count(), 1, "{}", display.text());
    assert_eq!(common::count_files(roots.target(1)), 2);
}

#[tokio::test]
async fn test_wipe_never_deletes_target_root() {
    let roots = Roots::new(1);
    let display = common::display();
    let mirrors = mirror_roots(&roots, &display);
    common::write(roots.source(1), "keep.txt", "k");
    common::write(roots.target(1), "stale/old.txt", "s");

    let (queue, worker) = ActionQueue::new(Duration::from_millis(10), display.clone());
    queue.copy(&mirrors[0], RelativePath::root());
    queue.delete(&mirrors[0], RelativePath::root());
    drain(queue, worker).await;

    assert!(roots.target(1).is_dir());
    assert!(!roots.target(1).join("stale").exists());
    assert!(display.text().contains("Recopy"));
}

#[tokio::test]
async fn test_two_roots_stay_independent() {
    let roots = Roots::new(2);
    let display = common::display();
    let mirrors = mirror_roots(&roots, &display);
    common::write(roots.source(1), "f.txt", "one");
    common::write(roots.source(2), "f.txt", "two");

    let (queue, worker) = ActionQueue::new(Duration::from_millis(10), display.clone());
    queue.copy(&mirrors[0], rel("f.txt"));
    queue.delete(&mirrors[1], rel("f.txt"));
    drain(queue, worker).await;

    assert_eq!(
        fs::read_to_string(roots.target(1).join("f.txt")).unwrap(),
        "one"
    );
    assert!(!roots.target(2).join("f.txt").exists());
    assert_eq!(display.events(), vec!["busy", "idle"]);
}
