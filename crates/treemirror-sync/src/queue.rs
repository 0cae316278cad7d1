//! Action queue - debounces and coalesces copy/delete actions
//!
//! Every root's watcher submits actions into one shared [`ActionQueue`]. A
//! single [`QueueWorker`] task holds the pending actions in arrival order and
//! executes them one at a time, after each has waited out the debounce delay.
//!
//! ## Flow
//!
//! ```text
//! RootWatcher 1 ─┐
//! RootWatcher 2 ─┼─→ mpsc::UnboundedSender ──→ QueueWorker ──→ spawn_blocking(MirrorRoot::apply)
//! wipe request  ─┘                                  │
//!                                           pending VecDeque
//! ```
//!
//! ## Coalescing
//!
//! When an action becomes due it is compared with the actions still pending
//! for the same root:
//!
//! 1. If a pending action makes it unnecessary, it is discarded unexecuted.
//! 2. Otherwise every pending action it makes unnecessary is removed.
//!
//! Because a copy always deletes and recopies its whole path, a burst of
//! events inside one folder collapses into a single copy of that folder.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use treemirror_core::domain::{made_unnecessary_by, makes_unnecessary, ActionKind, RelativePath};
use treemirror_core::ports::IStatusDisplay;

use crate::mirror::MirrorRoot;
use crate::QueueError;

/// A submission travelling from a producer to the worker
struct Submission {
    kind: ActionKind,
    root: Arc<MirrorRoot>,
    path: RelativePath,
    submitted_at: Instant,
}

/// An action waiting in the worker's pending sequence
struct QueuedAction {
    kind: ActionKind,
    root: Arc<MirrorRoot>,
    path: RelativePath,
    due: Instant,
}

impl QueuedAction {
    fn same_root(&self, other: &QueuedAction) -> bool {
        self.root.index() == other.root.index()
    }

    /// A pending action makes this one pointless
    fn made_unnecessary_by(&self, other: &QueuedAction) -> bool {
        self.same_root(other) && made_unnecessary_by(self.kind, &self.path, other.kind, &other.path)
    }

    /// This action makes a pending one pointless
    fn makes_unnecessary(&self, other: &QueuedAction) -> bool {
        self.same_root(other) && makes_unnecessary(self.kind, &self.path, other.kind, &other.path)
    }
}

// ============================================================================
// ActionQueue (producer handle)
// ============================================================================

/// Cheap, cloneable handle used to submit actions
///
/// Submission never blocks. The worker stops once every handle is dropped
/// and the pending actions have been drained.
#[derive(Clone)]
pub struct ActionQueue {
    tx: mpsc::UnboundedSender<Submission>,
}

impl ActionQueue {
    /// Creates the queue and its worker
    ///
    /// The worker must be driven with [`QueueWorker::run`].
    pub fn new(debounce: Duration, display: Arc<dyn IStatusDisplay>) -> (Self, QueueWorker) {
        let (tx, rx) = mpsc::unbounded_channel();

        info!(
            debounce_ms = debounce.as_millis() as u64,
            "Creating action queue"
        );

        let worker = QueueWorker {
            rx,
            pending: VecDeque::new(),
            debounce,
            display,
            busy: false,
            closed: false,
        };
        (Self { tx }, worker)
    }

    /// Appends an action; returns false if the worker has already stopped
    pub fn submit(&self, kind: ActionKind, root: &Arc<MirrorRoot>, path: RelativePath) -> bool {
        debug!(root = root.index(), %kind, %path, "Submitting action");
        let submission = Submission {
            kind,
            root: Arc::clone(root),
            path,
            submitted_at: Instant::now(),
        };
        if self.tx.send(submission).is_err() {
            warn!(root = root.index(), "Action queue worker has stopped, action dropped");
            return false;
        }
        true
    }

    /// Queues a delete-then-recopy of `path`
    pub fn copy(&self, root: &Arc<MirrorRoot>, path: RelativePath) -> bool {
        self.submit(ActionKind::Copy, root, path)
    }

    /// Queues a delete of `path`
    pub fn delete(&self, root: &Arc<MirrorRoot>, path: RelativePath) -> bool {
        self.submit(ActionKind::Delete, root, path)
    }
}

// ============================================================================
// QueueWorker
// ============================================================================

/// Owns the pending actions and executes them one at a time
pub struct QueueWorker {
    rx: mpsc::UnboundedReceiver<Submission>,
    pending: VecDeque<QueuedAction>,
    debounce: Duration,
    display: Arc<dyn IStatusDisplay>,
    busy: bool,
    /// Every producer handle has been dropped
    closed: bool,
}

impl QueueWorker {
    /// Runs the worker loop until all producers are gone and nothing is
    /// pending
    ///
    /// # Errors
    /// Returns [`QueueError::WorkerInterrupted`] if an action panicked or its
    /// blocking task was cancelled. The display is marked as errored first.
    #[instrument(skip(self), name = "queue_worker")]
    pub async fn run(mut self) -> Result<(), QueueError> {
        info!("Action queue worker started");

        loop {
            self.drain_submissions();

            let Some(head) = self.pending.pop_front() else {
                if self.busy {
                    self.busy = false;
                    self.display.mark_idle();
                    debug!("Action queue idle");
                }
                if self.closed {
                    break;
                }
                match self.rx.recv().await {
                    Some(submission) => self.push(submission),
                    None => self.closed = true,
                }
                continue;
            };

            if !self.busy {
                self.busy = true;
                self.display.mark_busy();
                debug!("Action queue busy");
            }

            self.wait_until(head.due).await;

            if let Some(other) = self.pending.iter().find(|other| head.made_unnecessary_by(other)) {
                debug!(
                    root = head.root.index(),
                    kind = %head.kind,
                    path = %head.path,
                    by_kind = %other.kind,
                    by_path = %other.path,
                    "Skipping action made unnecessary by a later one"
                );
                continue;
            }

            let before = self.pending.len();
            self.pending.retain(|other| !head.makes_unnecessary(other));
            let removed = before - self.pending.len();
            if removed > 0 {
                debug!(
                    root = head.root.index(),
                    kind = %head.kind,
                    path = %head.path,
                    removed,
                    "Coalesced pending actions"
                );
            }

            self.execute(head).await?;
        }

        info!("Action queue worker stopped");
        Ok(())
    }

    /// Moves every submission already in the channel into the pending
    /// sequence
    fn drain_submissions(&mut self) {
        if self.closed {
            return;
        }
        loop {
            match self.rx.try_recv() {
                Ok(submission) => self.push(submission),
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    self.closed = true;
                    break;
                }
            }
        }
    }

    fn push(&mut self, submission: Submission) {
        self.pending.push_back(QueuedAction {
            kind: submission.kind,
            root: submission.root,
            path: submission.path,
            due: submission.submitted_at + self.debounce,
        });
    }

    /// Sleeps until `due` while still accepting submissions
    async fn wait_until(&mut self, due: Instant) {
        let sleep = tokio::time::sleep_until(due);
        tokio::pin!(sleep);

        loop {
            if self.closed {
                sleep.as_mut().await;
                return;
            }
            tokio::select! {
                _ = sleep.as_mut() => return,
                received = self.rx.recv() => match received {
                    Some(submission) => self.push(submission),
                    None => self.closed = true,
                },
            }
        }
    }

    /// Runs one action on the blocking pool and waits for it
    async fn execute(&mut self, action: QueuedAction) -> Result<(), QueueError> {
        let QueuedAction {
            kind, root, path, ..
        } = action;
        let index = root.index();

        let task = tokio::task::spawn_blocking(move || root.apply(kind, &path));
        match task.await {
            Ok(outcome) => {
                if outcome.is_failure() {
                    warn!(root = index, %kind, %outcome, "Action failed");
                    self.display.mark_error();
                }
                Ok(())
            }
            Err(e) => {
                error!(root = index, %kind, error = %e, "Action task did not complete");
                self.display.mark_error();
                Err(QueueError::WorkerInterrupted(e.to_string()))
            }
        }
    }
}

// ============================================================================
// Unit tests
// ============================================================================
