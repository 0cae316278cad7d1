//! Mirror service - wires configured roots to watchers and the queue
//!
//! [`MirrorService::start`] builds one [`MirrorRoot`] and one [`RootWatcher`]
//! per root, spawns every watcher and the single queue worker, and keeps the
//! handles needed for wipes and shutdown.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use treemirror_core::config::Config;
use treemirror_core::domain::{RelativePath, RootDescriptor};
use treemirror_core::ports::IStatusDisplay;

use crate::mirror::{MirrorRoot, MirrorSettings};
use crate::queue::ActionQueue;
use crate::watcher::{RootWatcher, WatchMode};
use crate::QueueError;

/// Running mirror of a set of roots
pub struct MirrorService {
    roots: Vec<Arc<MirrorRoot>>,
    queue: Option<ActionQueue>,
    worker: JoinHandle<Result<(), QueueError>>,
    watchers: Vec<JoinHandle<()>>,
    shutdown: CancellationToken,
}

impl MirrorService {
    /// Starts watching `descriptors` with the queue and engine settings of
    /// `config`
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(
        config: &Config,
        descriptors: Vec<RootDescriptor>,
        display: Arc<dyn IStatusDisplay>,
        shutdown: CancellationToken,
    ) -> Self {
        Self::start_with_mode(config, descriptors, display, shutdown, WatchMode::native())
    }

    /// Same as [`start`](Self::start) with an explicit watch mode
    pub fn start_with_mode(
        config: &Config,
        descriptors: Vec<RootDescriptor>,
        display: Arc<dyn IStatusDisplay>,
        shutdown: CancellationToken,
        mode: WatchMode,
    ) -> Self {
        let (queue, worker) = ActionQueue::new(config.queue.debounce(), display.clone());
        let worker = tokio::spawn(worker.run());

        let settings = MirrorSettings::from(&config.mirror);
        let mut roots = Vec::with_capacity(descriptors.len());
        let mut watchers = Vec::with_capacity(descriptors.len());

        for descriptor in descriptors {
            info!(root = descriptor.index, source = %descriptor.source.display(),
                target = %descriptor.target.display(), "Starting root");
            let root = Arc::new(MirrorRoot::new(
                descriptor,
                settings.clone(),
                display.clone(),
            ));
            let watcher =
                RootWatcher::with_mode(root.clone(), queue.clone(), display.clone(), mode);
            let token = shutdown.child_token();
            let index = root.index();
            watchers.push(tokio::spawn(async move {
                if let Err(e) = watcher.run(token).await {
                    error!(root = index, error = %e, "Watcher ended");
                }
            }));
            roots.push(root);
        }

        Self {
            roots,
            queue: Some(queue),
            worker,
            watchers,
            shutdown,
        }
    }

    /// The mirrored roots in configuration order
    pub fn roots(&self) -> &[Arc<MirrorRoot>] {
        &self.roots
    }

    /// Queues a delete-and-recopy of the whole root `index`
    ///
    /// Returns false if no root has that index or the queue has stopped.
    pub fn wipe(&self, index: usize) -> bool {
        let Some(root) = self.roots.iter().find(|root| root.index() == index) else {
            warn!(index, "Wipe requested for unknown root");
            return false;
        };
        let Some(queue) = &self.queue else {
            return false;
        };
        info!(root = index, "Wipe requested");
        queue.copy(root, RelativePath::root())
    }

    /// Queues a wipe of every root
    pub fn wipe_all(&self) {
        for root in &self.roots {
            self.wipe(root.index());
        }
    }

    /// Stops the watchers, lets the queue drain and waits for the worker
    ///
    /// # Errors
    /// Returns the worker's failure, or [`QueueError::WorkerInterrupted`] if
    /// its task panicked.
    pub async fn shutdown(mut self) -> Result<(), QueueError> {
        self.shutdown.cancel();
        for watcher in self.watchers.drain(..) {
            if let Err(e) = watcher.await {
                warn!(error = %e, "Watcher task did not finish cleanly");
            }
        }
        // Dropping the last handle lets the worker finish once drained
        self.queue.take();
        self.worker
            .await
            .map_err(|e| QueueError::WorkerInterrupted(e.to_string()))?
    }

    /// Waits for the queue worker to end, which only happens on failure
    /// while watchers are running
    pub async fn join_worker(&mut self) -> Result<(), QueueError> {
        (&mut self.worker)
            .await
            .map_err(|e| QueueError::WorkerInterrupted(e.to_string()))?
    }
}
