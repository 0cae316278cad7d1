//! treemirror Sync - Watch, debounce and mirror engine
//!
//! Provides:
//! - One-way mirroring of source trees into target trees
//! - A single debouncing, coalescing action queue shared by all roots
//! - Per-root watchers translating native filesystem events into actions
//!
//! ## Modules
//!
//! - [`queue`] - Action queue and its worker loop
//! - [`mirror`] - Copy/delete engine for one root (runs on the queue worker)
//! - [`watcher`] - Native event subscription and translation for one root
//! - [`service`] - Wires configured roots, watchers and the queue together
//!
//! ## Architecture
//!
//! ```text
//! inotify / FSEvents / ReadDirectoryChanges
//!       │
//!       ▼
//!  RootWatcher (one task per root) ──→ ActionQueue ──→ queue worker ──→ MirrorRoot::copy/delete
//! ```

pub mod mirror;
pub mod queue;
pub mod service;
pub mod watcher;

#[cfg(test)]
pub(crate) mod test_support;

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while copying or deleting inside a mirrored root
#[derive(Debug, Error)]
pub enum MirrorError {
    /// An I/O error occurred during file operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// A directory walk failed
    #[error("Walk error: {0}")]
    WalkError(#[from] walkdir::Error),

    /// The specified path does not exist
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),
}

/// Errors that end a watcher's event loop or prevent it from starting
#[derive(Debug, Error)]
pub enum WatchError {
    /// The native watcher could not be created or a path could not be registered
    #[error("Watcher error: {0}")]
    Notify(#[from] notify::Error),

    /// A native event named a path outside the watched root
    #[error("Unexpected path outside root: {0}")]
    PathOutsideRoot(PathBuf),

    /// A native event carried no path although its kind requires one
    #[error("Unexpected event without path: {0}")]
    UnexpectedEvent(String),

    /// The startup walk of the source tree failed
    #[error("Walk error: {0}")]
    WalkError(#[from] walkdir::Error),

    /// The blocking registration task did not complete
    #[error("Registration task failed: {0}")]
    TaskFailed(String),
}

/// Errors that stop the action queue worker
#[derive(Debug, Error)]
pub enum QueueError {
    /// The worker was interrupted while executing or waiting; no further
    /// work can proceed safely
    #[error("Action queue worker interrupted: {0}")]
    WorkerInterrupted(String),
}
