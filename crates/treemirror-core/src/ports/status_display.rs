//! Status display port (driven/secondary port)
//!
//! This module defines the interface through which the mirror reports
//! progress to the user: a running, styled text log plus busy/idle/error
//! state. Implementations may print to a terminal, emit JSON lines, or
//! record calls for tests.
//!
//! ## Design Notes
//!
//! - Calls are fire-and-forget; the core never reads state back.
//! - Text arrives in fragments; a line is complete when a fragment ends
//!   with `\n`. Fragments from one copy/delete are emitted from a single
//!   thread (the queue worker) so they do not interleave with each other.
//! - Methods are synchronous because they are called from blocking
//!   filesystem code on the queue worker.

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

// ============================================================================
// TextStyle enum
// ============================================================================

/// Visual style tag for a text fragment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextStyle {
    /// Ordinary text
    #[default]
    Plain,
    /// Paths being processed
    Highlight,
    /// Outcomes and key values (OK, PARTIAL, folder counts)
    Key,
    /// Failures
    Error,
    /// Elapsed time of a slow operation
    Slow,
    /// Identifier of a root; the index picks a colour
    Root(usize),
}

impl Display for TextStyle {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            TextStyle::Plain => write!(f, "plain"),
            TextStyle::Highlight => write!(f, "highlight"),
            TextStyle::Key => write!(f, "key"),
            TextStyle::Error => write!(f, "error"),
            TextStyle::Slow => write!(f, "slow"),
            TextStyle::Root(index) => write!(f, "root{}", index),
        }
    }
}

// ============================================================================
// IStatusDisplay trait
// ============================================================================

/// Port trait for reporting mirror progress and state
///
/// ## Implementation Notes
///
/// - `append_text` may be called from any thread.
/// - `mark_busy` / `mark_idle` are called only by the action queue worker
///   and always alternate, starting with `mark_busy`.
/// - `mark_error` is a one-shot signal and may repeat; implementations
///   should latch it.
/// - `startup_finished` is called once per root after its watcher has
///   registered (or failed to register) with the filesystem.
pub trait IStatusDisplay: Send + Sync {
    /// Appends a styled fragment to the running log
    fn append_text(&self, text: &str, style: TextStyle);

    /// The action queue has started working
    fn mark_busy(&self);

    /// The action queue has drained
    fn mark_idle(&self);

    /// Something failed
    fn mark_error(&self);

    /// The watcher of root `index` has finished starting
    fn startup_finished(&self, index: usize);

    /// Appends an unstyled fragment
    fn append_plain(&self, text: &str) {
        self.append_text(text, TextStyle::Plain);
    }

    /// Appends `start` followed by `detail` in error style and a newline
    fn append_error(&self, start: &str, detail: &str) {
        self.append_text(start, TextStyle::Plain);
        self.append_text(detail, TextStyle::Error);
        self.append_text("\n", TextStyle::Plain);
    }
}
