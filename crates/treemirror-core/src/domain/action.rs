//! Pending mirror actions and the coalescing algebra
//!
//! An action is a Copy or Delete of a [`RelativePath`] under one root.
//! Before an action executes, the queue compares it against every action
//! still waiting for the same root:
//!
//! | Popped    | Other queued                        | Effect                   |
//! |-----------|-------------------------------------|--------------------------|
//! | Copy(P)   | any action at P or below P          | other is dropped         |
//! | Copy(P)   | Delete(D), D at or above P          | popped Copy is skipped   |
//! | Delete(P) | any                                 | nothing is dropped       |
//! | Delete(P) | Copy(C), C at or above P            | popped Delete is skipped |
//!
//! Copy always deletes and recreates its whole subtree, so it is
//! authoritative over anything beneath it. Delete is not: a later Copy may
//! still be needed after it runs.

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

use super::newtypes::RelativePath;

/// Kind of pending work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Delete the target path, then copy the source path over it
    Copy,
    /// Delete the target path
    Delete,
}

impl Display for ActionKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let s = match self {
            ActionKind::Copy => "copy",
            ActionKind::Delete => "delete",
        };
        write!(f, "{}", s)
    }
}

/// Returns true if the popped action `(kind, path)` makes the queued action
/// `(other_kind, other_path)` unnecessary, so the queued one can be dropped
pub fn makes_unnecessary(
    kind: ActionKind,
    path: &RelativePath,
    _other_kind: ActionKind,
    other_path: &RelativePath,
) -> bool {
    match kind {
        ActionKind::Copy => other_path.is_within(path),
        ActionKind::Delete => false,
    }
}

/// Returns true if the popped action `(kind, path)` is made unnecessary by
/// the queued action `(other_kind, other_path)`, so the popped one can be
/// skipped
pub fn made_unnecessary_by(
    kind: ActionKind,
    path: &RelativePath,
    other_kind: ActionKind,
    other_path: &RelativePath,
) -> bool {
    match (kind, other_kind) {
        (ActionKind::Copy, ActionKind::Delete) => path.is_within(other_path),
        (ActionKind::Delete, ActionKind::Copy) => path.is_within(other_path),
        _ => false,
    }
}
