//! Integration tests for treemirror-sync
//!
//! Drive the mirror engine, the action queue and the full service against
//! real temporary directories, observing progress through a recording
//! status display.

mod common;

mod test_mirror_queue;
mod test_service;
