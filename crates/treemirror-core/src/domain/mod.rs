//! Domain entities and business logic
//!
//! This module contains the core domain types for treemirror:
//! - Newtypes for validated relative paths and root descriptors
//! - Action kinds and the coalescing rules between pending actions
//! - Path exclusion rules
//! - Copy/delete outcomes
//! - Domain-specific error types

pub mod action;
pub mod errors;
pub mod newtypes;
pub mod outcome;
pub mod path_filter;

// Re-export commonly used types
pub use action::{made_unnecessary_by, makes_unnecessary, ActionKind};
pub use errors::DomainError;
pub use newtypes::*;
pub use outcome::Outcome;
pub use path_filter::is_excluded;
