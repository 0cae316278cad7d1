//! Domain error types
//!
//! This module defines error types specific to domain operations:
//! relative path validation and root containment.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Path is absolute where a root-relative path was required
    #[error("Path is absolute: {0}")]
    AbsolutePath(String),

    /// Path climbs out of its root through a `..` component
    #[error("Path escapes its root: {0}")]
    EscapesRoot(String),

    /// Path is not located under the given root directory
    #[error("Path not within root {root}: {path}")]
    PathNotInRoot {
        /// The root directory
        root: String,
        /// The offending path
        path: String,
    },
}
