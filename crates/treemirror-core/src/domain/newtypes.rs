//! Domain newtypes with validation
//!
//! This module provides strongly-typed wrappers for the values that flow
//! between watcher, queue and mirror engine. Each newtype ensures data
//! validity at construction time.

use std::fmt::{self, Display, Formatter};
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

// ============================================================================
// RelativePath - path below a mirrored root
// ============================================================================

/// A path relative to a mirrored root
///
/// RelativePath ensures the path is:
/// - Not absolute (no root or prefix component)
/// - Free of `..` components, so it can never leave its root
/// - Normalized (`.` components dropped)
///
/// The empty path denotes the root itself and is displayed as `.`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "PathBuf", into = "PathBuf")]
pub struct RelativePath(PathBuf);

impl RelativePath {
    /// Create a new RelativePath, validating and normalizing it
    ///
    /// # Errors
    /// Returns `DomainError::AbsolutePath` for absolute input and
    /// `DomainError::EscapesRoot` if any component is `..`
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, DomainError> {
        let path = path.into();
        let mut normalized = PathBuf::new();

        for component in path.components() {
            match component {
                Component::Prefix(_) | Component::RootDir => {
                    return Err(DomainError::AbsolutePath(path.display().to_string()));
                }
                Component::ParentDir => {
                    return Err(DomainError::EscapesRoot(path.display().to_string()));
                }
                Component::CurDir => {}
                Component::Normal(c) => normalized.push(c),
            }
        }

        Ok(Self(normalized))
    }

    /// The root itself
    #[must_use]
    pub fn root() -> Self {
        Self(PathBuf::new())
    }

    /// Compute the relative path of `path` below `root`
    ///
    /// # Errors
    /// Returns `DomainError::PathNotInRoot` if `path` is not under `root`,
    /// or the errors of [`RelativePath::new`] for the remainder
    pub fn from_within(root: &Path, path: &Path) -> Result<Self, DomainError> {
        let relative = path
            .strip_prefix(root)
            .map_err(|_| DomainError::PathNotInRoot {
                root: root.display().to_string(),
                path: path.display().to_string(),
            })?;
        Self::new(relative)
    }

    /// Whether this path denotes the root itself
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.as_os_str().is_empty()
    }

    /// Get the inner path
    #[must_use]
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// True if `self` equals `ancestor` or lies beneath it (component-wise)
    #[must_use]
    pub fn is_within(&self, ancestor: &RelativePath) -> bool {
        self.0.starts_with(&ancestor.0)
    }

    /// Resolve this path under an absolute base directory
    #[must_use]
    pub fn resolve(&self, base: &Path) -> PathBuf {
        if self.is_root() {
            base.to_path_buf()
        } else {
            base.join(&self.0)
        }
    }
}

impl Display for RelativePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            write!(f, ".")
        } else {
            write!(f, "{}", self.0.display())
        }
    }
}

impl TryFrom<PathBuf> for RelativePath {
    type Error = DomainError;

    fn try_from(path: PathBuf) -> Result<Self, Self::Error> {
        Self::new(path)
    }
}

impl TryFrom<&str> for RelativePath {
    type Error = DomainError;

    fn try_from(path: &str) -> Result<Self, Self::Error> {
        Self::new(path)
    }
}

impl From<RelativePath> for PathBuf {
    fn from(path: RelativePath) -> Self {
        path.0
    }
}

impl AsRef<Path> for RelativePath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

// ============================================================================
// RootDescriptor - one configured source/target pair
// ============================================================================

/// One mirrored `{source, target}` directory pair
///
/// Created once at startup from configuration and never mutated.
/// `index` is the 1-based position of the root in the configuration and
/// is used to identify the root in the display and in wipe requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootDescriptor {
    /// 1-based position of the root in the configuration
    pub index: usize,
    /// Human readable label, defaults to the source directory name
    pub label: String,
    /// Directory being watched
    pub source: PathBuf,
    /// Directory receiving the mirror
    pub target: PathBuf,
}

impl RootDescriptor {
    /// Create a new RootDescriptor
    pub fn new(
        index: usize,
        label: impl Into<String>,
        source: impl Into<PathBuf>,
        target: impl Into<PathBuf>,
    ) -> Self {
        Self {
            index,
            label: label.into(),
            source: source.into(),
            target: target.into(),
        }
    }
}

impl Display for RootDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} => {}",
            self.index,
            self.source.display(),
            self.target.display()
        )
    }
}
