//! Copy/delete engine for one mirrored root
//!
//! [`MirrorRoot`] owns a root's source/target pair and performs the actual
//! filesystem work for the action queue. All of its operations run on the
//! queue worker's blocking thread, never on a watcher task.
//!
//! ## Behaviour
//!
//! - **Copy** always deletes the target path first, then recreates it from
//!   the source. Entries that vanish from the source mid-walk make the copy
//!   `PARTIAL`; a missing source file makes it `ABSENT`.
//! - **Delete** removes a target subtree bottom-up and treats "already gone"
//!   as success for every entry. The target root directory itself is never
//!   removed, compared by file identity rather than by name.
//! - Individual file copies are retried on permission/sharing violations.
//!
//! Every operation writes one line to the status display:
//!
//! ```text
//! 1 docs/report.txt - Delete OK Copy OK
//! 2 Recopy - Delete . . OK 812ms Copy . . . OK 1630ms
//! ```

use std::fs;
use std::io::{self, ErrorKind};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};
use treemirror_core::config::MirrorConfig;
use treemirror_core::domain::outcome::{slow_millis, DEFAULT_SLOW_THRESHOLD};
use treemirror_core::domain::{is_excluded, ActionKind, Outcome, RelativePath, RootDescriptor};
use treemirror_core::ports::{IStatusDisplay, TextStyle};
use walkdir::WalkDir;

use crate::MirrorError;

/// Number of files between progress dots
const PROGRESS_EVERY: usize = 100;

// ============================================================================
// MirrorSettings
// ============================================================================

/// Tunables of the copy/delete engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorSettings {
    /// Operations slower than this show their elapsed time
    pub slow_threshold: Duration,
    /// Attempts per file on a permission/sharing violation
    pub copy_retries: u32,
    /// Pause between attempts
    pub retry_pause: Duration,
}

impl Default for MirrorSettings {
    fn default() -> Self {
        Self {
            slow_threshold: DEFAULT_SLOW_THRESHOLD,
            copy_retries: 3,
            retry_pause: Duration::from_millis(50),
        }
    }
}

impl From<&MirrorConfig> for MirrorSettings {
    fn from(config: &MirrorConfig) -> Self {
        Self {
            slow_threshold: config.slow_threshold(),
            copy_retries: config.copy_retries.max(1),
            retry_pause: config.retry_pause(),
        }
    }
}

impl MirrorError {
    /// True when the error means "the entry is not there (any more)"
    pub fn is_not_found(&self) -> bool {
        match self {
            MirrorError::IoError(e) => e.kind() == ErrorKind::NotFound,
            MirrorError::WalkError(e) => e
                .io_error()
                .is_some_and(|io| io.kind() == ErrorKind::NotFound),
            MirrorError::PathNotFound(_) => true,
        }
    }
}

// ============================================================================
// MirrorRoot
// ============================================================================

/// One source/target pair and the operations that keep the target in step
pub struct MirrorRoot {
    descriptor: RootDescriptor,
    settings: MirrorSettings,
    display: Arc<dyn IStatusDisplay>,
}

impl std::fmt::Debug for MirrorRoot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MirrorRoot")
            .field("descriptor", &self.descriptor)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// What the delete phase did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DeleteReport {
    /// Something existed and a line was started on the display
    shown: bool,
    /// The deletion failed
    failed: bool,
}

impl MirrorRoot {
    /// Creates the engine for one root
    pub fn new(
        descriptor: RootDescriptor,
        settings: MirrorSettings,
        display: Arc<dyn IStatusDisplay>,
    ) -> Self {
        Self {
            descriptor,
            settings,
            display,
        }
    }

    pub fn index(&self) -> usize {
        self.descriptor.index
    }

    pub fn source(&self) -> &Path {
        &self.descriptor.source
    }

    pub fn target(&self) -> &Path {
        &self.descriptor.target
    }

    /// Runs one queued action
    pub fn apply(&self, kind: ActionKind, path: &RelativePath) -> Outcome {
        match kind {
            ActionKind::Copy => self.copy(path),
            ActionKind::Delete => self.delete(path),
        }
    }

    // ========================================================================
    // Copy
    // ========================================================================

    /// Deletes the target path and re-copies it from the source
    ///
    /// Returns `Outcome::Error` if either the delete phase or the copy
    /// phase failed.
    #[instrument(skip_all, fields(root = self.descriptor.index, path = %path))]
    pub fn copy(&self, path: &RelativePath) -> Outcome {
        let deleted = self.delete_target(path, true);

        let source = path.resolve(self.source());
        let target = path.resolve(self.target());

        self.display.append_plain("Copy");
        let start = Instant::now();

        let outcome = match fs::metadata(&source) {
            Ok(meta) if meta.is_dir() => self.copy_directory(&source, &target),
            _ => self.copy_single(&source, &target),
        };

        match outcome {
            Ok(outcome) => {
                self.display
                    .append_text(&format!(" {} ", outcome), TextStyle::Key);
                self.show_slow_time(start);
                self.display.append_plain("\n");
                info!(
                    outcome = %outcome,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Copy finished"
                );
                if deleted.failed {
                    Outcome::Error
                } else {
                    outcome
                }
            }
            Err(e) => {
                self.display.append_text(" ERROR\n", TextStyle::Error);
                warn!(error = %e, "Copy failed");
                Outcome::Error
            }
        }
    }

    /// Copies a file, or reports `Absent` when the source has gone
    fn copy_single(&self, source: &Path, target: &Path) -> Result<Outcome, MirrorError> {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        match self.copy_with_retry(source, target) {
            Ok(()) => Ok(Outcome::Ok),
            Err(e) if e.is_not_found() => {
                debug!(source = %source.display(), "Source vanished before copy");
                Ok(Outcome::Absent)
            }
            Err(e) => Err(e),
        }
    }

    /// Recreates a source directory tree under the target
    ///
    /// Excluded subdirectories are skipped. A link to a directory becomes an
    /// empty directory, its contents are not followed. Entries that disappear
    /// while the walk is running turn the result into `Partial`.
    fn copy_directory(&self, source: &Path, target: &Path) -> Result<Outcome, MirrorError> {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }

        let source_root = self.source();
        let target_root = self.target();
        let mut partial = false;
        let mut files = 0usize;

        let walker = WalkDir::new(source).into_iter().filter_entry(|entry| {
            !(entry.file_type().is_dir()
                && entry
                    .path()
                    .strip_prefix(source_root)
                    .is_ok_and(is_excluded))
        });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let e = MirrorError::from(e);
                    if e.is_not_found() {
                        debug!(error = %e, "Entry vanished during copy walk");
                        partial = true;
                        continue;
                    }
                    return Err(e);
                }
            };

            let relative = entry
                .path()
                .strip_prefix(source_root)
                .map_err(|_| MirrorError::PathNotFound(entry.path().to_path_buf()))?;
            let destination = target_root.join(relative);

            if entry.file_type().is_dir() {
                fs::create_dir_all(&destination)?;
                continue;
            }

            if entry.path_is_symlink() && fs::metadata(entry.path()).is_ok_and(|m| m.is_dir()) {
                debug!(path = %entry.path().display(), "Linked folder copied as empty folder");
                fs::create_dir_all(&destination)?;
                continue;
            }

            match self.copy_with_retry(entry.path(), &destination) {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {
                    debug!(path = %entry.path().display(), "File vanished during copy");
                    partial = true;
                }
                Err(e) => return Err(e),
            }

            files += 1;
            if files % PROGRESS_EVERY == 0 {
                self.display.append_plain(" .");
            }
        }

        debug!(files, partial, "Directory copy walk complete");
        Ok(if partial { Outcome::Partial } else { Outcome::Ok })
    }

    /// Copies one file, retrying on permission/sharing violations
    ///
    /// Other errors are returned at once; after the last attempt the last
    /// permission error is returned.
    fn copy_with_retry(&self, source: &Path, target: &Path) -> Result<(), MirrorError> {
        copy_with_retry(
            source,
            target,
            self.settings.copy_retries,
            self.settings.retry_pause,
        )
    }

    // ========================================================================
    // Delete
    // ========================================================================

    /// Deletes the target path
    ///
    /// Shows nothing when there is nothing to delete.
    #[instrument(skip_all, fields(root = self.descriptor.index, path = %path))]
    pub fn delete(&self, path: &RelativePath) -> Outcome {
        let report = self.delete_target(path, false);
        if report.shown {
            self.display.append_plain("\n");
        }
        if report.failed {
            Outcome::Error
        } else {
            Outcome::Ok
        }
    }

    fn delete_target(&self, path: &RelativePath, display_anyway: bool) -> DeleteReport {
        let target = path.resolve(self.target());

        let meta = match fs::symlink_metadata(&target) {
            Ok(meta) => meta,
            Err(_) => {
                if display_anyway {
                    self.show_path(path);
                    self.display.append_plain(" - ");
                }
                return DeleteReport {
                    shown: false,
                    failed: false,
                };
            }
        };

        self.show_path(path);
        self.display.append_plain(" - Delete");
        let start = Instant::now();

        let result = if meta.is_dir() {
            self.delete_tree(&target)
        } else {
            remove_if_present(&target, false)
        };

        match result {
            Ok(()) => {
                self.display.append_text(" OK ", TextStyle::Key);
                self.show_slow_time(start);
                info!(
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Delete finished"
                );
                DeleteReport {
                    shown: true,
                    failed: false,
                }
            }
            Err(e) => {
                self.display.append_text(" ERROR ", TextStyle::Error);
                warn!(error = %e, target = %target.display(), "Delete failed");
                DeleteReport {
                    shown: true,
                    failed: true,
                }
            }
        }
    }

    /// Removes everything below `dir` bottom-up, then `dir` itself unless it
    /// is the target root
    fn delete_tree(&self, dir: &Path) -> Result<(), MirrorError> {
        let is_root = same_file(self.target(), dir)?;
        let mut files = 0usize;

        for entry in WalkDir::new(dir).min_depth(1).contents_first(true) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let e = MirrorError::from(e);
                    if e.is_not_found() {
                        continue;
                    }
                    return Err(e);
                }
            };

            let is_dir = entry.file_type().is_dir();
            remove_if_present(entry.path(), is_dir)?;

            if !is_dir {
                files += 1;
                if files % PROGRESS_EVERY == 0 {
                    self.display.append_plain(" .");
                }
            }
        }

        if is_root {
            debug!(target = %dir.display(), "Kept target root directory");
        } else {
            remove_if_present(dir, true)?;
        }
        Ok(())
    }

    // ========================================================================
    // Display helpers
    // ========================================================================

    /// Writes the root identifier and the path (or `Recopy` for the root)
    fn show_path(&self, path: &RelativePath) {
        let index = self.descriptor.index;
        self.display
            .append_text(&format!("{} ", index), TextStyle::Root(index));
        if path.is_root() {
            self.display.append_text("Recopy", TextStyle::Key);
        } else {
            self.display
                .append_text(&path.to_string(), TextStyle::Highlight);
        }
    }

    fn show_slow_time(&self, start: Instant) {
        if let Some(ms) = slow_millis(start.elapsed(), self.settings.slow_threshold) {
            self.display.append_text(&ms.to_string(), TextStyle::Slow);
            self.display.append_plain("ms ");
        }
    }
}

// ============================================================================
// Filesystem helpers
// ============================================================================

/// Copies `source` to `target`, retrying up to `attempts` times on
/// `PermissionDenied` with `pause` between attempts
pub fn copy_with_retry(
    source: &Path,
    target: &Path,
    attempts: u32,
    pause: Duration,
) -> Result<(), MirrorError> {
    retry_denied(source, attempts, pause, || fs::copy(source, target).map(drop))
}

/// Runs `op` until it succeeds, fails with anything but `PermissionDenied`,
/// or has been tried `attempts` times
fn retry_denied(
    source: &Path,
    attempts: u32,
    pause: Duration,
    mut op: impl FnMut() -> io::Result<()>,
) -> Result<(), MirrorError> {
    let mut last = None;
    for attempt in 0..attempts.max(1) {
        if attempt > 0 {
            std::thread::sleep(pause);
        }
        match op() {
            Ok(()) => return Ok(()),
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                debug!(attempt, source = %source.display(), "Copy denied, retrying");
                last = Some(e);
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(MirrorError::PathNotFound(source.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        }
    }
    Err(last
        .map(MirrorError::from)
        .unwrap_or_else(|| MirrorError::PathNotFound(source.to_path_buf())))
}

/// Removes a file or empty directory; "already gone" counts as success
fn remove_if_present(path: &Path, is_dir: bool) -> Result<(), MirrorError> {
    let result = if is_dir {
        fs::remove_dir(path)
    } else {
        fs::remove_file(path)
    };
    match result {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => {
            if fs::symlink_metadata(path).is_err() {
                Ok(())
            } else {
                Err(e.into())
            }
        }
    }
}

/// File identity comparison, immune to symlinks and case-insensitive names
#[cfg(unix)]
pub fn same_file(a: &Path, b: &Path) -> std::io::Result<bool> {
    use std::os::unix::fs::MetadataExt;

    let a = fs::metadata(a)?;
    let b = fs::metadata(b)?;
    Ok(a.dev() == b.dev() && a.ino() == b.ino())
}

/// File identity comparison, immune to symlinks and case-insensitive names
#[cfg(not(unix))]
pub fn same_file(a: &Path, b: &Path) -> std::io::Result<bool> {
    Ok(fs::canonicalize(a)? == fs::canonicalize(b)?)
}

// ============================================================================
// Unit tests
// ============================================================================

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::test_support::RecordingDisplay;

    struct Fixture {
        source: TempDir,
        target: TempDir,
        display: Arc<RecordingDisplay>,
        root: MirrorRoot,
    }

    fn fixture() -> Fixture {
        fixture_with(MirrorSettings::default())
    }

    fn fixture_with(settings: MirrorSettings) -> Fixture {
        let source = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        let display = Arc::new(RecordingDisplay::default());
        let root = MirrorRoot::new(
            RootDescriptor::new(1, "test", source.path(), target.path()),
            settings,
            display.clone(),
        );
        Fixture {
            source,
            target,
            display,
            root,
        }
    }

    fn rel(s: &str) -> RelativePath {
        RelativePath::new(s).unwrap()
    }

    fn write(base: &Path, rel: &str, content: &str) {
        let path = base.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    // ------------------------------------------------------------------
    // copy
    // ------------------------------------------------------------------

    #[test]
    fn test_copy_single_file() {
        let f = fixture();
        write(f.source.path(), "a/b.txt", "hello");

        let outcome = f.root.copy(&rel("a/b.txt"));

        assert_eq!(outcome, Outcome::Ok);
        assert_eq!(
            fs::read_to_string(f.target.path().join("a/b.txt")).unwrap(),
            "hello"
        );
        assert!(f.display.text().contains("1 a/b.txt - Copy OK"));
    }

    #[test]
    fn test_copy_replaces_existing_target_content() {
        let f = fixture();
        write(f.source.path(), "d/new.txt", "new");
        write(f.target.path(), "d/stale.txt", "stale");

        assert_eq!(f.root.copy(&rel("d")), Outcome::Ok);

        assert!(f.target.path().join("d/new.txt").exists());
        assert!(!f.target.path().join("d/stale.txt").exists());
        assert!(f.display.text().contains("d - Delete OK Copy OK"));
    }

    #[test]
    fn test_copy_is_idempotent() {
        let f = fixture();
        write(f.source.path(), "tree/x.txt", "x");
        write(f.source.path(), "tree/sub/y.txt", "y");

        assert_eq!(f.root.copy(&rel("tree")), Outcome::Ok);
        assert_eq!(f.root.copy(&rel("tree")), Outcome::Ok);

        assert_eq!(
            fs::read_to_string(f.target.path().join("tree/x.txt")).unwrap(),
            "x"
        );
        assert_eq!(
            fs::read_to_string(f.target.path().join("tree/sub/y.txt")).unwrap(),
            "y"
        );
    }

    #[test]
    fn test_copy_missing_source_is_absent() {
        let f = fixture();

        let outcome = f.root.copy(&rel("gone.txt"));

        assert_eq!(outcome, Outcome::Absent);
        assert!(!outcome.is_failure());
        assert!(f.display.text().contains("gone.txt - Copy ABSENT"));
    }

    #[test]
    fn test_copy_directory_skips_excluded_folders() {
        let f = fixture();
        write(f.source.path(), "proj/src/main.rs", "fn main() {}");
        write(f.source.path(), "proj/.git/HEAD", "ref: main");
        write(f.source.path(), "proj/vendor/lib.php", "<?php");

        assert_eq!(f.root.copy(&rel("proj")), Outcome::Ok);

        assert!(f.target.path().join("proj/src/main.rs").exists());
        assert!(!f.target.path().join("proj/.git").exists());
        assert!(!f.target.path().join("proj/vendor").exists());
    }

    #[test]
    fn test_copy_root_recopies_everything() {
        let f = fixture();
        write(f.source.path(), "one.txt", "1");
        write(f.source.path(), "deep/two.txt", "2");
        write(f.target.path(), "orphan.txt", "?");

        assert_eq!(f.root.copy(&RelativePath::root()), Outcome::Ok);

        assert!(f.target.path().exists());
        assert!(f.target.path().join("one.txt").exists());
        assert!(f.target.path().join("deep/two.txt").exists());
        assert!(!f.target.path().join("orphan.txt").exists());
        assert!(f.display.text().starts_with("1 Recopy - Delete OK Copy OK"));
    }

    #[test]
    fn test_copy_shows_slow_time_only_above_threshold() {
        let fast = fixture();
        write(fast.source.path(), "f.txt", "x");
        fast.root.copy(&rel("f.txt"));
        assert!(fast.display.styled(TextStyle::Slow).is_empty());

        let slow = fixture_with(MirrorSettings {
            slow_threshold: Duration::ZERO,
            ..MirrorSettings::default()
        });
        write(slow.source.path(), "f.txt", "x");
        slow.root.copy(&rel("f.txt"));
        assert_eq!(slow.display.styled(TextStyle::Slow).len(), 1);
    }

    #[test]
    fn test_copy_progress_dots() {
        let f = fixture();
        for i in 0..150 {
            write(f.source.path(), &format!("many/file{i:03}.txt"), "x");
        }

        assert_eq!(f.root.copy(&rel("many")), Outcome::Ok);

        let count = fs::read_dir(f.target.path().join("many")).unwrap().count();
        assert_eq!(count, 150);
        assert!(f.display.text().contains("Copy . OK"));
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_directory_with_linked_folder() {
        let f = fixture();
        let outside = TempDir::new().unwrap();
        write(outside.path(), "elsewhere.txt", "e");
        write(f.source.path(), "proj/src/main.rs", "fn main() {}");
        write(f.source.path(), "proj/zz_after.txt", "after");
        std::os::unix::fs::symlink(outside.path(), f.source.path().join("proj/link")).unwrap();

        assert_eq!(f.root.copy(&rel("proj")), Outcome::Ok);

        assert!(f.target.path().join("proj/src/main.rs").exists());
        assert!(f.target.path().join("proj/zz_after.txt").exists());
        let link = f.target.path().join("proj/link");
        assert!(fs::symlink_metadata(&link).unwrap().is_dir());
        assert!(!link.join("elsewhere.txt").exists());
        assert!(f.display.text().contains("proj - Copy OK"));
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_directory_with_vanished_entry_is_partial() {
        let f = fixture();
        write(f.source.path(), "proj/keep.txt", "k");
        std::os::unix::fs::symlink(
            f.source.path().join("proj/was-here.txt"),
            f.source.path().join("proj/dangling"),
        )
        .unwrap();

        let outcome = f.root.copy(&rel("proj"));

        assert_eq!(outcome, Outcome::Partial);
        assert!(!outcome.is_failure());
        assert!(f.target.path().join("proj/keep.txt").exists());
        assert!(f.display.text().contains("proj - Copy PARTIAL"));
        assert!(f.display.events().is_empty());
    }

    // ------------------------------------------------------------------
    // delete
    // ------------------------------------------------------------------

    #[test]
    fn test_delete_file() {
        let f = fixture();
        write(f.target.path(), "x.txt", "x");

        assert_eq!(f.root.delete(&rel("x.txt")), Outcome::Ok);

        assert!(!f.target.path().join("x.txt").exists());
        assert_eq!(f.display.text(), "1 x.txt - Delete OK \n");
    }

    #[test]
    fn test_delete_directory_tree() {
        let f = fixture();
        write(f.target.path(), "d/a.txt", "a");
        write(f.target.path(), "d/e/b.txt", "b");

        assert_eq!(f.root.delete(&rel("d")), Outcome::Ok);

        assert!(!f.target.path().join("d").exists());
        assert!(f.target.path().exists());
    }

    #[test]
    fn test_delete_nothing_shows_nothing() {
        let f = fixture();

        assert_eq!(f.root.delete(&rel("missing")), Outcome::Ok);

        assert!(f.display.text().is_empty());
    }

    #[test]
    fn test_delete_never_removes_root() {
        let f = fixture();
        write(f.target.path(), "a.txt", "a");
        write(f.target.path(), "sub/b.txt", "b");

        assert_eq!(f.root.delete(&RelativePath::root()), Outcome::Ok);

        assert!(f.target.path().is_dir());
        assert_eq!(fs::read_dir(f.target.path()).unwrap().count(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_delete_symlink_removes_link_only() {
        let f = fixture();
        let outside = TempDir::new().unwrap();
        write(outside.path(), "keep.txt", "keep");
        std::os::unix::fs::symlink(outside.path(), f.target.path().join("link")).unwrap();

        assert_eq!(f.root.delete(&rel("link")), Outcome::Ok);

        assert!(fs::symlink_metadata(f.target.path().join("link")).is_err());
        assert!(outside.path().join("keep.txt").exists());
    }

    // ------------------------------------------------------------------
    // helpers
    // ------------------------------------------------------------------

    #[test]
    fn test_apply_dispatches_by_kind() {
        let f = fixture();
        write(f.source.path(), "k.txt", "k");

        assert_eq!(f.root.apply(ActionKind::Copy, &rel("k.txt")), Outcome::Ok);
        assert!(f.target.path().join("k.txt").exists());

        assert_eq!(f.root.apply(ActionKind::Delete, &rel("k.txt")), Outcome::Ok);
        assert!(!f.target.path().join("k.txt").exists());
    }

    #[test]
    fn test_copy_with_retry_missing_source() {
        let dir = TempDir::new().unwrap();
        let err = copy_with_retry(
            &dir.path().join("nope"),
            &dir.path().join("out"),
            3,
            Duration::from_millis(1),
        )
        .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_retry_recovers_after_denied_attempts() {
        let mut calls = 0;
        let result = retry_denied(Path::new("f.txt"), 3, Duration::ZERO, || {
            calls += 1;
            if calls < 3 {
                Err(io::Error::from(ErrorKind::PermissionDenied))
            } else {
                Ok(())
            }
        });

        assert!(result.is_ok());
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_retry_returns_last_denial() {
        let mut calls = 0;
        let err = retry_denied(Path::new("f.txt"), 3, Duration::ZERO, || {
            calls += 1;
            Err(io::Error::new(
                ErrorKind::PermissionDenied,
                format!("denied {calls}"),
            ))
        })
        .unwrap_err();

        assert_eq!(calls, 3);
        assert!(!err.is_not_found());
        assert!(matches!(
            &err,
            MirrorError::IoError(e) if e.kind() == ErrorKind::PermissionDenied && e.to_string() == "denied 3"
        ));
    }

    #[test]
    fn test_retry_does_not_repeat_other_errors() {
        let mut calls = 0;
        let err = retry_denied(Path::new("f.txt"), 3, Duration::ZERO, || {
            calls += 1;
            Err(io::Error::from(ErrorKind::InvalidData))
        })
        .unwrap_err();

        assert_eq!(calls, 1);
        assert!(matches!(err, MirrorError::IoError(_)));
    }

    #[test]
    fn test_same_file_identity() {
        let dir = TempDir::new().unwrap();
        let sub = dir.path().join("sub");
        fs::create_dir(&sub).unwrap();

        assert!(same_file(dir.path(), &dir.path().join("sub/..")).unwrap());
        assert!(!same_file(dir.path(), &sub).unwrap());
    }

    #[test]
    fn test_settings_from_config() {
        let config = MirrorConfig {
            slow_threshold_ms: 900,
            copy_retries: 0,
            retry_pause_ms: 5,
        };
        let settings = MirrorSettings::from(&config);
        assert_eq!(settings.slow_threshold, Duration::from_millis(900));
        assert_eq!(settings.copy_retries, 1);
        assert_eq!(settings.retry_pause, Duration::from_millis(5));
    }
}
