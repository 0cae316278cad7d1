//! Root watcher - native filesystem events into queued actions
//!
//! One [`RootWatcher`] runs per mirrored root. It subscribes to the
//! platform's change notifications for the source tree and turns each raw
//! `notify` event into copy/delete actions on the shared [`ActionQueue`].
//!
//! ## Watch modes
//!
//! - **Subtree**: backends that can watch a whole tree natively (FSEvents,
//!   ReadDirectoryChanges) get a single recursive registration.
//! - **Per-directory**: every other backend (inotify, kqueue, polling) gets
//!   one registration per non-excluded directory. Registration walks run on
//!   the blocking pool, serialised across roots by a process-wide lock.
//!   Directories created later are registered as their events arrive, and
//!   the whole tree is walked again after a rescan.
//!
//! ## Event mapping
//!
//! | notify event | action |
//! |---|---|
//! | `Create(*)` | copy |
//! | `Remove(*)` | delete |
//! | `Modify(Name(From))` | delete |
//! | `Modify(Name(To))` | copy |
//! | `Modify(Name(Both))` | delete old, copy new |
//! | `Modify(Name(Any/Other))` | copy if the path exists, else delete |
//! | other `Modify(*)` | copy, unless the path is a directory |
//! | rescan flag | copy the whole root |
//! | `Access(*)`, `Any`, `Other` | ignored |

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher, WatcherKind};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use treemirror_core::domain::{is_excluded, RelativePath};
use treemirror_core::ports::{IStatusDisplay, TextStyle};
use walkdir::WalkDir;

use crate::mirror::MirrorRoot;
use crate::queue::ActionQueue;
use crate::WatchError;

/// Capacity of the channel between the notify callback and the event loop
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Held while a root walks its tree registering directories
static WALK_LOCK: Mutex<()> = Mutex::new(());

// ============================================================================
// WatchMode
// ============================================================================

/// How a root's tree is registered with the native watcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchMode {
    /// One recursive registration of the root
    Subtree,
    /// One registration per directory
    PerDirectory,
}

impl WatchMode {
    /// The mode supported by this platform's recommended watcher
    pub fn native() -> Self {
        match <RecommendedWatcher as Watcher>::kind() {
            WatcherKind::Fsevent | WatcherKind::ReadDirectoryChangesWatcher => WatchMode::Subtree,
            _ => WatchMode::PerDirectory,
        }
    }
}

/// Short name of the platform's watcher backend
pub fn backend_name() -> &'static str {
    match <RecommendedWatcher as Watcher>::kind() {
        WatcherKind::Fsevent => "FSEvents",
        WatcherKind::ReadDirectoryChangesWatcher => "Windows",
        WatcherKind::Inotify => "inotify",
        WatcherKind::Kqueue => "kqueue",
        WatcherKind::PollWatcher => "poll",
        _ => "native",
    }
}

// ============================================================================
// Change - translated event
// ============================================================================

/// One change to the source tree, derived from a native event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    /// A path appeared (created or renamed into place)
    Created(RelativePath),
    /// An existing file changed
    Modified(RelativePath),
    /// A path went away (removed or renamed away)
    Removed(RelativePath),
    /// Events were lost; the whole root must be recopied
    Rescan,
}

/// Translates a native event into changes relative to `source`
///
/// Paths under excluded directories are dropped. Modifications of
/// directories are dropped, since their contents report their own events.
///
/// # Errors
/// - [`WatchError::PathOutsideRoot`] if the event names a path that is not
///   under `source`
/// - [`WatchError::UnexpectedEvent`] if a create/remove/modify event carries
///   no path and no rescan flag
pub fn translate_event(source: &Path, event: &Event) -> Result<Vec<Change>, WatchError> {
    if event.need_rescan() {
        debug!(kind = ?event.kind, "Rescan requested by native watcher");
        return Ok(vec![Change::Rescan]);
    }

    let expects_path = matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Remove(_) | EventKind::Modify(_)
    );
    if expects_path && event.paths.is_empty() {
        return Err(WatchError::UnexpectedEvent(format!("{:?}", event.kind)));
    }

    let mut relative = Vec::with_capacity(event.paths.len());
    for path in &event.paths {
        let rel = RelativePath::from_within(source, path)
            .map_err(|_| WatchError::PathOutsideRoot(path.clone()))?;
        relative.push((path.as_path(), rel));
    }

    let mut changes = Vec::new();
    match &event.kind {
        EventKind::Create(_) => {
            for (_, rel) in relative {
                changes.push(Change::Created(rel));
            }
        }
        EventKind::Remove(_) => {
            for (_, rel) in relative {
                changes.push(Change::Removed(rel));
            }
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            for (_, rel) in relative {
                changes.push(Change::Removed(rel));
            }
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            for (_, rel) in relative {
                changes.push(Change::Created(rel));
            }
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) if relative.len() == 2 => {
            let mut pair = relative.into_iter();
            if let (Some((_, old)), Some((_, new))) = (pair.next(), pair.next()) {
                changes.push(Change::Removed(old));
                changes.push(Change::Created(new));
            }
        }
        EventKind::Modify(ModifyKind::Name(_)) => {
            for (abs, rel) in relative {
                if fs::symlink_metadata(abs).is_ok() {
                    changes.push(Change::Created(rel));
                } else {
                    changes.push(Change::Removed(rel));
                }
            }
        }
        EventKind::Modify(_) => {
            for (abs, rel) in relative {
                if !abs.is_dir() {
                    changes.push(Change::Modified(rel));
                }
            }
        }
        EventKind::Access(_) | EventKind::Any | EventKind::Other => {}
    }

    changes.retain(|change| match change {
        Change::Created(p) | Change::Modified(p) | Change::Removed(p) => {
            let keep = !is_excluded(p.as_path());
            if !keep {
                debug!(path = %p, "Ignoring change in excluded folder");
            }
            keep
        }
        Change::Rescan => true,
    });
    Ok(changes)
}

// ============================================================================
// Registration
// ============================================================================

/// The native watcher of one root and the directories registered with it
struct Registration {
    watcher: RecommendedWatcher,
    source: PathBuf,
    mode: WatchMode,
    folders: BTreeSet<PathBuf>,
}

/// Registration shared between the event loop and blocking walks
type SharedRegistration = Arc<Mutex<Registration>>;

fn lock_registration(registration: &Mutex<Registration>) -> MutexGuard<'_, Registration> {
    registration.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Runs [`Registration::register_tree`] for `dir` on the blocking pool
async fn register_blocking(
    registration: &SharedRegistration,
    dir: PathBuf,
) -> Result<usize, WatchError> {
    let registration = Arc::clone(registration);
    tokio::task::spawn_blocking(move || {
        let _guard = WALK_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        lock_registration(&registration).register_tree(&dir)
    })
    .await
    .map_err(|e| WatchError::TaskFailed(e.to_string()))?
}

impl Registration {
    /// Registers `dir` and every non-excluded directory below it
    ///
    /// Directories that vanish during the walk are skipped. Returns the
    /// number of directories newly registered.
    fn register_tree(&mut self, dir: &Path) -> Result<usize, WatchError> {
        let source = self.source.clone();
        let walker = WalkDir::new(dir).follow_links(false).into_iter().filter_entry(|entry| {
            entry.file_type().is_dir()
                && !entry
                    .path()
                    .strip_prefix(&source)
                    .is_ok_and(is_excluded)
        });

        let mut added = 0;
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    if e
                        .io_error()
                        .is_some_and(|io| io.kind() == std::io::ErrorKind::NotFound)
                    {
                        debug!(error = %e, "Folder vanished during registration walk");
                        continue;
                    }
                    return Err(e.into());
                }
            };
            let path = entry.into_path();
            if self.folders.contains(&path) {
                continue;
            }
            match self.watcher.watch(&path, RecursiveMode::NonRecursive) {
                Ok(()) => {
                    self.folders.insert(path);
                    added += 1;
                }
                Err(e) if matches!(e.kind, notify::ErrorKind::PathNotFound) => {
                    debug!(path = %path.display(), "Folder vanished before registration");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(added)
    }

    /// Forgets every registration at or below `dir`
    fn unregister_tree(&mut self, dir: &Path) {
        let gone: Vec<PathBuf> = self
            .folders
            .iter()
            .filter(|folder| folder.starts_with(dir))
            .cloned()
            .collect();
        for folder in gone {
            // The kernel usually drops the watch with the folder already
            if let Err(e) = self.watcher.unwatch(&folder) {
                debug!(path = %folder.display(), error = %e, "Unwatch after removal failed");
            }
            self.folders.remove(&folder);
        }
    }
}

// ============================================================================
// RootWatcher
// ============================================================================

/// Watches one root's source tree and feeds the action queue
pub struct RootWatcher {
    root: Arc<MirrorRoot>,
    queue: ActionQueue,
    display: Arc<dyn IStatusDisplay>,
    mode: WatchMode,
}

impl RootWatcher {
    /// Creates a watcher using the platform's native mode
    pub fn new(root: Arc<MirrorRoot>, queue: ActionQueue, display: Arc<dyn IStatusDisplay>) -> Self {
        Self::with_mode(root, queue, display, WatchMode::native())
    }

    /// Creates a watcher with an explicit mode
    ///
    /// Subtree mode only sees nested changes on backends that support it.
    pub fn with_mode(
        root: Arc<MirrorRoot>,
        queue: ActionQueue,
        display: Arc<dyn IStatusDisplay>,
        mode: WatchMode,
    ) -> Self {
        Self {
            root,
            queue,
            display,
            mode,
        }
    }

    /// Starts watching and processes events until `shutdown` fires
    ///
    /// Signals `startup_finished` for this root once registration is done,
    /// whether or not it succeeded.
    ///
    /// # Errors
    /// Returns the error that stopped the watcher: a startup failure or a
    /// protocol violation by the native watcher. Both are also reported on
    /// the display and mark it as errored.
    #[instrument(skip_all, fields(root = self.root.index()))]
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), WatchError> {
        let (tx, mut rx) = mpsc::channel::<notify::Result<Event>>(EVENT_CHANNEL_CAPACITY);

        let registration = match self.start(tx).await {
            Ok(registration) => registration,
            Err(e) => {
                error!(error = %e, "Failed to start watcher");
                self.show_ident();
                self.display
                    .append_error("Error starting watcher: ", &e.to_string());
                self.display.mark_error();
                self.display.startup_finished(self.root.index());
                return Err(e);
            }
        };

        let (mode, folders) = {
            let registration = lock_registration(&registration);
            (registration.mode, registration.folders.len())
        };
        self.show_ident();
        match mode {
            WatchMode::Subtree => {
                self.display.append_plain("Watching subtree (");
                self.display.append_text(backend_name(), TextStyle::Key);
                self.display.append_plain(" mode)\n");
            }
            WatchMode::PerDirectory => {
                self.display.append_plain("Watching ");
                self.display
                    .append_text(&folders.to_string(), TextStyle::Key);
                self.display.append_plain(" folders\n");
            }
        }
        info!(?mode, folders, "Watcher ready");
        self.display.startup_finished(self.root.index());

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Watcher shutting down");
                    return Ok(());
                }
                received = rx.recv() => {
                    let Some(received) = received else {
                        warn!("Native watcher channel closed");
                        return Ok(());
                    };
                    match received {
                        Ok(event) => {
                            if let Err(e) = self.handle_event(&registration, &event).await {
                                error!(error = %e, "Watcher stopped");
                                self.show_ident();
                                self.display.append_error("Error watching: ", &e.to_string());
                                self.display.mark_error();
                                return Err(e);
                            }
                        }
                        Err(e) => {
                            warn!(error = %e, "Native watcher error");
                            self.show_ident();
                            self.display.append_error("Watcher error: ", &e.to_string());
                            self.display.mark_error();
                        }
                    }
                }
            }
        }
    }

    /// Creates the native watcher and registers the tree
    async fn start(
        &self,
        tx: mpsc::Sender<notify::Result<Event>>,
    ) -> Result<SharedRegistration, WatchError> {
        let source = fs::canonicalize(self.root.source())
            .map_err(|e| WatchError::Notify(notify::Error::io(e)))?;

        let watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                if tx.blocking_send(res).is_err() {
                    debug!("Dropping native event, watcher loop has ended");
                }
            },
            notify::Config::default(),
        )?;

        let mut registration = Registration {
            watcher,
            source: source.clone(),
            mode: self.mode,
            folders: BTreeSet::new(),
        };

        match self.mode {
            WatchMode::Subtree => {
                registration
                    .watcher
                    .watch(&source, RecursiveMode::Recursive)?;
                registration.folders.insert(source);
                Ok(Arc::new(Mutex::new(registration)))
            }
            WatchMode::PerDirectory => {
                let registration = Arc::new(Mutex::new(registration));
                let count = register_blocking(&registration, source).await?;
                debug!(count, "Registered folders");
                Ok(registration)
            }
        }
    }

    /// Queues the actions for one native event
    async fn handle_event(
        &self,
        registration: &SharedRegistration,
        event: &Event,
    ) -> Result<(), WatchError> {
        debug!(kind = ?event.kind, paths = ?event.paths, "Native event");

        let (source, mode) = {
            let registration = lock_registration(registration);
            (registration.source.clone(), registration.mode)
        };

        for change in translate_event(&source, event)? {
            match change {
                Change::Rescan => {
                    info!("Recopying whole root after lost events");
                    if mode == WatchMode::PerDirectory {
                        self.register_folders(registration, source.clone()).await;
                    }
                    self.queue.copy(&self.root, RelativePath::root());
                }
                Change::Created(path) => {
                    if mode == WatchMode::PerDirectory {
                        let absolute = path.resolve(&source);
                        if absolute.is_dir() {
                            self.register_folders(registration, absolute).await;
                        }
                    }
                    self.queue.copy(&self.root, path);
                }
                Change::Modified(path) => {
                    self.queue.copy(&self.root, path);
                }
                Change::Removed(path) => {
                    if mode == WatchMode::PerDirectory {
                        lock_registration(registration).unregister_tree(&path.resolve(&source));
                    }
                    self.queue.delete(&self.root, path);
                }
            }
        }
        Ok(())
    }

    /// Registers `folder` and everything below it that is not registered
    /// yet; failure leaves that subtree unobserved but keeps the watcher
    /// running
    async fn register_folders(&self, registration: &SharedRegistration, folder: PathBuf) {
        match register_blocking(registration, folder.clone()).await {
            Ok(added) => debug!(path = %folder.display(), added, "Registered folders"),
            Err(e) => {
                warn!(path = %folder.display(), error = %e, "Failed to watch folder");
                self.show_ident();
                self.display.append_error(
                    &format!("Error watching folder {}: ", folder.display()),
                    &e.to_string(),
                );
                self.display.mark_error();
            }
        }
    }

    fn show_ident(&self) {
        let index = self.root.index();
        self.display
            .append_text(&format!("{} ", index), TextStyle::Root(index));
    }
}

// ============================================================================
// Unit tests
// ============================================================================
