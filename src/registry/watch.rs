//! Directory-change notifications for thumbnailer directories.
//!
//! Raw notifications from the `notify` crate are translated into
//! [`WatchEvent`]s, which is all the registry reacts to. Keeping the
//! translation separate lets the registry logic be driven directly in tests.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::error::ThumbnailResult;

/// A change the registry must react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// A file or directory appeared.
    Created(PathBuf),
    /// A file's contents or attributes changed.
    Changed(PathBuf),
    /// A file or subdirectory went away.
    Deleted(PathBuf),
    /// A watched directory was deleted or unmounted.
    DirectoryRemoved(PathBuf),
    /// A watched directory was moved away or replaced.
    DirectoryMoved(PathBuf),
}

impl WatchEvent {
    /// The path the event is about.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Created(p)
            | Self::Changed(p)
            | Self::Deleted(p)
            | Self::DirectoryRemoved(p)
            | Self::DirectoryMoved(p) => p,
        }
    }
}

/// Translate a raw notification into registry events.
///
/// `roots` are the directories being watched; removing or renaming one of
/// them is reported as a directory-level event.
#[must_use]
pub fn translate(event: &Event, roots: &[PathBuf]) -> Vec<WatchEvent> {
    let is_root = |p: &Path| roots.iter().any(|r| r == p);
    let gone = |p: &PathBuf| {
        if is_root(p) {
            WatchEvent::DirectoryMoved(p.clone())
        } else {
            WatchEvent::Deleted(p.clone())
        }
    };

    match &event.kind {
        EventKind::Create(_) => event.paths.iter().cloned().map(WatchEvent::Created).collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            event.paths.iter().map(gone).collect()
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            event.paths.iter().cloned().map(WatchEvent::Created).collect()
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let mut events = Vec::with_capacity(2);
            if let Some(from) = event.paths.first() {
                events.push(gone(from));
            }
            if let Some(to) = event.paths.get(1) {
                events.push(WatchEvent::Created(to.clone()));
            }
            events
        }
        EventKind::Modify(ModifyKind::Name(_)) => event
            .paths
            .iter()
            .map(|p| {
                if is_root(p) {
                    WatchEvent::DirectoryMoved(p.clone())
                } else if p.exists() {
                    WatchEvent::Created(p.clone())
                } else {
                    WatchEvent::Deleted(p.clone())
                }
            })
            .collect(),
        EventKind::Modify(_) => event.paths.iter().cloned().map(WatchEvent::Changed).collect(),
        EventKind::Remove(_) => event
            .paths
            .iter()
            .map(|p| {
                if is_root(p) {
                    WatchEvent::DirectoryRemoved(p.clone())
                } else {
                    WatchEvent::Deleted(p.clone())
                }
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Recursive watcher over thumbnailer directories.
pub struct DirectoryWatcher {
    watcher: RecommendedWatcher,
}

impl DirectoryWatcher {
    /// Create a watcher and the channel its notifications arrive on.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform watcher cannot be created.
    pub fn new() -> ThumbnailResult<(Self, Receiver<notify::Result<Event>>)> {
        let (tx, rx) = mpsc::channel();
        let watcher = notify::recommended_watcher(tx)?;
        Ok((Self { watcher }, rx))
    }

    /// Start watching `dir` and everything below it.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be watched.
    pub fn watch(&mut self, dir: &Path) -> ThumbnailResult<()> {
        self.watcher.watch(dir, RecursiveMode::Recursive)?;
        log::debug!("Watching thumbnailer directory {}", dir.display());
        Ok(())
    }

    /// Stop watching `dir`. Errors (typically "not watched") are ignored.
    pub fn unwatch(&mut self, dir: &Path) {
        if let Err(e) = self.watcher.unwatch(dir) {
            log::trace!("Unwatch of {} failed: {}", dir.display(), e);
        }
    }
}

impl std::fmt::Debug for DirectoryWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryWatcher").finish_non_exhaustive()
    }
}
