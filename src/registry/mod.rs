//! Registry of external thumbnailers.
//!
//! Thumbnailers are discovered from `thumbnailers/*.thumbnailer` files below
//! the XDG data directories, loaded lazily on first use, and kept fresh by
//! watching those directories for changes.
//!
//! # Architecture
//!
//! * [`thumbnailer`]: Parsing of definition files into [`Thumbnailer`] records.
//! * [`watch`]: Filesystem notifications translated into [`WatchEvent`]s.
//! * [`settings`]: The disable policy, supplied by the embedding application.
//!
//! # Locking
//!
//! All mutable state sits behind a single mutex held for the duration of
//! each lookup or event. Records are shared as `Arc<Thumbnailer>` between the
//! record list and the mime-type index; a changed definition replaces the
//! `Arc` in both under that lock, so a reader holds either the old record or
//! the new one.

pub mod settings;
pub mod thumbnailer;
pub mod watch;

use std::collections::{HashMap, HashSet};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use directories::BaseDirs;
use walkdir::WalkDir;

pub use settings::{MemorySettings, SettingsCallback, SettingsProvider};
pub use thumbnailer::{is_definition_file, Thumbnailer};
pub use watch::{translate, DirectoryWatcher, WatchEvent};

/// Subdirectory of each data directory holding definition files.
pub const THUMBNAILERS_DIR: &str = "thumbnailers";

const DEFAULT_DATA_DIRS: &str = "/usr/local/share:/usr/share";

/// Default search path: the user data directory first, then `$XDG_DATA_DIRS`.
///
/// Earlier directories win when two definitions claim the same mime type.
#[must_use]
pub fn default_thumbnailer_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Some(base) = BaseDirs::new() {
        dirs.push(base.data_dir().join(THUMBNAILERS_DIR));
    }

    let system = env::var("XDG_DATA_DIRS")
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_DATA_DIRS.to_string());
    for dir in env::split_paths(&system) {
        if dir.as_os_str().is_empty() {
            continue;
        }
        let dir = dir.join(THUMBNAILERS_DIR);
        if !dirs.contains(&dir) {
            dirs.push(dir);
        }
    }
    dirs
}

#[derive(Debug, Default)]
struct State {
    loaded: bool,
    thumbnailers: Vec<Arc<Thumbnailer>>,
    mime_index: HashMap<String, Arc<Thumbnailer>>,
    watched: Vec<PathBuf>,
    watcher: Option<DirectoryWatcher>,
    events: Option<Receiver<notify::Result<notify::Event>>>,
    disabled_all: bool,
    disabled_types: HashSet<String>,
}

impl State {
    fn is_disabled(&self, mime_type: &str) -> bool {
        self.disabled_all || self.disabled_types.contains(mime_type)
    }

    fn find(&self, mime_type: &str) -> Option<Arc<Thumbnailer>> {
        if self.is_disabled(mime_type) {
            return None;
        }
        self.mime_index.get(mime_type).cloned()
    }

    /// Map each mime type of `thumbnailer` unless another record has it.
    fn index(&mut self, thumbnailer: &Arc<Thumbnailer>) {
        for mime_type in thumbnailer.mime_types() {
            self.mime_index
                .entry(mime_type.clone())
                .or_insert_with(|| Arc::clone(thumbnailer));
        }
    }

    fn unindex(&mut self, thumbnailer: &Arc<Thumbnailer>) {
        self.mime_index.retain(|_, t| !Arc::ptr_eq(t, thumbnailer));
    }

    fn position(&self, path: &Path) -> Option<usize> {
        self.thumbnailers.iter().position(|t| t.path() == path)
    }

    fn load_directory(&mut self, dir: &Path) {
        if !dir.is_dir() {
            log::debug!("Skipping missing thumbnailer directory {}", dir.display());
            return;
        }

        let mut files: Vec<PathBuf> = WalkDir::new(dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    log::debug!("Error reading {}: {}", dir.display(), e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file() && is_definition_file(entry.path()))
            .map(|entry| entry.into_path())
            .collect();
        files.sort();

        for file in files {
            self.load_file(&file);
        }
    }

    /// Load or reload a single definition file.
    fn load_file(&mut self, path: &Path) {
        let parsed = match Thumbnailer::load(path) {
            Ok(t) => Some(Arc::new(t)),
            Err(e) => {
                log::warn!("Ignoring thumbnailer {}: {}", path.display(), e);
                None
            }
        };

        match (self.position(path), parsed) {
            (Some(pos), Some(new)) => {
                let old = Arc::clone(&self.thumbnailers[pos]);
                self.unindex(&old);
                self.thumbnailers[pos] = Arc::clone(&new);
                self.index(&new);
                log::debug!("Reloaded thumbnailer {}", path.display());
            }
            (Some(_), None) => self.remove_file(path),
            (None, Some(new)) => {
                self.index(&new);
                self.thumbnailers.push(new);
                log::debug!("Added thumbnailer {}", path.display());
            }
            (None, None) => {}
        }
    }

    fn remove_file(&mut self, path: &Path) {
        if let Some(pos) = self.position(path) {
            let old = self.thumbnailers.remove(pos);
            self.unindex(&old);
            log::debug!("Removed thumbnailer {}", path.display());
        }
    }

    fn remove_under(&mut self, dir: &Path) {
        let (gone, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.thumbnailers)
            .into_iter()
            .partition(|t| t.is_under(dir));
        self.thumbnailers = kept;
        for old in &gone {
            self.unindex(old);
        }
        if !gone.is_empty() {
            log::debug!(
                "Removed {} thumbnailer(s) under {}",
                gone.len(),
                dir.display()
            );
        }
    }

    fn watch(&mut self, dir: &Path) {
        if !dir.is_dir() {
            return;
        }
        if let Some(watcher) = self.watcher.as_mut() {
            match watcher.watch(dir) {
                Ok(()) => {
                    if !self.watched.iter().any(|d| d == dir) {
                        self.watched.push(dir.to_path_buf());
                    }
                }
                Err(e) => log::warn!("Cannot watch {}: {}", dir.display(), e),
            }
        }
    }

    fn unwatch(&mut self, dir: &Path) {
        if let Some(watcher) = self.watcher.as_mut() {
            watcher.unwatch(dir);
        }
        self.watched.retain(|d| d != dir);
    }

    fn apply(&mut self, event: &WatchEvent) {
        log::trace!("Thumbnailer directory event: {:?}", event);
        match event {
            WatchEvent::Created(path) | WatchEvent::Changed(path) => {
                if path.is_dir() {
                    self.load_directory(path);
                } else if is_definition_file(path) {
                    self.load_file(path);
                }
            }
            WatchEvent::Deleted(path) => {
                self.remove_file(path);
                self.remove_under(path);
            }
            WatchEvent::DirectoryRemoved(dir) => {
                self.remove_under(dir);
                self.unwatch(dir);
            }
            WatchEvent::DirectoryMoved(dir) => {
                self.remove_under(dir);
                self.unwatch(dir);
                self.load_directory(dir);
                self.watch(dir);
            }
        }
    }
}

/// Thread-safe registry of thumbnailers keyed by mime type.
pub struct Registry {
    dirs: Vec<PathBuf>,
    watch: bool,
    state: Arc<Mutex<State>>,
}

impl Registry {
    /// Registry over the default search path.
    #[must_use]
    pub fn new(settings: Arc<dyn SettingsProvider>) -> Self {
        Self::with_dirs(default_thumbnailer_dirs(), settings)
    }

    /// Registry over an explicit list of directories, in priority order.
    #[must_use]
    pub fn with_dirs(dirs: Vec<PathBuf>, settings: Arc<dyn SettingsProvider>) -> Self {
        let state = Arc::new(Mutex::new(State {
            disabled_all: settings.disabled_all(),
            disabled_types: settings.disabled_types(),
            ..State::default()
        }));

        let weak: Weak<Mutex<State>> = Arc::downgrade(&state);
        settings.subscribe(Box::new(move |s| {
            let Some(state) = weak.upgrade() else {
                return false;
            };
            let mut state = state.lock().unwrap_or_else(|e| e.into_inner());
            state.disabled_all = s.disabled_all();
            state.disabled_types = s.disabled_types();
            log::debug!(
                "Thumbnail settings changed: disable_all={}, {} disabled type(s)",
                state.disabled_all,
                state.disabled_types.len()
            );
            true
        }));

        Self {
            dirs,
            watch: true,
            state,
        }
    }

    /// Disable directory watching. Changes are then only picked up through
    /// [`Registry::handle_event`] or [`Registry::reload`].
    #[must_use]
    pub fn without_watching(mut self) -> Self {
        self.watch = false;
        self
    }

    /// Directories searched, in priority order.
    #[must_use]
    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A panic while holding the lock leaves the state usable.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Lock, loading on first use and applying pending notifications.
    fn lock_fresh(&self) -> MutexGuard<'_, State> {
        let mut state = self.lock();
        if !state.loaded {
            self.load_locked(&mut state);
        }
        drain_pending(&mut state);
        state
    }

    fn load_locked(&self, state: &mut State) {
        state.loaded = true;
        if self.watch && state.watcher.is_none() {
            match DirectoryWatcher::new() {
                Ok((watcher, rx)) => {
                    state.watcher = Some(watcher);
                    state.events = Some(rx);
                }
                Err(e) => log::warn!("Thumbnailer directories will not be watched: {}", e),
            }
        }
        for dir in &self.dirs {
            state.load_directory(dir);
            state.watch(dir);
        }
        log::debug!(
            "Loaded {} thumbnailer(s) from {} director(ies)",
            state.thumbnailers.len(),
            self.dirs.len()
        );
    }

    /// Load all directories now instead of on first lookup.
    pub fn load(&self) {
        drop(self.lock_fresh());
    }

    /// Drop everything and load all directories again.
    pub fn reload(&self) {
        let mut state = self.lock();
        state.thumbnailers.clear();
        state.mime_index.clear();
        let watched = std::mem::take(&mut state.watched);
        for dir in &watched {
            if let Some(watcher) = state.watcher.as_mut() {
                watcher.unwatch(dir);
            }
        }
        self.load_locked(&mut state);
    }

    /// React to a directory change.
    ///
    /// Watched registries call this for every notification they receive;
    /// embedders with their own file monitoring can call it directly.
    ///
    /// # Arguments
    ///
    /// * `event` - The change. `Created` and `Changed` load or replace the
    ///   record of a `.thumbnailer` file, `Deleted` removes it, and the
    ///   directory events drop every record below the directory (reloading
    ///   it again for `DirectoryMoved`).
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use std::path::PathBuf;
    /// use std::sync::Arc;
    /// use thumbcache::registry::{MemorySettings, Registry, WatchEvent};
    ///
    /// let dir = PathBuf::from("/usr/share/thumbnailers");
    /// let registry = Registry::with_dirs(vec![dir.clone()], Arc::new(MemorySettings::default()))
    ///     .without_watching();
    /// registry.handle_event(&WatchEvent::Created(dir.join("svg.thumbnailer")));
    /// ```
    pub fn handle_event(&self, event: &WatchEvent) {
        let mut state = self.lock_fresh();
        state.apply(event);
    }

    /// Apply any notifications received since the last call.
    pub fn pump_events(&self) {
        drop(self.lock_fresh());
    }

    /// Pump notifications every `poll` until `shutdown` is set, calling
    /// `on_tick` after each pump.
    pub fn watch_forever<F>(&self, shutdown: &AtomicBool, poll: Duration, mut on_tick: F)
    where
        F: FnMut(&Self),
    {
        self.load();
        while !shutdown.load(Ordering::SeqCst) {
            std::thread::sleep(poll);
            self.pump_events();
            on_tick(self);
        }
        log::debug!("Stopped watching thumbnailer directories");
    }

    /// Thumbnailer for `mime_type`, honouring the disable policy.
    #[must_use]
    pub fn lookup(&self, mime_type: &str) -> Option<Arc<Thumbnailer>> {
        self.lock_fresh().find(mime_type)
    }

    /// Command template for `mime_type`, honouring the disable policy.
    #[must_use]
    pub fn command_for(&self, mime_type: &str) -> Option<String> {
        self.lookup(mime_type).map(|t| t.command().to_string())
    }

    /// Whether thumbnailing of `mime_type` is disabled by policy.
    #[must_use]
    pub fn is_disabled(&self, mime_type: &str) -> bool {
        self.lock().is_disabled(mime_type)
    }

    /// Snapshot of all loaded records, in load order.
    #[must_use]
    pub fn thumbnailers(&self) -> Vec<Arc<Thumbnailer>> {
        self.lock_fresh().thumbnailers.clone()
    }

    /// Snapshot of the mime-type index, sorted by mime type.
    #[must_use]
    pub fn mime_types(&self) -> Vec<(String, Arc<Thumbnailer>)> {
        let state = self.lock_fresh();
        let mut entries: Vec<_> = state
            .mime_index
            .iter()
            .map(|(m, t)| (m.clone(), Arc::clone(t)))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    /// Directories currently being watched.
    #[must_use]
    pub fn watched_dirs(&self) -> Vec<PathBuf> {
        self.lock().watched.clone()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("dirs", &self.dirs)
            .field("watch", &self.watch)
            .finish_non_exhaustive()
    }
}

fn drain_pending(state: &mut State) {
    let Some(rx) = state.events.take() else {
        return;
    };
    while let Ok(received) = rx.try_recv() {
        match received {
            Ok(event) => {
                for change in translate(&event, &state.watched) {
                    state.apply(&change);
                }
            }
            Err(e) => log::warn!("Thumbnailer watch error: {}", e),
        }
    }
    state.events = Some(rx);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write_def(dir: &Path, name: &str, exec: &str, mimes: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(
            &path,
            format!("[Thumbnailer Entry]\nExec={exec}\nMimeType={mimes}\n"),
        )
        .unwrap();
        path
    }

    fn registry(dirs: Vec<PathBuf>) -> (Registry, Arc<MemorySettings>) {
        let settings = Arc::new(MemorySettings::default());
        let registry = Registry::with_dirs(dirs, settings.clone()).without_watching();
        (registry, settings)
    }

    #[test]
    fn test_dropped_registry_unsubscribes() {
        let settings = Arc::new(MemorySettings::default());
        let kept = Registry::with_dirs(Vec::new(), settings.clone()).without_watching();
        drop(Registry::with_dirs(Vec::new(), settings.clone()).without_watching());
        assert_eq!(settings.subscriber_count(), 2);

        settings.set_disabled_all(true);
        assert_eq!(settings.subscriber_count(), 1);
        assert!(kept.is_disabled("image/png"));
    }

    #[test]
    fn test_settings_change_survives_poisoned_lock() {
        let dir = tempdir().unwrap();
        let (registry, settings) = registry(vec![dir.path().to_path_buf()]);
        std::thread::scope(|scope| {
            let poisoner = scope.spawn(|| {
                let _guard = registry.lock();
                panic!("poison the registry state");
            });
            assert!(poisoner.join().is_err());
        });
        assert!(registry.state.is_poisoned());

        settings.set_disabled_types(["image/png"]);
        assert!(registry.is_disabled("image/png"));
    }

    #[test]
    fn test_watch_forever_stops_on_shutdown() {
        let dir = tempdir().unwrap();
        let (registry, _) = registry(vec![dir.path().to_path_buf()]);
        let shutdown = AtomicBool::new(false);
        let mut ticks = 0;
        registry.watch_forever(&shutdown, Duration::from_millis(1), |r| {
            ticks += 1;
            if ticks == 3 {
                write_def(dir.path(), "late.thumbnailer", "late %u %o", "image/x-late;");
                r.reload();
                shutdown.store(true, Ordering::SeqCst);
            }
        });
        assert_eq!(ticks, 3);
        assert!(registry.lookup("image/x-late").is_some());
    }

    #[test]
    fn test_lazy_load_and_lookup() {
        let dir = tempdir().unwrap();
        write_def(dir.path(), "svg.thumbnailer", "convert %i -o %o", "image/svg+xml;");
        let (registry, _) = registry(vec![dir.path().to_path_buf()]);

        let t = registry.lookup("image/svg+xml").unwrap();
        assert_eq!(t.command(), "convert %i -o %o");
        assert!(registry.lookup("image/png").is_none());
    }

    #[test]
    fn test_recursive_discovery_skips_other_files() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("vendor");
        fs::create_dir(&nested).unwrap();
        write_def(&nested, "pdf.thumbnailer", "pdf %u %o", "application/pdf;");
        write_def(dir.path(), "notes.txt", "x %u %o", "text/plain;");
        let (registry, _) = registry(vec![dir.path().to_path_buf()]);

        assert_eq!(registry.thumbnailers().len(), 1);
        assert!(registry.lookup("application/pdf").is_some());
        assert!(registry.lookup("text/plain").is_none());
    }

    #[test]
    fn test_first_directory_wins() {
        let user = tempdir().unwrap();
        let system = tempdir().unwrap();
        write_def(user.path(), "a.thumbnailer", "user %u %o", "image/png;");
        write_def(system.path(), "a.thumbnailer", "system %u %o", "image/png;image/gif;");
        let (registry, _) = registry(vec![user.path().to_path_buf(), system.path().to_path_buf()]);

        assert_eq!(registry.command_for("image/png").unwrap(), "user %u %o");
        assert_eq!(registry.command_for("image/gif").unwrap(), "system %u %o");
    }

    #[test]
    fn test_malformed_definition_does_not_affect_others() {
        let dir = tempdir().unwrap();
        write_def(dir.path(), "good.thumbnailer", "good %u %o", "image/png;");
        fs::write(dir.path().join("bad.thumbnailer"), "[Thumbnailer Entry]\nExec=x\n").unwrap();
        let (registry, _) = registry(vec![dir.path().to_path_buf()]);

        assert_eq!(registry.thumbnailers().len(), 1);
        assert!(registry.lookup("image/png").is_some());
    }

    #[test]
    fn test_created_and_deleted_events() {
        let dir = tempdir().unwrap();
        let (registry, _) = registry(vec![dir.path().to_path_buf()]);
        registry.load();
        assert!(registry.lookup("image/svg+xml").is_none());

        let path = write_def(dir.path(), "svg.thumbnailer", "convert %i -o %o", "image/svg+xml");
        registry.handle_event(&WatchEvent::Created(path.clone()));
        assert!(registry.lookup("image/svg+xml").is_some());

        fs::remove_file(&path).unwrap();
        registry.handle_event(&WatchEvent::Deleted(path));
        assert!(registry.lookup("image/svg+xml").is_none());
        assert!(registry.thumbnailers().is_empty());
    }

    #[test]
    fn test_changed_event_updates_in_place() {
        let dir = tempdir().unwrap();
        write_def(dir.path(), "a.thumbnailer", "first %u %o", "image/png;");
        write_def(dir.path(), "b.thumbnailer", "second %u %o", "image/jpeg;");
        let (registry, _) = registry(vec![dir.path().to_path_buf()]);
        registry.load();

        let path = write_def(dir.path(), "a.thumbnailer", "updated %u %o", "image/webp;");
        registry.handle_event(&WatchEvent::Changed(path.clone()));

        let all = registry.thumbnailers();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].path(), path.as_path());
        assert_eq!(all[0].command(), "updated %u %o");
        assert!(registry.lookup("image/png").is_none());
        assert!(registry.lookup("image/webp").is_some());
    }

    #[test]
    fn test_changed_to_invalid_removes_record() {
        let dir = tempdir().unwrap();
        let path = write_def(dir.path(), "a.thumbnailer", "a %u %o", "image/png;");
        let (registry, _) = registry(vec![dir.path().to_path_buf()]);
        registry.load();

        fs::write(&path, "garbage").unwrap();
        registry.handle_event(&WatchEvent::Changed(path));
        assert!(registry.thumbnailers().is_empty());
        assert!(registry.lookup("image/png").is_none());
    }

    #[test]
    fn test_directory_removed_cascades() {
        let one = tempdir().unwrap();
        let two = tempdir().unwrap();
        write_def(one.path(), "a.thumbnailer", "a %u %o", "image/png;");
        write_def(one.path(), "b.thumbnailer", "b %u %o", "image/gif;");
        write_def(two.path(), "c.thumbnailer", "c %u %o", "image/bmp;");
        let (registry, _) = registry(vec![one.path().to_path_buf(), two.path().to_path_buf()]);
        registry.load();

        registry.handle_event(&WatchEvent::DirectoryRemoved(one.path().to_path_buf()));
        assert_eq!(registry.thumbnailers().len(), 1);
        assert!(registry.lookup("image/png").is_none());
        assert!(registry.lookup("image/bmp").is_some());
    }

    #[test]
    fn test_directory_moved_reloads() {
        let dir = tempdir().unwrap();
        write_def(dir.path(), "a.thumbnailer", "a %u %o", "image/png;");
        let (registry, _) = registry(vec![dir.path().to_path_buf()]);
        registry.load();

        write_def(dir.path(), "b.thumbnailer", "b %u %o", "image/gif;");
        registry.handle_event(&WatchEvent::DirectoryMoved(dir.path().to_path_buf()));
        assert_eq!(registry.thumbnailers().len(), 2);
        assert!(registry.lookup("image/gif").is_some());
    }

    #[test]
    fn test_disable_policy_follows_settings() {
        let dir = tempdir().unwrap();
        write_def(dir.path(), "a.thumbnailer", "a %u %o", "image/png;image/gif;");
        let (registry, settings) = registry(vec![dir.path().to_path_buf()]);

        settings.set_disabled_types(["image/png"]);
        assert!(registry.lookup("image/png").is_none());
        assert!(registry.lookup("image/gif").is_some());
        assert!(registry.is_disabled("image/png"));

        settings.set_disabled_all(true);
        assert!(registry.lookup("image/gif").is_none());
        assert_eq!(registry.thumbnailers().len(), 1);

        settings.set_disabled_all(false);
        settings.set_disabled_types(Vec::<String>::new());
        assert!(registry.lookup("image/png").is_some());
    }

    #[test]
    fn test_missing_directory_is_skipped() {
        let dir = tempdir().unwrap();
        let (registry, _) = registry(vec![dir.path().join("does-not-exist")]);
        assert!(registry.thumbnailers().is_empty());
        assert!(registry.watched_dirs().is_empty());
    }
}
