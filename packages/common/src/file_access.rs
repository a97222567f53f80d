//! File access abstraction.
//!
//! The document engine only needs byte buffers in and out; where those bytes
//! live is decided by the host. `RealFileAccess` works on a directory on
//! disk, `MemoryFileAccess` keeps everything in memory for tests and tools.

use crate::{CommonError, CommonResult};
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcher};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

/// Callback invoked when a watched file changes
pub type ChangeCallback = Arc<dyn Fn() + Send + Sync + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    File,
    Directory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    pub kind: FileKind,
}

/// Keeps a watch alive. Dropping the handle stops the watch.
pub struct WatchHandle {
    cancel: Option<Box<dyn FnOnce() + Send>>,
    _watcher: Option<RecommendedWatcher>,
}

impl WatchHandle {
    fn with_cancel(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
            _watcher: None,
        }
    }

    fn with_watcher(watcher: RecommendedWatcher) -> Self {
        Self {
            cancel: None,
            _watcher: Some(watcher),
        }
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

/// File access used for project load/save
pub trait FileAccess {
    /// Call `on_change` whenever a file matching `pattern` is created, changed or deleted
    fn watch(&self, pattern: &str, on_change: ChangeCallback) -> CommonResult<WatchHandle>;

    /// List files matching a glob pattern
    fn glob(&self, pattern: &str) -> CommonResult<Vec<PathBuf>>;

    /// Stat a path, `None` if it does not exist
    fn stat(&self, path: &Path) -> Option<Stats>;

    fn read_file(&self, path: &Path) -> CommonResult<Vec<u8>>;

    fn write_file(&self, path: &Path, data: &[u8]) -> CommonResult<()>;

    fn remove(&self, path: &Path) -> CommonResult<()>;
}

/// Directory-rooted access to the real file system
pub struct RealFileAccess {
    root: PathBuf,
}

impl RealFileAccess {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

impl FileAccess for RealFileAccess {
    fn watch(&self, pattern: &str, on_change: ChangeCallback) -> CommonResult<WatchHandle> {
        let pattern = glob::Pattern::new(&self.root.join(pattern).to_string_lossy())?;

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event.paths.iter().any(|p| pattern.matches_path(p)) {
                        on_change();
                    }
                }
                Err(err) => tracing::warn!(error = %err, "file watch error"),
            },
            Config::default(),
        )?;
        watcher.watch(&self.root, RecursiveMode::Recursive)?;

        Ok(WatchHandle::with_watcher(watcher))
    }

    fn glob(&self, pattern: &str) -> CommonResult<Vec<PathBuf>> {
        let full = self.root.join(pattern);
        let mut paths = Vec::new();
        for entry in glob::glob(&full.to_string_lossy())? {
            match entry {
                Ok(path) => {
                    if path.components().any(|c| c.as_os_str() == "node_modules") {
                        continue;
                    }
                    paths.push(path);
                }
                Err(err) => tracing::debug!(error = %err, "skipping unreadable glob entry"),
            }
        }
        Ok(paths)
    }

    fn stat(&self, path: &Path) -> Option<Stats> {
        let metadata = std::fs::metadata(self.resolve(path)).ok()?;
        let kind = if metadata.is_dir() {
            FileKind::Directory
        } else {
            FileKind::File
        };
        Some(Stats { kind })
    }

    fn read_file(&self, path: &Path) -> CommonResult<Vec<u8>> {
        let full = self.resolve(path);
        if !full.exists() {
            return Err(CommonError::NotFound(full));
        }
        Ok(std::fs::read(full)?)
    }

    fn write_file(&self, path: &Path, data: &[u8]) -> CommonResult<()> {
        let full = self.resolve(path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(full, data)?;
        Ok(())
    }

    fn remove(&self, path: &Path) -> CommonResult<()> {
        let full = self.resolve(path);
        if full.exists() {
            std::fs::remove_file(full)?;
        }
        Ok(())
    }
}

struct MemoryWatcher {
    id: u64,
    pattern: glob::Pattern,
    on_change: ChangeCallback,
}

#[derive(Default)]
struct MemoryState {
    files: BTreeMap<PathBuf, Vec<u8>>,
    watchers: Vec<MemoryWatcher>,
    next_watcher_id: u64,
}

/// In-memory file access for testing
#[derive(Clone, Default)]
pub struct MemoryFileAccess {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryFileAccess {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&self, path: impl Into<PathBuf>, data: impl Into<Vec<u8>>) {
        self.lock().files.insert(path.into(), data.into());
    }

    pub fn files(&self) -> Vec<PathBuf> {
        self.lock().files.keys().cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn notify(&self, path: &Path) {
        // Callbacks run outside the lock so they may call back into the file access.
        let callbacks: Vec<ChangeCallback> = self
            .lock()
            .watchers
            .iter()
            .filter(|w| w.pattern.matches_path(path))
            .map(|w| w.on_change.clone())
            .collect();
        for callback in callbacks {
            callback();
        }
    }
}

impl FileAccess for MemoryFileAccess {
    fn watch(&self, pattern: &str, on_change: ChangeCallback) -> CommonResult<WatchHandle> {
        let pattern = glob::Pattern::new(pattern)?;
        let id = {
            let mut state = self.lock();
            let id = state.next_watcher_id;
            state.next_watcher_id += 1;
            state.watchers.push(MemoryWatcher {
                id,
                pattern,
                on_change,
            });
            id
        };

        let state = Arc::downgrade(&self.state);
        Ok(WatchHandle::with_cancel(move || {
            if let Some(state) = state.upgrade() {
                let mut state = state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                state.watchers.retain(|w| w.id != id);
            }
        }))
    }

    fn glob(&self, pattern: &str) -> CommonResult<Vec<PathBuf>> {
        let pattern = glob::Pattern::new(pattern)?;
        Ok(self
            .lock()
            .files
            .keys()
            .filter(|path| pattern.matches_path(path))
            .cloned()
            .collect())
    }

    fn stat(&self, path: &Path) -> Option<Stats> {
        let state = self.lock();
        if state.files.contains_key(path) {
            return Some(Stats {
                kind: FileKind::File,
            });
        }
        if state.files.keys().any(|file| file.starts_with(path)) {
            return Some(Stats {
                kind: FileKind::Directory,
            });
        }
        None
    }

    fn read_file(&self, path: &Path) -> CommonResult<Vec<u8>> {
        self.lock()
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| CommonError::NotFound(path.to_path_buf()))
    }

    fn write_file(&self, path: &Path, data: &[u8]) -> CommonResult<()> {
        self.lock().files.insert(path.to_path_buf(), data.to_vec());
        self.notify(path);
        Ok(())
    }

    fn remove(&self, path: &Path) -> CommonResult<()> {
        let removed = self.lock().files.remove(path).is_some();
        if removed {
            self.notify(path);
        }
        Ok(())
    }
}
