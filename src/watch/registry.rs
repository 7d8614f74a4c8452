// src/watch/registry.rs

//! Idempotent directory-watch management.
//!
//! Each directory moves `Unwatched -> Watched` on a successful add and back
//! to `Unwatched` when the registry is closed. A directory is never watched
//! by more than one handle.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::anyhow;
use tracing::{debug, info};

use crate::errors::{BuildwatchError, Result};
use crate::fs::FileSystem;
use crate::watch::backend::{WatchBackend, WatchHandle};
use crate::watch::TriggerSink;

/// Registry shared between the coordinator and in-flight builds.
pub type SharedRegistry = Arc<Mutex<DirectoryRegistry>>;

pub struct DirectoryRegistry {
    backend: Arc<dyn WatchBackend>,
    fs: Arc<dyn FileSystem>,
    sink: TriggerSink,
    watched: HashMap<PathBuf, Box<dyn WatchHandle>>,
    closed: bool,
}

impl fmt::Debug for DirectoryRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryRegistry")
            .field("backend", &self.backend.name())
            .field("watched", &self.watched.keys().collect::<Vec<_>>())
            .field("closed", &self.closed)
            .finish()
    }
}

impl DirectoryRegistry {
    pub fn new(
        backend: Arc<dyn WatchBackend>,
        fs: Arc<dyn FileSystem>,
        sink: TriggerSink,
    ) -> Self {
        Self {
            backend,
            fs,
            sink,
            watched: HashMap::new(),
            closed: false,
        }
    }

    /// Start watching `dir` unless it is already watched.
    ///
    /// Fails with [`BuildwatchError::MissingDirectory`] if `dir` does not
    /// exist; nothing is recorded in that case. After [`close_all`] this is a
    /// no-op, so a build that outlives the coordinator cannot revive watching.
    ///
    /// [`close_all`]: DirectoryRegistry::close_all
    pub fn add_watch_dir(&mut self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        let Some((backend, sink)) = self.begin_watch(dir)? else {
            return Ok(());
        };
        let handle = backend.watch(dir, sink)?;
        self.finish_watch(dir, handle);
        Ok(())
    }

    /// Checks that run before the backend is asked to watch `dir`.
    /// `Ok(None)` means there is nothing to do.
    fn begin_watch(&self, dir: &Path) -> Result<Option<(Arc<dyn WatchBackend>, TriggerSink)>> {
        if self.closed {
            debug!(?dir, "registry closed; ignoring watch request");
            return Ok(None);
        }

        if self.watched.contains_key(dir) {
            return Ok(None);
        }

        if !self.fs.exists(dir) {
            return Err(BuildwatchError::MissingDirectory(dir.to_path_buf()));
        }

        Ok(Some((Arc::clone(&self.backend), self.sink.clone())))
    }

    /// Record a freshly created handle. It is stopped instead if the
    /// registry closed, or another add for `dir` won, in the meantime.
    fn finish_watch(&mut self, dir: &Path, mut handle: Box<dyn WatchHandle>) {
        if self.closed || self.watched.contains_key(dir) {
            handle.stop();
            debug!(?dir, "discarding watch created concurrently");
            return;
        }
        self.watched.insert(dir.to_path_buf(), handle);
        debug!(?dir, backend = self.backend.name(), "directory registered");
    }

    /// Stop every handle and forget every directory.
    pub fn close_all(&mut self) {
        self.closed = true;

        if self.watched.is_empty() {
            return;
        }

        let count = self.watched.len();
        for (dir, mut handle) in self.watched.drain() {
            handle.stop();
            debug!(?dir, "directory unwatched");
        }
        info!(count, "stopped watching all directories");
    }

    pub fn is_watched(&self, dir: impl AsRef<Path>) -> bool {
        self.watched.contains_key(dir.as_ref())
    }

    /// Currently watched directories, sorted.
    pub fn watched_dirs(&self) -> Vec<PathBuf> {
        let mut dirs: Vec<PathBuf> = self.watched.keys().cloned().collect();
        dirs.sort();
        dirs
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

/// The "register this directory" capability handed to every build.
#[derive(Debug, Clone)]
pub struct WatchDirs {
    registry: SharedRegistry,
}

impl WatchDirs {
    pub fn new(registry: SharedRegistry) -> Self {
        Self { registry }
    }

    /// See [`DirectoryRegistry::add_watch_dir`].
    ///
    /// The registry is unlocked while the backend sets up the watch, which
    /// can walk a large tree.
    pub fn add(&self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        let Some((backend, sink)) = self.lock()?.begin_watch(dir)? else {
            return Ok(());
        };
        let handle = backend.watch(dir, sink)?;
        self.lock()?.finish_watch(dir, handle);
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, DirectoryRegistry>> {
        self.registry
            .lock()
            .map_err(|_| BuildwatchError::Other(anyhow!("directory registry mutex poisoned")))
    }
}
