// src/watch/mod.rs

//! Directory watching.
//!
//! This module is responsible for:
//! - The [`WatchBackend`] capability: watch one directory, report
//!   change/created/deleted events, stop on request.
//! - A `notify`-based backend with native and polling variants, chosen once
//!   at startup by [`select_backend`].
//! - The [`DirectoryRegistry`], which keeps exactly one backend handle per
//!   watched directory and owns shutdown of all of them.
//!
//! It does **not** know about builds or debouncing; every event is handed to
//! a [`TriggerSink`] supplied by the engine.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

pub mod backend;
pub mod notify_backend;
pub mod registry;

pub use backend::{BackendKind, WatchBackend, WatchHandle, select_backend};
pub use notify_backend::NotifyBackend;
pub use registry::{DirectoryRegistry, SharedRegistry, WatchDirs};

/// What happened to a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileEventKind {
    Changed,
    Created,
    Deleted,
}

impl fmt::Display for FileEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FileEventKind::Changed => "changed",
            FileEventKind::Created => "added",
            FileEventKind::Deleted => "deleted",
        };
        f.write_str(s)
    }
}

/// A single filesystem event as reported by a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEvent {
    pub kind: FileEventKind,
    pub path: PathBuf,
}

impl FileEvent {
    pub fn new(kind: FileEventKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }
}

/// Where backends deliver their events.
///
/// Backends call [`TriggerSink::send`] from whatever thread they run on.
#[derive(Clone)]
pub struct TriggerSink {
    inner: Arc<dyn Fn(FileEvent) + Send + Sync>,
}

impl TriggerSink {
    pub fn new(f: impl Fn(FileEvent) + Send + Sync + 'static) -> Self {
        Self { inner: Arc::new(f) }
    }

    pub fn send(&self, event: FileEvent) {
        (self.inner)(event)
    }
}

impl fmt::Debug for TriggerSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TriggerSink").finish_non_exhaustive()
    }
}
