// src/watch/backend.rs

//! Pluggable watch backend abstraction.
//!
//! The registry talks to a `WatchBackend` instead of to `notify` directly.
//! Exactly one backend is active per coordinator; it is chosen once, up
//! front, and injected. Tests provide their own backend that records watched
//! directories and lets them push events by hand.

use std::fmt::Debug;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::engine::WatcherOptions;
use crate::errors::Result;
use crate::watch::TriggerSink;
use crate::watch::notify_backend::NotifyBackend;

/// Capability to watch one directory (recursively).
pub trait WatchBackend: Send + Sync + Debug {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Start watching `dir`, delivering every change/created/deleted event to
    /// `sink` until the returned handle is stopped.
    fn watch(&self, dir: &Path, sink: TriggerSink) -> Result<Box<dyn WatchHandle>>;
}

/// An active watch on one directory.
pub trait WatchHandle: Send {
    /// Stop delivering events. Calling it more than once is harmless.
    fn stop(&mut self);
}

/// Which notification mechanism the `notify` backend uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// OS event APIs (inotify, FSEvents, ReadDirectoryChangesW, kqueue).
    Native,
    /// Periodic directory scans.
    Polling { interval: Duration },
}

impl BackendKind {
    pub fn from_options(options: &WatcherOptions) -> Self {
        if options.poll {
            BackendKind::Polling {
                interval: options.poll_interval,
            }
        } else {
            BackendKind::Native
        }
    }
}

/// Pick the process-wide backend from the coordinator options.
pub fn select_backend(options: &WatcherOptions) -> Arc<dyn WatchBackend> {
    let backend = NotifyBackend::new(BackendKind::from_options(options));
    info!("watching with: {}", backend.name());
    Arc::new(backend)
}
