// src/watch/notify_backend.rs

use std::path::{Path, PathBuf};

use notify::{Config, Event, EventKind, PollWatcher, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::watch::backend::{BackendKind, WatchBackend, WatchHandle};
use crate::watch::{FileEvent, FileEventKind, TriggerSink};

/// `notify`-based backend, native or polling.
#[derive(Debug, Clone, Copy)]
pub struct NotifyBackend {
    kind: BackendKind,
}

impl NotifyBackend {
    pub fn new(kind: BackendKind) -> Self {
        Self { kind }
    }
}

impl WatchBackend for NotifyBackend {
    fn name(&self) -> &'static str {
        match self.kind {
            BackendKind::Native => "native",
            BackendKind::Polling { .. } => "polling",
        }
    }

    fn watch(&self, dir: &Path, sink: TriggerSink) -> Result<Box<dyn WatchHandle>> {
        // Called synchronously by notify on its own thread.
        let handler = move |res: notify::Result<Event>| match res {
            Ok(event) => {
                for file_event in file_events(&event) {
                    sink.send(file_event);
                }
            }
            Err(err) => {
                warn!("file watch error: {err}");
            }
        };

        let mut watcher: Box<dyn Watcher + Send> = match self.kind {
            BackendKind::Native => Box::new(RecommendedWatcher::new(handler, Config::default())?),
            BackendKind::Polling { interval } => Box::new(PollWatcher::new(
                handler,
                Config::default().with_poll_interval(interval),
            )?),
        };

        watcher.watch(dir, RecursiveMode::Recursive)?;

        info!(backend = self.name(), "file watcher started on {:?}", dir);

        Ok(Box::new(NotifyHandle {
            dir: dir.to_path_buf(),
            watcher: Some(watcher),
        }))
    }
}

/// Keeps the underlying notify watcher alive until stopped.
struct NotifyHandle {
    dir: PathBuf,
    watcher: Option<Box<dyn Watcher + Send>>,
}

impl WatchHandle for NotifyHandle {
    fn stop(&mut self) {
        let Some(mut watcher) = self.watcher.take() else {
            return;
        };
        if let Err(err) = watcher.unwatch(&self.dir) {
            debug!(dir = ?self.dir, error = %err, "unwatch failed; dropping watcher anyway");
        }
        debug!(dir = ?self.dir, "file watcher stopped");
    }
}

/// Map a notify event onto zero or more [`FileEvent`]s.
///
/// Access and unclassified events are dropped. notify reports paths under
/// the directory exactly as it was passed to `watch`, so they are only
/// absolute when the watched directory was.
pub fn file_events(event: &Event) -> Vec<FileEvent> {
    let kind = match event.kind {
        EventKind::Create(_) => FileEventKind::Created,
        EventKind::Modify(_) => FileEventKind::Changed,
        EventKind::Remove(_) => FileEventKind::Deleted,
        EventKind::Access(_) | EventKind::Any | EventKind::Other => return Vec::new(),
    };

    event
        .paths
        .iter()
        .map(|p| FileEvent::new(kind, p.clone()))
        .collect()
}
