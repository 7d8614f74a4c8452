use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use buildwatch::errors::Result;
use buildwatch::watch::{FileEvent, FileEventKind, TriggerSink, WatchBackend, WatchHandle};

#[derive(Debug, Default)]
struct FakeState {
    active: HashMap<PathBuf, TriggerSink>,
    started: Vec<PathBuf>,
    stopped: Vec<PathBuf>,
}

/// A watch backend that never touches the OS.
///
/// - records every directory it was asked to watch (and stop)
/// - lets tests push events into an active watch with [`FakeBackend::emit`]
///
/// Clones share state, so keep one clone in the test and hand another to
/// the coordinator.
#[derive(Debug, Clone, Default)]
pub struct FakeBackend {
    state: Arc<Mutex<FakeState>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver an event to the watch on `dir`. Returns `false` if `dir` is
    /// not (or no longer) watched.
    pub fn emit(&self, dir: impl AsRef<Path>, kind: FileEventKind, path: impl Into<PathBuf>) -> bool {
        let sink = self.state.lock().unwrap().active.get(dir.as_ref()).cloned();
        match sink {
            Some(sink) => {
                sink.send(FileEvent::new(kind, path));
                true
            }
            None => false,
        }
    }

    pub fn emit_change(&self, dir: impl AsRef<Path>, path: impl Into<PathBuf>) -> bool {
        self.emit(dir, FileEventKind::Changed, path)
    }

    /// Directories currently watched, sorted.
    pub fn active_dirs(&self) -> Vec<PathBuf> {
        let mut dirs: Vec<_> = self.state.lock().unwrap().active.keys().cloned().collect();
        dirs.sort();
        dirs
    }

    /// How many handles were ever created for `dir`.
    pub fn watch_count(&self, dir: impl AsRef<Path>) -> usize {
        let dir = dir.as_ref();
        self.state
            .lock()
            .unwrap()
            .started
            .iter()
            .filter(|d| d.as_path() == dir)
            .count()
    }

    pub fn stopped_dirs(&self) -> Vec<PathBuf> {
        self.state.lock().unwrap().stopped.clone()
    }
}

impl WatchBackend for FakeBackend {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn watch(&self, dir: &Path, sink: TriggerSink) -> Result<Box<dyn WatchHandle>> {
        let mut state = self.state.lock().unwrap();
        state.active.insert(dir.to_path_buf(), sink);
        state.started.push(dir.to_path_buf());
        Ok(Box::new(FakeHandle {
            dir: dir.to_path_buf(),
            state: Arc::clone(&self.state),
            stopped: false,
        }))
    }
}

struct FakeHandle {
    dir: PathBuf,
    state: Arc<Mutex<FakeState>>,
    stopped: bool,
}

impl WatchHandle for FakeHandle {
    fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        let mut state = self.state.lock().unwrap();
        state.active.remove(&self.dir);
        state.stopped.push(self.dir.clone());
    }
}
