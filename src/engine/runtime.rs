// src/engine/runtime.rs

//! The coordinator: an async shell around [`SequencerCore`].
//!
//! All scheduling state lives in one actor task. File events, manual
//! triggers, timer expiries, build settlements, close requests and "current
//! build" queries are messages on one channel and are handled strictly in
//! arrival order, so no state is ever mutated concurrently. Timers and builds
//! run in their own tasks and report back through the same channel; the
//! actor keeps accepting triggers while a build is in flight.
//!
//! Each scheduled build owns a *link*: a `watch` channel set exactly once
//! with its [`BuildOutcome`]. The most recently created link is the tail of
//! the sequence and is what [`BuildWatcher::wait_for_current`] waits on.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::errors::{BuildwatchError, Result};
use crate::fs::{FileSystem, RealFileSystem};
use crate::watch::{
    DirectoryRegistry, FileEvent, SharedRegistry, TriggerSink, WatchBackend, WatchDirs,
    select_backend,
};

use super::core::{SequencerCommand, SequencerCore, SequencerInput};
use super::runner::run_build;
use super::{BuildId, BuildOutcome, Builder, INITIAL_BUILD_ID, WatchEvent, WatcherOptions};

/// Capacity of the `change`/`error` broadcast channel. Slow listeners that
/// fall further behind observe `RecvError::Lagged`.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

type Link = watch::Sender<Option<BuildOutcome>>;
type LinkReceiver = watch::Receiver<Option<BuildOutcome>>;

enum Message {
    File(FileEvent),
    Trigger(PathBuf),
    TimerFired(BuildId),
    BuildSettled { id: BuildId, outcome: BuildOutcome },
    CurrentLink(oneshot::Sender<LinkReceiver>),
    Close,
}

/// Public handle of the coordinator.
///
/// Construction starts the initial build right away. Dropping the handle
/// closes the coordinator.
pub struct BuildWatcher {
    tx: mpsc::UnboundedSender<Message>,
    events: broadcast::Sender<WatchEvent>,
    registry: SharedRegistry,
    options: WatcherOptions,
    task: Option<JoinHandle<()>>,
}

impl fmt::Debug for BuildWatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildWatcher")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl BuildWatcher {
    /// Start a coordinator with the backend picked from `options` and the
    /// real filesystem.
    ///
    /// Returns the handle plus an event receiver that is subscribed before
    /// the initial build starts, so it observes that build's event.
    /// Must be called from within a Tokio runtime.
    pub fn spawn(
        builder: impl Builder + 'static,
        options: WatcherOptions,
    ) -> (Self, broadcast::Receiver<WatchEvent>) {
        let backend = select_backend(&options);
        Self::spawn_with(builder, options, backend, Arc::new(RealFileSystem))
    }

    /// Start a coordinator with an explicit backend and filesystem.
    pub fn spawn_with(
        builder: impl Builder + 'static,
        options: WatcherOptions,
        backend: Arc<dyn WatchBackend>,
        fs: Arc<dyn FileSystem>,
    ) -> (Self, broadcast::Receiver<WatchEvent>) {
        let (tx, rx) = mpsc::unbounded_channel::<Message>();
        let (events, events_rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let sink = {
            let tx = tx.clone();
            TriggerSink::new(move |event| {
                let _ = tx.send(Message::File(event));
            })
        };
        let registry: SharedRegistry =
            Arc::new(Mutex::new(DirectoryRegistry::new(backend, fs, sink)));

        let (initial_link, tail) = watch::channel(None);
        let mut links = HashMap::new();
        links.insert(INITIAL_BUILD_ID, initial_link);

        let mut actor = Actor {
            core: SequencerCore::new(),
            rx,
            tx: tx.clone(),
            builder: Arc::new(builder),
            registry: Arc::clone(&registry),
            events: events.clone(),
            options,
            links,
            tail,
            timer: None,
        };

        // The initial build starts before the actor loop is even scheduled.
        let commands = actor.core.start_initial();
        actor.execute_all(commands);

        let task = tokio::spawn(actor.run());

        let watcher = Self {
            tx,
            events,
            registry,
            options,
            task: Some(task),
        };
        (watcher, events_rx)
    }

    pub fn options(&self) -> &WatcherOptions {
        &self.options
    }

    /// Another receiver for `change`/`error` events, starting from now.
    pub fn subscribe(&self) -> broadcast::Receiver<WatchEvent> {
        self.events.subscribe()
    }

    /// Ask for a rebuild because `path` changed.
    ///
    /// Calls within one debounce window collapse into a single build.
    pub fn schedule_build(&self, path: impl Into<PathBuf>) {
        let _ = self.tx.send(Message::Trigger(path.into()));
    }

    /// Watch `dir` and schedule a build for every event under it.
    ///
    /// No-op if it is already watched; fails with `MissingDirectory` if it
    /// does not exist.
    pub fn add_watch_dir(&self, dir: impl AsRef<Path>) -> Result<()> {
        WatchDirs::new(Arc::clone(&self.registry)).add(dir)
    }

    pub fn watched_dirs(&self) -> Vec<PathBuf> {
        match self.registry.lock() {
            Ok(registry) => registry.watched_dirs(),
            Err(poisoned) => poisoned.into_inner().watched_dirs(),
        }
    }

    /// Wait for the most recently scheduled build to settle.
    ///
    /// "Most recent" is evaluated when this call reaches the coordinator,
    /// after every trigger sent before it. Resolves with
    /// `Err(BuildwatchError::Closed)` if that build was cancelled by
    /// [`close`](Self::close) before it started.
    pub async fn wait_for_current(&self) -> BuildOutcome {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.tx.send(Message::CurrentLink(reply_tx)).is_err() {
            return closed_outcome();
        }
        let Ok(mut link) = reply_rx.await else {
            return closed_outcome();
        };

        match link.wait_for(Option::is_some).await {
            Ok(outcome) => outcome.clone().unwrap_or_else(closed_outcome),
            Err(_) => closed_outcome(),
        }
    }

    /// Stop all watching and cancel a pending debounce timer.
    ///
    /// A build already running is not interrupted; it still emits its event.
    /// Idempotent.
    pub fn close(&self) {
        // Trigger sources go first so nothing new arrives behind the close.
        match self.registry.lock() {
            Ok(mut registry) => registry.close_all(),
            Err(poisoned) => poisoned.into_inner().close_all(),
        }
        let _ = self.tx.send(Message::Close);
    }

    /// [`close`](Self::close), then wait until a running build (if any) has
    /// finished and the coordinator task has exited.
    pub async fn shutdown(mut self) {
        self.close();
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                warn!("build watcher task ended abnormally: {err}");
            }
        }
    }
}

impl Drop for BuildWatcher {
    fn drop(&mut self) {
        self.close();
    }
}

fn closed_outcome() -> BuildOutcome {
    Err(Arc::new(BuildwatchError::Closed))
}

/// Owns every piece of mutable scheduling state.
struct Actor {
    core: SequencerCore,
    rx: mpsc::UnboundedReceiver<Message>,
    tx: mpsc::UnboundedSender<Message>,
    builder: Arc<dyn Builder>,
    registry: SharedRegistry,
    events: broadcast::Sender<WatchEvent>,
    options: WatcherOptions,
    /// Links of builds that have not settled yet.
    links: HashMap<BuildId, Link>,
    tail: LinkReceiver,
    timer: Option<(BuildId, JoinHandle<()>)>,
}

impl Actor {
    async fn run(mut self) {
        debug!("build watcher loop started");

        while let Some(message) = self.rx.recv().await {
            self.handle(message);

            if self.core.is_closed() && self.core.running().is_none() {
                break;
            }
        }

        debug!("build watcher loop finished");
    }

    fn handle(&mut self, message: Message) {
        match message {
            Message::File(event) => {
                if self.options.verbose {
                    info!("file {} {:?}", event.kind, event.path);
                } else {
                    debug!("file {} {:?}", event.kind, event.path);
                }
                self.apply(SequencerInput::Trigger { path: event.path });
            }
            Message::Trigger(path) => {
                self.apply(SequencerInput::Trigger { path });
            }
            Message::TimerFired(id) => {
                self.apply(SequencerInput::TimerFired { id });
            }
            Message::BuildSettled { id, outcome } => {
                if let Some(link) = self.links.remove(&id) {
                    link.send_replace(Some(outcome));
                }
                self.apply(SequencerInput::BuildSettled { id });
            }
            Message::CurrentLink(reply) => {
                let _ = reply.send(self.tail.clone());
            }
            Message::Close => {
                self.apply(SequencerInput::Close);
            }
        }
    }

    fn apply(&mut self, input: SequencerInput) {
        let commands = self.core.step(input);
        self.execute_all(commands);
    }

    fn execute_all(&mut self, commands: Vec<SequencerCommand>) {
        for command in commands {
            self.execute(command);
        }
    }

    fn execute(&mut self, command: SequencerCommand) {
        match command {
            SequencerCommand::ArmTimer { id } => self.arm_timer(id),
            SequencerCommand::CancelTimer { id } => {
                if let Some((timer_id, handle)) = self.timer.take() {
                    if timer_id == id {
                        handle.abort();
                    } else {
                        self.timer = Some((timer_id, handle));
                    }
                }
                // Dropping the sender tells waiters the build will never run.
                self.links.remove(&id);
                debug!(id, "pending build cancelled");
            }
            SequencerCommand::StartBuild { id, trigger_path } => {
                if matches!(self.timer, Some((timer_id, _)) if timer_id == id) {
                    self.timer = None;
                }
                self.start_build(id, trigger_path);
            }
            SequencerCommand::StopWatching => match self.registry.lock() {
                Ok(mut registry) => registry.close_all(),
                Err(poisoned) => poisoned.into_inner().close_all(),
            },
        }
    }

    fn arm_timer(&mut self, id: BuildId) {
        let (link, tail) = watch::channel(None);
        self.links.insert(id, link);
        self.tail = tail;

        let tx = self.tx.clone();
        let debounce = self.options.debounce;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            let _ = tx.send(Message::TimerFired(id));
        });
        self.timer = Some((id, handle));
        debug!(id, ?debounce, "debounce timer armed");
    }

    fn start_build(&mut self, id: BuildId, trigger_path: Option<PathBuf>) {
        let builder = Arc::clone(&self.builder);
        let dirs = WatchDirs::new(Arc::clone(&self.registry));
        let events = self.events.clone();
        let verbose = self.options.verbose;
        let tx = self.tx.clone();

        info!(id, path = ?trigger_path, "build started");
        tokio::spawn(async move {
            let outcome = run_build(builder, dirs, trigger_path, &events, verbose).await;
            let _ = tx.send(Message::BuildSettled { id, outcome });
        });
    }
}
