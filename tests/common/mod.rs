#![allow(dead_code)]

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::TryRecvError;
use tracing::field::{Field, Visit};
use tracing::subscriber::DefaultGuard;
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

use buildwatch::engine::{BuildResult, BuildWatcher, WatchEvent, WatcherOptions};
use buildwatch::errors::BuildwatchError;
use buildwatch::fs::mock::MockFileSystem;
use buildwatch_test_utils::{FakeBackend, ScriptedBuilder};

pub use buildwatch_test_utils::{init_tracing, with_timeout};

pub const PROJECT_DIR: &str = "/project/src";

/// Everything a coordinator test needs to poke at.
pub struct Harness {
    pub watcher: BuildWatcher,
    pub events: broadcast::Receiver<WatchEvent>,
    pub backend: FakeBackend,
    pub fs: MockFileSystem,
    pub builder: ScriptedBuilder,
}

/// Spawn a coordinator over a fake backend and an in-memory filesystem that
/// contains [`PROJECT_DIR`].
pub fn spawn_harness(builder: ScriptedBuilder, debounce_ms: u64) -> Harness {
    let options = WatcherOptions {
        debounce: Duration::from_millis(debounce_ms),
        ..WatcherOptions::default()
    };
    spawn_harness_with(builder, options)
}

pub fn spawn_harness_with(builder: ScriptedBuilder, options: WatcherOptions) -> Harness {
    let backend = FakeBackend::new();
    let fs = MockFileSystem::new();
    fs.add_dir(PROJECT_DIR);

    let (watcher, events) = BuildWatcher::spawn_with(
        builder.clone(),
        options,
        Arc::new(backend.clone()),
        Arc::new(fs.clone()),
    );

    Harness {
        watcher,
        events,
        backend,
        fs,
        builder,
    }
}

pub async fn next_event(rx: &mut broadcast::Receiver<WatchEvent>) -> WatchEvent {
    with_timeout(rx.recv()).await.expect("event channel closed")
}

pub async fn expect_change(rx: &mut broadcast::Receiver<WatchEvent>) -> Arc<BuildResult> {
    match next_event(rx).await {
        WatchEvent::Change(result) => result,
        WatchEvent::Error(err) => panic!("expected change event, got error: {err}"),
    }
}

pub async fn expect_error(rx: &mut broadcast::Receiver<WatchEvent>) -> Arc<BuildwatchError> {
    match next_event(rx).await {
        WatchEvent::Error(err) => err,
        WatchEvent::Change(result) => panic!("expected error event, got change: {result:?}"),
    }
}

pub fn assert_no_event(rx: &mut broadcast::Receiver<WatchEvent>) {
    match rx.try_recv() {
        Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => {}
        other => panic!("expected no pending event, got {other:?}"),
    }
}

pub fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

/// Records every log event emitted on the current thread while its guard is
/// alive, as `"<LEVEL> <message>"`.
#[derive(Clone, Default)]
pub struct LogCapture {
    messages: Arc<Mutex<Vec<String>>>,
}

impl LogCapture {
    /// Install as the thread's default subscriber. `#[tokio::test]` runs
    /// every task on the test thread, so spawned tasks are captured too.
    pub fn install(&self) -> DefaultGuard {
        tracing::subscriber::set_default(tracing_subscriber::registry().with(self.clone()))
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }

    /// Indices of the messages containing `needle`, in emission order.
    pub fn positions(&self, needle: &str) -> Vec<usize> {
        self.messages()
            .iter()
            .enumerate()
            .filter(|(_, m)| m.contains(needle))
            .map(|(i, _)| i)
            .collect()
    }
}

struct MessageVisitor(String);

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.0 = format!("{value:?}");
        }
    }
}

impl<S: Subscriber> Layer<S> for LogCapture {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor(String::new());
        event.record(&mut visitor);
        let line = format!("{} {}", event.metadata().level(), visitor.0);
        self.messages.lock().unwrap().push(line);
    }
}
