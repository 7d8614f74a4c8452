use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;
use tokio::time::Instant;

use buildwatch::engine::{BuildFuture, BuildGraph, Builder};
use buildwatch::watch::WatchDirs;

/// What one build call does.
#[derive(Debug, Clone)]
pub enum ScriptStep {
    Succeed { delay: Duration },
    Fail { delay: Duration, message: String },
}

impl ScriptStep {
    fn delay(&self) -> Duration {
        match self {
            ScriptStep::Succeed { delay } | ScriptStep::Fail { delay, .. } => *delay,
        }
    }
}

#[derive(Debug, Default)]
struct ScriptState {
    script: Mutex<VecDeque<ScriptStep>>,
    default_delay: Mutex<Duration>,
    watch_dirs: Mutex<Vec<PathBuf>>,
    starts: Mutex<Vec<Instant>>,
    finishes: Mutex<Vec<Instant>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

/// A build collaborator driven by a script.
///
/// - scripted steps are consumed one per build; once the script is empty
///   every build succeeds after the default delay
/// - start/finish instants and peak concurrency are recorded
///
/// Clones share state.
#[derive(Debug, Clone, Default)]
pub struct ScriptedBuilder {
    inner: Arc<ScriptState>,
}

impl ScriptedBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_delay(self, delay: Duration) -> Self {
        *self.inner.default_delay.lock().unwrap() = delay;
        self
    }

    pub fn then_succeed(self, delay: Duration) -> Self {
        self.inner
            .script
            .lock()
            .unwrap()
            .push_back(ScriptStep::Succeed { delay });
        self
    }

    pub fn then_fail(self, delay: Duration, message: &str) -> Self {
        self.inner.script.lock().unwrap().push_back(ScriptStep::Fail {
            delay,
            message: message.to_string(),
        });
        self
    }

    /// Register `dir` through the build's `WatchDirs` on every build.
    pub fn watching(self, dir: impl Into<PathBuf>) -> Self {
        self.inner.watch_dirs.lock().unwrap().push(dir.into());
        self
    }

    pub fn builds_started(&self) -> usize {
        self.inner.starts.lock().unwrap().len()
    }

    pub fn builds_finished(&self) -> usize {
        self.inner.finishes.lock().unwrap().len()
    }

    pub fn starts(&self) -> Vec<Instant> {
        self.inner.starts.lock().unwrap().clone()
    }

    pub fn finishes(&self) -> Vec<Instant> {
        self.inner.finishes.lock().unwrap().clone()
    }

    /// Highest number of builds that were ever running at the same time.
    pub fn max_concurrent(&self) -> usize {
        self.inner.max_in_flight.load(Ordering::SeqCst)
    }
}

impl Builder for ScriptedBuilder {
    fn build(&self, dirs: WatchDirs) -> BuildFuture<'_> {
        let inner = Arc::clone(&self.inner);

        Box::pin(async move {
            let watch_dirs = inner.watch_dirs.lock().unwrap().clone();
            for dir in watch_dirs {
                dirs.add(dir)?;
            }

            let step = inner
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| ScriptStep::Succeed {
                    delay: *inner.default_delay.lock().unwrap(),
                });

            let now = inner.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            inner.max_in_flight.fetch_max(now, Ordering::SeqCst);
            inner.starts.lock().unwrap().push(Instant::now());

            tokio::time::sleep(step.delay()).await;

            inner.in_flight.fetch_sub(1, Ordering::SeqCst);
            inner.finishes.lock().unwrap().push(Instant::now());

            match step {
                ScriptStep::Succeed { delay } => {
                    let mut graph = BuildGraph::new();
                    graph.push("scripted", delay);
                    Ok(graph)
                }
                ScriptStep::Fail { message, .. } => Err(anyhow!(message)),
            }
        })
    }
}
