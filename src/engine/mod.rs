// src/engine/mod.rs

//! Build coordination engine.
//!
//! This module ties together:
//! - the sequencer: debounces trigger bursts and serializes builds
//! - the build runner: calls the [`Builder`] collaborator and publishes its
//!   outcome as a [`WatchEvent`]
//! - the coordinator [`BuildWatcher`], an actor that owns all scheduling
//!   state and reacts to file events, timer expiries and build completions
//!
//! The pure state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`].

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use crate::errors::BuildwatchError;
use crate::watch::WatchDirs;

pub mod core;
pub mod report;
pub mod runner;
pub mod runtime;

pub use self::core::{PendingBuild, SequencerCommand, SequencerCore, SequencerInput};
pub use runtime::BuildWatcher;

/// Identifies one scheduled build. The initial build is `0`; every armed
/// debounce window gets the next id.
pub type BuildId = u64;

/// Id of the build started at construction.
pub const INITIAL_BUILD_ID: BuildId = 0;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Coordinator configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatcherOptions {
    /// Debounce window started by the first event of a burst.
    pub debounce: Duration,
    /// Log every file event and report the slowest build nodes.
    pub verbose: bool,
    /// Use the polling backend.
    pub poll: bool,
    /// Poll interval for the polling backend.
    pub poll_interval: Duration,
}

impl Default for WatcherOptions {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            verbose: false,
            poll: false,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// One timed unit of work inside a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildNode {
    pub name: String,
    pub self_time: Duration,
}

/// Opaque build payload: the nodes a build went through and how long each
/// one took.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildGraph {
    pub nodes: Vec<BuildNode>,
}

impl BuildGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, self_time: Duration) {
        self.nodes.push(BuildNode {
            name: name.into(),
            self_time,
        });
    }

    pub fn total_time(&self) -> Duration {
        self.nodes.iter().map(|n| n.self_time).sum()
    }
}

/// A successful build as seen by `change` listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildResult {
    /// Last file event observed before this build started; `None` for the
    /// initial build.
    pub trigger_path: Option<PathBuf>,
    pub graph: BuildGraph,
    /// Wall time of the whole build call.
    pub elapsed: Duration,
}

/// How a single scheduled build settled.
pub type BuildOutcome = Result<Arc<BuildResult>, Arc<BuildwatchError>>;

/// Long-lived event stream published by [`BuildWatcher`].
#[derive(Debug, Clone)]
pub enum WatchEvent {
    /// A build succeeded.
    Change(Arc<BuildResult>),
    /// A build failed. The same error also settles that build's link.
    Error(Arc<BuildwatchError>),
}

pub type BuildFuture<'a> =
    Pin<Box<dyn Future<Output = anyhow::Result<BuildGraph>> + Send + 'a>>;

/// The build collaborator.
///
/// The coordinator guarantees that at most one `build` call is in flight at
/// a time. `dirs` lets the build register directories that must be watched.
pub trait Builder: Send + Sync {
    fn build(&self, dirs: WatchDirs) -> BuildFuture<'_>;
}
