// src/engine/runner.rs

//! Runs exactly one build pass.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{error, info};

use crate::errors::BuildwatchError;
use crate::watch::WatchDirs;

use super::report::log_slow_nodes;
use super::{BuildOutcome, BuildResult, Builder, WatchEvent};

/// Call the builder once and publish the outcome.
///
/// - Success: the trigger path is attached, a `Change` event is emitted, and
///   in verbose mode the slowest nodes are reported before returning.
/// - Failure: an `Error` event is emitted and the same error is returned, so
///   whoever waits on this build sees it too.
///
/// A panicking builder counts as a failed build.
pub async fn run_build(
    builder: Arc<dyn Builder>,
    dirs: WatchDirs,
    trigger_path: Option<PathBuf>,
    events: &broadcast::Sender<WatchEvent>,
    verbose: bool,
) -> BuildOutcome {
    let started = Instant::now();

    let attempt = tokio::spawn(async move { builder.build(dirs).await }).await;

    let result = match attempt {
        Ok(Ok(graph)) => Ok(graph),
        Ok(Err(err)) => Err(into_build_error(err)),
        Err(join_err) => Err(BuildwatchError::BuildFailure(format!(
            "build task aborted: {join_err}"
        ))),
    };

    match result {
        Ok(graph) => {
            let result = Arc::new(BuildResult {
                trigger_path,
                graph,
                elapsed: started.elapsed(),
            });
            info!(
                elapsed = ?result.elapsed,
                path = ?result.trigger_path,
                "build succeeded"
            );
            let _ = events.send(WatchEvent::Change(Arc::clone(&result)));

            if verbose {
                log_slow_nodes(&result.graph);
            }
            Ok(result)
        }
        Err(err) => {
            let err = Arc::new(err);
            error!(path = ?trigger_path, error = %err, "build failed");
            let _ = events.send(WatchEvent::Error(Arc::clone(&err)));
            Err(err)
        }
    }
}

/// Keep crate errors raised inside the build (e.g. a missing watch
/// directory); anything else becomes a `BuildFailure`.
fn into_build_error(err: anyhow::Error) -> BuildwatchError {
    match err.downcast::<BuildwatchError>() {
        Ok(err) => err,
        Err(other) => BuildwatchError::BuildFailure(format!("{other:#}")),
    }
}
