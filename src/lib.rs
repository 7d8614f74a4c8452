// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod watch;

use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};

use crate::cli::CliArgs;
use crate::config::ConfigFile;
use crate::config::loader::load_and_validate;
use crate::engine::{BuildWatcher, WatchEvent, WatcherOptions};
use crate::errors::BuildwatchError;
use crate::exec::CommandBuilder;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading (+ CLI overrides)
/// - the command builder
/// - the build watcher (backend selection, initial build)
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;
    let root = config_root_dir(&config_path);

    let options = apply_cli_overrides(cfg.watcher_options(), &args);
    let dirs = cfg.resolved_dirs(&root);

    if args.dry_run {
        print_dry_run(&cfg, &options, &dirs);
        return Ok(());
    }

    if args.once {
        let builder = CommandBuilder::new(cfg.steps.clone(), Vec::new()).with_working_dir(&root);
        return run_once(builder, options).await;
    }

    if dirs.is_empty() {
        return Err(BuildwatchError::ConfigError(
            "[watch].dirs must list at least one directory (or use --once)".to_string(),
        )
        .into());
    }

    let builder = CommandBuilder::new(cfg.steps.clone(), dirs).with_working_dir(&root);
    let (watcher, mut events) = BuildWatcher::spawn(builder, options);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(WatchEvent::Change(result)) => {
                    info!(
                        elapsed = ?result.elapsed,
                        trigger = ?result.trigger_path,
                        "rebuilt; waiting for changes"
                    );
                }
                Ok(WatchEvent::Error(err)) => {
                    warn!("build failed; waiting for changes: {err}");
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event listener lagged behind");
                }
                // Only once every sender is gone, and `watcher` holds one.
                Err(RecvError::Closed) => break,
            },
            res = &mut ctrl_c => {
                if let Err(e) = res {
                    error!("failed to listen for Ctrl+C: {e}");
                }
                info!("shutdown requested");
                break;
            }
        }
    }

    watcher.shutdown().await;
    debug!("build watcher stopped");
    Ok(())
}

/// Run the initial build only and report its outcome.
async fn run_once(builder: CommandBuilder, options: WatcherOptions) -> Result<()> {
    let (watcher, _events) = BuildWatcher::spawn(builder, options);
    let outcome = watcher.wait_for_current().await;
    watcher.shutdown().await;

    match outcome {
        Ok(result) => {
            info!(elapsed = ?result.elapsed, "build succeeded");
            Ok(())
        }
        Err(err) => bail!("build failed: {err}"),
    }
}

/// CLI flags win over `[watch]` settings.
pub fn apply_cli_overrides(mut options: WatcherOptions, args: &CliArgs) -> WatcherOptions {
    if args.poll {
        options.poll = true;
    }
    if args.verbose {
        options.verbose = true;
    }
    if let Some(ms) = args.debounce {
        options.debounce = std::time::Duration::from_millis(ms);
    }
    options
}

/// Figure out the directory relative paths in the config refer to.
///
/// - If the config path has a non-empty parent (e.g. "configs/Buildwatch.toml"),
///   we use that directory, made absolute against the current directory.
/// - If it's just a bare filename like "Buildwatch.toml" (parent = ""),
///   we fall back to the current working directory.
///
/// notify reports event paths under the watched path as given, so an
/// absolute root keeps trigger paths absolute too.
pub fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            std::path::absolute(parent).unwrap_or_else(|_| parent.to_path_buf())
        }
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

/// Simple dry-run output: print the resolved settings and steps.
fn print_dry_run(cfg: &ConfigFile, options: &WatcherOptions, dirs: &[PathBuf]) {
    println!("buildwatch dry-run");
    println!("  debounce = {:?}", options.debounce);
    if options.poll {
        println!("  backend = polling (every {:?})", options.poll_interval);
    } else {
        println!("  backend = native");
    }
    println!("  verbose = {}", options.verbose);
    println!();

    println!("watch dirs ({}):", dirs.len());
    for dir in dirs {
        println!("  - {}", dir.display());
    }
    println!();

    println!("build steps ({}):", cfg.steps.len());
    for step in &cfg.steps {
        println!("  - {}", step.name);
        println!("      cmd: {}", step.cmd);
    }

    debug!("dry-run complete (no build)");
}
