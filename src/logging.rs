// src/logging.rs

//! Log output for `buildwatch`.
//!
//! Events go to stderr through a `tracing-subscriber` fmt layer; build
//! command output keeps stdout to itself. The filter is taken from
//! `--log-level` when given, otherwise from `BUILDWATCH_LOG`, which accepts
//! full `EnvFilter` directives such as `buildwatch=debug,notify=warn`.

use anyhow::{Result, anyhow};
use tracing::warn;
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::LogLevel;

pub const LOG_ENV_VAR: &str = "BUILDWATCH_LOG";

/// Used when neither the CLI nor the environment picks a filter.
pub const DEFAULT_FILTER: &str = "info";

pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let env = std::env::var(LOG_ENV_VAR).ok();
    let (filter, rejected) = build_filter(cli_level, env.as_deref());

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("installing log subscriber: {e}"))?;

    if let Some(directives) = rejected {
        warn!("ignoring invalid {LOG_ENV_VAR}={directives:?}; using {DEFAULT_FILTER:?}");
    }
    Ok(())
}

/// Resolve the filter from the CLI level and the raw `BUILDWATCH_LOG` value.
///
/// The second item carries the env value back when it did not parse, so
/// the caller can report it once logging is up.
pub fn build_filter(cli_level: Option<LogLevel>, env: Option<&str>) -> (EnvFilter, Option<String>) {
    if let Some(level) = cli_level {
        return (EnvFilter::new(level.as_directive()), None);
    }

    match env.map(str::trim).filter(|s| !s.is_empty()) {
        None => (EnvFilter::new(DEFAULT_FILTER), None),
        Some(directives) => match EnvFilter::try_new(directives) {
            Ok(filter) => (filter, None),
            Err(_) => (EnvFilter::new(DEFAULT_FILTER), Some(directives.to_string())),
        },
    }
}
