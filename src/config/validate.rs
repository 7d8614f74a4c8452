// src/config/validate.rs

use std::collections::HashSet;

use crate::config::model::{BuildStep, ConfigFile, DEFAULT_STEP_NAME, RawConfigFile};
use crate::errors::{BuildwatchError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = BuildwatchError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_watch_section(&raw)?;
        let steps = resolve_steps(raw.build.cmd, raw.build.steps)?;
        Ok(ConfigFile::new_unchecked(raw.watch, steps))
    }
}

fn validate_watch_section(cfg: &RawConfigFile) -> Result<()> {
    if cfg.watch.poll_interval_ms == 0 {
        return Err(BuildwatchError::ConfigError(
            "[watch].poll_interval_ms must be >= 1 (got 0)".to_string(),
        ));
    }

    if cfg.watch.dirs.iter().any(|d| d.trim().is_empty()) {
        return Err(BuildwatchError::ConfigError(
            "[watch].dirs must not contain empty entries".to_string(),
        ));
    }

    Ok(())
}

fn resolve_steps(cmd: Option<String>, steps: Vec<BuildStep>) -> Result<Vec<BuildStep>> {
    let steps = match (cmd, steps.is_empty()) {
        (Some(_), false) => {
            return Err(BuildwatchError::ConfigError(
                "[build] must use either `cmd` or [[build.step]], not both".to_string(),
            ));
        }
        (None, true) => {
            return Err(BuildwatchError::ConfigError(
                "config must contain a [build] section with `cmd` or at least one [[build.step]]"
                    .to_string(),
            ));
        }
        (Some(cmd), true) => vec![BuildStep {
            name: DEFAULT_STEP_NAME.to_string(),
            cmd,
        }],
        (None, false) => steps,
    };

    let mut seen = HashSet::new();
    for step in &steps {
        if step.name.trim().is_empty() {
            return Err(BuildwatchError::ConfigError(
                "build step names must not be empty".to_string(),
            ));
        }
        if step.cmd.trim().is_empty() {
            return Err(BuildwatchError::ConfigError(format!(
                "build step '{}' has an empty `cmd`",
                step.name
            )));
        }
        if !seen.insert(step.name.as_str()) {
            return Err(BuildwatchError::ConfigError(format!(
                "duplicate build step name '{}'",
                step.name
            )));
        }
    }

    Ok(steps)
}
