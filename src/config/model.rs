// src/config/model.rs

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::engine::WatcherOptions;

/// Step name used when `[build]` only has the `cmd` shorthand.
pub const DEFAULT_STEP_NAME: &str = "build";

/// Configuration exactly as read from a TOML file, before validation.
///
/// ```toml
/// [watch]
/// debounce_ms = 100
/// poll = false
/// dirs = ["src", "assets"]
///
/// [build]
/// cmd = "make"
/// ```
///
/// `[build]` may instead list several named steps:
///
/// ```toml
/// [[build.step]]
/// name = "compile"
/// cmd = "cargo build"
///
/// [[build.step]]
/// name = "test"
/// cmd = "cargo test"
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub watch: WatchSection,

    #[serde(default)]
    pub build: BuildSection,
}

/// `[watch]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct WatchSection {
    /// Debounce window; rapid events inside it collapse into one build.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Use the polling backend instead of native OS notifications.
    #[serde(default)]
    pub poll: bool,

    /// Poll interval, only used when `poll = true`.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Log every file event and the slowest build steps.
    #[serde(default)]
    pub verbose: bool,

    /// Directories registered for watching by every build.
    ///
    /// Relative entries are resolved against the config file's directory.
    #[serde(default)]
    pub dirs: Vec<String>,
}

fn default_debounce_ms() -> u64 {
    100
}

fn default_poll_interval_ms() -> u64 {
    1000
}

impl Default for WatchSection {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            poll: false,
            poll_interval_ms: default_poll_interval_ms(),
            verbose: false,
            dirs: Vec::new(),
        }
    }
}

/// `[build]` section. Exactly one of `cmd` / `step` must be present.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct BuildSection {
    #[serde(default)]
    pub cmd: Option<String>,

    #[serde(default, rename = "step")]
    pub steps: Vec<BuildStep>,
}

/// A single named shell command that is part of a build.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BuildStep {
    pub name: String,
    pub cmd: String,
}

/// Validated configuration.
///
/// Only constructed through `TryFrom<RawConfigFile>` (see `validate.rs`), so
/// `steps` is never empty and step names are unique.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub watch: WatchSection,
    pub steps: Vec<BuildStep>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(watch: WatchSection, steps: Vec<BuildStep>) -> Self {
        Self { watch, steps }
    }

    /// Coordinator options derived from `[watch]`.
    pub fn watcher_options(&self) -> WatcherOptions {
        WatcherOptions {
            debounce: Duration::from_millis(self.watch.debounce_ms),
            verbose: self.watch.verbose,
            poll: self.watch.poll,
            poll_interval: Duration::from_millis(self.watch.poll_interval_ms),
        }
    }

    /// Watch directories, with relative entries joined onto `root`.
    pub fn resolved_dirs(&self, root: &Path) -> Vec<PathBuf> {
        self.watch
            .dirs
            .iter()
            .map(|d| {
                let p = PathBuf::from(d);
                if p.is_absolute() { p } else { root.join(p) }
            })
            .collect()
    }
}
