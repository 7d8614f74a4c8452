#![allow(dead_code)]

use buildwatch::config::{BuildSection, BuildStep, ConfigFile, RawConfigFile, WatchSection};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                watch: WatchSection::default(),
                build: BuildSection::default(),
            },
        }
    }

    pub fn with_cmd(mut self, cmd: &str) -> Self {
        self.config.build.cmd = Some(cmd.to_string());
        self
    }

    pub fn with_step(mut self, name: &str, cmd: &str) -> Self {
        self.config.build.steps.push(BuildStep {
            name: name.to_string(),
            cmd: cmd.to_string(),
        });
        self
    }

    pub fn with_dir(mut self, dir: &str) -> Self {
        self.config.watch.dirs.push(dir.to_string());
        self
    }

    pub fn debounce_ms(mut self, ms: u64) -> Self {
        self.config.watch.debounce_ms = ms;
        self
    }

    pub fn poll(mut self, interval_ms: u64) -> Self {
        self.config.watch.poll = true;
        self.config.watch.poll_interval_ms = interval_ms;
        self
    }

    pub fn verbose(mut self, val: bool) -> Self {
        self.config.watch.verbose = val;
        self
    }

    pub fn build_raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}
