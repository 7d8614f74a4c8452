// src/errors.rs

//! Crate-wide error aliases and helpers.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuildwatchError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Attempting to watch missing directory: {}", .0.display())]
    MissingDirectory(PathBuf),

    #[error("File watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("Build failed: {0}")]
    BuildFailure(String),

    #[error("Watcher closed before the build ran")]
    Closed,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, BuildwatchError>;
