// src/exec/mod.rs

//! Process execution layer.
//!
//! [`CommandBuilder`] is the production [`Builder`](crate::engine::Builder):
//! it registers the configured watch directories and then runs the build
//! steps as shell commands, one after another, using
//! `tokio::process::Command`.

pub mod command;

pub use command::{CommandBuilder, STDERR_TAIL_LINES};
