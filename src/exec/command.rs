// src/exec/command.rs

use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::BuildStep;
use crate::engine::{BuildFuture, BuildGraph, Builder};
use crate::errors::BuildwatchError;
use crate::watch::WatchDirs;

/// How many trailing stderr lines are quoted in a failure message.
pub const STDERR_TAIL_LINES: usize = 20;

/// Runs a fixed list of shell steps as one build.
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    steps: Vec<BuildStep>,
    watch_dirs: Vec<PathBuf>,
    working_dir: Option<PathBuf>,
}

impl CommandBuilder {
    pub fn new(steps: Vec<BuildStep>, watch_dirs: Vec<PathBuf>) -> Self {
        Self {
            steps,
            watch_dirs,
            working_dir: None,
        }
    }

    /// Run every step inside `dir` instead of the current directory.
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    async fn run(&self, dirs: WatchDirs) -> Result<BuildGraph> {
        for dir in &self.watch_dirs {
            dirs.add(dir)?;
        }

        let mut graph = BuildGraph::new();
        for step in &self.steps {
            let started = Instant::now();
            self.run_step(step).await?;
            graph.push(step.name.clone(), started.elapsed());
        }
        Ok(graph)
    }

    async fn run_step(&self, step: &BuildStep) -> Result<()> {
        info!(step = %step.name, cmd = %step.cmd, "running build step");

        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&step.cmd);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(&step.cmd);
            c
        };

        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawning process for build step '{}'", step.name))?;

        // Forward stdout as-is; the build's output belongs on our stdout.
        let stdout_task = child.stdout.take().map(|stdout| {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    println!("{line}");
                }
            })
        });

        // Forward stderr and remember its tail for the failure message.
        let tail = Arc::new(Mutex::new(VecDeque::with_capacity(STDERR_TAIL_LINES)));
        let stderr_task = child.stderr.take().map(|stderr| {
            let tail = Arc::clone(&tail);
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    eprintln!("{line}");
                    if let Ok(mut tail) = tail.lock() {
                        if tail.len() == STDERR_TAIL_LINES {
                            tail.pop_front();
                        }
                        tail.push_back(line);
                    }
                }
            })
        });

        let status = child
            .wait()
            .await
            .with_context(|| format!("waiting for process of build step '{}'", step.name))?;

        for task in [stdout_task, stderr_task].into_iter().flatten() {
            let _ = task.await;
        }

        let code = status.code().unwrap_or(-1);
        debug!(step = %step.name, exit_code = code, success = status.success(), "build step exited");

        if status.success() {
            return Ok(());
        }

        let tail: Vec<String> = match tail.lock() {
            Ok(tail) => tail.iter().cloned().collect(),
            Err(_) => Vec::new(),
        };
        let mut message = format!("step '{}' exited with code {}", step.name, code);
        if !tail.is_empty() {
            message.push_str(":\n");
            message.push_str(&tail.join("\n"));
        }
        Err(BuildwatchError::BuildFailure(message).into())
    }
}

impl Builder for CommandBuilder {
    fn build(&self, dirs: WatchDirs) -> BuildFuture<'_> {
        Box::pin(self.run(dirs))
    }
}
