// src/engine/core.rs

//! Pure sequencer state machine.
//!
//! [`SequencerCore`] consumes [`SequencerInput`]s and returns the
//! [`SequencerCommand`]s the async shell (`engine::runtime`) must carry out.
//! It owns no timers, channels or tasks, so it can be driven step by step in
//! tests without Tokio.
//!
//! Rules:
//! - A trigger arms a debounce timer unless a build is already pending.
//!   While one is pending, triggers only update its trigger path.
//! - A pending build starts once its timer has fired *and* the running build
//!   (if any) has settled, successfully or not.
//! - The timer starts with the first trigger of a burst, not after the
//!   running build; a burst therefore waits at most one debounce window plus
//!   the rest of the running build.
//! - After `Close` every input except `BuildSettled` is ignored.

use std::path::PathBuf;

use tracing::{debug, trace};

use super::{BuildId, INITIAL_BUILD_ID};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequencerInput {
    /// A file event (or manual request) asking for a rebuild.
    Trigger { path: PathBuf },
    /// The debounce timer of build `id` elapsed.
    TimerFired { id: BuildId },
    /// Build `id` finished, with either outcome.
    BuildSettled { id: BuildId },
    /// Stop scheduling.
    Close,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequencerCommand {
    /// Create the link for build `id` and start its debounce timer.
    ArmTimer { id: BuildId },
    /// Abort the timer of build `id` and drop its link.
    CancelTimer { id: BuildId },
    /// Run build `id` now.
    StartBuild {
        id: BuildId,
        trigger_path: Option<PathBuf>,
    },
    /// Stop every directory watch.
    StopWatching,
}

/// A build whose debounce window is open or closed but which has not
/// started yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingBuild {
    pub id: BuildId,
    pub timer_fired: bool,
    pub trigger_path: PathBuf,
    /// Number of triggers coalesced into this build.
    pub triggers: usize,
}

#[derive(Debug, Default)]
pub struct SequencerCore {
    next_id: BuildId,
    running: Option<BuildId>,
    pending: Option<PendingBuild>,
    closed: bool,
}

impl SequencerCore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start the initial, non-debounced build.
    ///
    /// Only valid on a fresh core; later calls return no commands.
    pub fn start_initial(&mut self) -> Vec<SequencerCommand> {
        if self.next_id != INITIAL_BUILD_ID || self.closed {
            return Vec::new();
        }
        self.next_id = INITIAL_BUILD_ID + 1;
        self.running = Some(INITIAL_BUILD_ID);
        vec![SequencerCommand::StartBuild {
            id: INITIAL_BUILD_ID,
            trigger_path: None,
        }]
    }

    pub fn running(&self) -> Option<BuildId> {
        self.running
    }

    pub fn pending(&self) -> Option<&PendingBuild> {
        self.pending.as_ref()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// No build running and none pending.
    pub fn is_idle(&self) -> bool {
        self.running.is_none() && self.pending.is_none()
    }

    pub fn step(&mut self, input: SequencerInput) -> Vec<SequencerCommand> {
        trace!(?input, "sequencer input");
        match input {
            SequencerInput::Trigger { path } => self.on_trigger(path),
            SequencerInput::TimerFired { id } => self.on_timer_fired(id),
            SequencerInput::BuildSettled { id } => self.on_build_settled(id),
            SequencerInput::Close => self.on_close(),
        }
    }

    fn on_trigger(&mut self, path: PathBuf) -> Vec<SequencerCommand> {
        if self.closed {
            debug!(?path, "sequencer closed; ignoring trigger");
            return Vec::new();
        }

        if let Some(pending) = self.pending.as_mut() {
            pending.trigger_path = path;
            pending.triggers += 1;
            return Vec::new();
        }

        let id = self.next_id;
        self.next_id += 1;
        self.pending = Some(PendingBuild {
            id,
            timer_fired: false,
            trigger_path: path,
            triggers: 1,
        });
        vec![SequencerCommand::ArmTimer { id }]
    }

    fn on_timer_fired(&mut self, id: BuildId) -> Vec<SequencerCommand> {
        match self.pending.as_mut() {
            Some(pending) if pending.id == id => pending.timer_fired = true,
            _ => {
                debug!(id, "stale debounce timer; ignoring");
                return Vec::new();
            }
        }
        self.maybe_start_pending()
    }

    fn on_build_settled(&mut self, id: BuildId) -> Vec<SequencerCommand> {
        if self.running != Some(id) {
            debug!(id, running = ?self.running, "settlement for a build that is not running");
            return Vec::new();
        }
        self.running = None;
        self.maybe_start_pending()
    }

    fn on_close(&mut self) -> Vec<SequencerCommand> {
        if self.closed {
            return Vec::new();
        }
        self.closed = true;

        let mut commands = Vec::new();
        if let Some(pending) = self.pending.take() {
            commands.push(SequencerCommand::CancelTimer { id: pending.id });
        }
        commands.push(SequencerCommand::StopWatching);
        commands
    }

    fn maybe_start_pending(&mut self) -> Vec<SequencerCommand> {
        if self.running.is_some() {
            return Vec::new();
        }
        let ready = self.pending.as_ref().is_some_and(|p| p.timer_fired);
        if !ready {
            return Vec::new();
        }
        let Some(pending) = self.pending.take() else {
            return Vec::new();
        };

        debug!(
            id = pending.id,
            triggers = pending.triggers,
            path = ?pending.trigger_path,
            "starting debounced build"
        );
        self.running = Some(pending.id);
        vec![SequencerCommand::StartBuild {
            id: pending.id,
            trigger_path: Some(pending.trigger_path),
        }]
    }
}
