// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Worker identity, startup arguments, and lifecycle outcomes (spec §4.7).
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use chorus_core::{ChannelId, ContextId};
use chorus_tools::AutonomyLevel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(pub Uuid);

impl WorkerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for WorkerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Everything a worker needs to come up, passed by value into
/// `Supervisor::spawn` — never read back from a global (spec §9's "no
/// global mutable state"). Stored verbatim so a crash can be retried with
/// the exact same arguments.
#[derive(Debug, Clone)]
pub struct StartupArgs {
    pub channel: ChannelId,
    pub context_id: ContextId,
    pub handle: String,
    /// The vendor CLI this worker wraps: `"claude-code"` | `"codex"` |
    /// `"pi"` | any `ParticipantType::Other` string.
    pub agent_type: String,
    pub model: String,
    pub autonomy: AutonomyLevel,
    pub working_dir: Option<PathBuf>,
}

/// How a worker's task ended, delivered over the supervisor's completion
/// channel — mirrors `control::service::ControlService`'s
/// `completion_tx: mpsc::Sender<Uuid>`, extended to carry why.
#[derive(Debug)]
pub enum WorkerOutcome {
    /// Idle-unload or an explicit `WorkerControl::Stop`.
    Unloaded,
    Crashed { error: String },
}

/// Sent to a running worker's control channel — the supervisor never
/// reaches into a worker's state directly (spec §5's "no shared mutable
/// state between agents").
#[derive(Debug, Clone, Copy)]
pub enum WorkerControl {
    Pause,
    Resume,
    Stop,
}
