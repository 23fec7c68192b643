// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Events emitted by an agent runtime over the course of a turn. Extends
//! the teacher's `sven-core::events::AgentEvent` with the queue/interleave
//! surface spec §4.6 requires (`Queued`, `Interleaved`) and generalizes its
//! per-kind `typing`/`thinking`/`action` bracketing into `ActionStart`/
//! `ActionEnd` pairs so every tracker carries the same start/end shape.
use chorus_tools::ToolCall;

/// Consumers (the channel the agent is a participant of, a supervisor
/// dashboard) subscribe to these to drive their own output.
#[derive(Debug, Clone)]
pub enum AgentEvent {
    /// A text chunk streamed from the vendor model.
    TextDelta(String),
    /// A complete text response, after streaming finishes.
    TextComplete(String),
    /// A reasoning/thinking chunk from an extended-thinking vendor stream.
    ThinkingDelta(String),
    /// A complete thinking block, accumulated from `ThinkingDelta`s.
    ThinkingComplete(String),
    /// The model requested a tool call.
    ToolCallStarted(ToolCall),
    /// A tool call finished, successfully or not.
    ToolCallFinished {
        call_id: String,
        tool_name: String,
        output: String,
        is_error: bool,
    },
    /// Context was compacted; token counts for the UI.
    ContextCompacted { tokens_before: usize, tokens_after: usize },
    /// Token usage update for the turn just completed.
    TokenUsage {
        input: u32,
        output: u32,
        context_total: usize,
        cache_read: u32,
        cache_write: u32,
    },
    /// The agent finished processing the current turn.
    TurnComplete,
    /// A recoverable error occurred; the agent remains alive.
    Error(String),
    /// The current vendor call was aborted (pause/interrupt).
    Aborted,
    /// A message was admitted to the pending queue at this position.
    Queued { position: usize },
    /// A batch of queued messages was folded into the active turn as a
    /// follow-up at a safe splice point.
    Interleaved { batched_ids: Vec<String> },
    /// A tracked ephemeral action began (`typing`, `thinking`, tool
    /// execution); `kind` is a short tag (`"typing"`, `"tool:Bash"`, ...).
    ActionStart { kind: String, description: String },
    /// The matching end for a prior `ActionStart` of the same `kind`.
    ActionEnd { kind: String },
}
