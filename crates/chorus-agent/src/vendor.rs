// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The vendor-SDK binding (spec §4.6): the runtime treats the agent CLI/SDK
//! as a black box exposing a fixed set of operations plus an event stream.
//! Grounded on `sven_model::ModelProvider`'s shape (`async_trait`, a boxed
//! event stream per call) but scoped to one conversation handle rather than
//! one HTTP-backed provider — closer to a long-lived session object than a
//! stateless completion endpoint.
use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde_json::Value;
use thiserror::Error;

use chorus_tools::ToolOutput;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VendorUsage {
    pub input: u32,
    pub output: u32,
    pub cache_read: u32,
    pub cache_write: u32,
}

/// One event surfaced by a vendor stream. The runtime maps each of these
/// onto an `AgentEvent` (and, for `ToolStart`, drives the approval gate and
/// tool execution before feeding the result back via
/// `VendorSession::submit_tool_result`).
#[derive(Debug, Clone)]
pub enum VendorEvent {
    TextDelta(String),
    TextEnd,
    ThinkingDelta(String),
    ToolStart { name: String, args: Value, call_id: String },
    ToolEnd { call_id: String },
    TurnEnd { usage: Option<VendorUsage> },
    Error(String),
}

#[derive(Debug, Error)]
pub enum VendorError {
    /// `start_session` was asked to resume a stored `sdk_session_id` the
    /// vendor no longer recognizes (resolved Open Question #4). The caller
    /// falls back to a fresh session rather than failing the turn.
    #[error("vendor rejected the stored session handle: {0}")]
    SessionRejected(String),
    #[error("vendor error: {0}")]
    Other(String),
}

#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    pub model: String,
    pub system_prompt: Option<String>,
    /// A previously persisted `sdk_session_id` to resume, if any.
    pub resume_sdk_session_id: Option<String>,
}

pub type VendorEventStream = Pin<Box<dyn Stream<Item = VendorEvent> + Send>>;

/// The black-box binding from spec §4.6. One implementation per supported
/// agent CLI (Claude Code, Codex, Pi, ...); `chorus-supervisor` constructs
/// the concrete implementation a worker uses based on `StartupArgs::agent_type`.
#[async_trait]
pub trait VendorSession: Send + Sync {
    async fn start_session(&self, opts: SessionOptions) -> Result<(), VendorError>;
    async fn prompt(&self, text: String, images: Vec<Value>) -> VendorEventStream;
    async fn abort(&self);
    async fn follow_up(&self, text: String, images: Vec<Value>) -> VendorEventStream;
    async fn stats(&self) -> VendorUsage;
    async fn dispose(&self);
    fn supported_models(&self) -> Vec<String>;
    /// Feeds a finished tool's result back through the vendor's tool-result
    /// channel so the model can continue the turn.
    async fn submit_tool_result(&self, call_id: String, output: ToolOutput);
    /// An opaque handle identifying this conversation to the vendor, to be
    /// persisted as `Session::sdk_session_id` and offered to a future
    /// `start_session` call for resumption.
    fn sdk_session_id(&self) -> Option<String>;
}
