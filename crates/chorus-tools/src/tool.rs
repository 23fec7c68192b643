// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Adapted near-verbatim from `sven-tools::tool`: the `Tool` trait and its
//! call/output types already match spec §4.5's `ToolMethod` contract
//! (name, description, JSON-Schema parameters, an approval default, and an
//! async `execute`). Dropped: `modes()`/`AgentMode` filtering and
//! `OutputCategory` truncation hints — both belong to the teacher's desktop
//! shell, not this substrate.
use async_trait::async_trait;
use serde_json::Value;

use crate::policy::ApprovalPolicy;

/// A single tool invocation requested by an agent.
#[derive(Debug, Clone)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub args: Value,
}

/// The result of executing a tool.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub call_id: String,
    pub content: String,
    pub is_error: bool,
}

impl ToolOutput {
    pub fn ok(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            content: content.into(),
            is_error: false,
        }
    }

    /// `content: "Error: …"`, matching spec §4.6's tool-failure edge case:
    /// a raising tool is reported back to the model as an error result, not
    /// a crash.
    pub fn err(call_id: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            content: format!("Error: {}", msg.into()),
            is_error: true,
        }
    }
}

/// Every tool the agent can call implements this — whether it's a local
/// builtin or a `ToolMethod` reflecting a peer's RPC method (spec §4.5).
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters_schema(&self) -> Value;
    fn default_policy(&self) -> ApprovalPolicy;
    async fn execute(&self, call: &ToolCall) -> ToolOutput;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn err_output_is_prefixed_and_flagged() {
        let out = ToolOutput::err("1", "boom");
        assert!(out.is_error);
        assert_eq!(out.content, "Error: boom");
    }

    #[test]
    fn ok_output_is_not_flagged() {
        let out = ToolOutput::ok("1", "done");
        assert!(!out.is_error);
        assert_eq!(out.content, "done");
    }
}
