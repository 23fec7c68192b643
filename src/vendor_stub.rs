// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Placeholder `VendorSession`: every call surfaces the same error. Vendor
//! CLI adapters (Claude Code, Codex, Pi) are out of scope here — a real
//! deployment supplies its own `VendorFactory` closure to
//! `chorus_supervisor::Supervisor::new`. This stub only exists so the
//! binary links and a freshly spawned worker fails loudly instead of the
//! process refusing to start.
use async_trait::async_trait;
use futures::stream;
use serde_json::Value;

use chorus_agent::{SessionOptions, VendorError, VendorEventStream, VendorSession, VendorUsage};
use chorus_tools::ToolOutput;

pub struct UnavailableVendor {
    agent_type: String,
}

impl UnavailableVendor {
    pub fn new(agent_type: impl Into<String>) -> Self {
        Self {
            agent_type: agent_type.into(),
        }
    }
}

#[async_trait]
impl VendorSession for UnavailableVendor {
    async fn start_session(&self, _opts: SessionOptions) -> Result<(), VendorError> {
        Err(VendorError::Other(format!(
            "no vendor adapter registered for agent_type {:?}",
            self.agent_type
        )))
    }

    async fn prompt(&self, _text: String, _images: Vec<Value>) -> VendorEventStream {
        Box::pin(stream::once(async { chorus_agent::VendorEvent::Error("vendor unavailable".into()) }))
    }

    async fn abort(&self) {}

    async fn follow_up(&self, _text: String, _images: Vec<Value>) -> VendorEventStream {
        Box::pin(stream::once(async { chorus_agent::VendorEvent::Error("vendor unavailable".into()) }))
    }

    async fn stats(&self) -> VendorUsage {
        VendorUsage::default()
    }

    async fn dispose(&self) {}

    fn supported_models(&self) -> Vec<String> {
        Vec::new()
    }

    async fn submit_tool_result(&self, _call_id: String, _output: ToolOutput) {}

    fn sdk_session_id(&self) -> Option<String> {
        None
    }
}
