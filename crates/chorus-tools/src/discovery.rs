// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Roster-driven tool discovery (spec §4.5): for every participant in a
//! channel's roster, call its well-known `list_methods` RPC method and
//! reflect the non-menu (peer-callable) results into the canonical tool
//! space as `ToolMethod`s — `menu` methods are invoked by a user action
//! (spec §4.4), not by a peer agent, so they never enter the tool catalog.
//! Kept independent of `chorus-broker` by taking the caller as a generic
//! closure rather than a concrete channel handle, avoiding a circular crate
//! dependency (the broker will own roster storage but doesn't need to know
//! about tool reflection).
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::time::timeout;

use chorus_core::{canonical_tool_name, ClientId};
use chorus_rpc::BoxFuture;

use crate::policy::ApprovalPolicy;
use crate::tool::{Tool, ToolCall, ToolOutput};

/// One entry in a participant's advertised `list_methods` response.
#[derive(Debug, Clone)]
pub struct RemoteMethodDescriptor {
    pub name: String,
    pub description: String,
    pub parameter_schema: Value,
    pub menu: bool,
}

/// Invokes a named RPC method on a given participant and awaits its unary
/// result. Supplied by the caller (normally `chorus-broker` plus
/// `chorus-rpc::Dispatcher`) so this crate never depends on the broker.
pub type RemoteCaller =
    Arc<dyn Fn(ClientId, String, Value) -> BoxFuture<'static, Result<Value, String>> + Send + Sync>;

/// Invokes a participant's `list_methods` RPC method. Supplied separately
/// from `RemoteCaller` because its return shape differs from an arbitrary
/// tool call's.
pub type ListMethodsCaller =
    Arc<dyn Fn(ClientId) -> BoxFuture<'static, Result<Vec<RemoteMethodDescriptor>, String>> + Send + Sync>;

/// A `Tool` that forwards execution to a remote participant's RPC method.
///
/// Registered and looked up under `canonical_name` (falling back to the raw
/// remote method name when it doesn't map onto a known canonical tool), but
/// the underlying RPC call always targets the original `descriptor.name`
/// (spec §4.5: "underlying invocation uses the original name").
pub struct ToolMethod {
    owner: ClientId,
    canonical_name: String,
    descriptor: RemoteMethodDescriptor,
    caller: RemoteCaller,
}

impl ToolMethod {
    pub fn new(owner: ClientId, descriptor: RemoteMethodDescriptor, caller: RemoteCaller) -> Self {
        let canonical_name = canonical_tool_name(&descriptor.name)
            .map(str::to_string)
            .unwrap_or_else(|| descriptor.name.clone());
        Self {
            owner,
            canonical_name,
            descriptor,
            caller,
        }
    }

    pub fn owner(&self) -> ClientId {
        self.owner
    }
}

#[async_trait::async_trait]
impl Tool for ToolMethod {
    fn name(&self) -> &str {
        &self.canonical_name
    }

    fn description(&self) -> &str {
        &self.descriptor.description
    }

    fn parameters_schema(&self) -> Value {
        self.descriptor.parameter_schema.clone()
    }

    fn default_policy(&self) -> ApprovalPolicy {
        if chorus_core::is_destructive(&self.canonical_name) {
            ApprovalPolicy::Ask
        } else {
            ApprovalPolicy::Auto
        }
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        match (self.caller)(self.owner, self.descriptor.name.clone(), call.args.clone()).await {
            Ok(value) => ToolOutput::ok(&call.id, value.to_string()),
            Err(msg) => ToolOutput::err(&call.id, msg),
        }
    }
}

/// Walks `roster`, asking each participant for its methods within
/// `per_participant_timeout`. Participants that don't respond in time are
/// skipped rather than failing the whole discovery pass, matching spec
/// §4.5's edge case for an unresponsive peer.
pub async fn discover(
    roster: &[ClientId],
    list_methods: ListMethodsCaller,
    caller: RemoteCaller,
    per_participant_timeout: Duration,
) -> Vec<ToolMethod> {
    let mut discovered = Vec::new();
    for &client_id in roster {
        let result = timeout(per_participant_timeout, (list_methods)(client_id)).await;
        let Ok(Ok(descriptors)) = result else {
            tracing::debug!(?client_id, "list_methods discovery timed out or failed");
            continue;
        };
        for descriptor in descriptors.into_iter().filter(|d| !d.menu) {
            discovered.push(ToolMethod::new(client_id, descriptor, Arc::clone(&caller)));
        }
    }
    discovered
}
