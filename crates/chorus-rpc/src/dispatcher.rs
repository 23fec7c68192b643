// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Caller-side timeout racing and callee-side method serving (spec §4.4).
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use chorus_core::CallId;

use crate::call::{CallOutcome, PendingCalls};
use crate::error::CancelReason;
use crate::registry::{MethodCall, MethodHandler, MethodOutcome, MethodRegistry};

/// Caller-side helper: races a registered call's terminal outcome against a
/// fixed timeout. Unary calls only — a streaming call's terminal
/// `rpc_response` goes through the same `PendingCalls` entry but the
/// progress events bypass this type entirely (delivered on the caller's own
/// `mpsc::Receiver<Value>`, wired up by the transport layer).
pub struct Dispatcher {
    pending: Arc<PendingCalls>,
    timeout: Duration,
}

impl Dispatcher {
    pub fn new(pending: Arc<PendingCalls>, timeout: Duration) -> Self {
        Self { pending, timeout }
    }

    /// Register `call_id` and await its outcome. On timeout the dispatcher
    /// cancels the call as if it had sent `rpc_cancel` to the callee, and
    /// resolves to `Cancelled(Timeout)` — spec §4.4's "callee must terminate
    /// in bounded time or the caller's timeout fires".
    pub async fn call(&self, call_id: CallId, parent: Option<&CancellationToken>) -> CallOutcome {
        let (rx, _token) = self.pending.register(call_id.clone(), parent);
        tokio::select! {
            result = rx => result.unwrap_or_else(|_| {
                CallOutcome::Err("callee dropped without responding".to_string())
            }),
            _ = tokio::time::sleep(self.timeout) => {
                self.pending.cancel(&call_id, CancelReason::Timeout);
                CallOutcome::Cancelled(CancelReason::Timeout)
            }
        }
    }
}

/// Callee-side: serve a unary method call against a registry. Schema
/// validation is the handler's responsibility (it receives raw `args`); a
/// handler that rejects malformed args should return `MethodOutcome::Err`,
/// which the caller surfaces as `rpc_response{status: error}`.
pub async fn serve_unary(registry: &MethodRegistry, method_name: &str, call: MethodCall) -> MethodOutcome {
    match registry.get(method_name) {
        Some(entry) => match entry.handler {
            MethodHandler::Unary(f) => f(call).await,
            MethodHandler::Streaming(f) => f(call, mpsc::channel(1).0).await,
        },
        None => MethodOutcome::Err(format!("unknown method: {method_name}")),
    }
}

/// Callee-side: serve a streaming method call, forwarding progress events
/// on `events_tx` as `rpc_event` frames until the terminal outcome arrives.
pub async fn serve_streaming(
    registry: &MethodRegistry,
    method_name: &str,
    call: MethodCall,
    events_tx: mpsc::Sender<Value>,
) -> MethodOutcome {
    match registry.get(method_name) {
        Some(entry) => match entry.handler {
            MethodHandler::Streaming(f) => f(call, events_tx).await,
            MethodHandler::Unary(f) => f(call).await,
        },
        None => MethodOutcome::Err(format!("unknown method: {method_name}")),
    }
}
