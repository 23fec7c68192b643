// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Call lifecycle tracking. Directly modeled on the teacher's
//! `control::service::Session::pending_approvals`: a map from an id to the
//! `oneshot::Sender` that unblocks the task awaiting the terminal outcome,
//! generalized from "one call kind" (tool approval) to every RPC call, and
//! from a flat cancel channel to a `CancellationToken` child-token tree so
//! cancelling a parent call cascades to every call it spawned.
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use chorus_core::CallId;

use crate::error::CancelReason;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    Pending,
    Streaming,
    Completed,
    Errored,
    Cancelled,
}

#[derive(Debug, Clone)]
pub enum CallOutcome {
    Ok(Value),
    Err(String),
    Cancelled(CancelReason),
}

struct CallHandle {
    result_tx: Option<oneshot::Sender<CallOutcome>>,
    cancel_token: CancellationToken,
}

/// Tracks every call a caller currently has in flight, keyed by `call_id`.
/// `call_id` is unique across a caller's lifetime (spec §3); the callee
/// emits at most one terminal outcome per call.
#[derive(Default)]
pub struct PendingCalls {
    calls: DashMap<CallId, CallHandle>,
}

impl PendingCalls {
    pub fn new() -> Self {
        Self {
            calls: DashMap::new(),
        }
    }

    /// Register a new in-flight call, optionally under a parent's
    /// cancellation scope (so cancelling the parent cancels this call too).
    /// Returns the receiver the caller awaits for the terminal outcome.
    pub fn register(
        &self,
        call_id: CallId,
        parent: Option<&CancellationToken>,
    ) -> (oneshot::Receiver<CallOutcome>, CancellationToken) {
        let (tx, rx) = oneshot::channel();
        let cancel_token = match parent {
            Some(p) => p.child_token(),
            None => CancellationToken::new(),
        };
        self.calls.insert(
            call_id,
            CallHandle {
                result_tx: Some(tx),
                cancel_token: cancel_token.clone(),
            },
        );
        (rx, cancel_token)
    }

    /// Deliver the terminal outcome for `call_id`, if it's still pending.
    /// Returns `false` if no such call was registered (already completed,
    /// or unknown) — the callee is expected to be tolerant of this.
    pub fn complete(&self, call_id: &CallId, outcome: CallOutcome) -> bool {
        if let Some((_, mut handle)) = self.calls.remove(call_id) {
            if let Some(tx) = handle.result_tx.take() {
                let _ = tx.send(outcome);
                return true;
            }
        }
        false
    }

    /// Cancel a specific in-flight call and everything it spawned.
    pub fn cancel(&self, call_id: &CallId, reason: CancelReason) {
        if let Some((_, handle)) = self.calls.remove(call_id) {
            handle.cancel_token.cancel();
            if let Some(tx) = handle.result_tx {
                let _ = tx.send(CallOutcome::Cancelled(reason));
            }
        }
    }

    /// Cancel every call currently tracked — used when a participant
    /// disconnects (spec §4.4: "disconnect of either side cancels all
    /// in-flight calls that involve it").
    pub fn cancel_all(&self, reason: CancelReason) {
        let ids: Vec<CallId> = self.calls.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            self.cancel(&id, reason);
        }
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}
