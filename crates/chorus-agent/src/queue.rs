// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The message queue with interleaving (spec §4.6). `pending` is the FIFO
//! of messages admitted but not yet processed; `active` holds at most one
//! entry being driven through the vendor. Grounded on the turn-boundary
//! shape of the teacher's `Agent`/`run_agentic_loop`, which this crate
//! splits into an explicit queue type so the splice-point logic in
//! `runtime.rs` can reason about it without owning the vendor call too.
use std::collections::VecDeque;

use serde_json::Value;

/// One admitted message awaiting or undergoing processing.
#[derive(Debug, Clone)]
pub struct QueuedMessage {
    pub id: String,
    pub text: String,
    pub images: Vec<Value>,
}

/// The result of draining `pending` at a safe splice point: the original
/// messages (kept so a failed interleave can be re-pushed intact) plus
/// their concatenation, ready to hand the vendor as a follow-up turn.
#[derive(Debug, Clone)]
pub struct InterleaveBatch {
    pub batched_ids: Vec<String>,
    pub text: String,
    pub images: Vec<Value>,
    /// The id the agent should re-anchor its replies to (spec §4.6: "the
    /// newest message's id").
    pub last_id: String,
    messages: Vec<QueuedMessage>,
}

#[derive(Debug, Default)]
pub struct MessageQueue {
    pending: VecDeque<QueuedMessage>,
    active: Option<QueuedMessage>,
    paused: bool,
}

impl MessageQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admits a message to the tail of `pending`. Returns its 1-based
    /// position, used to publish the initial `typing("queued: position
    /// N")` indicator.
    pub fn push(&mut self, msg: QueuedMessage) -> usize {
        self.pending.push_back(msg);
        self.pending.len()
    }

    /// 1-based positions of every pending message, in FIFO order —
    /// re-published together whenever the queue's shape changes, per
    /// spec §4.6 rather than polled per-entry.
    pub fn positions(&self) -> Vec<(String, usize)> {
        self.pending
            .iter()
            .enumerate()
            .map(|(i, m)| (m.id.clone(), i + 1))
            .collect()
    }

    /// Promotes the next pending message to `active`, if none is already
    /// active. Returns the promoted message, if any.
    pub fn start_next(&mut self) -> Option<&QueuedMessage> {
        if self.active.is_none() {
            self.active = self.pending.pop_front();
        }
        self.active.as_ref()
    }

    pub fn active(&self) -> Option<&QueuedMessage> {
        self.active.as_ref()
    }

    /// Clears `active`, returning the finished message.
    pub fn finish_active(&mut self) -> Option<QueuedMessage> {
        self.active.take()
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Resume does not replay anything itself — `pending` was never
    /// touched by `pause` — it just clears the flag so `start_next` can
    /// run again.
    pub fn resume(&mut self) {
        self.paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty() && self.active.is_none()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Drains every pending message into one interleave batch, or `None`
    /// if nothing is pending. Does not touch `active`.
    pub fn drain_interleave_batch(&mut self) -> Option<InterleaveBatch> {
        if self.pending.is_empty() {
            return None;
        }
        let messages: Vec<QueuedMessage> = self.pending.drain(..).collect();
        let batched_ids = messages.iter().map(|m| m.id.clone()).collect();
        let text = messages
            .iter()
            .map(|m| m.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let images = messages.iter().flat_map(|m| m.images.clone()).collect();
        let last_id = messages.last().map(|m| m.id.clone()).unwrap_or_default();
        Some(InterleaveBatch {
            batched_ids,
            text,
            images,
            last_id,
            messages,
        })
    }

    /// Re-pushes a batch's original messages to the head of `pending`, in
    /// their original order — spec §4.6's "if an interleave fails ...
    /// re-pushed to the head of pending and processed as the next turn".
    pub fn requeue_front(&mut self, batch: InterleaveBatch) {
        for msg in batch.messages.into_iter().rev() {
            self.pending.push_front(msg);
        }
    }
}
