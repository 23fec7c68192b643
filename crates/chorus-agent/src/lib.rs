// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Agent runtime (spec §4.6): the message queue with interleaving, the
//! black-box vendor-SDK binding, context-window tracking, and the
//! lifecycle state machine that ties them together.
mod context_tracker;
mod events;
mod queue;
mod runtime;
mod vendor;

pub use context_tracker::ContextTracker;
pub use events::AgentEvent;
pub use queue::{InterleaveBatch, MessageQueue, QueuedMessage};
pub use runtime::{build_missed_context, AgentRuntime, MissedContext, WorkerState};
pub use vendor::{SessionOptions, VendorError, VendorEvent, VendorEventStream, VendorSession, VendorUsage};
