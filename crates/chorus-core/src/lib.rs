// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
mod channel;
mod error;
mod event;
mod ids;
mod participant;
mod tools;

pub use channel::{Channel, Replay, RosterEntry};
pub use error::CoreError;
pub use event::{ContentType, Event, EventKind};
pub use ids::{CallId, ChannelId, ClientId, ContextId, IdentityKey};
pub use participant::{Participant, ParticipantType};
pub use tools::{canonical_tool_name, is_destructive, CANONICAL_TOOLS, DESTRUCTIVE_TOOLS};
