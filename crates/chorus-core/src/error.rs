// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

use crate::ids::{ChannelId, ClientId};

/// Errors raised at the data-model boundary: lookups against the broker's
/// arenas and the handful of invariants this crate is responsible for
/// enforcing itself (everything else is the broker's job).
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("channel {0} not found")]
    ChannelNotFound(ChannelId),

    #[error("participant {0} not found in channel {1}")]
    ParticipantNotFound(ClientId, ChannelId),

    #[error("handle {0:?} is already taken in channel {1}")]
    HandleTaken(String, ChannelId),

    #[error("unknown tool name {0:?}")]
    UnknownTool(String),
}
