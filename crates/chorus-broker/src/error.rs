// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use chorus_core::ChannelId;

/// Broker-internal failures, surfaced to the publisher (spec §4.2's "a
/// single participant's malformed frame is answered with an error frame; it
/// does not poison the channel").
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("channel {0} not found")]
    ChannelNotFound(ChannelId),
    #[error("participant is not a member of this channel")]
    NotAMember,
    #[error("session store error: {0}")]
    Session(#[from] chorus_session::SessionError),
}
