// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

/// Errors raised at the transport boundary (spec §4.1/§7). Never terminal
/// for the broker — always terminal for the one connection that raised it.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("frame of {size} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("connection closed: {reason}")]
    Disconnected { reason: String },

    #[error("malformed frame: {0}")]
    Framing(String),

    #[error("send on a transport with no receiver left")]
    SendFailed,
}
