// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

use chorus_core::ClientId;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("method {0:?} not found on participant {1}")]
    NotFound(String, ClientId),

    #[error("call arguments failed schema validation: {0}")]
    Schema(String),

    #[error("call timed out")]
    Timeout,

    #[error("call was cancelled: {0}")]
    Cancelled(CancelReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    Timeout,
    ParentCancelled,
    Disconnect,
    Requested,
}

impl std::fmt::Display for CancelReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CancelReason::Timeout => "timeout",
            CancelReason::ParentCancelled => "parent_cancelled",
            CancelReason::Disconnect => "disconnect",
            CancelReason::Requested => "requested",
        };
        write!(f, "{s}")
    }
}
