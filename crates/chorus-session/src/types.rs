// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use serde::{Deserialize, Serialize};

use chorus_core::{ChannelId, ContextId, IdentityKey};

/// Key a session record is addressed by: `context_id` isolates sessions
/// even when two channels share a `channel_id` string (spec §4.8).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey {
    pub context_id: ContextId,
    pub channel_id: ChannelId,
    pub identity_key: IdentityKey,
}

impl SessionKey {
    pub fn new(context_id: ContextId, channel_id: ChannelId, identity_key: IdentityKey) -> Self {
        Self {
            context_id,
            channel_id,
            identity_key,
        }
    }

    /// Filesystem-safe filename stem for this key, used by `FileSessionStore`.
    pub(crate) fn file_stem(&self) -> String {
        format!("{}__{}", self.channel_id.as_str(), self.identity_key.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Fresh,
    Resumed,
}

/// Durable per-`(channel_id, identity_key)` state (spec §3). The checkpoint
/// is monotonically non-decreasing; the vendor SDK handle is rewritten at
/// most once per logical conversation but may be replaced on vendor reset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub checkpoint_pubsub_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdk_session_id: Option<String>,
    #[serde(default)]
    pub settings: serde_json::Value,
    pub status: SessionStatus,
}

impl Session {
    pub fn fresh() -> Self {
        Self {
            checkpoint_pubsub_id: 0,
            sdk_session_id: None,
            settings: serde_json::Value::Null,
            status: SessionStatus::Fresh,
        }
    }
}
