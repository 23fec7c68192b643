// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use serde::{Deserialize, Serialize};
use serde_json::Value;

use chorus_core::{CallId, ChannelId, ClientId, ContentType, ContextId, IdentityKey, RosterEntry};

/// Snapshot of a resumed session handed back in `Ready`, mirroring C3's
/// `Session` record (spec §3/§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExistingSession {
    pub checkpoint: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdk_session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Value>,
}

/// Outcome of an RPC call as carried in `RpcResponse` (spec §6).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RpcStatus {
    Ok,
    Error,
    Cancelled,
}

/// Every frame kind exchanged between a connected participant and the
/// broker (spec.md §4.1/§6), plus `Ping`/`Pong` keepalives and `Error` for
/// protocol-level rejections that don't fit a more specific variant.
///
/// Encoded as JSON over WebSocket (browser-facing, mirroring the teacher's
/// `control::protocol` choice for `sven-node::http::ws`) or CBOR for
/// non-browser transports (`codec::encode_frame`/`decode_frame`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frame {
    /// Admission request: client → broker.
    Hello {
        token: String,
        channel_id: ChannelId,
        context_id: ContextId,
        handle: String,
        #[serde(default)]
        metadata: Value,
        identity_key: IdentityKey,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        replay_since_id: Option<u64>,
    },

    /// Admission accepted: broker → client.
    Ready {
        client_id: ClientId,
        assigned_handle: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        existing_session: Option<ExistingSession>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        channel_config: Option<Value>,
    },

    /// Admission refused: broker → client. Connection is torn down after.
    Reject { reason: String },

    /// New content published by a client into its channel.
    Publish {
        content: Value,
        content_type: ContentType,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reply_to: Option<String>,
        persist: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        targeted: Option<Vec<ClientId>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        attachments: Option<Vec<Value>>,
    },

    /// An ordered event delivered to a subscriber, live or replayed.
    Event {
        pubsub_id: u64,
        kind: chorus_core::EventKind,
        sender_id: ClientId,
        content: Value,
        content_type: ContentType,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reply_to: Option<String>,
        persist: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        attachments: Option<Vec<Value>>,
    },

    /// Full roster snapshot, broadcast whenever membership or metadata
    /// changes (debounced, spec §4.2).
    RosterUpdate { participants: Vec<RosterEntry> },

    /// Client told its replay window has been exceeded; it must resync
    /// from `from_id` itself.
    ReplayTruncated { from_id: u64 },

    Subscribe { channel_id: ChannelId },
    Unsubscribe { channel_id: ChannelId },

    RpcRequest {
        call_id: CallId,
        callee_id: ClientId,
        method_name: String,
        args: Value,
    },
    RpcEvent {
        call_id: CallId,
        payload: Value,
    },
    RpcResponse {
        call_id: CallId,
        status: RpcStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    RpcCancel {
        call_id: CallId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },

    UpdateMetadata { metadata: Value },
    SetChannelTitle { title: String },
    GetSettings,
    UpdateSettings { blob: Value },
    CommitCheckpoint { pubsub_id: u64 },
    UpdateSdkSession { handle_opaque: String },

    Ping,
    Pong,

    /// Protocol-level error that isn't specific enough to be an `Reject`
    /// or an `RpcResponse{status: error}` — e.g. a malformed frame.
    Error { code: u32, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_tag_is_snake_case() {
        let f = Frame::GetSettings;
        let json = serde_json::to_string(&f).unwrap();
        assert_eq!(json, r#"{"type":"get_settings"}"#);
    }

    #[test]
    fn hello_round_trips_through_json() {
        let f = Frame::Hello {
            token: "tok".into(),
            channel_id: ChannelId::from("c1"),
            context_id: ContextId::from("ctx"),
            handle: "alice".into(),
            metadata: Value::Null,
            identity_key: IdentityKey::from("alice-key"),
            replay_since_id: Some(5),
        };
        let json = serde_json::to_string(&f).unwrap();
        let back: Frame = serde_json::from_str(&json).unwrap();
        match back {
            Frame::Hello {
                handle,
                replay_since_id,
                ..
            } => {
                assert_eq!(handle, "alice");
                assert_eq!(replay_since_id, Some(5));
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn rpc_response_status_serializes_snake_case() {
        let json = serde_json::to_string(&RpcStatus::Cancelled).unwrap();
        assert_eq!(json, "\"cancelled\"");
    }
}
