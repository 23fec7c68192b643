// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use serde_json::Value;
use tokio::sync::mpsc;

use chorus_core::{ChannelId, ClientId, ContentType, ContextId, IdentityKey};
use chorus_transport::{ExistingSession, Frame};

/// The decoded contents of an inbound `hello` frame, plus the sink the hub
/// pushes every subsequent frame for this connection through — `ready` or
/// `reject` included, so a caller never has to special-case the admission
/// response's delivery path.
pub struct AdmitRequest {
    pub channel_id: ChannelId,
    pub context_id: ContextId,
    pub handle: String,
    pub metadata: Value,
    pub identity_key: IdentityKey,
    pub replay_since_id: Option<u64>,
    pub outbound: mpsc::Sender<Frame>,
}

/// Result of `ChannelHub::admit`. The matching `Frame::Ready`/`Frame::Reject`
/// has already been pushed onto the caller's `outbound` sender; this is
/// returned in addition so callers (and tests) don't have to drain the
/// channel just to learn the assigned id.
#[derive(Debug, Clone)]
pub enum AdmitOutcome {
    Ready {
        client_id: ClientId,
        assigned_handle: String,
        existing_session: Option<ExistingSession>,
    },
    Reject {
        reason: String,
    },
}

/// The decoded contents of an inbound `publish` frame.
pub struct PublishRequest {
    pub content: Value,
    pub content_type: ContentType,
    pub reply_to: Option<String>,
    pub persist: bool,
    pub targeted: Option<Vec<ClientId>>,
    pub attachments: Option<Vec<Value>>,
}
