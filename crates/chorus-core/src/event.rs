// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ChannelId, ClientId};

/// Well-known content types from the wire protocol (spec §6), plus an
/// escape hatch for forward compatibility with content types this crate
/// does not interpret. Serializes as a bare string (the wire format's
/// `content_type` field), not as an internally-tagged object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentType {
    Message,
    Typing,
    InlineUi,
    RpcRequest,
    RpcResponse,
    RpcEvent,
    Other(String),
}

impl ContentType {
    fn as_wire_str(&self) -> &str {
        match self {
            ContentType::Message => "message",
            ContentType::Typing => "typing",
            ContentType::InlineUi => "inline_ui",
            ContentType::RpcRequest => "rpc_request",
            ContentType::RpcResponse => "rpc_response",
            ContentType::RpcEvent => "rpc_event",
            ContentType::Other(s) => s,
        }
    }
}

impl Default for ContentType {
    fn default() -> Self {
        ContentType::Message
    }
}

impl From<&str> for ContentType {
    fn from(s: &str) -> Self {
        match s {
            "message" => ContentType::Message,
            "typing" => ContentType::Typing,
            "inline_ui" => ContentType::InlineUi,
            "rpc_request" => ContentType::RpcRequest,
            "rpc_response" => ContentType::RpcResponse,
            "rpc_event" => ContentType::RpcEvent,
            other => ContentType::Other(other.to_string()),
        }
    }
}

impl Serialize for ContentType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_wire_str())
    }
}

impl<'de> Deserialize<'de> for ContentType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(ContentType::from(s.as_str()))
    }
}

/// Whether an event was delivered live or replayed from the persisted log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Live,
    Replay,
}

/// One entry in a channel's ordered stream.
///
/// `pubsub_id` is assigned by the broker and is only `Some` once the event
/// has been appended to the log; unpersisted (`persist: false`) events still
/// get an id for live delivery bookkeeping, they just never appear in replay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub pubsub_id: u64,
    pub channel_id: ChannelId,
    pub sender_id: ClientId,
    pub kind: EventKind,
    pub content_type: ContentType,
    pub content: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
    pub persist: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub targeted_recipients: Option<Vec<ClientId>>,
    pub timestamp: DateTime<Utc>,
}

impl Event {
    /// Whether `recipient` should see this event in live delivery.
    ///
    /// The sender always sees its own events; otherwise, a targeted event is
    /// visible only to its listed recipients. Untargeted events broadcast to
    /// everyone. This applies uniformly to every content type including
    /// `typing` — see SPEC_FULL.md §4.2 (resolved Open Question #2).
    pub fn visible_to(&self, recipient: &ClientId) -> bool {
        if recipient == &self.sender_id {
            return true;
        }
        match &self.targeted_recipients {
            Some(recipients) => recipients.contains(recipient),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(sender: ClientId, targeted: Option<Vec<ClientId>>) -> Event {
        Event {
            pubsub_id: 1,
            channel_id: ChannelId::from("c"),
            sender_id: sender,
            kind: EventKind::Live,
            content_type: ContentType::Message,
            content: serde_json::json!("hi"),
            attachments: None,
            reply_to: None,
            persist: true,
            targeted_recipients: targeted,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn sender_always_sees_its_own_event() {
        let sender = ClientId::new();
        let other = ClientId::new();
        let ev = event(sender.clone(), Some(vec![other]));
        assert!(ev.visible_to(&sender));
    }

    #[test]
    fn untargeted_event_broadcasts_to_everyone() {
        let ev = event(ClientId::new(), None);
        assert!(ev.visible_to(&ClientId::new()));
    }

    #[test]
    fn targeted_event_hidden_from_non_recipient() {
        let sender = ClientId::new();
        let recipient = ClientId::new();
        let bystander = ClientId::new();
        let ev = event(sender, Some(vec![recipient.clone()]));
        assert!(ev.visible_to(&recipient));
        assert!(!ev.visible_to(&bystander));
    }

    #[test]
    fn typing_content_type_is_targeted_like_any_other() {
        let sender = ClientId::new();
        let recipient = ClientId::new();
        let bystander = ClientId::new();
        let mut ev = event(sender, Some(vec![recipient.clone()]));
        ev.content_type = ContentType::Typing;
        assert!(ev.visible_to(&recipient));
        assert!(!ev.visible_to(&bystander));
    }

    #[test]
    fn content_type_round_trips_as_snake_case() {
        let json = serde_json::to_string(&ContentType::InlineUi).unwrap();
        assert_eq!(json, "\"inline_ui\"");
    }
}
