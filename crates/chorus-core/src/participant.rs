// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{ClientId, IdentityKey};

/// What kind of thing is on the other end of a connection.
///
/// `panel` and `worker` are human-facing UIs; the rest are agent processes
/// identified by the CLI tool they wrap. `Other` keeps the roster usable as
/// new agent types show up without a broker release. Serializes as a bare
/// kebab-case string, same approach as `ContentType`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParticipantType {
    Panel,
    Worker,
    Codex,
    ClaudeCode,
    Pi,
    Other(String),
}

impl ParticipantType {
    fn as_wire_str(&self) -> &str {
        match self {
            ParticipantType::Panel => "panel",
            ParticipantType::Worker => "worker",
            ParticipantType::Codex => "codex",
            ParticipantType::ClaudeCode => "claude-code",
            ParticipantType::Pi => "pi",
            ParticipantType::Other(s) => s,
        }
    }
}

impl From<&str> for ParticipantType {
    fn from(s: &str) -> Self {
        match s {
            "panel" => ParticipantType::Panel,
            "worker" => ParticipantType::Worker,
            "codex" => ParticipantType::Codex,
            "claude-code" => ParticipantType::ClaudeCode,
            "pi" => ParticipantType::Pi,
            other => ParticipantType::Other(other.to_string()),
        }
    }
}

impl Serialize for ParticipantType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_wire_str())
    }
}

impl<'de> Deserialize<'de> for ParticipantType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(ParticipantType::from(s.as_str()))
    }
}

/// A connected client as the broker sees it: who they are, what channel
/// they're in, and the human-readable handle the channel assigned them.
///
/// `identity_key` is the stable, caller-supplied identity used for session
/// resume; `client_id` is a fresh broker-assigned id for this connection and
/// changes across reconnects even when `identity_key` doesn't.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub client_id: ClientId,
    pub identity_key: IdentityKey,
    pub participant_type: ParticipantType,
    pub handle: String,
    #[serde(default)]
    pub metadata: Value,
}

impl Participant {
    pub fn new(
        identity_key: IdentityKey,
        participant_type: ParticipantType,
        handle: impl Into<String>,
    ) -> Self {
        Self {
            client_id: ClientId::new(),
            identity_key,
            participant_type,
            handle: handle.into(),
            metadata: Value::Null,
        }
    }
}
