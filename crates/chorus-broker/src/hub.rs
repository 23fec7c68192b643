// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The channel hub itself (spec §4.2): admission, handle mangling,
//! supersede-on-reconnect, ordered publish/fan-out, and replay. Grounded on
//! `sven-node::control::service::ControlService`'s shape — a handle-owning
//! struct wrapping a `DashMap`/`HashMap` of per-key state — generalized from
//! "one agent, many sessions" to "many channels, many participants".
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use serde_json::Value;
use tracing::{info, warn};

use chorus_core::{
    Channel, ChannelId, ClientId, ContextId, Event, EventKind, Participant, ParticipantType,
    Replay, RosterEntry,
};
use chorus_config::BrokerConfig;
use chorus_session::{Session, SessionKey, SessionStore};
use chorus_transport::{ExistingSession, Frame};

use crate::entry::ChannelEntry;
use crate::error::BrokerError;
use crate::types::{AdmitOutcome, AdmitRequest, PublishRequest};

/// Owns every live channel. One process runs exactly one hub; channels are
/// created lazily on first admission and retained for as long as their
/// `context_id` is referenced, per spec §3's channel lifecycle.
pub struct ChannelHub {
    channels: DashMap<(ContextId, ChannelId), Arc<ChannelEntry>>,
    config: BrokerConfig,
    sessions: Arc<dyn SessionStore>,
}

impl ChannelHub {
    pub fn new(config: BrokerConfig, sessions: Arc<dyn SessionStore>) -> Self {
        Self {
            channels: DashMap::new(),
            config,
            sessions,
        }
    }

    fn entry(&self, context_id: &ContextId, channel_id: &ChannelId) -> Arc<ChannelEntry> {
        self.channels
            .entry((context_id.clone(), channel_id.clone()))
            .or_insert_with(|| {
                ChannelEntry::new(
                    channel_id.clone(),
                    context_id.clone(),
                    self.config.roster_debounce_ms,
                )
            })
            .clone()
    }

    /// Admits a `hello`. Pushes `Ready`/`Reject` onto `req.outbound` itself,
    /// and — if `participant_type` parses and the identity already has a
    /// live connection — closes that older connection with `reason =
    /// superseded` before this one goes live, per spec §4.2 and scenario S3.
    pub async fn admit(
        &self,
        req: AdmitRequest,
        participant_type: ParticipantType,
    ) -> Result<AdmitOutcome, BrokerError> {
        let entry = self.entry(&req.context_id, &req.channel_id);

        if let Some(old_client_id) = entry.live_client_for(&req.identity_key) {
            entry.send_to(
                &old_client_id,
                Frame::Error {
                    code: 409,
                    message: "superseded".into(),
                },
            );
            entry.unsubscribe(&old_client_id);
            info!(%old_client_id, identity_key = %req.identity_key, "connection superseded");
        }

        let assigned_handle = mangle_handle(&entry.channel, &req.handle);

        let mut participant = Participant::new(
            req.identity_key.clone(),
            participant_type,
            assigned_handle.clone(),
        );
        participant.metadata = req.metadata;
        let client_id = participant.client_id.clone();

        let key = SessionKey::new(
            req.context_id.clone(),
            req.channel_id.clone(),
            req.identity_key.clone(),
        );
        let existing = self.sessions.load(&key).await?;
        let existing_session = existing.as_ref().map(session_to_wire);

        entry.channel.insert(participant);
        entry.subscribe(client_id.clone(), req.identity_key.clone(), req.outbound.clone());

        let _ = req.outbound.try_send(Frame::Ready {
            client_id: client_id.clone(),
            assigned_handle: assigned_handle.clone(),
            existing_session: existing_session.clone(),
            channel_config: Some(entry.channel.config()).filter(|v| !v.is_null()),
        });

        if let Some(since) = req.replay_since_id {
            match entry.channel.replay_since(since).await {
                Replay::Events(events) => {
                    for event in events {
                        let mut replay_event = event;
                        replay_event.kind = EventKind::Replay;
                        entry.send_to(&client_id, event_frame(&replay_event));
                    }
                }
                Replay::Truncated { from_id } => {
                    entry.send_to(&client_id, Frame::ReplayTruncated { from_id });
                }
            }
        }

        Ok(AdmitOutcome::Ready {
            client_id,
            assigned_handle,
            existing_session,
        })
    }

    /// Publishes content into a channel (spec §4.2's `publish` contract).
    /// Assigns `pubsub_id`, appends to the log iff `persist`, and fans the
    /// resulting `event{kind:live}` out to every subscriber it's visible to.
    pub async fn publish(
        &self,
        context_id: &ContextId,
        channel_id: &ChannelId,
        sender_id: ClientId,
        req: PublishRequest,
    ) -> Result<Event, BrokerError> {
        let entry = self.require_entry(context_id, channel_id)?;

        let event = if req.persist {
            entry
                .channel
                .append_persisted(
                    move |id| build_event(id, channel_id.clone(), sender_id, req),
                    self.config.replay_window,
                )
                .await
        } else {
            let id = entry.channel.next_pubsub_id();
            build_event(id, channel_id.clone(), sender_id, req)
        };

        entry.fan_out_event(&event);
        Ok(event)
    }

    /// Removes a participant from the roster on disconnect (spec §4.2's
    /// `LIVE -- disconnect --> GONE` transition). The session record is
    /// untouched — only the live roster entry and subscription go away.
    pub fn disconnect(&self, context_id: &ContextId, channel_id: &ChannelId, client_id: &ClientId) {
        if let Some(entry) = self.channels.get(&(context_id.clone(), channel_id.clone())) {
            entry.unsubscribe(client_id);
        }
    }

    /// Last-writer-wins metadata replace (spec §3), followed by a
    /// (debounced) roster broadcast.
    pub fn update_metadata(
        &self,
        context_id: &ContextId,
        channel_id: &ChannelId,
        client_id: &ClientId,
        metadata: Value,
    ) -> Result<(), BrokerError> {
        let entry = self.require_entry(context_id, channel_id)?;
        let mut participant = entry
            .channel
            .get(client_id)
            .ok_or(BrokerError::NotAMember)?;
        participant.metadata = metadata;
        entry.channel.insert(participant);
        entry.mark_roster_dirty();
        Ok(())
    }

    pub fn set_channel_title(
        &self,
        context_id: &ContextId,
        channel_id: &ChannelId,
        title: String,
    ) -> Result<(), BrokerError> {
        let entry = self.require_entry(context_id, channel_id)?;
        entry.channel.set_title(Some(title));
        Ok(())
    }

    pub fn roster(&self, context_id: &ContextId, channel_id: &ChannelId) -> Vec<RosterEntry> {
        self.channels
            .get(&(context_id.clone(), channel_id.clone()))
            .map(|e| e.channel.roster())
            .unwrap_or_default()
    }

    fn require_entry(
        &self,
        context_id: &ContextId,
        channel_id: &ChannelId,
    ) -> Result<Arc<ChannelEntry>, BrokerError> {
        self.channels
            .get(&(context_id.clone(), channel_id.clone()))
            .map(|e| e.clone())
            .ok_or_else(|| BrokerError::ChannelNotFound(channel_id.clone()))
    }
}

fn mangle_handle(channel: &Channel, wanted: &str) -> String {
    let taken = |h: &str| channel.roster().iter().any(|r| r.handle == h);
    if !taken(wanted) {
        return wanted.to_string();
    }
    let mut n = 2;
    loop {
        let candidate = format!("{wanted}-{n}");
        if !taken(&candidate) {
            return candidate;
        }
        n += 1;
        if n > 10_000 {
            warn!(handle = wanted, "handle mangling exhausted a suspicious number of suffixes");
            return format!("{wanted}-{}", ClientId::new());
        }
    }
}

fn build_event(id: u64, channel_id: ChannelId, sender_id: ClientId, req: PublishRequest) -> Event {
    Event {
        pubsub_id: id,
        channel_id,
        sender_id,
        kind: EventKind::Live,
        content_type: req.content_type,
        content: req.content,
        attachments: req.attachments,
        reply_to: req.reply_to,
        persist: req.persist,
        targeted_recipients: req.targeted,
        timestamp: Utc::now(),
    }
}

fn event_frame(event: &Event) -> Frame {
    Frame::Event {
        pubsub_id: event.pubsub_id,
        kind: event.kind,
        sender_id: event.sender_id.clone(),
        content: event.content.clone(),
        content_type: event.content_type.clone(),
        reply_to: event.reply_to.clone(),
        persist: event.persist,
        timestamp: event.timestamp,
        attachments: event.attachments.clone(),
    }
}

fn session_to_wire(session: &Session) -> ExistingSession {
    ExistingSession {
        checkpoint: session.checkpoint_pubsub_id,
        sdk_session_id: session.sdk_session_id.clone(),
        settings: Some(session.settings.clone()).filter(|v| !v.is_null()),
    }
}
