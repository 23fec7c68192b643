// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Per-channel state plus the subscriber fan-out and roster-debounce actor.
//! The debounce loop mirrors the teacher's context-usage debounce idiom
//! referenced in spec §4.6: a `tokio::time::sleep` that resets on every new
//! mutation and fires only once the burst goes quiet.
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::mpsc;

use chorus_core::{Channel, ChannelId, ClientId, ContextId, Event, IdentityKey};
use chorus_transport::Frame;

pub struct ChannelEntry {
    pub channel: Channel,
    subscribers: DashMap<ClientId, mpsc::Sender<Frame>>,
    identity_index: DashMap<IdentityKey, ClientId>,
    dirty_tx: mpsc::Sender<()>,
}

impl ChannelEntry {
    pub fn new(channel_id: ChannelId, context_id: ContextId, roster_debounce_ms: u64) -> Arc<Self> {
        let (dirty_tx, dirty_rx) = mpsc::channel(64);
        let entry = Arc::new(Self {
            channel: Channel::new(channel_id, context_id),
            subscribers: DashMap::new(),
            identity_index: DashMap::new(),
            dirty_tx,
        });
        tokio::spawn(Self::debounce_loop(
            Arc::clone(&entry),
            dirty_rx,
            Duration::from_millis(roster_debounce_ms),
        ));
        entry
    }

    /// Who currently holds the live connection for `identity_key`, if any.
    pub fn live_client_for(&self, identity_key: &IdentityKey) -> Option<ClientId> {
        self.identity_index.get(identity_key).map(|e| *e.value())
    }

    pub fn subscribe(&self, client_id: ClientId, identity_key: IdentityKey, outbound: mpsc::Sender<Frame>) {
        self.subscribers.insert(client_id, outbound);
        self.identity_index.insert(identity_key, client_id);
        self.mark_roster_dirty();
    }

    pub fn unsubscribe(&self, client_id: &ClientId) {
        self.subscribers.remove(client_id);
        if let Some(p) = self.channel.remove(client_id) {
            self.identity_index.remove(&p.identity_key);
        }
        self.mark_roster_dirty();
    }

    pub fn send_to(&self, client_id: &ClientId, frame: Frame) {
        if let Some(tx) = self.subscribers.get(client_id) {
            let _ = tx.try_send(frame);
        }
    }

    pub fn mark_roster_dirty(&self) {
        let _ = self.dirty_tx.try_send(());
    }

    /// Delivers `event` to every subscriber it's visible to (spec §4.2's
    /// targeted-delivery rule), translating the core `Event` into the wire
    /// `Frame::Event` once up front.
    pub fn fan_out_event(&self, event: &Event) {
        let frame = Frame::Event {
            pubsub_id: event.pubsub_id,
            kind: event.kind,
            sender_id: event.sender_id.clone(),
            content: event.content.clone(),
            content_type: event.content_type.clone(),
            reply_to: event.reply_to.clone(),
            persist: event.persist,
            timestamp: event.timestamp,
            attachments: event.attachments.clone(),
        };
        for entry in self.subscribers.iter() {
            if event.visible_to(entry.key()) {
                let _ = entry.value().try_send(frame.clone());
            }
        }
    }

    fn broadcast_roster(&self) {
        let participants = self.channel.roster();
        for entry in self.subscribers.iter() {
            let _ = entry.value().try_send(Frame::RosterUpdate {
                participants: participants.clone(),
            });
        }
    }

    async fn debounce_loop(entry: Arc<Self>, mut dirty_rx: mpsc::Receiver<()>, debounce: Duration) {
        loop {
            if dirty_rx.recv().await.is_none() {
                return;
            }
            loop {
                tokio::select! {
                    msg = dirty_rx.recv() => {
                        if msg.is_none() {
                            return;
                        }
                    }
                    _ = tokio::time::sleep(debounce) => break,
                }
            }
            entry.broadcast_roster();
        }
    }
}

impl std::fmt::Debug for ChannelEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelEntry")
            .field("channel_id", &self.channel.channel_id)
            .finish()
    }
}
