// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex as StdMutex;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex as AsyncMutex;

use crate::event::Event;
use crate::ids::{ChannelId, ClientId, ContextId};
use crate::participant::{Participant, ParticipantType};

/// A roster snapshot entry handed out to callers. Plain data, detached from
/// the broker's live arena, so a caller iterating a roster never blocks a
/// concurrent join/leave. Carries `participant_type`/`metadata` (not just
/// identity) because `roster_update` is the broker's only channel for
/// surfacing metadata changes like `contextUsage`/`activeModel` to other
/// participants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterEntry {
    pub client_id: ClientId,
    pub handle: String,
    pub participant_type: ParticipantType,
    #[serde(default)]
    pub metadata: Value,
}

impl From<&Participant> for RosterEntry {
    fn from(p: &Participant) -> Self {
        Self {
            client_id: p.client_id.clone(),
            handle: p.handle.clone(),
            participant_type: p.participant_type.clone(),
            metadata: p.metadata.clone(),
        }
    }
}

/// Outcome of an admit-time replay request (spec §4.2).
pub enum Replay {
    /// Every persisted event with `pubsub_id > from_id`, in order.
    Events(Vec<Event>),
    /// `from_id` falls outside the retained window; the caller must treat
    /// its local state as stale and resync from `from_id`.
    Truncated { from_id: u64 },
}

/// A channel's live membership and ordered event log, mirroring `RoomState`
/// in the teacher's peer-to-peer node: a stable identity (`channel_id`) plus
/// a concurrent map of who's currently in it, addressed by id rather than by
/// owning reference so the broker's arena stays acyclic.
///
/// The log-append path is guarded by a `tokio::sync::Mutex` held only long
/// enough to assign a `pubsub_id` and push the event; it is released before
/// fan-out, per the no-lock-across-a-suspension-point rule for anything but
/// this append step.
#[derive(Debug)]
pub struct Channel {
    pub channel_id: ChannelId,
    pub context_id: ContextId,
    members: DashMap<ClientId, Participant>,
    next_pubsub_id: AtomicU64,
    /// Lowest `pubsub_id` still retained in `event_log`; used to detect a
    /// replay request that falls outside the window even after the matching
    /// entries have been evicted.
    oldest_retained_id: AtomicU64,
    event_log: AsyncMutex<VecDeque<Event>>,
    channel_config: StdMutex<Value>,
    title: StdMutex<Option<String>>,
}

impl Channel {
    pub fn new(channel_id: ChannelId, context_id: ContextId) -> Self {
        Self {
            channel_id,
            context_id,
            members: DashMap::new(),
            next_pubsub_id: AtomicU64::new(1),
            oldest_retained_id: AtomicU64::new(1),
            event_log: AsyncMutex::new(VecDeque::new()),
            channel_config: StdMutex::new(Value::Null),
            title: StdMutex::new(None),
        }
    }

    /// Reserve and return the next `pubsub_id` for this channel, used for
    /// non-persisted events which still need an id for live delivery
    /// bookkeeping but never enter the log.
    pub fn next_pubsub_id(&self) -> u64 {
        self.next_pubsub_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Assigns the next `pubsub_id`, builds the event via `build`, appends
    /// it to the log, and evicts the oldest entry once `replay_window` is
    /// exceeded. Returns the assigned event so the caller can fan it out
    /// after releasing the append lock.
    pub async fn append_persisted(
        &self,
        build: impl FnOnce(u64) -> Event,
        replay_window: usize,
    ) -> Event {
        let id = self.next_pubsub_id();
        let event = build(id);
        let mut log = self.event_log.lock().await;
        log.push_back(event.clone());
        while log.len() > replay_window {
            if let Some(evicted) = log.pop_front() {
                self.oldest_retained_id
                    .store(evicted.pubsub_id + 1, Ordering::SeqCst);
            }
        }
        event
    }

    /// Every persisted event with `pubsub_id > from_id`, or `Truncated` if
    /// `from_id` predates the retained window.
    pub async fn replay_since(&self, from_id: u64) -> Replay {
        let oldest = self.oldest_retained_id.load(Ordering::SeqCst);
        if from_id + 1 < oldest {
            return Replay::Truncated { from_id: oldest };
        }
        let log = self.event_log.lock().await;
        Replay::Events(
            log.iter()
                .filter(|e| e.pubsub_id > from_id)
                .cloned()
                .collect(),
        )
    }

    pub fn set_title(&self, title: Option<String>) {
        *self.title.lock().unwrap() = title;
    }

    pub fn title(&self) -> Option<String> {
        self.title.lock().unwrap().clone()
    }

    pub fn set_config(&self, config: Value) {
        *self.channel_config.lock().unwrap() = config;
    }

    pub fn config(&self) -> Value {
        self.channel_config.lock().unwrap().clone()
    }

    /// Whether `handle` is already taken by a member other than `by`.
    pub fn handle_taken(&self, handle: &str, by: &ClientId) -> bool {
        self.members
            .iter()
            .any(|e| e.handle == handle && e.client_id != *by)
    }

    pub fn insert(&self, participant: Participant) {
        self.members
            .insert(participant.client_id.clone(), participant);
    }

    pub fn remove(&self, client_id: &ClientId) -> Option<Participant> {
        self.members.remove(client_id).map(|(_, p)| p)
    }

    pub fn get(&self, client_id: &ClientId) -> Option<Participant> {
        self.members.get(client_id).map(|e| e.clone())
    }

    pub fn contains(&self, client_id: &ClientId) -> bool {
        self.members.contains_key(client_id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// A detached roster snapshot, safe to hand to a caller outside the lock.
    pub fn roster(&self) -> Vec<RosterEntry> {
        self.members
            .iter()
            .map(|e| RosterEntry::from(&*e))
            .collect()
    }

    pub fn client_ids(&self) -> Vec<ClientId> {
        self.members.iter().map(|e| e.client_id.clone()).collect()
    }
}
