// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The supervisor itself (spec §4.7): spawns a worker per agent
//! participant, bridges its events onto the channel, watches its idle
//! window, and restarts it on crash. Grounded on
//! `control::service::ControlService::handle_send_input`'s spawn-task +
//! completion-channel shape, generalized from "one turn" to "a worker's
//! whole lifetime".
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{info, warn};

use chorus_agent::{AgentEvent, AgentRuntime, VendorSession, WorkerState};
use chorus_broker::{AdmitOutcome, AdmitRequest, ChannelHub, PublishRequest};
use chorus_config::{AgentConfig, SupervisorConfig, ToolsConfig};
use chorus_core::{ChannelId, ClientId, ContentType, ContextId, IdentityKey, ParticipantType};
use chorus_rpc::Dispatcher;
use chorus_session::{SessionKey, SessionStore};
use chorus_tools::{ApprovalGate, ToolRegistry};
use chorus_transport::Frame;

use crate::idle::IdleTracker;
use crate::model::context_window_for;
use crate::types::{StartupArgs, WorkerControl, WorkerId, WorkerOutcome};

/// Builds the concrete `VendorSession` for a worker's `agent_type`. One
/// implementation per supported CLI lives outside this crate (out of
/// scope per spec §1); the supervisor only knows how to ask for one.
pub type VendorFactory = Arc<dyn Fn(&StartupArgs) -> Arc<dyn VendorSession> + Send + Sync>;

struct WorkerHandle {
    control_tx: mpsc::Sender<WorkerControl>,
    args: StartupArgs,
}

/// Owns every worker's lifecycle. One process runs exactly one supervisor,
/// sharing one `ChannelHub`/`SessionStore`/`Dispatcher`/`ToolRegistry`
/// across every worker it spawns.
pub struct Supervisor {
    hub: Arc<ChannelHub>,
    sessions: Arc<dyn SessionStore>,
    dispatcher: Arc<Dispatcher>,
    tools: Arc<ToolRegistry>,
    tools_cfg: ToolsConfig,
    agent_cfg: AgentConfig,
    supervisor_cfg: SupervisorConfig,
    vendor_factory: VendorFactory,
    workers: DashMap<WorkerId, WorkerHandle>,
    completion_tx: mpsc::Sender<(WorkerId, WorkerOutcome)>,
}

impl Supervisor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        hub: Arc<ChannelHub>,
        sessions: Arc<dyn SessionStore>,
        dispatcher: Arc<Dispatcher>,
        tools: Arc<ToolRegistry>,
        tools_cfg: ToolsConfig,
        agent_cfg: AgentConfig,
        supervisor_cfg: SupervisorConfig,
        vendor_factory: VendorFactory,
    ) -> (Arc<Self>, mpsc::Receiver<(WorkerId, WorkerOutcome)>) {
        let (completion_tx, completion_rx) = mpsc::channel(64);
        let sup = Arc::new(Self {
            hub,
            sessions,
            dispatcher,
            tools,
            tools_cfg,
            agent_cfg,
            supervisor_cfg,
            vendor_factory,
            workers: DashMap::new(),
            completion_tx,
        });
        (sup, completion_rx)
    }

    /// Spawns a fresh worker task for `args` and returns its id
    /// immediately — the task runs independently from here on.
    pub fn spawn(self: &Arc<Self>, args: StartupArgs) -> WorkerId {
        let id = WorkerId::new();
        self.spawn_with_id(id, args);
        id
    }

    fn spawn_with_id(self: &Arc<Self>, id: WorkerId, args: StartupArgs) {
        let (control_tx, control_rx) = mpsc::channel(8);
        self.workers.insert(
            id,
            WorkerHandle {
                control_tx,
                args: args.clone(),
            },
        );
        let sup = Arc::clone(self);
        tokio::spawn(async move {
            sup.run_worker(id, args, control_rx).await;
        });
    }

    pub async fn send_control(&self, id: WorkerId, ctrl: WorkerControl) -> bool {
        match self.workers.get(&id) {
            Some(handle) => handle.control_tx.send(ctrl).await.is_ok(),
            None => false,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Drains the completion channel, restarting crashed workers whose
    /// manifest asks for it (spec §4.7's "restart-with-same-args").
    pub async fn run(self: Arc<Self>, mut completion_rx: mpsc::Receiver<(WorkerId, WorkerOutcome)>) {
        while let Some((id, outcome)) = completion_rx.recv().await {
            let handle = self.workers.remove(&id).map(|(_, h)| h);
            match outcome {
                WorkerOutcome::Crashed { error } => {
                    warn!(%id, error, "worker crashed");
                    if self.supervisor_cfg.restart_on_crash {
                        if let Some(handle) = handle {
                            info!(%id, "restarting crashed worker with its original arguments");
                            self.spawn_with_id(WorkerId::new(), handle.args);
                        }
                    }
                }
                WorkerOutcome::Unloaded => {
                    info!(%id, "worker unloaded");
                }
            }
        }
    }

    async fn run_worker(&self, id: WorkerId, args: StartupArgs, mut control_rx: mpsc::Receiver<WorkerControl>) {
        let outcome = self.run_worker_inner(&args, &mut control_rx).await;
        let _ = self.completion_tx.send((id, outcome)).await;
    }

    async fn run_worker_inner(
        &self,
        args: &StartupArgs,
        control_rx: &mut mpsc::Receiver<WorkerControl>,
    ) -> WorkerOutcome {
        let (outbound_tx, mut outbound_rx) = mpsc::channel(256);
        let identity_key = IdentityKey::from(args.handle.clone());
        let admit_req = AdmitRequest {
            channel_id: args.channel.clone(),
            context_id: args.context_id.clone(),
            handle: args.handle.clone(),
            metadata: serde_json::Value::Null,
            identity_key: identity_key.clone(),
            replay_since_id: None,
            outbound: outbound_tx,
        };
        let participant_type = ParticipantType::from(args.agent_type.as_str());
        let client_id = match self.hub.admit(admit_req, participant_type).await {
            Ok(AdmitOutcome::Ready { client_id, .. }) => client_id,
            Ok(AdmitOutcome::Reject { reason }) => {
                return WorkerOutcome::Crashed {
                    error: format!("admission rejected: {reason}"),
                }
            }
            Err(e) => return WorkerOutcome::Crashed { error: e.to_string() },
        };

        let session_key = SessionKey::new(args.context_id.clone(), args.channel.clone(), identity_key);
        let approval_gate = ApprovalGate::from_config(&self.tools_cfg);
        let context_window = context_window_for(&args.model) as usize;
        let (events_tx, mut events_rx) = mpsc::channel(256);
        let vendor = (self.vendor_factory)(args);

        let mut runtime = AgentRuntime::new(
            vendor,
            self.tools.clone(),
            approval_gate,
            args.autonomy,
            self.dispatcher.clone(),
            self.panel_participant(&args.context_id, &args.channel),
            self.hub.clone(),
            self.sessions.clone(),
            session_key,
            client_id,
            context_window,
            self.agent_cfg.context_warn_fraction,
            events_tx,
            Duration::from_millis(self.agent_cfg.stream_no_progress_timeout_ms),
            Duration::from_millis(self.agent_cfg.tool_execution_timeout_ms),
        );

        if let Err(e) = runtime.on_wake(args.model.clone()).await {
            self.hub.disconnect(&args.context_id, &args.channel, &client_id);
            return WorkerOutcome::Crashed { error: e.to_string() };
        }

        let mut idle = IdleTracker::new(Instant::now());
        let mut roster_poll = tokio::time::interval(Duration::from_secs(1));
        let idle_grace = Duration::from_secs(self.supervisor_cfg.idle_grace_secs);
        let activity_grace = Duration::from_secs(self.supervisor_cfg.activity_grace_secs);

        let outcome = loop {
            tokio::select! {
                frame = outbound_rx.recv() => {
                    match frame {
                        Some(Frame::Event { sender_id, content, content_type, pubsub_id, .. })
                            if sender_id != client_id && content_type == ContentType::Message =>
                        {
                            let text = content
                                .as_str()
                                .map(str::to_string)
                                .unwrap_or_else(|| content.to_string());
                            runtime.enqueue(pubsub_id.to_string(), text, Vec::new()).await;
                            idle.record_activity(Instant::now());
                        }
                        Some(_) => {}
                        None => break WorkerOutcome::Crashed { error: "connection to hub closed".into() },
                    }
                }
                ev = events_rx.recv() => {
                    if let Some(ev) = ev {
                        self.bridge_agent_event(&args.context_id, &args.channel, client_id, &ev).await;
                        if matches!(ev, AgentEvent::TurnComplete | AgentEvent::ToolCallStarted(_)) {
                            idle.record_activity(Instant::now());
                        }
                    }
                }
                ctrl = control_rx.recv() => {
                    match ctrl {
                        Some(WorkerControl::Pause) => runtime.pause().await,
                        Some(WorkerControl::Resume) => runtime.resume(),
                        Some(WorkerControl::Stop) | None => break WorkerOutcome::Unloaded,
                    }
                }
                _ = roster_poll.tick() => {
                    let roster = self.hub.roster(&args.context_id, &args.channel);
                    let panel_present = roster.iter().any(|p| p.participant_type == ParticipantType::Panel);
                    let now = Instant::now();
                    idle.observe_roster(panel_present, now);
                    if idle.should_unload(now, idle_grace, activity_grace) {
                        break WorkerOutcome::Unloaded;
                    }
                }
            }

            if runtime.state() != WorkerState::Processing && !runtime.queue().is_empty() {
                runtime.run_turn().await;
                idle.record_activity(Instant::now());
            }
        };

        runtime.sleep().await;
        self.hub.disconnect(&args.context_id, &args.channel, &client_id);
        outcome
    }

    fn panel_participant(&self, context_id: &ContextId, channel_id: &ChannelId) -> Option<ClientId> {
        self.hub
            .roster(context_id, channel_id)
            .into_iter()
            .find(|p| p.participant_type == ParticipantType::Panel)
            .map(|p| p.client_id)
    }

    /// Forwards the user-visible subset of a worker's `AgentEvent`s onto
    /// the channel as ordinary events — text output persists, ephemeral
    /// progress (`typing`, error surfacing) does not.
    async fn bridge_agent_event(
        &self,
        context_id: &ContextId,
        channel_id: &ChannelId,
        sender: ClientId,
        ev: &AgentEvent,
    ) {
        let (content_type, content, persist) = match ev {
            AgentEvent::TextComplete(text) if !text.is_empty() => {
                (ContentType::Message, serde_json::json!(text), true)
            }
            AgentEvent::ActionStart { kind, description } => (
                ContentType::Typing,
                serde_json::json!({"kind": kind, "description": description, "state": "start"}),
                false,
            ),
            AgentEvent::ActionEnd { kind } => (
                ContentType::Typing,
                serde_json::json!({"kind": kind, "state": "end"}),
                false,
            ),
            AgentEvent::Error(message) => (ContentType::InlineUi, serde_json::json!({"error": message}), false),
            _ => return,
        };
        let req = PublishRequest {
            content,
            content_type,
            reply_to: None,
            persist,
            targeted: None,
            attachments: None,
        };
        let _ = self.hub.publish(context_id, channel_id, sender, req).await;
    }
}
