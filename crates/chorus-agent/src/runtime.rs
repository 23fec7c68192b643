// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The agent runtime: lifecycle state machine, message queue driver,
//! approval-gated tool execution, and the missed-context builder (spec
//! §4.6). Grounded on `sven-core::agent::Agent` + `runtime_context.rs`,
//! generalized from "one HTTP model provider" to "one black-box vendor
//! session" and from the teacher's in-process tool registry call to the
//! approval-gated, RPC-capable one this substrate requires.
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use serde_json::Value;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use chorus_broker::{ChannelHub, PublishRequest};
use chorus_core::{CallId, ChannelId, ClientId, ContentType, ContextId, Event};
use chorus_rpc::{CallOutcome, Dispatcher};
use chorus_session::{SessionKey, SessionStore};
use chorus_tools::{ApprovalGate, ApprovalPolicy, AutonomyLevel, ToolCall, ToolOutput, ToolRegistry};

use crate::context_tracker::ContextTracker;
use crate::events::AgentEvent;
use crate::queue::{MessageQueue, QueuedMessage};
use crate::vendor::{SessionOptions, VendorError, VendorEvent, VendorEventStream, VendorSession};

/// Spec §4.6's lifecycle: `INITIALIZING -> IDLE -> ENQUEUED -> PROCESSING
/// -> IDLE`, with `PAUSED` and `SLEEPING` side branches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Initializing,
    Idle,
    Enqueued,
    Processing,
    Paused,
    Sleeping,
    Terminated,
}

/// The missed-context preamble built on reconnect; consumed at most once —
/// `take()` clears it so a second call to the same turn never re-injects
/// it, matching spec §4.6's "consumed at most once".
#[derive(Debug, Default)]
pub struct MissedContext(Option<String>);

impl MissedContext {
    pub fn set(&mut self, text: Option<String>) {
        self.0 = text;
    }

    pub fn take(&mut self) -> Option<String> {
        self.0.take()
    }
}

/// Compresses `missed` (events the agent has not yet seen, excluding its
/// own emissions) into a bounded preamble. Truncates at the first line
/// that would push the body past `max_chars` rather than mid-line.
pub fn build_missed_context(missed: &[Event], self_id: &ClientId, max_chars: usize) -> Option<String> {
    let mut body = String::new();
    for event in missed {
        if event.sender_id == *self_id {
            continue;
        }
        let text = event
            .content
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| event.content.to_string());
        let line = format!("[{}] {}\n", event.sender_id, text);
        if body.len() + line.len() > max_chars {
            break;
        }
        body.push_str(&line);
    }
    if body.is_empty() {
        None
    } else {
        Some(format!("<missed_context>\n{body}</missed_context>\n"))
    }
}

/// Drives one agent participant: its queue, its vendor session, and its
/// tool/approval loop. One runtime per worker task (spec §4.6's
/// single-threaded-cooperative model — exactly one logical task owns this).
pub struct AgentRuntime {
    state: WorkerState,
    queue: MessageQueue,
    vendor: Arc<dyn VendorSession>,
    tools: Arc<ToolRegistry>,
    approval_gate: ApprovalGate,
    autonomy: AutonomyLevel,
    dispatcher: Arc<Dispatcher>,
    approval_participant: Option<ClientId>,
    hub: Arc<ChannelHub>,
    sessions: Arc<dyn SessionStore>,
    session_key: SessionKey,
    context_id: ContextId,
    channel_id: ChannelId,
    client_id: ClientId,
    context_tracker: ContextTracker,
    missed_context: MissedContext,
    events_tx: tokio::sync::mpsc::Sender<AgentEvent>,
    /// `true` while text deltas of the active reply are streaming — the
    /// interleave gate for invariant 8 ("not during active text streaming").
    streaming_text: bool,
    turn_cancel: CancellationToken,
    /// No-progress watchdog on `stream.next()` (spec §5).
    stream_no_progress_timeout: Duration,
    /// Upper bound on a single tool execution (spec §5).
    tool_execution_timeout: Duration,
}

impl AgentRuntime {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        vendor: Arc<dyn VendorSession>,
        tools: Arc<ToolRegistry>,
        approval_gate: ApprovalGate,
        autonomy: AutonomyLevel,
        dispatcher: Arc<Dispatcher>,
        approval_participant: Option<ClientId>,
        hub: Arc<ChannelHub>,
        sessions: Arc<dyn SessionStore>,
        session_key: SessionKey,
        client_id: ClientId,
        max_context_tokens: usize,
        context_warn_fraction: f32,
        events_tx: tokio::sync::mpsc::Sender<AgentEvent>,
        stream_no_progress_timeout: Duration,
        tool_execution_timeout: Duration,
    ) -> Self {
        Self {
            state: WorkerState::Initializing,
            queue: MessageQueue::new(),
            vendor,
            tools,
            approval_gate,
            autonomy,
            dispatcher,
            approval_participant,
            context_id: session_key.context_id.clone(),
            channel_id: session_key.channel_id.clone(),
            hub,
            sessions,
            session_key,
            client_id,
            context_tracker: ContextTracker::new(max_context_tokens, context_warn_fraction),
            missed_context: MissedContext::default(),
            events_tx,
            streaming_text: false,
            turn_cancel: CancellationToken::new(),
            stream_no_progress_timeout,
            tool_execution_timeout,
        }
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// `INITIALIZING -- on_wake --> IDLE`. Resumes the stored
    /// `sdk_session_id` if one exists; falls back to a fresh session and
    /// surfaces an `Error` event rather than failing the turn if the
    /// vendor rejects it (resolved Open Question #4).
    pub async fn on_wake(&mut self, model: String) -> Result<(), VendorError> {
        let stored = self.sessions.load(&self.session_key).await.ok().flatten();
        let resume_id = stored.and_then(|s| s.sdk_session_id);
        let opts = SessionOptions {
            model,
            system_prompt: None,
            resume_sdk_session_id: resume_id.clone(),
        };
        match self.vendor.start_session(opts.clone()).await {
            Ok(()) => {}
            Err(VendorError::SessionRejected(reason)) if resume_id.is_some() => {
                warn!(reason, "previous session could not be resumed; starting a new one");
                let _ = self.events_tx.try_send(AgentEvent::Error(
                    "previous session could not be resumed; starting a new one".into(),
                ));
                self.vendor
                    .start_session(SessionOptions {
                        resume_sdk_session_id: None,
                        ..opts
                    })
                    .await?;
            }
            Err(e) => return Err(e),
        }
        self.state = WorkerState::Idle;
        Ok(())
    }

    /// Sets the missed-context preamble to prepend to the next turn; built
    /// by the caller from the channel's replay log (spec §4.6).
    pub fn set_missed_context(&mut self, missed: &[Event], max_chars: usize) {
        self.missed_context
            .set(build_missed_context(missed, &self.client_id, max_chars));
    }

    /// `IDLE -- event arrives for me --> ENQUEUED`. Publishes the initial
    /// `typing("queued: position N")` indicator via the broker.
    pub async fn enqueue(&mut self, id: String, text: String, images: Vec<Value>) {
        let position = self.queue.push(QueuedMessage { id, text, images });
        self.state = WorkerState::Enqueued;
        let _ = self.events_tx.try_send(AgentEvent::Queued { position });
        self.publish_typing(&format!("queued: position {position}")).await;
    }

    /// `ENQUEUED -- dequeued --> PROCESSING -- prompt() returns --> IDLE`.
    /// Drives exactly one pending message (plus whatever interleaves into
    /// it along the way) through the vendor.
    pub async fn run_turn(&mut self) {
        let Some(msg) = self.queue.start_next().cloned() else {
            return;
        };
        self.state = WorkerState::Processing;
        let preamble = self.missed_context.take();
        let text = match preamble {
            Some(p) => format!("{p}{}", msg.text),
            None => msg.text.clone(),
        };
        let stream = self.vendor.prompt(text, msg.images.clone()).await;
        self.drive_stream(stream, msg.id.clone()).await;
        self.queue.finish_active();
        self.state = WorkerState::Idle;
        let _ = self.events_tx.try_send(AgentEvent::TurnComplete);
    }

    async fn drive_stream(&mut self, mut stream: VendorEventStream, mut anchor_id: String) {
        self.streaming_text = false;
        let mut text_buf = String::new();
        let mut thinking_buf = String::new();
        let mut saw_text = false;
        loop {
            let next_event = match timeout(self.stream_no_progress_timeout, stream.next()).await {
                Ok(event) => event,
                Err(_) => {
                    let _ = self.events_tx.try_send(AgentEvent::Error(
                        "vendor stream made no progress within the watchdog window".into(),
                    ));
                    return;
                }
            };
            match next_event {
                Some(VendorEvent::TextDelta(s)) => {
                    if !thinking_buf.is_empty() {
                        let _ = self
                            .events_tx
                            .try_send(AgentEvent::ThinkingComplete(std::mem::take(&mut thinking_buf)));
                    }
                    self.streaming_text = true;
                    saw_text = true;
                    text_buf.push_str(&s);
                    let _ = self.events_tx.try_send(AgentEvent::TextDelta(s));
                }
                Some(VendorEvent::TextEnd) => {
                    self.streaming_text = false;
                    saw_text = true;
                    let _ = self
                        .events_tx
                        .try_send(AgentEvent::TextComplete(std::mem::take(&mut text_buf)));
                    if let Some(next) = self.maybe_interleave(&mut anchor_id).await {
                        stream = next;
                    }
                }
                Some(VendorEvent::ThinkingDelta(s)) => {
                    thinking_buf.push_str(&s);
                    let _ = self.events_tx.try_send(AgentEvent::ThinkingDelta(s));
                }
                Some(VendorEvent::ToolStart { name, args, call_id }) => {
                    if !thinking_buf.is_empty() {
                        let _ = self
                            .events_tx
                            .try_send(AgentEvent::ThinkingComplete(std::mem::take(&mut thinking_buf)));
                    }
                    self.handle_tool_start(name, args, call_id).await;
                }
                Some(VendorEvent::ToolEnd { call_id }) => {
                    let _ = self
                        .events_tx
                        .try_send(AgentEvent::ActionEnd { kind: format!("tool:{call_id}") });
                    if let Some(next) = self.maybe_interleave(&mut anchor_id).await {
                        stream = next;
                    }
                }
                Some(VendorEvent::TurnEnd { usage }) => {
                    if let Some(u) = usage {
                        self.context_tracker.record_usage(&u);
                        let _ = self.events_tx.try_send(AgentEvent::TokenUsage {
                            input: u.input,
                            output: u.output,
                            context_total: self.context_tracker.used_tokens(),
                            cache_read: u.cache_read,
                            cache_write: u.cache_write,
                        });
                        if self.context_tracker.should_warn() {
                            let _ = self.events_tx.try_send(AgentEvent::Error(
                                "context usage has crossed 80% of the model's context window".into(),
                            ));
                        }
                    }
                    if !saw_text {
                        let _ = self.events_tx.try_send(AgentEvent::Error(
                            "the vendor returned no text for this turn".into(),
                        ));
                    }
                    return;
                }
                Some(VendorEvent::Error(reason)) => {
                    // Spec §4.6 edge case: no silent failure — always a
                    // user-visible error, turn still ends cleanly.
                    let _ = self.events_tx.try_send(AgentEvent::Error(reason));
                    return;
                }
                None => {
                    if !saw_text {
                        let _ = self.events_tx.try_send(AgentEvent::Error(
                            "the vendor returned no text for this turn".into(),
                        ));
                    }
                    return;
                }
            }
        }
    }

    /// At a safe splice point (after `TextEnd`/`ToolEnd`, never while
    /// `streaming_text`), drains `pending` into one follow-up turn. If the
    /// vendor declines, the batch is re-pushed to the head of `pending`
    /// unconsumed (spec §4.6 edge case).
    async fn maybe_interleave(&mut self, anchor_id: &mut String) -> Option<VendorEventStream> {
        if self.streaming_text {
            return None;
        }
        let batch = self.queue.drain_interleave_batch()?;
        let mut follow_up = self
            .vendor
            .follow_up(batch.text.clone(), batch.images.clone())
            .await;
        match follow_up.next().await {
            Some(VendorEvent::Error(reason)) => {
                warn!(reason, "vendor declined interleave follow-up; requeuing batch");
                let _ = self
                    .events_tx
                    .try_send(AgentEvent::Error(format!("could not interleave new messages: {reason}")));
                self.queue.requeue_front(batch);
                None
            }
            Some(first) => {
                *anchor_id = batch.last_id.clone();
                let _ = self.events_tx.try_send(AgentEvent::Interleaved {
                    batched_ids: batch.batched_ids.clone(),
                });
                let prefixed: VendorEventStream =
                    Box::pin(stream::once(async move { first }).chain(follow_up));
                Some(prefixed)
            }
            None => {
                self.queue.requeue_front(batch);
                None
            }
        }
    }

    async fn handle_tool_start(&mut self, vendor_name: String, args: Value, call_id: String) {
        let canonical = chorus_core::canonical_tool_name(&vendor_name)
            .map(str::to_string)
            .unwrap_or(vendor_name);
        let _ = self.events_tx.try_send(AgentEvent::ActionStart {
            kind: format!("tool:{call_id}"),
            description: canonical.clone(),
        });
        let tool_call = ToolCall {
            id: call_id.clone(),
            name: canonical.clone(),
            args: args.clone(),
        };
        let _ = self.events_tx.try_send(AgentEvent::ToolCallStarted(tool_call.clone()));

        let output = match self.approval_gate.decide(&canonical, self.autonomy) {
            ApprovalPolicy::Deny => {
                ToolOutput::err(call_id.clone(), format!("{canonical} is denied by policy"))
            }
            ApprovalPolicy::Auto => self.execute_tool(&tool_call).await,
            ApprovalPolicy::Ask => {
                if self.request_approval(&canonical, &args).await {
                    self.execute_tool(&tool_call).await
                } else {
                    ToolOutput::err(call_id.clone(), format!("Permission denied: {canonical} was not approved"))
                }
            }
        };

        let _ = self.events_tx.try_send(AgentEvent::ToolCallFinished {
            call_id: call_id.clone(),
            tool_name: canonical,
            output: output.content.clone(),
            is_error: output.is_error,
        });
        self.vendor.submit_tool_result(call_id, output).await;
    }

    async fn execute_tool(&self, call: &ToolCall) -> ToolOutput {
        match self.tools.get(&call.name) {
            Some(tool) => match timeout(self.tool_execution_timeout, tool.execute(call)).await {
                Ok(output) => output,
                Err(_) => ToolOutput::err(
                    call.id.clone(),
                    format!("{} timed out after {:?}", call.name, self.tool_execution_timeout),
                ),
            },
            None => ToolOutput::err(call.id.clone(), format!("unknown tool: {}", call.name)),
        }
    }

    /// Scenario S5: sends an `rpc_request{method_name:"approve_tool"}`
    /// targeted at the designated panel participant and awaits its
    /// terminal outcome through the shared dispatcher. No panel present —
    /// or a denied/errored/cancelled outcome — defaults to deny.
    async fn request_approval(&self, tool: &str, args: &Value) -> bool {
        let Some(panel) = self.approval_participant else {
            warn!(tool, "no panel participant to ask for approval; defaulting to deny");
            return false;
        };
        let call_id = CallId::new();
        let req = PublishRequest {
            content: serde_json::json!({
                "call_id": call_id.to_string(),
                "callee_id": self.client_id.to_string(),
                "method_name": "approve_tool",
                "args": {"tool": tool, "args": args},
            }),
            content_type: ContentType::RpcRequest,
            reply_to: None,
            persist: false,
            targeted: Some(vec![panel]),
            attachments: None,
        };
        if self
            .hub
            .publish(&self.context_id, &self.channel_id, self.client_id, req)
            .await
            .is_err()
        {
            return false;
        }
        match self.dispatcher.call(call_id, Some(&self.turn_cancel)).await {
            CallOutcome::Ok(v) => v.get("approved").and_then(Value::as_bool).unwrap_or(false),
            CallOutcome::Err(_) | CallOutcome::Cancelled(_) => false,
        }
    }

    async fn publish_typing(&self, text: &str) {
        let req = PublishRequest {
            content: serde_json::json!(text),
            content_type: ContentType::Typing,
            reply_to: None,
            persist: false,
            targeted: None,
            attachments: None,
        };
        let _ = self
            .hub
            .publish(&self.context_id, &self.channel_id, self.client_id, req)
            .await;
    }

    /// `PROCESSING -- pause --> PAUSED -> IDLE`. Aborts the in-flight
    /// vendor call (causing `prompt()`/`follow_up()` to return) and cancels
    /// every RPC call this turn originated. Pending items are untouched —
    /// resume replays them.
    pub async fn pause(&mut self) {
        self.vendor.abort().await;
        self.turn_cancel.cancel();
        self.turn_cancel = CancellationToken::new();
        self.queue.pause();
        self.state = WorkerState::Paused;
        let _ = self.events_tx.try_send(AgentEvent::Aborted);
    }

    pub fn resume(&mut self) {
        self.queue.resume();
        self.state = WorkerState::Idle;
    }

    pub fn queue(&self) -> &MessageQueue {
        &self.queue
    }

    /// `IDLE -- supervisor unload --> SLEEPING -- on_sleep --> TERMINATED`.
    pub async fn sleep(&mut self) {
        self.state = WorkerState::Sleeping;
        self.vendor.dispose().await;
        self.state = WorkerState::Terminated;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;
    use tokio::sync::mpsc;

    #[test]
    fn missed_context_excludes_self_and_truncates() {
        let me = ClientId::new();
        let other = ClientId::new();
        let events = vec![
            event(me, "mine"),
            event(other, "aaaaaaaaaa"),
            event(other, "bbbbbbbbbb"),
        ];
        let out = build_missed_context(&events, &me, 60).unwrap();
        assert!(out.contains("aaaaaaaaaa"));
        assert!(!out.contains("bbbbbbbbbb"));
        assert!(!out.contains("mine"));
    }

    #[test]
    fn missed_context_empty_when_nothing_to_show() {
        let me = ClientId::new();
        let events = vec![event(me, "only mine")];
        assert!(build_missed_context(&events, &me, 8000).is_none());
    }

    #[test]
    fn missed_context_consumed_at_most_once() {
        let mut mc = MissedContext::default();
        mc.set(Some("preamble".into()));
        assert_eq!(mc.take(), Some("preamble".to_string()));
        assert_eq!(mc.take(), None);
    }

    fn event(sender: ClientId, text: &str) -> Event {
        Event {
            pubsub_id: 1,
            channel_id: ChannelId::from("c"),
            sender_id: sender,
            kind: chorus_core::EventKind::Live,
            content_type: chorus_core::ContentType::Message,
            content: serde_json::json!(text),
            attachments: None,
            reply_to: None,
            persist: true,
            targeted_recipients: None,
            timestamp: chrono::Utc::now(),
        }
    }

    /// A scripted vendor double: `prompt` replays a fixed script of events
    /// once; `follow_up` either succeeds with a one-event script or
    /// declines, per `decline_follow_up`.
    struct ScriptedVendor {
        decline_follow_up: bool,
        follow_up_calls: StdMutex<usize>,
    }

    #[async_trait]
    impl VendorSession for ScriptedVendor {
        async fn start_session(&self, _opts: SessionOptions) -> Result<(), VendorError> {
            Ok(())
        }

        async fn prompt(&self, _text: String, _images: Vec<Value>) -> VendorEventStream {
            Box::pin(stream::iter(vec![
                VendorEvent::TextDelta("hi".into()),
                VendorEvent::TextEnd,
                VendorEvent::TurnEnd { usage: None },
            ]))
        }

        async fn abort(&self) {}

        async fn follow_up(&self, _text: String, _images: Vec<Value>) -> VendorEventStream {
            *self.follow_up_calls.lock().unwrap() += 1;
            if self.decline_follow_up {
                Box::pin(stream::iter(vec![VendorEvent::Error("busy".into())]))
            } else {
                Box::pin(stream::iter(vec![
                    VendorEvent::TextEnd,
                    VendorEvent::TurnEnd { usage: None },
                ]))
            }
        }

        async fn stats(&self) -> VendorUsageAlias {
            VendorUsageAlias::default()
        }

        async fn dispose(&self) {}

        fn supported_models(&self) -> Vec<String> {
            vec!["test-model".into()]
        }

        async fn submit_tool_result(&self, _call_id: String, _output: ToolOutput) {}

        fn sdk_session_id(&self) -> Option<String> {
            None
        }
    }

    // Avoids importing `crate::vendor::VendorUsage` twice under a name
    // collision with the test module's own `usage` helpers elsewhere.
    type VendorUsageAlias = crate::vendor::VendorUsage;

    fn mock_runtime(vendor: Arc<dyn VendorSession>) -> (AgentRuntime, mpsc::Receiver<AgentEvent>) {
        mock_runtime_with_timeouts(
            vendor,
            std::time::Duration::from_secs(120),
            std::time::Duration::from_secs(120),
        )
    }

    fn mock_runtime_with_timeouts(
        vendor: Arc<dyn VendorSession>,
        stream_no_progress_timeout: std::time::Duration,
        tool_execution_timeout: std::time::Duration,
    ) -> (AgentRuntime, mpsc::Receiver<AgentEvent>) {
        use chorus_config::BrokerConfig;
        use chorus_session::FileSessionStore;

        let (events_tx, events_rx) = mpsc::channel(64);
        let dir = tempfile::tempdir().unwrap().into_path();
        let sessions: Arc<dyn SessionStore> = Arc::new(FileSessionStore::new(dir));
        let hub = Arc::new(ChannelHub::new(BrokerConfig::default(), sessions.clone()));
        let pending = Arc::new(chorus_rpc::PendingCalls::new());
        let dispatcher = Arc::new(Dispatcher::new(pending, std::time::Duration::from_millis(50)));
        let key = SessionKey::new(
            ContextId::from("ctx"),
            ChannelId::from("c"),
            chorus_core::IdentityKey::from("agent-1"),
        );
        let runtime = AgentRuntime::new(
            vendor,
            Arc::new(ToolRegistry::new()),
            ApprovalGate::from_config(&chorus_config::ToolsConfig::default()),
            AutonomyLevel::Autonomous,
            dispatcher,
            None,
            hub,
            sessions,
            key,
            ClientId::new(),
            10_000,
            0.8,
            events_tx,
            stream_no_progress_timeout,
            tool_execution_timeout,
        );
        (runtime, events_rx)
    }

    #[tokio::test]
    async fn run_turn_drains_one_message_and_completes() {
        let vendor = Arc::new(ScriptedVendor {
            decline_follow_up: false,
            follow_up_calls: StdMutex::new(0),
        });
        let (mut rt, mut events) = mock_runtime(vendor);
        rt.enqueue("m1".into(), "hello".into(), vec![]).await;
        rt.run_turn().await;
        assert_eq!(rt.state(), WorkerState::Idle);

        let mut saw_turn_complete = false;
        while let Ok(ev) = events.try_recv() {
            if matches!(ev, AgentEvent::TurnComplete) {
                saw_turn_complete = true;
            }
        }
        assert!(saw_turn_complete);
    }

    #[tokio::test]
    async fn interleave_happens_at_splice_point_not_mid_stream() {
        let vendor = Arc::new(ScriptedVendor {
            decline_follow_up: false,
            follow_up_calls: StdMutex::new(0),
        });
        let (mut rt, _events) = mock_runtime(vendor.clone());
        rt.enqueue("m1".into(), "first".into(), vec![]).await;
        // Queue a second message before the turn starts so it's present in
        // `pending` when the splice point after TextEnd is reached.
        rt.enqueue("m2".into(), "second".into(), vec![]).await;
        rt.run_turn().await;
        assert_eq!(*vendor.follow_up_calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn declined_interleave_requeues_the_batch() {
        let vendor = Arc::new(ScriptedVendor {
            decline_follow_up: true,
            follow_up_calls: StdMutex::new(0),
        });
        let (mut rt, mut events) = mock_runtime(vendor.clone());
        rt.enqueue("m1".into(), "first".into(), vec![]).await;
        rt.enqueue("m2".into(), "second".into(), vec![]).await;
        rt.run_turn().await;
        assert_eq!(*vendor.follow_up_calls.lock().unwrap(), 1);
        assert_eq!(rt.queue().pending_len(), 1, "declined batch must be requeued");

        let mut saw_decline_error = false;
        while let Ok(ev) = events.try_recv() {
            if let AgentEvent::Error(msg) = ev {
                if msg.contains("could not interleave") {
                    saw_decline_error = true;
                }
            }
        }
        assert!(saw_decline_error);
    }

    #[tokio::test]
    async fn autonomous_tool_call_executes_without_approval() {
        struct EchoTool;
        #[async_trait]
        impl chorus_tools::Tool for EchoTool {
            fn name(&self) -> &str {
                "Bash"
            }
            fn description(&self) -> &str {
                "echoes"
            }
            fn parameters_schema(&self) -> Value {
                serde_json::json!({})
            }
            fn default_policy(&self) -> ApprovalPolicy {
                ApprovalPolicy::Ask
            }
            async fn execute(&self, call: &ToolCall) -> ToolOutput {
                ToolOutput::ok(call.id.clone(), "ran")
            }
        }

        struct ToolCallingVendor;
        #[async_trait]
        impl VendorSession for ToolCallingVendor {
            async fn start_session(&self, _opts: SessionOptions) -> Result<(), VendorError> {
                Ok(())
            }
            async fn prompt(&self, _text: String, _images: Vec<Value>) -> VendorEventStream {
                Box::pin(stream::iter(vec![
                    VendorEvent::ToolStart {
                        name: "bash".into(),
                        args: serde_json::json!({}),
                        call_id: "c1".into(),
                    },
                    VendorEvent::ToolEnd { call_id: "c1".into() },
                    VendorEvent::TurnEnd { usage: None },
                ]))
            }
            async fn abort(&self) {}
            async fn follow_up(&self, _text: String, _images: Vec<Value>) -> VendorEventStream {
                Box::pin(stream::iter(vec![VendorEvent::TurnEnd { usage: None }]))
            }
            async fn stats(&self) -> VendorUsageAlias {
                VendorUsageAlias::default()
            }
            async fn dispose(&self) {}
            fn supported_models(&self) -> Vec<String> {
                vec![]
            }
            async fn submit_tool_result(&self, _call_id: String, _output: ToolOutput) {}
            fn sdk_session_id(&self) -> Option<String> {
                None
            }
        }

        let (mut rt, mut events) = mock_runtime(Arc::new(ToolCallingVendor));
        rt.tools.register(EchoTool);
        rt.enqueue("m1".into(), "do it".into(), vec![]).await;
        rt.run_turn().await;

        let mut finished_ok = false;
        while let Ok(ev) = events.try_recv() {
            if let AgentEvent::ToolCallFinished { is_error, output, .. } = ev {
                assert!(!is_error);
                assert_eq!(output, "ran");
                finished_ok = true;
            }
        }
        assert!(finished_ok);
    }

    #[tokio::test]
    async fn restricted_autonomy_without_panel_denies_destructive_tool() {
        struct BashOnlyVendor;
        #[async_trait]
        impl VendorSession for BashOnlyVendor {
            async fn start_session(&self, _opts: SessionOptions) -> Result<(), VendorError> {
                Ok(())
            }
            async fn prompt(&self, _text: String, _images: Vec<Value>) -> VendorEventStream {
                Box::pin(stream::iter(vec![
                    VendorEvent::ToolStart {
                        name: "Bash".into(),
                        args: serde_json::json!({"cmd": "rm -rf /"}),
                        call_id: "c1".into(),
                    },
                    VendorEvent::ToolEnd { call_id: "c1".into() },
                    VendorEvent::TurnEnd { usage: None },
                ]))
            }
            async fn abort(&self) {}
            async fn follow_up(&self, _text: String, _images: Vec<Value>) -> VendorEventStream {
                Box::pin(stream::iter(vec![VendorEvent::TurnEnd { usage: None }]))
            }
            async fn stats(&self) -> VendorUsageAlias {
                VendorUsageAlias::default()
            }
            async fn dispose(&self) {}
            fn supported_models(&self) -> Vec<String> {
                vec![]
            }
            async fn submit_tool_result(&self, _call_id: String, _output: ToolOutput) {}
            fn sdk_session_id(&self) -> Option<String> {
                None
            }
        }

        let (mut rt, mut events) = mock_runtime(Arc::new(BashOnlyVendor));
        rt.autonomy = AutonomyLevel::Standard;
        rt.enqueue("m1".into(), "go".into(), vec![]).await;
        rt.run_turn().await;

        let mut denied = false;
        while let Ok(ev) = events.try_recv() {
            if let AgentEvent::ToolCallFinished { is_error, output, .. } = ev {
                if is_error && output.contains("Permission denied") {
                    denied = true;
                }
            }
        }
        assert!(denied, "no panel to approve Bash under standard autonomy must deny");
    }

    #[tokio::test]
    async fn textless_turn_surfaces_an_error() {
        struct SilentVendor;
        #[async_trait]
        impl VendorSession for SilentVendor {
            async fn start_session(&self, _opts: SessionOptions) -> Result<(), VendorError> {
                Ok(())
            }
            async fn prompt(&self, _text: String, _images: Vec<Value>) -> VendorEventStream {
                Box::pin(stream::iter(vec![VendorEvent::TurnEnd { usage: None }]))
            }
            async fn abort(&self) {}
            async fn follow_up(&self, _text: String, _images: Vec<Value>) -> VendorEventStream {
                Box::pin(stream::iter(vec![VendorEvent::TurnEnd { usage: None }]))
            }
            async fn stats(&self) -> VendorUsageAlias {
                VendorUsageAlias::default()
            }
            async fn dispose(&self) {}
            fn supported_models(&self) -> Vec<String> {
                vec![]
            }
            async fn submit_tool_result(&self, _call_id: String, _output: ToolOutput) {}
            fn sdk_session_id(&self) -> Option<String> {
                None
            }
        }

        let (mut rt, mut events) = mock_runtime(Arc::new(SilentVendor));
        rt.enqueue("m1".into(), "go".into(), vec![]).await;
        rt.run_turn().await;

        let mut saw_no_text_error = false;
        while let Ok(ev) = events.try_recv() {
            if let AgentEvent::Error(msg) = ev {
                if msg.contains("no text") {
                    saw_no_text_error = true;
                }
            }
        }
        assert!(saw_no_text_error, "a textless turn must surface a user-visible error");
    }

    #[tokio::test]
    async fn stalled_vendor_stream_times_out_with_an_error() {
        struct StallingVendor;
        #[async_trait]
        impl VendorSession for StallingVendor {
            async fn start_session(&self, _opts: SessionOptions) -> Result<(), VendorError> {
                Ok(())
            }
            async fn prompt(&self, _text: String, _images: Vec<Value>) -> VendorEventStream {
                Box::pin(stream::unfold((), |_| async {
                    tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
                    None
                }))
            }
            async fn abort(&self) {}
            async fn follow_up(&self, _text: String, _images: Vec<Value>) -> VendorEventStream {
                Box::pin(stream::iter(vec![VendorEvent::TurnEnd { usage: None }]))
            }
            async fn stats(&self) -> VendorUsageAlias {
                VendorUsageAlias::default()
            }
            async fn dispose(&self) {}
            fn supported_models(&self) -> Vec<String> {
                vec![]
            }
            async fn submit_tool_result(&self, _call_id: String, _output: ToolOutput) {}
            fn sdk_session_id(&self) -> Option<String> {
                None
            }
        }

        let (mut rt, mut events) = mock_runtime_with_timeouts(
            Arc::new(StallingVendor),
            std::time::Duration::from_millis(20),
            std::time::Duration::from_secs(120),
        );
        rt.enqueue("m1".into(), "go".into(), vec![]).await;
        rt.run_turn().await;

        let mut saw_watchdog_error = false;
        while let Ok(ev) = events.try_recv() {
            if let AgentEvent::Error(msg) = ev {
                if msg.contains("no progress") {
                    saw_watchdog_error = true;
                }
            }
        }
        assert!(saw_watchdog_error, "a stalled vendor stream must surface a watchdog error");
    }

    #[tokio::test]
    async fn hung_tool_execution_times_out() {
        struct SlowTool;
        #[async_trait]
        impl chorus_tools::Tool for SlowTool {
            fn name(&self) -> &str {
                "Bash"
            }
            fn description(&self) -> &str {
                "never finishes"
            }
            fn parameters_schema(&self) -> Value {
                serde_json::json!({})
            }
            fn default_policy(&self) -> ApprovalPolicy {
                ApprovalPolicy::Auto
            }
            async fn execute(&self, call: &ToolCall) -> ToolOutput {
                tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
                ToolOutput::ok(call.id.clone(), "should never get here")
            }
        }

        struct ToolCallingVendor;
        #[async_trait]
        impl VendorSession for ToolCallingVendor {
            async fn start_session(&self, _opts: SessionOptions) -> Result<(), VendorError> {
                Ok(())
            }
            async fn prompt(&self, _text: String, _images: Vec<Value>) -> VendorEventStream {
                Box::pin(stream::iter(vec![
                    VendorEvent::ToolStart {
                        name: "bash".into(),
                        args: serde_json::json!({}),
                        call_id: "c1".into(),
                    },
                    VendorEvent::ToolEnd { call_id: "c1".into() },
                    VendorEvent::TurnEnd { usage: None },
                ]))
            }
            async fn abort(&self) {}
            async fn follow_up(&self, _text: String, _images: Vec<Value>) -> VendorEventStream {
                Box::pin(stream::iter(vec![VendorEvent::TurnEnd { usage: None }]))
            }
            async fn stats(&self) -> VendorUsageAlias {
                VendorUsageAlias::default()
            }
            async fn dispose(&self) {}
            fn supported_models(&self) -> Vec<String> {
                vec![]
            }
            async fn submit_tool_result(&self, _call_id: String, _output: ToolOutput) {}
            fn sdk_session_id(&self) -> Option<String> {
                None
            }
        }

        let (mut rt, mut events) = mock_runtime_with_timeouts(
            Arc::new(ToolCallingVendor),
            std::time::Duration::from_secs(120),
            std::time::Duration::from_millis(20),
        );
        rt.tools.register(SlowTool);
        rt.enqueue("m1".into(), "do it".into(), vec![]).await;
        rt.run_turn().await;

        let mut timed_out = false;
        while let Ok(ev) = events.try_recv() {
            if let AgentEvent::ToolCallFinished { is_error, output, .. } = ev {
                if is_error && output.contains("timed out") {
                    timed_out = true;
                }
            }
        }
        assert!(timed_out, "a hung tool execution must time out rather than block forever");
    }
}
