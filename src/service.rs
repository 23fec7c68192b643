// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Per-connection protocol handling, transport-agnostic: both the
//! WebSocket (`axum`, JSON) and native (`tokio-tungstenite`, CBOR)
//! listeners bridge their wire bytes down to a `(Sender<Frame>,
//! Receiver<Frame>)` pair and hand it to [`run_connection`]. Shaped after
//! the teacher's `control::service::ControlService` connection loop,
//! generalized from one hard-wired agent session to the broker's full
//! frame surface.
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use chorus_broker::{AdmitOutcome, AdmitRequest, ChannelHub};
use chorus_core::ParticipantType;
use chorus_rpc::{CallOutcome, CancelReason, MethodCall, MethodOutcome, MethodRegistry, PendingCalls};
use chorus_session::{SessionKey, SessionStore};
use chorus_transport::Frame;

/// State shared by every connection the listeners accept.
pub struct ConnectionState {
    pub hub: Arc<ChannelHub>,
    pub sessions: Arc<dyn SessionStore>,
    pub pending: Arc<PendingCalls>,
    /// Broker-local methods a connected client may call directly
    /// (`list_methods` discovery and the like) — distinct from the
    /// participant-to-participant RPC surface, which travels as targeted
    /// `rpc_request` events through `ChannelHub::publish` instead.
    pub local_methods: Arc<MethodRegistry>,
}

/// Drives one connection end-to-end: admission, then the frame loop, then
/// cleanup on disconnect. Returns once `inbound` closes or the remote
/// rejects admission.
pub async fn run_connection(
    state: Arc<ConnectionState>,
    mut inbound: mpsc::Receiver<Frame>,
    outbound: mpsc::Sender<Frame>,
) {
    let Some(Frame::Hello {
        token: _,
        channel_id,
        context_id,
        handle,
        metadata,
        identity_key,
        replay_since_id,
    }) = inbound.recv().await
    else {
        debug!("connection closed before sending hello");
        return;
    };

    let participant_type = ParticipantType::Panel;
    let admit_req = AdmitRequest {
        channel_id: channel_id.clone(),
        context_id: context_id.clone(),
        handle,
        metadata,
        identity_key: identity_key.clone(),
        replay_since_id,
        outbound: outbound.clone(),
    };
    let client_id = match state.hub.admit(admit_req, participant_type).await {
        Ok(AdmitOutcome::Ready { client_id, .. }) => client_id,
        Ok(AdmitOutcome::Reject { reason }) => {
            info!(%reason, "admission rejected");
            return;
        }
        Err(e) => {
            warn!("admission error: {e}");
            return;
        }
    };
    let session_key = SessionKey::new(context_id.clone(), channel_id.clone(), identity_key);
    info!(%client_id, %channel_id, %context_id, "participant admitted");

    while let Some(frame) = inbound.recv().await {
        match frame {
            Frame::Publish {
                content,
                content_type,
                reply_to,
                persist,
                targeted,
                attachments,
            } => {
                let req = chorus_broker::PublishRequest {
                    content,
                    content_type,
                    reply_to,
                    persist,
                    targeted,
                    attachments,
                };
                if let Err(e) = state.hub.publish(&context_id, &channel_id, client_id, req).await {
                    let _ = outbound
                        .send(Frame::Error {
                            code: 400,
                            message: e.to_string(),
                        })
                        .await;
                }
            }
            Frame::RpcRequest {
                call_id,
                callee_id: _,
                method_name,
                args,
            } => {
                let outcome = chorus_rpc::serve_unary(
                    &state.local_methods,
                    &method_name,
                    MethodCall {
                        call_id: call_id.clone(),
                        caller_id: client_id,
                        args,
                    },
                )
                .await;
                let response = match outcome {
                    MethodOutcome::Ok(result) => Frame::RpcResponse {
                        call_id,
                        status: chorus_transport::RpcStatus::Ok,
                        result: Some(result),
                        message: None,
                    },
                    MethodOutcome::Err(message) => Frame::RpcResponse {
                        call_id,
                        status: chorus_transport::RpcStatus::Error,
                        result: None,
                        message: Some(message),
                    },
                };
                let _ = outbound.send(response).await;
            }
            Frame::RpcResponse {
                call_id,
                status,
                result,
                message,
            } => {
                let outcome = match status {
                    chorus_transport::RpcStatus::Ok => CallOutcome::Ok(result.unwrap_or(serde_json::Value::Null)),
                    chorus_transport::RpcStatus::Error => CallOutcome::Err(message.unwrap_or_default()),
                    chorus_transport::RpcStatus::Cancelled => CallOutcome::Cancelled(CancelReason::Requested),
                };
                state.pending.complete(&call_id, outcome);
            }
            Frame::RpcCancel { call_id, .. } => {
                state.pending.cancel(&call_id, CancelReason::Requested);
            }
            Frame::RpcEvent { .. } => {
                // Streaming progress frames from a callee aren't surfaced
                // anywhere yet; nothing subscribes to them.
            }
            Frame::UpdateMetadata { metadata } => {
                if let Err(e) = state.hub.update_metadata(&context_id, &channel_id, &client_id, metadata) {
                    warn!(%client_id, "update_metadata failed: {e}");
                }
            }
            Frame::SetChannelTitle { title } => {
                if let Err(e) = state.hub.set_channel_title(&context_id, &channel_id, title) {
                    warn!(%client_id, "set_channel_title failed: {e}");
                }
            }
            Frame::GetSettings => match state.sessions.get_settings(&session_key).await {
                Ok(settings) => {
                    let _ = outbound
                        .send(Frame::UpdateSettings {
                            blob: settings.unwrap_or(serde_json::Value::Null),
                        })
                        .await;
                }
                Err(e) => warn!(%client_id, "get_settings failed: {e}"),
            },
            Frame::UpdateSettings { blob } => {
                if let Err(e) = state.sessions.update_settings(&session_key, blob).await {
                    warn!(%client_id, "update_settings failed: {e}");
                }
            }
            Frame::CommitCheckpoint { pubsub_id } => {
                if let Err(e) = state.sessions.commit_checkpoint(&session_key, pubsub_id).await {
                    warn!(%client_id, "commit_checkpoint failed: {e}");
                }
            }
            Frame::UpdateSdkSession { handle_opaque } => {
                if let Err(e) = state.sessions.update_sdk_session(&session_key, handle_opaque).await {
                    warn!(%client_id, "update_sdk_session failed: {e}");
                }
            }
            Frame::Ping => {
                let _ = outbound.send(Frame::Pong).await;
            }
            Frame::Subscribe { .. } | Frame::Unsubscribe { .. } => {
                // A connection's subscription is fixed to the channel it
                // was admitted into; cross-channel subscription isn't part
                // of the admission model.
            }
            Frame::Hello { .. }
            | Frame::Ready { .. }
            | Frame::Reject { .. }
            | Frame::Event { .. }
            | Frame::RosterUpdate { .. }
            | Frame::ReplayTruncated { .. }
            | Frame::Pong
            | Frame::Error { .. } => {
                debug!(%client_id, "ignoring broker-to-client frame received from client");
            }
        }
    }

    state.hub.disconnect(&context_id, &channel_id, &client_id);
    info!(%client_id, "participant disconnected");
}
