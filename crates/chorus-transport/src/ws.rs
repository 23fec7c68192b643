// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! WebSocket bridge — translates browser WebSocket connections to the
//! internal `Frame` protocol. Wire format is JSON text frames, comfortable
//! for browsers and avoiding a CBOR dependency in the browser bundle.
//!
//! Shaped identically to the teacher's `http::ws::handle_socket`
//! `tokio::select!` read/write loop, generalized from one
//! `ControlCommand`/`ControlEvent` pair tied to a single agent to the full
//! `Frame` enum tied to many concurrent channel connections.
use axum::extract::ws::{Message, WebSocket};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::frame::Frame;

/// Bridge a single accepted WebSocket connection to a pair of `mpsc`
/// channels: frames sent on `outbound` are written to the socket; frames
/// read from the socket are pushed onto `inbound`.
pub async fn handle_socket(
    mut socket: WebSocket,
    mut outbound: mpsc::Receiver<Frame>,
    inbound: mpsc::Sender<Frame>,
    max_frame_bytes: usize,
) {
    loop {
        tokio::select! {
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if text.len() > max_frame_bytes {
                            warn!(size = text.len(), limit = max_frame_bytes, "oversized frame rejected");
                            let err = Frame::Error {
                                code: 413,
                                message: "payload too large".to_string(),
                            };
                            send_frame(&mut socket, &err).await;
                            continue;
                        }
                        match serde_json::from_str::<Frame>(&text) {
                            Ok(frame) => {
                                if inbound.send(frame).await.is_err() {
                                    break;
                                }
                            }
                            Err(e) => {
                                warn!("invalid frame JSON: {e}");
                                let err = Frame::Error {
                                    code: 400,
                                    message: format!("invalid JSON frame: {e}"),
                                };
                                send_frame(&mut socket, &err).await;
                            }
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!("WebSocket recv error: {e}");
                        break;
                    }
                }
            }
            frame = outbound.recv() => {
                match frame {
                    Some(frame) => send_frame(&mut socket, &frame).await,
                    None => break,
                }
            }
        }
    }
}

async fn send_frame(socket: &mut WebSocket, frame: &Frame) {
    if let Ok(json) = serde_json::to_string(frame) {
        let _ = socket.send(Message::Text(json)).await;
    }
}
