// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Native listener for non-browser clients: a WebSocket handshake over raw
//! TCP (so the same port survives NAT/proxy traversal as the browser path)
//! but binary CBOR frames instead of JSON text, per `codec.rs`'s
//! encode/decode split. Shaped after `chorus_transport::ws::handle_socket`,
//! generalized from `axum`'s `WebSocket` type to `tokio-tungstenite`'s.
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use chorus_transport::{decode_frame, encode_frame, Frame};

use crate::service::{run_connection, ConnectionState};

pub async fn run(listen_addr: &str, max_frame_bytes: usize, state: Arc<ConnectionState>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(listen_addr).await?;
    info!(%listen_addr, "native listener started");

    loop {
        let (stream, peer) = listener.accept().await?;
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            match tokio_tungstenite::accept_async(stream).await {
                Ok(ws) => handle_connection(ws, max_frame_bytes, state).await,
                Err(e) => warn!(%peer, "native handshake failed: {e}"),
            }
        });
    }
}

async fn handle_connection(
    ws: tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>,
    max_frame_bytes: usize,
    state: Arc<ConnectionState>,
) {
    let (mut sink, mut stream) = ws.split();
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<Frame>(256);
    let (inbound_tx, inbound_rx) = mpsc::channel::<Frame>(256);

    let reader = tokio::spawn(async move {
        while let Some(msg) = stream.next().await {
            match msg {
                Ok(Message::Binary(bytes)) => {
                    if bytes.len() > max_frame_bytes {
                        warn!(size = bytes.len(), limit = max_frame_bytes, "oversized native frame rejected");
                        continue;
                    }
                    match decode_frame(&bytes) {
                        Ok(frame) => {
                            if inbound_tx.send(frame).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!("invalid CBOR frame: {e}"),
                    }
                }
                Ok(Message::Close(_)) | Err(_) => break,
                Ok(_) => {}
            }
        }
    });

    let writer = tokio::spawn(async move {
        while let Some(frame) = outbound_rx.recv().await {
            match encode_frame(&frame) {
                Ok(bytes) => {
                    if sink.send(Message::Binary(bytes)).await.is_err() {
                        break;
                    }
                }
                Err(e) => warn!("failed to encode outbound frame: {e}"),
            }
        }
    });

    run_connection(state, inbound_rx, outbound_tx).await;
    reader.abort();
    writer.abort();
    debug!("native connection tasks torn down");
}
