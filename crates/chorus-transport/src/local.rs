// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! In-process transport used by tests and by co-located agent workers that
//! share the broker's address space. Grounded on the `mpsc`/`broadcast`
//! channel pairing the teacher uses for `control::service::AgentHandle`,
//! generalized to carry the full `Frame` enum both ways.
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;

use crate::error::TransportError;
use crate::frame::Frame;
use crate::transport::{ConnectionEvent, ConnectionEventStream, FrameStream, Transport};

const CHANNEL_CAPACITY: usize = 256;

/// One end of an in-process connection. `InProcessTransport::pair()`
/// constructs two of these, each the other's peer.
pub struct InProcessTransport {
    outbound: mpsc::Sender<Frame>,
    inbound: Option<mpsc::Receiver<Frame>>,
    conn_events: Option<mpsc::Receiver<ConnectionEvent>>,
    conn_tx: mpsc::Sender<ConnectionEvent>,
}

impl InProcessTransport {
    /// Build a connected pair: frames sent on one side arrive as inbound
    /// frames on the other.
    pub fn pair() -> (Self, Self) {
        let (a_to_b, b_from_a) = mpsc::channel(CHANNEL_CAPACITY);
        let (b_to_a, a_from_b) = mpsc::channel(CHANNEL_CAPACITY);
        let (a_conn_tx, a_conn_rx) = mpsc::channel(8);
        let (b_conn_tx, b_conn_rx) = mpsc::channel(8);

        let a = Self {
            outbound: a_to_b,
            inbound: Some(a_from_b),
            conn_events: Some(a_conn_rx),
            conn_tx: b_conn_tx,
        };
        let b = Self {
            outbound: b_to_a,
            inbound: Some(b_from_a),
            conn_events: Some(b_conn_rx),
            conn_tx: a_conn_tx,
        };
        (a, b)
    }
}

#[async_trait]
impl Transport for InProcessTransport {
    async fn send(&self, frame: Frame) -> Result<(), TransportError> {
        self.outbound
            .send(frame)
            .await
            .map_err(|_| TransportError::SendFailed)
    }

    fn frames(&mut self) -> FrameStream {
        let rx = self
            .inbound
            .take()
            .expect("frames() called more than once on this transport half");
        Box::pin(ReceiverStream::new(rx))
    }

    fn connection_events(&mut self) -> ConnectionEventStream {
        let rx = self
            .conn_events
            .take()
            .expect("connection_events() called more than once on this transport half");
        Box::pin(ReceiverStream::new(rx))
    }
}

impl Drop for InProcessTransport {
    fn drop(&mut self) {
        let _ = self.conn_tx.try_send(ConnectionEvent::Disconnected {
            reason: "transport dropped".to_string(),
        });
    }
}
