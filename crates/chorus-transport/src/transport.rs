// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::pin::Pin;

use async_trait::async_trait;
use tokio_stream::Stream;

use crate::error::TransportError;
use crate::frame::Frame;

/// A connection transitioning to or from being usable. A disconnect MUST
/// eventually surface on every transport — no silent hangs (spec §4.1).
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    Connected,
    Disconnected { reason: String },
}

pub type FrameStream = Pin<Box<dyn Stream<Item = Frame> + Send>>;
pub type ConnectionEventStream = Pin<Box<dyn Stream<Item = ConnectionEvent> + Send>>;

/// A framed, bidirectional, ordered, reliable-within-connection byte
/// channel (spec §4.1). Every concrete transport (in-process, WebSocket)
/// implements this; the broker and RPC layer never see anything else.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one frame. `PayloadTooLarge` rejects the send without tearing
    /// down the connection; every other error is treated as terminal for
    /// this connection.
    async fn send(&self, frame: Frame) -> Result<(), TransportError>;

    /// Inbound frames, in the order the remote end sent them.
    fn frames(&mut self) -> FrameStream;

    /// Connect/disconnect transitions for this transport.
    fn connection_events(&mut self) -> ConnectionEventStream;
}
