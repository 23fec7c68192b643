// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Wire codec helpers, mirroring the teacher's `control::protocol`
//! `encode_command`/`decode_command` pair: CBOR for non-browser transports,
//! JSON for WebSocket (handled directly by `ws.rs` via `serde_json`).
use crate::frame::Frame;

/// Encode a `Frame` to CBOR bytes.
pub fn encode_frame(frame: &Frame) -> anyhow::Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(frame, &mut buf).map_err(|e| anyhow::anyhow!("CBOR encode: {e}"))?;
    Ok(buf)
}

/// Decode a `Frame` from CBOR bytes.
pub fn decode_frame(bytes: &[u8]) -> anyhow::Result<Frame> {
    ciborium::from_reader(bytes).map_err(|e| anyhow::anyhow!("CBOR decode: {e}"))
}
