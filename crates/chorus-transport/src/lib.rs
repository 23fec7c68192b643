// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
mod codec;
mod error;
mod frame;
mod local;
mod transport;
pub mod ws;

pub use codec::{decode_frame, encode_frame};
pub use error::TransportError;
pub use frame::{ExistingSession, Frame, RpcStatus};
pub use local::InProcessTransport;
pub use transport::{ConnectionEvent, ConnectionEventStream, FrameStream, Transport};
