// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
mod call;
mod dispatcher;
mod error;
mod registry;

pub use call::{CallOutcome, CallState, PendingCalls};
pub use dispatcher::{serve_streaming, serve_unary, Dispatcher};
pub use error::{CancelReason, RpcError};
pub use registry::{BoxFuture, MethodCall, MethodEntry, MethodHandler, MethodOutcome, MethodRegistry};
