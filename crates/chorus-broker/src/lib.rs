// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Channel hub: admission, ordering, fan-out, replay, and roster (spec §4.2).
mod entry;
mod error;
mod hub;
mod types;

pub use error::BrokerError;
pub use hub::ChannelHub;
pub use types::{AdmitOutcome, AdmitRequest, PublishRequest};
