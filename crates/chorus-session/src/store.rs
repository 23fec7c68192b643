// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;
use serde_json::Value;

use crate::error::SessionError;
use crate::types::{Session, SessionKey};

/// The only shared mutable resource between agents (spec §5). Every access
/// goes through this API, which serializes writes per key.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, key: &SessionKey) -> Result<Option<Session>, SessionError>;

    /// Monotonic: applying a `pubsub_id` smaller than the stored value is a
    /// silent no-op. Returns the value now stored (the max of old and new).
    async fn commit_checkpoint(&self, key: &SessionKey, pubsub_id: u64) -> Result<u64, SessionError>;

    /// Last-writer-wins.
    async fn update_sdk_session(&self, key: &SessionKey, handle: String) -> Result<(), SessionError>;

    async fn update_settings(&self, key: &SessionKey, blob: Value) -> Result<(), SessionError>;

    async fn get_settings(&self, key: &SessionKey) -> Result<Option<Value>, SessionError>;

    /// Used only on explicit workspace removal.
    async fn delete(&self, key: &SessionKey) -> Result<(), SessionError>;
}
