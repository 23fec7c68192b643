// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! File-backed `SessionStore`. One YAML record per `(context_id, channel_id,
//! identity_key)` under `<data_dir>/<context_id>/sessions/`. Writes go
//! through a tempfile-then-rename discipline, generalizing the teacher's
//! `write_secret_file` (single `std::fs::write`, mode 0o600) into a
//! crash-safe read-modify-write: write to a `NamedTempFile` in the same
//! directory, `sync_all()`, then `persist()` (atomic rename) — a torn write
//! can never leave a half-written record visible.
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::SessionError;
use crate::store::SessionStore;
use crate::types::{Session, SessionKey, SessionStatus};

pub struct FileSessionStore {
    data_dir: PathBuf,
    locks: DashMap<SessionKey, Arc<Mutex<()>>>,
}

impl FileSessionStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            locks: DashMap::new(),
        }
    }

    fn record_path(&self, key: &SessionKey) -> PathBuf {
        self.data_dir
            .join(key.context_id.as_str())
            .join("sessions")
            .join(format!("{}.yaml", key.file_stem()))
    }

    fn read_record(path: &Path) -> Result<Option<Session>, SessionError> {
        if !path.is_file() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(path).map_err(|source| SessionError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let session: Session = serde_yaml::from_str(&text).map_err(|source| SessionError::Decode {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Some(session))
    }

    fn write_record(path: &Path, session: &Session) -> Result<(), SessionError> {
        let parent = path.parent().expect("record path always has a parent");
        std::fs::create_dir_all(parent).map_err(|source| SessionError::Write {
            path: path.display().to_string(),
            source,
        })?;
        let yaml = serde_yaml::to_string(session).map_err(SessionError::Encode)?;

        let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(|source| SessionError::Write {
            path: path.display().to_string(),
            source,
        })?;
        tmp.write_all(yaml.as_bytes())
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|source| SessionError::Write {
                path: path.display().to_string(),
                source,
            })?;
        tmp.persist(path)
            .map_err(|e| SessionError::Write {
                path: path.display().to_string(),
                source: e.error,
            })?;
        Ok(())
    }

    /// Get (creating if absent) the in-process lock guarding writes to `key`.
    /// Returns an owned `Arc` so the caller never holds a `DashMap` shard
    /// guard across an `.await` point.
    fn lock_for(&self, key: &SessionKey) -> Arc<Mutex<()>> {
        self.locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn load(&self, key: &SessionKey) -> Result<Option<Session>, SessionError> {
        let path = self.record_path(key);
        Self::read_record(&path)
    }

    async fn commit_checkpoint(&self, key: &SessionKey, pubsub_id: u64) -> Result<u64, SessionError> {
        let lock = self.lock_for(key);
        let _guard = lock.lock().await;
        let path = self.record_path(key);
        let mut session = Self::read_record(&path)?.unwrap_or_else(Session::fresh);
        let applied = session.checkpoint_pubsub_id.max(pubsub_id);
        if applied != session.checkpoint_pubsub_id {
            session.checkpoint_pubsub_id = applied;
            Self::write_record(&path, &session)?;
        } else {
            debug!(key = ?key, stale = pubsub_id, "ignored stale checkpoint commit");
        }
        Ok(applied)
    }

    async fn update_sdk_session(&self, key: &SessionKey, handle: String) -> Result<(), SessionError> {
        let lock = self.lock_for(key);
        let _guard = lock.lock().await;
        let path = self.record_path(key);
        let mut session = Self::read_record(&path)?.unwrap_or_else(Session::fresh);
        session.sdk_session_id = Some(handle);
        session.status = SessionStatus::Resumed;
        Self::write_record(&path, &session)
    }

    async fn update_settings(&self, key: &SessionKey, blob: Value) -> Result<(), SessionError> {
        let lock = self.lock_for(key);
        let _guard = lock.lock().await;
        let path = self.record_path(key);
        let mut session = Self::read_record(&path)?.unwrap_or_else(Session::fresh);
        session.settings = blob;
        Self::write_record(&path, &session)
    }

    async fn get_settings(&self, key: &SessionKey) -> Result<Option<Value>, SessionError> {
        Ok(self.load(key).await?.map(|s| s.settings))
    }

    async fn delete(&self, key: &SessionKey) -> Result<(), SessionError> {
        let lock = self.lock_for(key);
        let _guard = lock.lock().await;
        let path = self.record_path(key);
        if path.is_file() {
            std::fs::remove_file(&path).map_err(|source| SessionError::Write {
                path: path.display().to_string(),
                source,
            })?;
        }
        Ok(())
    }
}
