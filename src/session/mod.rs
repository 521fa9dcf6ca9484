// src/session/mod.rs
//! Session records
//!
//! A session points from an opaque identifier to the storage key of one
//! converted archive. Records are immutable: stores never overwrite an
//! existing id. Re-inserting an identical record succeeds; a different record
//! under a taken id fails with `SessionConflict`.

mod rest;
mod sqlite;

pub use rest::RestSessionStore;
pub use sqlite::SqliteSessionStore;

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque session identifier: `{unix_millis}_{uuid}`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Fresh identifier with a time prefix and a random v4 suffix
    pub fn generate() -> Self {
        Self(format!(
            "{}_{}",
            Utc::now().timestamp_millis(),
            uuid::Uuid::new_v4().simple()
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A persisted pointer to a converted archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: String,
    pub archive_key: String,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(id: impl Into<String>, archive_key: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            archive_key: archive_key.into(),
            created_at: Utc::now(),
        }
    }
}

/// Session record persistence
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Look up a session, `None` if the id is unknown
    async fn get(&self, id: &str) -> Result<Option<Session>>;

    /// Persist a new session without overwriting
    async fn insert(&self, session: &Session) -> Result<()>;

    /// Name for logging
    fn name(&self) -> &str;
}
