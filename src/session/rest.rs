// src/session/rest.rs
//! Session store over the Supabase REST (PostgREST) API
//!
//! Rows live in a table (default `sessions`) with columns `id`, `file_url`
//! and `created_at`. A duplicate primary key answers 409; the existing row is
//! then compared to decide between idempotent success and a conflict.

use super::{Session, SessionStore};
use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

#[derive(Debug, Serialize, Deserialize)]
struct SessionRow {
    id: String,
    file_url: String,
    created_at: DateTime<Utc>,
}

impl From<SessionRow> for Session {
    fn from(row: SessionRow) -> Self {
        Self {
            id: row.id,
            archive_key: row.file_url,
            created_at: row.created_at,
        }
    }
}

/// Session store backed by a PostgREST table
pub struct RestSessionStore {
    client: reqwest::Client,
    table_url: Url,
}

impl RestSessionStore {
    /// `project_url` is the bare Supabase project URL
    pub fn new(project_url: &str, table: &str, service_key: &str) -> Result<Self> {
        let init_err = |message: String| Error::SessionStore {
            step: "init",
            message,
        };

        let table_url = Url::parse(project_url)
            .and_then(|base| base.join(&format!("rest/v1/{table}")))
            .map_err(|e| init_err(format!("invalid project URL '{project_url}': {e}")))?;

        let mut headers = HeaderMap::new();
        headers.insert(
            "apikey",
            HeaderValue::from_str(service_key)
                .map_err(|e| init_err(format!("invalid service key: {e}")))?,
        );
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {service_key}"))
                .map_err(|e| init_err(format!("invalid service key: {e}")))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| init_err(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client, table_url })
    }

    fn lookup_url(&self, id: &str) -> Url {
        let mut url = self.table_url.clone();
        url.query_pairs_mut()
            .append_pair("select", "id,file_url,created_at")
            .append_pair("id", &format!("eq.{id}"));
        url
    }
}

#[async_trait]
impl SessionStore for RestSessionStore {
    async fn get(&self, id: &str) -> Result<Option<Session>> {
        let get_err = |message: String| Error::SessionStore {
            step: "get",
            message,
        };

        let response = self
            .client
            .get(self.lookup_url(id))
            .send()
            .await
            .map_err(|e| get_err(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(get_err(format!("HTTP {status}: {body}")));
        }

        let rows: Vec<SessionRow> = response
            .json()
            .await
            .map_err(|e| get_err(format!("malformed response: {e}")))?;

        Ok(rows.into_iter().next().map(Session::from))
    }

    async fn insert(&self, session: &Session) -> Result<()> {
        let insert_err = |message: String| Error::SessionStore {
            step: "insert",
            message,
        };

        let row = SessionRow {
            id: session.id.clone(),
            file_url: session.archive_key.clone(),
            created_at: session.created_at,
        };

        let response = self
            .client
            .post(self.table_url.clone())
            .header("Prefer", "return=minimal")
            .json(&[row])
            .send()
            .await
            .map_err(|e| insert_err(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            debug!("Inserted session {}", session.id);
            return Ok(());
        }

        if status == StatusCode::CONFLICT {
            return match self.get(&session.id).await? {
                Some(existing) if existing.archive_key == session.archive_key => Ok(()),
                _ => Err(Error::SessionConflict(session.id.clone())),
            };
        }

        let body = response.text().await.unwrap_or_default();
        Err(insert_err(format!("HTTP {status}: {body}")))
    }

    fn name(&self) -> &str {
        "supabase"
    }
}
