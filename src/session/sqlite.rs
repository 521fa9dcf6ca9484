// src/session/sqlite.rs

//! SQLite session store
//!
//! The schema is versioned through a `schema_version` table and migrated on
//! open. Queries run on the blocking pool.

use super::{Session, SessionStore};
use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

fn sql_err(step: &'static str) -> impl Fn(rusqlite::Error) -> Error {
    move |e| Error::SessionStore {
        step,
        message: e.to_string(),
    }
}

/// Session store in a local SQLite database
#[derive(Clone)]
pub struct SqliteSessionStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSessionStore {
    /// Open (creating if needed) and migrate a database file
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(sql_err("open"))?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")
            .map_err(sql_err("open"))?;
        Self::from_connection(conn)
    }

    /// In-memory database
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(sql_err("open"))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        migrate(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, step: &'static str, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().map_err(|_| Error::SessionStore {
                step,
                message: "connection lock poisoned".to_string(),
            })?;
            f(&guard)
        })
        .await
        .map_err(|e| Error::Internal(format!("session store task failed: {e}")))?
    }
}

fn get_session(conn: &Connection, id: &str) -> Result<Option<Session>> {
    let row = conn
        .query_row(
            "SELECT id, file_url, created_at FROM sessions WHERE id = ?1",
            [id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            },
        )
        .optional()
        .map_err(sql_err("get"))?;

    let Some((id, archive_key, created_at)) = row else {
        return Ok(None);
    };

    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| Error::SessionStore {
            step: "get",
            message: format!("bad created_at '{created_at}' for session {id}: {e}"),
        })?
        .with_timezone(&Utc);

    Ok(Some(Session {
        id,
        archive_key,
        created_at,
    }))
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn get(&self, id: &str) -> Result<Option<Session>> {
        let id = id.to_string();
        self.with_conn("get", move |conn| get_session(conn, &id)).await
    }

    async fn insert(&self, session: &Session) -> Result<()> {
        let session = session.clone();
        self.with_conn("insert", move |conn| {
            let inserted = conn
                .execute(
                    "INSERT OR IGNORE INTO sessions (id, file_url, created_at) VALUES (?1, ?2, ?3)",
                    params![session.id, session.archive_key, session.created_at.to_rfc3339()],
                )
                .map_err(sql_err("insert"))?;

            if inserted == 1 {
                debug!("Inserted session {}", session.id);
                return Ok(());
            }

            match get_session(conn, &session.id)? {
                Some(existing) if existing.archive_key == session.archive_key => {
                    debug!("Session {} already recorded", session.id);
                    Ok(())
                }
                _ => Err(Error::SessionConflict(session.id)),
            }
        })
        .await
    }

    fn name(&self) -> &str {
        "sqlite"
    }
}

fn init_schema_version(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )
    .map_err(sql_err("migrate"))?;
    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> Result<i32> {
    init_schema_version(conn)?;

    let version = conn
        .query_row(
            "SELECT version FROM schema_version ORDER BY version DESC LIMIT 1",
            [],
            |row| row.get(0),
        )
        .optional()
        .map_err(sql_err("migrate"))?
        .unwrap_or(0);

    Ok(version)
}

/// Apply all pending migrations
pub fn migrate(conn: &Connection) -> Result<()> {
    let current_version = get_schema_version(conn)?;

    if current_version >= SCHEMA_VERSION {
        debug!("Session schema is up to date (version {})", current_version);
        return Ok(());
    }

    for version in (current_version + 1)..=SCHEMA_VERSION {
        info!("Applying session schema migration {}", version);
        match version {
            1 => migrate_v1(conn)?,
            _ => {
                return Err(Error::SessionStore {
                    step: "migrate",
                    message: format!("unknown schema version {version}"),
                });
            }
        }
        conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])
            .map_err(sql_err("migrate"))?;
    }

    Ok(())
}

/// Version 1: the sessions table
fn migrate_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE sessions (
            id TEXT PRIMARY KEY,
            file_url TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        ",
    )
    .map_err(sql_err("migrate"))?;
    Ok(())
}
