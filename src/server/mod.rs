// src/server/mod.rs
//! apkrelay HTTP server
//!
//! Thin axum surface over the [`Pipeline`]:
//! - `POST /upload` - multipart bundle upload, returns a session id
//! - `POST /get-apk` - session id + device spec, returns a download link
//! - `GET /health`, `GET /` - liveness
//! - `GET /storage/v1/object/public/{bucket}/{key}` - public objects when the
//!   local blob store is in use
//!
//! The pipeline is checked (`startup_check`) before the listener binds.

mod handlers;
mod routes;

pub use routes::create_router;

use crate::pipeline::Pipeline;
use crate::storage::LocalBlobStore;
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,
    /// Include full error detail in failure responses
    pub development: bool,
    /// Body limit for bundle uploads in bytes
    pub max_upload_size: usize,
    /// Body limit for JSON requests in bytes
    pub max_json_size: usize,
    /// Bucket served by the local public object route
    pub bucket: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            development: false,
            max_upload_size: 500 * 1024 * 1024,
            max_json_size: 500 * 1024 * 1024,
            bucket: "appfiles".to_string(),
        }
    }
}

/// Shared server state
///
/// The pipeline keeps no per-request state, so no lock is needed.
pub struct ServerState {
    pub config: ServerConfig,
    pub pipeline: Pipeline,
    /// Set when blobs live on local disk and are served by this process
    pub local_blobs: Option<LocalBlobStore>,
}

impl ServerState {
    pub fn new(config: ServerConfig, pipeline: Pipeline) -> Self {
        Self {
            config,
            pipeline,
            local_blobs: None,
        }
    }

    /// Serve public objects from a local blob store
    pub fn with_local_blobs(mut self, store: LocalBlobStore) -> Self {
        self.local_blobs = Some(store);
        self
    }
}

/// Start the server
pub async fn run_server(state: ServerState) -> Result<()> {
    let bind_addr = state.config.bind_addr;
    tracing::info!("Starting apkrelay on {}", bind_addr);
    if state.config.development {
        tracing::info!("Development mode: error details are included in responses");
    }
    if let Some(local) = &state.local_blobs {
        tracing::info!("Serving local objects from {}", local.root().display());
    }

    state
        .pipeline
        .startup_check()
        .await
        .context("Startup check failed")?;

    let app = create_router(Arc::new(state));

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("Failed to bind {bind_addr}"))?;
    tracing::info!("apkrelay is ready to serve");

    axum::serve(listener, app).await?;
    Ok(())
}
