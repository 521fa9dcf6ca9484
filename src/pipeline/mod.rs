// src/pipeline/mod.rs
//! Conversion and retrieval pipeline
//!
//! Composes the conversion tool, blob store, session store and scratch space
//! into the two end-to-end flows:
//!
//! - **ingest**: bundle stream -> scratch file -> `build-apks` -> archive
//!   upload -> session record
//! - **retrieve**: session lookup -> archive existence check -> bounded
//!   download -> `extract-apks` + best-match selection -> package upload ->
//!   public link
//!
//! Steps within a flow run strictly in order. Each flow owns one
//! [`ScratchGuard`](crate::scratch::ScratchGuard) and releases it once, after
//! the outcome is known, on every exit path.

mod convert;
mod extract;
mod ingest;
mod retrieve;

pub use convert::convert_bundle;
pub use extract::{ExtractionResult, extract_for_device};
pub use ingest::IngestReceipt;
pub use retrieve::DownloadTicket;

use crate::bundletool::{ConversionTool, DiagnosticPolicy};
use crate::error::Result;
use crate::scratch::ScratchSpace;
use crate::session::SessionStore;
use crate::storage::BlobStore;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// File name of the converted archive under a session prefix
pub const ARCHIVE_FILENAME: &str = "output.apks";

/// Smallest package accepted as real extraction output (100 KiB)
pub const MIN_PACKAGE_SIZE: u64 = 100 * 1024;

/// Storage key of a session's archive: `uploads/{session}/output.apks`
pub fn archive_key(session_id: &str) -> String {
    format!("uploads/{session_id}/{ARCHIVE_FILENAME}")
}

/// Storage key of a delivered package: `downloads/{session}/{file}`
pub fn package_key(session_id: &str, file_name: &str) -> String {
    format!("downloads/{session_id}/{file_name}")
}

/// Pipeline tuning
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Root for per-invocation scratch paths
    pub scratch_dir: PathBuf,
    /// Bound on the archive download in retrieve
    pub download_timeout: Duration,
    /// Bound on each upload
    pub upload_timeout: Duration,
    /// Advisory lifetime of a delivered link
    pub link_ttl: Duration,
    /// Cache-Control max-age set on delivered packages
    pub cache_control: Duration,
    /// Selected packages below this size are rejected
    pub min_package_size: u64,
    /// Storage base URL used to compose public links
    pub public_base_url: String,
    /// Bucket holding delivered packages
    pub bucket: String,
    /// How tool output is judged
    pub diagnostics: DiagnosticPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            scratch_dir: std::env::temp_dir().join("apkrelay"),
            download_timeout: Duration::from_secs(30),
            upload_timeout: Duration::from_secs(120),
            link_ttl: Duration::from_secs(24 * 60 * 60),
            cache_control: Duration::from_secs(3600),
            min_package_size: MIN_PACKAGE_SIZE,
            public_base_url: "http://localhost:3000/storage/v1".to_string(),
            bucket: "appfiles".to_string(),
            diagnostics: DiagnosticPolicy::default(),
        }
    }
}

/// The ingest/retrieve orchestrator
///
/// Holds no per-request state; concurrent invocations share only the scratch
/// root, inside which every path is uniquely named.
pub struct Pipeline {
    config: PipelineConfig,
    tool: Arc<dyn ConversionTool>,
    blobs: Arc<dyn BlobStore>,
    sessions: Arc<dyn SessionStore>,
    scratch: ScratchSpace,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        tool: Arc<dyn ConversionTool>,
        blobs: Arc<dyn BlobStore>,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        let scratch = ScratchSpace::new(config.scratch_dir.clone());
        Self {
            config,
            tool,
            blobs,
            sessions,
            scratch,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn scratch(&self) -> &ScratchSpace {
        &self.scratch
    }

    /// Verify the conversion tool and scratch root before serving
    pub async fn startup_check(&self) -> Result<()> {
        self.tool.check().await?;
        tokio::fs::create_dir_all(&self.config.scratch_dir).await?;
        info!(
            "Pipeline ready: tool={}, blobs={}, sessions={}, scratch={}",
            self.tool.name(),
            self.blobs.name(),
            self.sessions.name(),
            self.config.scratch_dir.display()
        );
        Ok(())
    }
}
