// src/pipeline/ingest.rs

//! Ingest flow

use super::{Pipeline, archive_key, convert_bundle};
use crate::error::{Error, Result};
use crate::scratch::{ScratchGuard, ScratchKind};
use crate::session::{Session, SessionId};
use crate::storage::{ARCHIVE_CONTENT_TYPE, UploadOptions, upload_with_timeout};
use crate::units::format_file_size;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tracing::{error, info, warn};

/// Result of a successful ingest
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReceipt {
    pub session_id: String,
    pub archive_key: String,
    pub archive_size: u64,
}

impl Pipeline {
    /// Convert an inbound bundle stream and register a session for it
    ///
    /// The session record is written last, so a failed upload leaves no
    /// session behind.
    pub async fn ingest<R>(&self, bundle: R) -> Result<IngestReceipt>
    where
        R: AsyncRead + Unpin + Send,
    {
        let mut guard = self.scratch().guard();
        let result = self.ingest_steps(&mut guard, bundle).await;
        guard.release().await;

        match &result {
            Err(e) if e.is_validation() => warn!("Ingest rejected: {}", e),
            Err(e) => error!("Ingest failed: {}", e),
            Ok(_) => {}
        }
        result
    }

    async fn ingest_steps<R>(&self, guard: &mut ScratchGuard, mut bundle: R) -> Result<IngestReceipt>
    where
        R: AsyncRead + Unpin + Send,
    {
        let bundle_path = guard.allocate(ScratchKind::Bundle).await?;
        let mut file = tokio::fs::File::create(&bundle_path).await?;
        let received = tokio::io::copy(&mut bundle, &mut file).await?;
        file.flush().await?;
        drop(file);

        if received == 0 {
            return Err(Error::InputMissing(bundle_path));
        }
        info!("Received bundle ({})", format_file_size(received));

        let archive_path = guard.allocate(ScratchKind::Archive).await?;
        let archive_size = convert_bundle(
            self.tool.as_ref(),
            self.config.diagnostics,
            &bundle_path,
            &archive_path,
        )
        .await?;

        let session_id = SessionId::generate().into_string();
        let key = archive_key(&session_id);
        let data = tokio::fs::read(&archive_path).await?;
        upload_with_timeout(
            self.blobs.as_ref(),
            &key,
            data,
            &UploadOptions::new(ARCHIVE_CONTENT_TYPE),
            self.config.upload_timeout,
        )
        .await?;

        self.sessions.insert(&Session::new(&session_id, &key)).await?;
        info!("Session {} created for {}", session_id, key);

        Ok(IngestReceipt {
            session_id,
            archive_key: key,
            archive_size,
        })
    }
}
