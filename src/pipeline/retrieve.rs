// src/pipeline/retrieve.rs

//! Retrieve flow

use super::{Pipeline, extract_for_device, package_key};
use crate::device::DeviceSpec;
use crate::error::{Error, Result};
use crate::scratch::{ScratchGuard, ScratchKind};
use crate::storage::{
    PACKAGE_CONTENT_TYPE, UploadOptions, download_with_timeout, object_exists, public_object_url,
    upload_with_timeout,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, warn};

/// Location of a delivered package
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadTicket {
    pub download_url: String,
    /// Advisory; nothing deletes the object at this time
    pub expires_at: DateTime<Utc>,
    pub file_size: u64,
    pub file_name: String,
}

impl Pipeline {
    /// Deliver the package of a session's archive that best fits a device
    ///
    /// `device_spec` is validated before any lookup, download or process.
    pub async fn retrieve(&self, session_id: &str, device_spec: &Value) -> Result<DownloadTicket> {
        let spec = DeviceSpec::from_value(device_spec)
            .inspect_err(|e| log_failure(session_id, e))?;
        self.retrieve_for_device(session_id, &spec).await
    }

    /// [`retrieve`](Self::retrieve) with an already parsed spec
    pub async fn retrieve_for_device(
        &self,
        session_id: &str,
        spec: &DeviceSpec,
    ) -> Result<DownloadTicket> {
        spec.validate().inspect_err(|e| log_failure(session_id, e))?;

        let mut guard = self.scratch().guard();
        let result = self.retrieve_steps(&mut guard, session_id, spec).await;
        guard.release().await;

        if let Err(e) = &result {
            log_failure(session_id, e);
        }
        result
    }

    async fn retrieve_steps(
        &self,
        guard: &mut ScratchGuard,
        session_id: &str,
        spec: &DeviceSpec,
    ) -> Result<DownloadTicket> {
        let session = self
            .sessions
            .get(session_id)
            .await?
            .ok_or_else(|| Error::SessionNotFound(session_id.to_string()))?;

        if !object_exists(self.blobs.as_ref(), &session.archive_key).await? {
            return Err(Error::FileNotFound(session.archive_key));
        }

        let data = download_with_timeout(
            self.blobs.as_ref(),
            &session.archive_key,
            self.config.download_timeout,
        )
        .await?;

        let archive_path = guard.allocate(ScratchKind::Archive).await?;
        tokio::fs::write(&archive_path, &data).await?;
        drop(data);

        let extraction = extract_for_device(
            self.tool.as_ref(),
            self.config.diagnostics,
            guard,
            &archive_path,
            spec,
            self.config.min_package_size,
        )
        .await?;

        let key = package_key(session_id, &extraction.selected);
        let package = tokio::fs::read(&extraction.path).await?;
        let options = UploadOptions::new(PACKAGE_CONTENT_TYPE)
            .overwrite(true)
            .cache_control(self.config.cache_control.as_secs());
        upload_with_timeout(
            self.blobs.as_ref(),
            &key,
            package,
            &options,
            self.config.upload_timeout,
        )
        .await?;

        let ttl = chrono::Duration::from_std(self.config.link_ttl)
            .map_err(|e| Error::Internal(format!("link lifetime out of range: {e}")))?;

        info!("Delivered {} for session {}", key, session_id);
        Ok(DownloadTicket {
            download_url: public_object_url(&self.config.public_base_url, &self.config.bucket, &key),
            expires_at: Utc::now() + ttl,
            file_size: extraction.size,
            file_name: extraction.selected,
        })
    }
}

fn log_failure(session_id: &str, e: &Error) {
    if e.is_validation() {
        warn!("Rejected retrieve for session {}: {}", session_id, e);
    } else {
        error!("Retrieve for session {} failed: {}", session_id, e);
    }
}
