// src/storage/mod.rs
//! Blob storage for bundles, converted archives and extracted packages
//!
//! Backends implement [`BlobStore`]:
//! - [`SupabaseStorage`] - Supabase storage REST API (production)
//! - [`LocalBlobStore`] - a directory on disk (development and tests)
//!
//! Keys are path-like strings (`uploads/{session}/output.apks`). Listing is
//! one level deep, like a directory listing of the key's parent.

mod local;
mod supabase;

pub use local::LocalBlobStore;
pub use supabase::SupabaseStorage;

use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Content type for converted archives
pub const ARCHIVE_CONTENT_TYPE: &str = "application/octet-stream";

/// Content type for installable packages
pub const PACKAGE_CONTENT_TYPE: &str = "application/vnd.android.package-archive";

/// One entry of a listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectEntry {
    pub name: String,
}

/// Options for an upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOptions {
    pub content_type: String,
    /// Replace an existing object instead of failing
    pub overwrite: bool,
    /// `Cache-Control: max-age` hint in seconds
    pub cache_control_secs: Option<u64>,
}

impl UploadOptions {
    pub fn new(content_type: impl Into<String>) -> Self {
        Self {
            content_type: content_type.into(),
            overwrite: false,
            cache_control_secs: None,
        }
    }

    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn cache_control(mut self, secs: u64) -> Self {
        self.cache_control_secs = Some(secs);
        self
    }
}

/// Durable key-value blob storage
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// List the objects directly under `prefix`
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectEntry>>;

    /// Fetch an object's bytes
    async fn download(&self, key: &str) -> Result<Vec<u8>>;

    /// Store an object
    async fn upload(&self, key: &str, data: Vec<u8>, options: &UploadOptions) -> Result<()>;

    /// Name for logging
    fn name(&self) -> &str;
}

/// Split a key into its parent prefix and file name
pub fn split_key(key: &str) -> (&str, &str) {
    match key.rsplit_once('/') {
        Some((prefix, name)) => (prefix, name),
        None => ("", key),
    }
}

/// Check that `key` is listed under its parent prefix
pub async fn object_exists(store: &dyn BlobStore, key: &str) -> Result<bool> {
    let (prefix, name) = split_key(key);
    let entries = store.list(prefix).await?;
    debug!("Listed {} entries under '{}' on {}", entries.len(), prefix, store.name());
    Ok(entries.iter().any(|entry| entry.name == name))
}

/// Download with a bounded wait
///
/// On expiry the in-flight request is dropped and the call fails with
/// `DownloadTimeout`.
pub async fn download_with_timeout(
    store: &dyn BlobStore,
    key: &str,
    timeout: Duration,
) -> Result<Vec<u8>> {
    match tokio::time::timeout(timeout, store.download(key)).await {
        Ok(result) => result,
        Err(_) => Err(Error::DownloadTimeout {
            key: key.to_string(),
            timeout,
        }),
    }
}

/// Upload with a bounded wait
pub async fn upload_with_timeout(
    store: &dyn BlobStore,
    key: &str,
    data: Vec<u8>,
    options: &UploadOptions,
    timeout: Duration,
) -> Result<()> {
    match tokio::time::timeout(timeout, store.upload(key, data, options)).await {
        Ok(result) => result,
        Err(_) => Err(Error::UploadFailed {
            key: key.to_string(),
            message: format!("timed out after {}s", timeout.as_secs_f64()),
        }),
    }
}

/// Public URL of an object: `{base}/object/public/{bucket}/{key}`
pub fn public_object_url(base_url: &str, bucket: &str, key: &str) -> String {
    format!(
        "{}/object/public/{}/{}",
        base_url.trim_end_matches('/'),
        bucket,
        key.trim_start_matches('/')
    )
}
