// src/storage/supabase.rs
//! Supabase storage backend
//!
//! Talks to the storage REST API (`{project}/storage/v1`) with the service
//! key. Listing uses `POST /object/list/{bucket}`, downloads
//! `GET /object/{bucket}/{key}` and uploads `POST /object/{bucket}/{key}`
//! with `x-upsert` controlling overwrite.

use super::{BlobStore, ObjectEntry, UploadOptions, public_object_url};
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CACHE_CONTROL, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Serialize;
use tracing::debug;
use url::Url;

/// Page size for listings; session prefixes hold a single object
const LIST_LIMIT: u32 = 100;

#[derive(Debug, Serialize)]
struct ListRequest<'a> {
    prefix: &'a str,
    limit: u32,
    offset: u32,
    #[serde(rename = "sortBy")]
    sort_by: SortBy,
}

#[derive(Debug, Serialize)]
struct SortBy {
    column: &'static str,
    order: &'static str,
}

/// Blob store backed by a Supabase storage bucket
pub struct SupabaseStorage {
    client: reqwest::Client,
    /// `https://<project>.supabase.co/storage/v1`, no trailing slash
    base_url: String,
    bucket: String,
}

impl SupabaseStorage {
    /// Connect to the bucket of a project
    ///
    /// `project_url` is the bare project URL; the storage path is appended.
    pub fn new(project_url: &str, bucket: &str, service_key: &str) -> Result<Self> {
        let base = Self::storage_base_url(project_url)?;
        Self::with_base_url(&base, bucket, service_key)
    }

    /// Connect using an explicit storage base URL
    pub fn with_base_url(base_url: &str, bucket: &str, service_key: &str) -> Result<Self> {
        Url::parse(base_url).map_err(|e| Error::Storage {
            step: "init",
            message: format!("invalid storage URL '{base_url}': {e}"),
        })?;

        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(service_key).map_err(|e| Error::Storage {
            step: "init",
            message: format!("invalid service key: {e}"),
        })?;
        let bearer = HeaderValue::from_str(&format!("Bearer {service_key}")).map_err(|e| {
            Error::Storage {
                step: "init",
                message: format!("invalid service key: {e}"),
            }
        })?;
        headers.insert("apikey", key);
        headers.insert(AUTHORIZATION, bearer);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Storage {
                step: "init",
                message: format!("failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            bucket: bucket.to_string(),
        })
    }

    /// `{project}/storage/v1`
    pub fn storage_base_url(project_url: &str) -> Result<String> {
        let url = Url::parse(project_url).map_err(|e| Error::Storage {
            step: "init",
            message: format!("invalid project URL '{project_url}': {e}"),
        })?;
        Ok(format!("{}/storage/v1", url.as_str().trim_end_matches('/')))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Public URL for an object in this bucket
    pub fn public_url(&self, key: &str) -> String {
        public_object_url(&self.base_url, &self.bucket, key)
    }

    fn object_url(&self, key: &str) -> String {
        format!(
            "{}/object/{}/{}",
            self.base_url,
            self.bucket,
            key.trim_start_matches('/')
        )
    }

    fn list_url(&self) -> String {
        format!("{}/object/list/{}", self.base_url, self.bucket)
    }
}

#[async_trait]
impl BlobStore for SupabaseStorage {
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectEntry>> {
        let request = ListRequest {
            prefix,
            limit: LIST_LIMIT,
            offset: 0,
            sort_by: SortBy {
                column: "name",
                order: "asc",
            },
        };

        let list_err = |message: String| Error::Storage {
            step: "list",
            message,
        };

        let response = self
            .client
            .post(self.list_url())
            .json(&request)
            .send()
            .await
            .map_err(|e| list_err(format!("{prefix}: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(list_err(format!("{prefix}: HTTP {status}: {body}")));
        }

        response
            .json::<Vec<ObjectEntry>>()
            .await
            .map_err(|e| list_err(format!("{prefix}: malformed listing: {e}")))
    }

    async fn download(&self, key: &str) -> Result<Vec<u8>> {
        let download_err = |message: String| Error::DownloadFailed {
            key: key.to_string(),
            message,
        };

        debug!("Downloading {} from bucket {}", key, self.bucket);
        let response = self
            .client
            .get(self.object_url(key))
            .send()
            .await
            .map_err(|e| download_err(e.to_string()))?;

        if !response.status().is_success() {
            return Err(download_err(format!("HTTP {}", response.status())));
        }

        let data = response
            .bytes()
            .await
            .map_err(|e| download_err(e.to_string()))?;
        Ok(data.to_vec())
    }

    async fn upload(&self, key: &str, data: Vec<u8>, options: &UploadOptions) -> Result<()> {
        let upload_err = |message: String| Error::UploadFailed {
            key: key.to_string(),
            message,
        };

        let size = data.len();
        let mut request = self
            .client
            .post(self.object_url(key))
            .header(CONTENT_TYPE, options.content_type.as_str())
            .header("x-upsert", if options.overwrite { "true" } else { "false" })
            .body(data);
        if let Some(secs) = options.cache_control_secs {
            request = request.header(CACHE_CONTROL, format!("max-age={secs}"));
        }

        let response = request
            .send()
            .await
            .map_err(|e| upload_err(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(upload_err(format!("HTTP {status}: {body}")));
        }

        debug!("Uploaded {} ({} bytes) to bucket {}", key, size, self.bucket);
        Ok(())
    }

    fn name(&self) -> &str {
        "supabase"
    }
}
