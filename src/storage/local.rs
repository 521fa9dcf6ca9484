// src/storage/local.rs

//! Directory-backed blob store
//!
//! Keys map to files under the root. Writes go through a temp file and a
//! rename so readers never see a partial object.

use super::{BlobStore, ObjectEntry, UploadOptions};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

/// Blob store rooted at a local directory
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a key to a path, rejecting traversal
    fn object_path(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(Error::Storage {
                step: "resolve key",
                message: format!("invalid object key '{key}'"),
            });
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectEntry>> {
        let dir = self.object_path(prefix)?;
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(Error::Storage {
                    step: "list",
                    message: format!("{}: {e}", dir.display()),
                });
            }
        };

        let mut listed = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if let Some(name) = entry.file_name().to_str() {
                if name.ends_with(".tmp") {
                    continue;
                }
                listed.push(ObjectEntry {
                    name: name.to_string(),
                });
            }
        }
        listed.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(listed)
    }

    async fn download(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.object_path(key)?;
        tokio::fs::read(&path).await.map_err(|e| Error::DownloadFailed {
            key: key.to_string(),
            message: e.to_string(),
        })
    }

    async fn upload(&self, key: &str, data: Vec<u8>, options: &UploadOptions) -> Result<()> {
        let path = self.object_path(key)?;
        let upload_err = |message: String| Error::UploadFailed {
            key: key.to_string(),
            message,
        };

        if !options.overwrite && tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Err(upload_err("object already exists".to_string()));
        }

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| upload_err(e.to_string()))?;
        }

        // one temp file per writer, so concurrent uploads of a key never share it
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| upload_err("object key has no file name".to_string()))?;
        let temp_path = path.with_file_name(format!(
            ".{}.{}.tmp",
            file_name,
            Uuid::new_v4().simple()
        ));
        tokio::fs::write(&temp_path, &data)
            .await
            .map_err(|e| upload_err(e.to_string()))?;
        if let Err(e) = tokio::fs::rename(&temp_path, &path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(upload_err(e.to_string()));
        }

        debug!("Stored {} ({} bytes, {})", key, data.len(), options.content_type);
        Ok(())
    }

    fn name(&self) -> &str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::storage::{ARCHIVE_CONTENT_TYPE, object_exists};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_upload_list_download() {
        let temp = TempDir::new().unwrap();
        let store = LocalBlobStore::new(temp.path());
        let options = UploadOptions::new(ARCHIVE_CONTENT_TYPE);

        store
            .upload("uploads/s1/output.apks", b"apks".to_vec(), &options)
            .await
            .unwrap();

        let listed = store.list("uploads/s1").await.unwrap();
        assert_eq!(listed, vec![ObjectEntry { name: "output.apks".into() }]);
        assert!(object_exists(&store, "uploads/s1/output.apks").await.unwrap());
        assert_eq!(store.download("uploads/s1/output.apks").await.unwrap(), b"apks");
    }

    #[tokio::test]
    async fn test_upload_without_overwrite_rejects_existing() {
        let temp = TempDir::new().unwrap();
        let store = LocalBlobStore::new(temp.path());
        let options = UploadOptions::new(ARCHIVE_CONTENT_TYPE);

        store.upload("a/b.apk", b"one".to_vec(), &options).await.unwrap();
        let err = store.upload("a/b.apk", b"two".to_vec(), &options).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UploadFailed);

        store
            .upload("a/b.apk", b"two".to_vec(), &options.clone().overwrite(true))
            .await
            .unwrap();
        assert_eq!(store.download("a/b.apk").await.unwrap(), b"two");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_overwrites_of_one_key() {
        let temp = TempDir::new().unwrap();
        let store = LocalBlobStore::new(temp.path());
        let options = UploadOptions::new(ARCHIVE_CONTENT_TYPE).overwrite(true);
        let data = vec![0x5a; 4 * 1024 * 1024];

        for _ in 0..10 {
            let writers: Vec<_> = (0..2)
                .map(|_| {
                    let store = store.clone();
                    let data = data.clone();
                    let options = options.clone();
                    tokio::spawn(async move {
                        store.upload("downloads/s1/app.apk", data, &options).await
                    })
                })
                .collect();
            for writer in writers {
                writer.await.unwrap().unwrap();
            }
        }

        assert_eq!(store.download("downloads/s1/app.apk").await.unwrap(), data);
        let names: Vec<_> = std::fs::read_dir(temp.path().join("downloads/s1"))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("app.apk")]);
    }

    #[tokio::test]
    async fn test_missing_prefix_lists_empty() {
        let temp = TempDir::new().unwrap();
        let store = LocalBlobStore::new(temp.path());
        assert!(store.list("uploads/nothing").await.unwrap().is_empty());

        let err = store.download("uploads/nothing/output.apks").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DownloadFailed);
    }

    #[test]
    fn test_rejects_traversal() {
        let store = LocalBlobStore::new("/srv/blobs");
        assert!(store.object_path("../etc/passwd").is_err());
        assert!(store.object_path("uploads/../../x").is_err());
        assert_eq!(
            store.object_path("/uploads/s1/output.apks").unwrap(),
            PathBuf::from("/srv/blobs/uploads/s1/output.apks")
        );
    }
}
