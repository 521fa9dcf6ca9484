// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.
//!
//! `FakeTool` stands in for bundletool with canned output, and the blob and
//! session store wrappers inject faults at chosen steps.

#![allow(dead_code)]

use apkrelay::pipeline::{Pipeline, PipelineConfig};
use apkrelay::session::SqliteSessionStore;
use apkrelay::storage::LocalBlobStore;
use apkrelay::{
    BlobStore, ConversionTool, Error, ObjectEntry, Result, Session, SessionStore, ToolOutput,
    UploadOptions,
};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Default size of fake packages, above the 100 KiB floor
pub const PACKAGE_SIZE: usize = 150 * 1024;

/// Canned behaviour of [`FakeTool`]
#[derive(Debug, Clone)]
pub struct ToolScript {
    pub build_stderr: String,
    /// Write the archive on build
    pub build_writes_output: bool,
    pub extract_stderr: String,
    pub extract_exit_code: i32,
    /// Files written into the extraction output directory
    pub packages: Vec<(String, usize)>,
}

impl Default for ToolScript {
    fn default() -> Self {
        Self {
            build_stderr: String::new(),
            build_writes_output: true,
            extract_stderr: String::new(),
            extract_exit_code: 0,
            packages: vec![
                ("app-arm64-v8a.apk".to_string(), PACKAGE_SIZE),
                ("app-universal.apk".to_string(), PACKAGE_SIZE),
            ],
        }
    }
}

/// Conversion tool double returning canned output
#[derive(Default)]
pub struct FakeTool {
    script: Mutex<ToolScript>,
    pub build_calls: AtomicUsize,
    pub extract_calls: AtomicUsize,
    last_spec: Mutex<Option<Value>>,
}

impl FakeTool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adjust the canned behaviour
    pub fn script(&self, f: impl FnOnce(&mut ToolScript)) {
        f(&mut self.script.lock().unwrap());
    }

    pub fn with_packages(self, packages: &[(&str, usize)]) -> Self {
        self.script(|s| {
            s.packages = packages
                .iter()
                .map(|(name, size)| (name.to_string(), *size))
                .collect()
        });
        self
    }

    pub fn builds(&self) -> usize {
        self.build_calls.load(Ordering::SeqCst)
    }

    pub fn extractions(&self) -> usize {
        self.extract_calls.load(Ordering::SeqCst)
    }

    /// The device spec document seen by the last extraction
    pub fn last_spec(&self) -> Option<Value> {
        self.last_spec.lock().unwrap().clone()
    }
}

#[async_trait]
impl ConversionTool for FakeTool {
    async fn build(&self, bundle: &Path, output: &Path) -> Result<ToolOutput> {
        self.build_calls.fetch_add(1, Ordering::SeqCst);
        let script = self.script.lock().unwrap().clone();

        let bundle = tokio::fs::read(bundle).await?;
        if script.build_writes_output {
            let mut archive = b"APKS:".to_vec();
            archive.extend_from_slice(&bundle);
            tokio::fs::write(output, archive).await?;
        }
        Ok(ToolOutput::success("", script.build_stderr))
    }

    async fn extract(
        &self,
        archive: &Path,
        output_dir: &Path,
        device_spec: &Path,
    ) -> Result<ToolOutput> {
        self.extract_calls.fetch_add(1, Ordering::SeqCst);
        let script = self.script.lock().unwrap().clone();

        tokio::fs::metadata(archive).await?;
        let document = tokio::fs::read(device_spec).await?;
        let spec: Value = serde_json::from_slice(&document)
            .map_err(|e| Error::Internal(format!("bad spec document: {e}")))?;
        *self.last_spec.lock().unwrap() = Some(spec);

        for (name, size) in &script.packages {
            tokio::fs::write(output_dir.join(name), vec![0x5a; *size]).await?;
        }

        Ok(ToolOutput {
            exit_code: Some(script.extract_exit_code),
            stdout: String::new(),
            stderr: script.extract_stderr,
        })
    }

    fn name(&self) -> &str {
        "fake-bundletool"
    }
}

/// Faults injected by [`FaultyBlobStore`]
#[derive(Debug, Clone, Default)]
pub struct BlobFaults {
    pub fail_list: bool,
    pub fail_download: bool,
    /// Hold downloads for this long before answering
    pub stall_download: Option<Duration>,
    /// Fail uploads whose key starts with this prefix
    pub fail_upload_prefix: Option<String>,
}

/// Local blob store with fault injection
pub struct FaultyBlobStore {
    pub inner: LocalBlobStore,
    faults: Mutex<BlobFaults>,
}

impl FaultyBlobStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            inner: LocalBlobStore::new(root),
            faults: Mutex::new(BlobFaults::default()),
        }
    }

    pub fn faults(&self, f: impl FnOnce(&mut BlobFaults)) {
        f(&mut self.faults.lock().unwrap());
    }

    pub fn clear_faults(&self) {
        *self.faults.lock().unwrap() = BlobFaults::default();
    }

    fn current(&self) -> BlobFaults {
        self.faults.lock().unwrap().clone()
    }
}

#[async_trait]
impl BlobStore for FaultyBlobStore {
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectEntry>> {
        if self.current().fail_list {
            return Err(Error::Storage {
                step: "list",
                message: "injected list failure".to_string(),
            });
        }
        self.inner.list(prefix).await
    }

    async fn download(&self, key: &str) -> Result<Vec<u8>> {
        let faults = self.current();
        if let Some(stall) = faults.stall_download {
            tokio::time::sleep(stall).await;
        }
        if faults.fail_download {
            return Err(Error::DownloadFailed {
                key: key.to_string(),
                message: "injected download failure".to_string(),
            });
        }
        self.inner.download(key).await
    }

    async fn upload(&self, key: &str, data: Vec<u8>, options: &UploadOptions) -> Result<()> {
        if let Some(prefix) = self.current().fail_upload_prefix
            && key.starts_with(&prefix)
        {
            return Err(Error::UploadFailed {
                key: key.to_string(),
                message: "injected upload failure".to_string(),
            });
        }
        self.inner.upload(key, data, options).await
    }

    fn name(&self) -> &str {
        "faulty-local"
    }
}

/// SQLite session store that counts calls and can fail lookups
pub struct CountingSessionStore {
    inner: SqliteSessionStore,
    pub gets: AtomicUsize,
    pub inserts: AtomicUsize,
    fail_get: Mutex<bool>,
}

impl CountingSessionStore {
    pub fn new() -> Self {
        Self {
            inner: SqliteSessionStore::in_memory().unwrap(),
            gets: AtomicUsize::new(0),
            inserts: AtomicUsize::new(0),
            fail_get: Mutex::new(false),
        }
    }

    pub fn fail_get(&self, fail: bool) {
        *self.fail_get.lock().unwrap() = fail;
    }
}

#[async_trait]
impl SessionStore for CountingSessionStore {
    async fn get(&self, id: &str) -> Result<Option<Session>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if *self.fail_get.lock().unwrap() {
            return Err(Error::SessionStore {
                step: "get",
                message: "injected lookup failure".to_string(),
            });
        }
        self.inner.get(id).await
    }

    async fn insert(&self, session: &Session) -> Result<()> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        self.inner.insert(session).await
    }

    fn name(&self) -> &str {
        "counting-sqlite"
    }
}

/// A pipeline wired to fakes under one temp directory
pub struct Harness {
    pub temp: TempDir,
    pub tool: Arc<FakeTool>,
    pub blobs: Arc<FaultyBlobStore>,
    pub sessions: Arc<CountingSessionStore>,
    pub pipeline: Pipeline,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_tool(FakeTool::new())
    }

    pub fn with_tool(tool: FakeTool) -> Self {
        Self::with_config(tool, |_| {})
    }

    pub fn with_config(tool: FakeTool, configure: impl FnOnce(&mut PipelineConfig)) -> Self {
        let temp = TempDir::new().unwrap();
        let mut config = PipelineConfig {
            scratch_dir: temp.path().join("scratch"),
            public_base_url: "https://proj.supabase.co/storage/v1".to_string(),
            ..Default::default()
        };
        configure(&mut config);

        let tool = Arc::new(tool);
        let blobs = Arc::new(FaultyBlobStore::new(temp.path().join("blobs")));
        let sessions = Arc::new(CountingSessionStore::new());
        let pipeline = Pipeline::new(config, tool.clone(), blobs.clone(), sessions.clone());

        Self {
            temp,
            tool,
            blobs,
            sessions,
            pipeline,
        }
    }

    pub fn scratch_dir(&self) -> PathBuf {
        self.temp.path().join("scratch")
    }

    /// Entries left under the scratch root
    pub fn scratch_entries(&self) -> Vec<PathBuf> {
        match std::fs::read_dir(self.scratch_dir()) {
            Ok(entries) => entries.map(|e| e.unwrap().path()).collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn assert_scratch_clean(&self) {
        let left = self.scratch_entries();
        assert!(left.is_empty(), "scratch paths left behind: {left:?}");
    }

    /// Path of a blob on disk
    pub fn blob_path(&self, key: &str) -> PathBuf {
        self.temp.path().join("blobs").join(key)
    }

    /// Ingest a small bundle and return the session id
    pub async fn ingest_bundle(&self) -> String {
        let bundle: &[u8] = b"PK\x03\x04 fake bundle";
        self.pipeline.ingest(bundle).await.unwrap().session_id
    }
}

/// A device spec document
pub fn device_spec(abis: &[&str]) -> Value {
    json!({
        "sdkVersion": "33",
        "supportedAbis": abis,
        "screenDensity": 420,
    })
}
