// src/config.rs
//! Configuration file parsing for apkrelay
//!
//! Supports TOML configuration files with the following sections:
//! - [server] - Bind address, development mode, request size limits
//! - [storage] - Blob store backend (Supabase storage or a local directory)
//! - [sessions] - Session store backend (SQLite or the Supabase REST API)
//! - [bundletool] - How to launch bundletool, output ceilings, diagnostics
//! - [pipeline] - Scratch root, timeouts, link lifetime, package size floor
//!
//! Environment variables `PORT`, `SUPABASE_URL`, `SUPABASE_KEY` and
//! `APKRELAY_ENV` override the file after loading.

use crate::bundletool::{Bundletool, DEFAULT_JAR, DiagnosticPolicy};
use crate::pipeline::{Pipeline, PipelineConfig};
use crate::session::{RestSessionStore, SessionStore, SqliteSessionStore};
use crate::storage::{BlobStore, LocalBlobStore, SupabaseStorage};
use crate::units::{parse_duration, parse_size};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// TOML configuration file structure
#[derive(Debug, Default, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub storage: StorageSection,

    #[serde(default)]
    pub sessions: SessionsSection,

    #[serde(default)]
    pub bundletool: BundletoolSection,

    #[serde(default)]
    pub pipeline: PipelineSection,
}

/// Server configuration section
#[derive(Debug, Deserialize)]
pub struct ServerSection {
    /// Bind address
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Include full error chains in failure responses
    #[serde(default)]
    pub development: bool,

    /// Largest accepted bundle upload (e.g., "500MB")
    #[serde(default = "default_body_limit")]
    pub max_upload_size: String,

    /// Largest accepted JSON body
    #[serde(default = "default_body_limit")]
    pub max_json_size: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            development: false,
            max_upload_size: default_body_limit(),
            max_json_size: default_body_limit(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_body_limit() -> String {
    "500MB".to_string()
}

/// Blob store backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Supabase,
    #[default]
    Local,
}

/// Storage configuration section
#[derive(Debug, Deserialize)]
pub struct StorageSection {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Supabase project URL
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default = "default_bucket")]
    pub bucket: String,

    /// Supabase service key
    #[serde(default)]
    pub service_key: Option<String>,

    /// Root directory for the local backend
    #[serde(default = "default_local_root")]
    pub local_root: PathBuf,

    /// Base of public links, defaults to `{url}/storage/v1`
    #[serde(default)]
    pub public_base_url: Option<String>,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            url: None,
            bucket: default_bucket(),
            service_key: None,
            local_root: default_local_root(),
            public_base_url: None,
        }
    }
}

fn default_bucket() -> String {
    "appfiles".to_string()
}

fn default_local_root() -> PathBuf {
    PathBuf::from("/var/lib/apkrelay/storage")
}

/// Session store backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionBackend {
    #[default]
    Sqlite,
    Supabase,
}

/// Sessions configuration section
#[derive(Debug, Deserialize)]
pub struct SessionsSection {
    #[serde(default)]
    pub backend: SessionBackend,

    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Table name for the Supabase backend
    #[serde(default = "default_table")]
    pub table: String,
}

impl Default for SessionsSection {
    fn default() -> Self {
        Self {
            backend: SessionBackend::default(),
            db_path: default_db_path(),
            table: default_table(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("/var/lib/apkrelay/sessions.db")
}

fn default_table() -> String {
    "sessions".to_string()
}

/// bundletool configuration section
#[derive(Debug, Deserialize)]
pub struct BundletoolSection {
    #[serde(default = "default_java")]
    pub java: PathBuf,

    #[serde(default = "default_jar")]
    pub jar: PathBuf,

    /// Standalone launcher used instead of `java -jar`
    #[serde(default)]
    pub command: Option<PathBuf>,

    #[serde(default = "default_build_output_limit")]
    pub build_output_limit: String,

    #[serde(default = "default_extract_output_limit")]
    pub extract_output_limit: String,

    /// Judge success by exit status alone
    #[serde(default)]
    pub trust_exit_status: bool,
}

impl Default for BundletoolSection {
    fn default() -> Self {
        Self {
            java: default_java(),
            jar: default_jar(),
            command: None,
            build_output_limit: default_build_output_limit(),
            extract_output_limit: default_extract_output_limit(),
            trust_exit_status: false,
        }
    }
}

fn default_java() -> PathBuf {
    PathBuf::from("java")
}

fn default_jar() -> PathBuf {
    PathBuf::from(DEFAULT_JAR)
}

fn default_build_output_limit() -> String {
    "50MB".to_string()
}

fn default_extract_output_limit() -> String {
    "100MB".to_string()
}

/// Pipeline configuration section
#[derive(Debug, Deserialize)]
pub struct PipelineSection {
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,

    #[serde(default = "default_download_timeout")]
    pub download_timeout: String,

    #[serde(default = "default_upload_timeout")]
    pub upload_timeout: String,

    /// Advisory lifetime of delivered links
    #[serde(default = "default_link_ttl")]
    pub link_ttl: String,

    /// Cache-Control max-age of delivered packages
    #[serde(default = "default_cache_control")]
    pub cache_control: String,

    #[serde(default = "default_min_package_size")]
    pub min_package_size: String,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            scratch_dir: default_scratch_dir(),
            download_timeout: default_download_timeout(),
            upload_timeout: default_upload_timeout(),
            link_ttl: default_link_ttl(),
            cache_control: default_cache_control(),
            min_package_size: default_min_package_size(),
        }
    }
}

fn default_scratch_dir() -> PathBuf {
    std::env::temp_dir().join("apkrelay")
}

fn default_download_timeout() -> String {
    "30s".to_string()
}

fn default_upload_timeout() -> String {
    "2m".to_string()
}

fn default_link_ttl() -> String {
    "24h".to_string()
}

fn default_cache_control() -> String {
    "1h".to_string()
}

fn default_min_package_size() -> String {
    "100KB".to_string()
}

impl RelayConfig {
    /// Load configuration from a TOML file and apply the environment
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config: RelayConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Defaults plus the environment, for running without a file
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides read through `lookup`
    ///
    /// Supabase credentials switch both backends to Supabase.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT") {
            let host = self
                .server
                .bind
                .rsplit_once(':')
                .map(|(host, _)| host.to_string())
                .unwrap_or_else(|| "0.0.0.0".to_string());
            self.server.bind = format!("{host}:{port}");
        }

        if let Some(url) = lookup("SUPABASE_URL") {
            self.storage.url = Some(url);
            self.storage.backend = StorageBackend::Supabase;
            self.sessions.backend = SessionBackend::Supabase;
        }

        if let Some(key) = lookup("SUPABASE_KEY") {
            self.storage.service_key = Some(key);
        }

        if lookup("APKRELAY_ENV").is_some_and(|env| env == "development") {
            self.server.development = true;
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.server
            .bind
            .parse::<SocketAddr>()
            .with_context(|| format!("Invalid server.bind address: {}", self.server.bind))?;

        parse_size(&self.server.max_upload_size).context("Invalid server.max_upload_size")?;
        parse_size(&self.server.max_json_size).context("Invalid server.max_json_size")?;
        parse_size(&self.bundletool.build_output_limit)
            .context("Invalid bundletool.build_output_limit")?;
        parse_size(&self.bundletool.extract_output_limit)
            .context("Invalid bundletool.extract_output_limit")?;
        parse_size(&self.pipeline.min_package_size).context("Invalid pipeline.min_package_size")?;

        for (name, value) in [
            ("pipeline.download_timeout", &self.pipeline.download_timeout),
            ("pipeline.upload_timeout", &self.pipeline.upload_timeout),
            ("pipeline.link_ttl", &self.pipeline.link_ttl),
            ("pipeline.cache_control", &self.pipeline.cache_control),
        ] {
            parse_duration(value).with_context(|| format!("Invalid {name}: {value}"))?;
        }

        let uses_supabase = self.storage.backend == StorageBackend::Supabase
            || self.sessions.backend == SessionBackend::Supabase;
        if uses_supabase {
            if self.storage.url.is_none() {
                anyhow::bail!("storage.url (or SUPABASE_URL) is required for the supabase backend");
            }
            if self.storage.service_key.is_none() {
                anyhow::bail!(
                    "storage.service_key (or SUPABASE_KEY) is required for the supabase backend"
                );
            }
        }

        if self.storage.bucket.is_empty() {
            anyhow::bail!("storage.bucket must not be empty");
        }

        Ok(())
    }

    /// Convert to the internal ServerConfig structure
    #[cfg(feature = "server")]
    pub fn to_server_config(&self) -> Result<crate::server::ServerConfig> {
        Ok(crate::server::ServerConfig {
            bind_addr: self.server.bind.parse()?,
            development: self.server.development,
            max_upload_size: parse_size(&self.server.max_upload_size)? as usize,
            max_json_size: parse_size(&self.server.max_json_size)? as usize,
            bucket: self.storage.bucket.clone(),
        })
    }

    /// Base URL used to compose public links
    pub fn public_base_url(&self) -> Result<String> {
        if let Some(base) = &self.storage.public_base_url {
            return Ok(base.trim_end_matches('/').to_string());
        }
        match (&self.storage.backend, &self.storage.url) {
            (StorageBackend::Supabase, Some(url)) => Ok(SupabaseStorage::storage_base_url(url)?),
            _ => {
                let addr: SocketAddr = self.server.bind.parse()?;
                let host = if addr.ip().is_unspecified() {
                    "localhost".to_string()
                } else {
                    addr.ip().to_string()
                };
                Ok(format!("http://{host}:{}/storage/v1", addr.port()))
            }
        }
    }

    /// Pipeline settings derived from the file
    pub fn pipeline_config(&self) -> Result<PipelineConfig> {
        Ok(PipelineConfig {
            scratch_dir: self.pipeline.scratch_dir.clone(),
            download_timeout: parse_duration(&self.pipeline.download_timeout)?,
            upload_timeout: parse_duration(&self.pipeline.upload_timeout)?,
            link_ttl: parse_duration(&self.pipeline.link_ttl)?,
            cache_control: parse_duration(&self.pipeline.cache_control)?,
            min_package_size: parse_size(&self.pipeline.min_package_size)?,
            public_base_url: self.public_base_url()?,
            bucket: self.storage.bucket.clone(),
            diagnostics: DiagnosticPolicy {
                trust_exit_status: self.bundletool.trust_exit_status,
            },
        })
    }

    /// The configured bundletool launcher
    pub fn bundletool(&self) -> Result<Bundletool> {
        let tool = match &self.bundletool.command {
            Some(command) => Bundletool::command(command.clone()),
            None => Bundletool::jar(self.bundletool.java.clone(), self.bundletool.jar.clone()),
        };
        Ok(tool.with_output_limits(
            parse_size(&self.bundletool.build_output_limit)? as usize,
            parse_size(&self.bundletool.extract_output_limit)? as usize,
        ))
    }

    /// The local blob store, when that backend is selected
    pub fn local_blob_store(&self) -> Option<LocalBlobStore> {
        match self.storage.backend {
            StorageBackend::Local => Some(LocalBlobStore::new(&self.storage.local_root)),
            StorageBackend::Supabase => None,
        }
    }

    /// The configured blob store
    pub fn blob_store(&self) -> Result<Arc<dyn BlobStore>> {
        if let Some(local) = self.local_blob_store() {
            return Ok(Arc::new(local));
        }
        let (url, key) = self.supabase_credentials()?;
        Ok(Arc::new(SupabaseStorage::new(url, &self.storage.bucket, key)?))
    }

    /// The configured session store
    pub fn session_store(&self) -> Result<Arc<dyn SessionStore>> {
        match self.sessions.backend {
            SessionBackend::Sqlite => Ok(Arc::new(
                SqliteSessionStore::open(&self.sessions.db_path).with_context(|| {
                    format!("Failed to open session database {}", self.sessions.db_path.display())
                })?,
            )),
            SessionBackend::Supabase => {
                let (url, key) = self.supabase_credentials()?;
                Ok(Arc::new(RestSessionStore::new(url, &self.sessions.table, key)?))
            }
        }
    }

    /// Assemble the pipeline from every configured component
    pub fn build_pipeline(&self) -> Result<Pipeline> {
        Ok(Pipeline::new(
            self.pipeline_config()?,
            Arc::new(self.bundletool()?),
            self.blob_store()?,
            self.session_store()?,
        ))
    }

    fn supabase_credentials(&self) -> Result<(&str, &str)> {
        let url = self
            .storage
            .url
            .as_deref()
            .context("storage.url is not configured")?;
        let key = self
            .storage
            .service_key
            .as_deref()
            .context("storage.service_key is not configured")?;
        Ok((url, key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = RelayConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.bind, "0.0.0.0:3000");
        assert_eq!(config.storage.bucket, "appfiles");
        assert_eq!(config.storage.backend, StorageBackend::Local);
        assert_eq!(config.sessions.backend, SessionBackend::Sqlite);
    }

    #[test]
    fn test_default_pipeline_config() {
        let pipeline = RelayConfig::default().pipeline_config().unwrap();
        assert_eq!(pipeline.download_timeout, Duration::from_secs(30));
        assert_eq!(pipeline.upload_timeout, Duration::from_secs(120));
        assert_eq!(pipeline.link_ttl, Duration::from_secs(86_400));
        assert_eq!(pipeline.cache_control, Duration::from_secs(3600));
        assert_eq!(pipeline.min_package_size, 100 * 1024);
        assert_eq!(pipeline.public_base_url, "http://localhost:3000/storage/v1");
    }

    #[test]
    fn test_parse_toml() {
        let toml_str = r#"
[server]
bind = "127.0.0.1:8080"
development = true
max_upload_size = "1GB"

[storage]
backend = "supabase"
url = "https://proj.supabase.co"
service_key = "secret"
bucket = "apps"

[sessions]
backend = "supabase"
table = "relay_sessions"

[bundletool]
command = "/usr/bin/bundletool"
trust_exit_status = true

[pipeline]
download_timeout = "45s"
min_package_size = "200KB"
"#;
        let config: RelayConfig = toml::from_str(toml_str).unwrap();
        assert!(config.validate().is_ok());
        assert!(config.server.development);
        assert_eq!(config.sessions.table, "relay_sessions");

        let pipeline = config.pipeline_config().unwrap();
        assert_eq!(pipeline.download_timeout, Duration::from_secs(45));
        assert_eq!(pipeline.min_package_size, 200 * 1024);
        assert_eq!(pipeline.bucket, "apps");
        assert_eq!(pipeline.public_base_url, "https://proj.supabase.co/storage/v1");
        assert!(pipeline.diagnostics.trust_exit_status);

        let tool = config.bundletool().unwrap();
        assert_eq!(
            tool.launcher(),
            &crate::bundletool::Launcher::Command(PathBuf::from("/usr/bin/bundletool"))
        );
    }

    #[test]
    fn test_supabase_requires_credentials() {
        let toml_str = r#"
[storage]
backend = "supabase"
url = "https://proj.supabase.co"
"#;
        let config: RelayConfig = toml::from_str(toml_str).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let config: RelayConfig = toml::from_str("[server]\nbind = \"nowhere\"\n").unwrap();
        assert!(config.validate().is_err());

        let config: RelayConfig =
            toml::from_str("[pipeline]\ndownload_timeout = \"soon\"\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = RelayConfig::default();
        config.apply_env(env(&[
            ("PORT", "8088"),
            ("SUPABASE_URL", "https://proj.supabase.co"),
            ("SUPABASE_KEY", "secret"),
            ("APKRELAY_ENV", "development"),
        ]));

        assert_eq!(config.server.bind, "0.0.0.0:8088");
        assert_eq!(config.storage.backend, StorageBackend::Supabase);
        assert_eq!(config.sessions.backend, SessionBackend::Supabase);
        assert_eq!(config.storage.service_key.as_deref(), Some("secret"));
        assert!(config.server.development);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_production_env_is_not_development() {
        let mut config = RelayConfig::default();
        config.apply_env(env(&[("APKRELAY_ENV", "production")]));
        assert!(!config.server.development);
    }

    #[test]
    fn test_public_base_url_override() {
        let mut config = RelayConfig::default();
        config.storage.public_base_url = Some("https://cdn.example.com/storage/v1/".to_string());
        assert_eq!(
            config.public_base_url().unwrap(),
            "https://cdn.example.com/storage/v1"
        );
    }
}
