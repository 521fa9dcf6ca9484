// src/lib.rs

//! apkrelay - Android App Bundle conversion relay
//!
//! Accepts `.aab` bundles, converts them to universal APK sets with
//! bundletool, and later extracts the single APK that best fits a caller's
//! device, delivering it through blob storage.
//!
//! # Architecture
//!
//! - [`pipeline`]: ingest and retrieve flows with guaranteed scratch cleanup
//! - [`bundletool`]: the conversion tool behind a narrow trait
//! - [`storage`] / [`session`]: collaborator traits with Supabase and local
//!   backends
//! - [`selection`]: deterministic best-match package selection
//! - `server` (feature): the axum HTTP surface

pub mod bundletool;
pub mod config;
pub mod device;
mod error;
pub mod pipeline;
pub mod scratch;
pub mod selection;
pub mod session;
pub mod storage;
pub mod units;

#[cfg(feature = "server")]
pub mod server;

pub use bundletool::{Bundletool, ConversionTool, DiagnosticPolicy, ToolMode, ToolOutput};
pub use config::RelayConfig;
pub use device::DeviceSpec;
pub use error::{Error, ErrorKind, Result};
pub use pipeline::{DownloadTicket, IngestReceipt, Pipeline, PipelineConfig};
pub use scratch::{ScratchGuard, ScratchKind, ScratchSpace};
pub use selection::select_best_match;
pub use session::{Session, SessionId, SessionStore};
pub use storage::{BlobStore, ObjectEntry, UploadOptions};
pub use units::format_file_size;
