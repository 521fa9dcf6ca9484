// src/error.rs

//! Error types for the apkrelay pipeline
//!
//! Every variant maps onto one [`ErrorKind`], the machine-readable code that
//! callers see. `Display` carries the full detail (paths, tool diagnostics,
//! collaborator messages) for logs; [`Error::summary`] is the caller-facing
//! message and never contains filesystem paths or raw tool output.

use std::path::PathBuf;
use std::time::Duration;
use strum_macros::{AsRefStr, Display, IntoStaticStr};
use thiserror::Error;

use crate::bundletool::ToolMode;

/// Result type alias using the crate's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Machine-readable failure taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    InputMissing,
    InvalidDeviceSpec,
    SessionNotFound,
    FileNotFound,
    DownloadFailed,
    ConversionFailed,
    NoMatchingPackage,
    InvalidOutput,
    UploadFailed,
    InternalError,
}

impl ErrorKind {
    /// Snake-case code used in API responses
    pub fn code(&self) -> &'static str {
        self.into()
    }
}

/// Errors raised by the conversion and retrieval pipeline
#[derive(Error, Debug)]
pub enum Error {
    #[error("Input file not found: {}", .0.display())]
    InputMissing(PathBuf),

    #[error("Invalid device spec: {0}")]
    InvalidDeviceSpec(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("File not found in storage: {0}")]
    FileNotFound(String),

    #[error("Download of {key} failed: {message}")]
    DownloadFailed { key: String, message: String },

    #[error("Download of {key} timed out after {}s", .timeout.as_secs_f64())]
    DownloadTimeout { key: String, timeout: Duration },

    #[error("Conversion failed: {0}")]
    ConversionFailed(String),

    #[error("bundletool {mode} failed: {message}")]
    ToolFailed { mode: ToolMode, message: String },

    #[error("Conversion tool not available: {0}")]
    ToolNotFound(String),

    #[error("No package matches device ABIs {abis:?} (candidates: {candidates:?})")]
    NoMatchingPackage {
        abis: Vec<String>,
        candidates: Vec<String>,
    },

    #[error("Invalid output {}: {reason}", .path.display())]
    InvalidOutput { path: PathBuf, reason: String },

    #[error("Upload of {key} failed: {message}")]
    UploadFailed { key: String, message: String },

    #[error("Storage error during {step}: {message}")]
    Storage { step: &'static str, message: String },

    #[error("Session store error during {step}: {message}")]
    SessionStore { step: &'static str, message: String },

    #[error("Session {0} already exists with a different archive")]
    SessionConflict(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// The taxonomy bucket this error belongs to
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InputMissing(_) => ErrorKind::InputMissing,
            Self::InvalidDeviceSpec(_) => ErrorKind::InvalidDeviceSpec,
            Self::SessionNotFound(_) => ErrorKind::SessionNotFound,
            Self::FileNotFound(_) => ErrorKind::FileNotFound,
            Self::DownloadFailed { .. } | Self::DownloadTimeout { .. } => ErrorKind::DownloadFailed,
            Self::ConversionFailed(_) | Self::ToolFailed { .. } => ErrorKind::ConversionFailed,
            Self::NoMatchingPackage { .. } => ErrorKind::NoMatchingPackage,
            Self::InvalidOutput { .. } => ErrorKind::InvalidOutput,
            Self::UploadFailed { .. } => ErrorKind::UploadFailed,
            Self::Storage { .. }
            | Self::SessionStore { .. }
            | Self::SessionConflict(_)
            | Self::ToolNotFound(_)
            | Self::Io(_)
            | Self::Internal(_) => ErrorKind::InternalError,
        }
    }

    /// Caller-facing message without paths or tool diagnostics
    pub fn summary(&self) -> String {
        match self {
            Self::InputMissing(_) => "Input bundle is missing".to_string(),
            Self::InvalidDeviceSpec(reason) => format!("Invalid device spec: {reason}"),
            Self::SessionNotFound(_) => "Session not found, please upload the file again".to_string(),
            Self::FileNotFound(_) => "The converted archive is no longer in storage".to_string(),
            Self::DownloadFailed { .. } => "Failed to download the archive from storage".to_string(),
            Self::DownloadTimeout { timeout, .. } => format!(
                "Downloading the archive from storage timed out after {}s",
                timeout.as_secs()
            ),
            Self::ConversionFailed(_) => "Bundle conversion failed".to_string(),
            Self::ToolFailed { mode, .. } => format!("bundletool {mode} reported a failure"),
            Self::NoMatchingPackage { .. } => {
                "No package in the bundle matches this device".to_string()
            }
            Self::InvalidOutput { reason, .. } => format!("Extracted package is invalid: {reason}"),
            Self::UploadFailed { .. } => "Failed to upload the file to storage".to_string(),
            Self::Storage { step, .. } => format!("Storage error during {step}"),
            Self::SessionStore { step, .. } => format!("Session store error during {step}"),
            Self::SessionConflict(_)
            | Self::ToolNotFound(_)
            | Self::Io(_)
            | Self::Internal(_) => "An unexpected error occurred".to_string(),
        }
    }

    /// True for failures detected before any process or network cost
    pub fn is_validation(&self) -> bool {
        matches!(self.kind(), ErrorKind::InputMissing | ErrorKind::InvalidDeviceSpec)
    }

    /// Underlying tool or collaborator message, with filesystem paths masked
    ///
    /// `None` for variants whose only detail is a path or an internal fault.
    pub fn diagnostic(&self) -> Option<String> {
        let raw = match self {
            Self::ConversionFailed(message) | Self::ToolFailed { message, .. } => message,
            Self::DownloadFailed { message, .. } | Self::UploadFailed { message, .. } => message,
            Self::DownloadTimeout { .. } => return Some(self.to_string()),
            _ => return None,
        };
        let masked = mask_paths(raw.trim());
        (!masked.is_empty()).then_some(masked)
    }
}

/// Replace absolute paths in free text with `<path>`
fn mask_paths(text: &str) -> String {
    text.lines()
        .map(|line| {
            line.split(' ')
                .map(|word| {
                    let start = word.trim_start_matches(['\'', '"', '(', '[']);
                    if start.starts_with('/') {
                        let lead = &word[..word.len() - start.len()];
                        let tail_len = start.len()
                            - start
                                .trim_end_matches(['\'', '"', ')', ']', ':', ',', '.'])
                                .len();
                        format!("{lead}<path>{}", &start[start.len() - tail_len..])
                    } else {
                        word.to_string()
                    }
                })
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}
