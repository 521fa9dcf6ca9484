// src/server/handlers/mod.rs
//! HTTP request handlers and the failure response shape
//!
//! Every failure answers `{success: false, error, message, details?}` where
//! `error` is the machine-readable kind. `details` carries the underlying tool
//! or storage message with paths masked; development mode gets the full text.

pub mod apk;
pub mod objects;
pub mod upload;

use crate::error::{Error, ErrorKind};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::Value;

/// HTTP status for an error kind
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InputMissing | ErrorKind::InvalidDeviceSpec => StatusCode::BAD_REQUEST,
        ErrorKind::SessionNotFound | ErrorKind::FileNotFound => StatusCode::NOT_FOUND,
        ErrorKind::NoMatchingPackage => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::DownloadFailed | ErrorKind::UploadFailed => StatusCode::BAD_GATEWAY,
        ErrorKind::ConversionFailed | ErrorKind::InvalidOutput | ErrorKind::InternalError => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

/// A failure response
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: String,
    message: String,
    details: Option<Value>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Map a pipeline error, exposing its full text only in development
    pub fn from_error(err: &Error, development: bool) -> Self {
        let kind = err.kind();
        let api = Self::new(status_for(kind), kind.code(), err.summary());
        let details = if development {
            Some(err.to_string())
        } else {
            err.diagnostic()
        };
        match details {
            Some(details) => api.with_details(Value::String(details)),
            None => api,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            success: false,
            error: self.code,
            message: self.message,
            details: self.details,
        };
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(ErrorKind::InvalidDeviceSpec), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(ErrorKind::SessionNotFound), StatusCode::NOT_FOUND);
        assert_eq!(status_for(ErrorKind::FileNotFound), StatusCode::NOT_FOUND);
        assert_eq!(
            status_for(ErrorKind::NoMatchingPackage),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(status_for(ErrorKind::DownloadFailed), StatusCode::BAD_GATEWAY);
        assert_eq!(
            status_for(ErrorKind::ConversionFailed),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_details_only_in_development() {
        let err = Error::InputMissing(PathBuf::from("/scratch/bundle_1.aab"));

        let api = ApiError::from_error(&err, false);
        assert!(api.details.is_none());
        assert!(!api.message.contains("/scratch"));
        assert_eq!(api.code, "input_missing");

        let api = ApiError::from_error(&err, true);
        let details = api.details.unwrap();
        assert!(details.as_str().unwrap().contains("/scratch/bundle_1.aab"));
    }

    #[test]
    fn test_tool_diagnostic_attached_outside_development() {
        let err = Error::ToolFailed {
            mode: crate::bundletool::ToolMode::Build,
            message: "Error: File '/scratch/bundle_1.aab' is not a valid bundle".to_string(),
        };

        let api = ApiError::from_error(&err, false);
        assert_eq!(api.code, "conversion_failed");
        let details = api.details.unwrap();
        let details = details.as_str().unwrap();
        assert!(details.contains("is not a valid bundle"));
        assert!(!details.contains("/scratch"));
    }
}
