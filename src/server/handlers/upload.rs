// src/server/handlers/upload.rs
//! Bundle upload endpoint

use super::ApiError;
use crate::server::ServerState;
use axum::{
    Json,
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::TryStreamExt;
use serde::Serialize;
use std::io;
use std::sync::Arc;
use tokio_util::io::StreamReader;
use tracing::warn;

/// Multipart field holding the bundle
const FILE_FIELD: &str = "file";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,
    pub session_id: String,
    pub message: &'static str,
}

/// POST /upload
///
/// Streams the `file` field straight into the ingest flow.
pub async fn upload_bundle(
    State(state): State<Arc<ServerState>>,
    mut multipart: Multipart,
) -> Response {
    let development = state.config.development;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                warn!("Malformed upload: {}", e);
                return ApiError::new(e.status(), "invalid_request", e.body_text()).into_response();
            }
        };

        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let reader = StreamReader::new(field.map_err(io::Error::other));
        tokio::pin!(reader);

        return match state.pipeline.ingest(reader).await {
            Ok(receipt) => Json(UploadResponse {
                success: true,
                session_id: receipt.session_id,
                message: "File uploaded and converted successfully",
            })
            .into_response(),
            Err(e) => ApiError::from_error(&e, development).into_response(),
        };
    }

    ApiError::new(StatusCode::BAD_REQUEST, "input_missing", "No file uploaded").into_response()
}
