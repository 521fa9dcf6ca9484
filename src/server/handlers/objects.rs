// src/server/handlers/objects.rs
//! Public objects for the local blob store
//!
//! Mirrors the storage API's public path so that links produced in local mode
//! resolve against this server.

use super::ApiError;
use crate::selection::PACKAGE_EXTENSION;
use crate::server::ServerState;
use crate::storage::{ARCHIVE_CONTENT_TYPE, BlobStore, PACKAGE_CONTENT_TYPE};
use axum::{
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use std::sync::Arc;

/// GET /storage/v1/object/public/:bucket/*key
pub async fn public_object(
    State(state): State<Arc<ServerState>>,
    Path((bucket, key)): Path<(String, String)>,
) -> Response {
    let not_found = || ApiError::new(StatusCode::NOT_FOUND, "file_not_found", "Object not found");

    let Some(store) = &state.local_blobs else {
        return not_found().into_response();
    };
    if bucket != state.config.bucket {
        return not_found().into_response();
    }

    match store.download(&key).await {
        Ok(data) => {
            let content_type = if key.ends_with(PACKAGE_EXTENSION) {
                PACKAGE_CONTENT_TYPE
            } else {
                ARCHIVE_CONTENT_TYPE
            };
            ([(header::CONTENT_TYPE, content_type)], data).into_response()
        }
        Err(e) => {
            tracing::debug!("Public object {} unavailable: {}", key, e);
            not_found().into_response()
        }
    }
}
