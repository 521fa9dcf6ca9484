// src/server/handlers/apk.rs
//! Device package endpoint

use super::ApiError;
use crate::pipeline::DownloadTicket;
use crate::server::ServerState;
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetApkRequest {
    pub session_id: Option<String>,
    pub device_spec: Option<Value>,
}

#[derive(Serialize)]
pub struct GetApkResponse {
    pub success: bool,
    #[serde(flatten)]
    pub ticket: DownloadTicket,
}

/// POST /get-apk
///
/// Body: `{sessionId, deviceSpec}`. Returns `{success, downloadUrl,
/// expiresAt, fileSize}`.
pub async fn get_apk(
    State(state): State<Arc<ServerState>>,
    body: Result<Json<GetApkRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => {
            return ApiError::new(rejection.status(), "invalid_request", rejection.body_text())
                .into_response();
        }
    };

    let session_id = request.session_id.filter(|id| !id.is_empty());
    let device_spec = request.device_spec.filter(|spec| !spec.is_null());

    let (Some(session_id), Some(device_spec)) = (&session_id, &device_spec) else {
        return ApiError::new(
            StatusCode::BAD_REQUEST,
            "missing_parameters",
            "sessionId and deviceSpec are required",
        )
        .with_details(json!({
            "required": ["sessionId", "deviceSpec"],
            "received": {
                "sessionId": session_id.is_some(),
                "deviceSpec": device_spec.is_some(),
            }
        }))
        .into_response();
    };

    match state.pipeline.retrieve(session_id, device_spec).await {
        Ok(ticket) => Json(GetApkResponse {
            success: true,
            ticket,
        })
        .into_response(),
        Err(e) => ApiError::from_error(&e, state.config.development).into_response(),
    }
}
