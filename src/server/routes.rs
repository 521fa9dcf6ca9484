// src/server/routes.rs
//! Axum router configuration for the apkrelay server

use crate::server::ServerState;
use crate::server::handlers::{apk, objects, upload};
use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the main application router
pub fn create_router(state: Arc<ServerState>) -> Router {
    // CORS configuration - permissive, the service has no auth
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let upload_routes = Router::new()
        .route("/upload", post(upload::upload_bundle))
        .layer(DefaultBodyLimit::max(state.config.max_upload_size));

    let api_routes = Router::new()
        .route("/get-apk", post(apk::get_apk))
        .layer(DefaultBodyLimit::max(state.config.max_json_size));

    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route(
            "/storage/v1/object/public/:bucket/*key",
            get(objects::public_object),
        )
        .merge(upload_routes)
        .merge(api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn root() -> &'static str {
    "Server is running"
}

/// Health check endpoint
async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundletool::Bundletool;
    use crate::pipeline::{Pipeline, PipelineConfig};
    use crate::server::ServerConfig;
    use crate::session::SqliteSessionStore;
    use crate::storage::{BlobStore, LocalBlobStore, UploadOptions};
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn test_state(temp: &TempDir) -> ServerState {
        let config = PipelineConfig {
            scratch_dir: temp.path().join("scratch"),
            ..Default::default()
        };
        let blobs = LocalBlobStore::new(temp.path().join("blobs"));
        let pipeline = Pipeline::new(
            config,
            Arc::new(Bundletool::command("/nonexistent/bundletool")),
            Arc::new(blobs.clone()),
            Arc::new(SqliteSessionStore::in_memory().unwrap()),
        );
        ServerState::new(ServerConfig::default(), pipeline).with_local_blobs(blobs)
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let temp = TempDir::new().unwrap();
        let app = create_router(Arc::new(test_state(&temp)));

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_root() {
        let temp = TempDir::new().unwrap();
        let app = create_router(Arc::new(test_state(&temp)));

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"Server is running");
    }

    #[tokio::test]
    async fn test_get_apk_missing_parameters() {
        let temp = TempDir::new().unwrap();
        let app = create_router(Arc::new(test_state(&temp)));

        let response = app
            .oneshot(post_json("/get-apk", json!({ "sessionId": "abc" })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "missing_parameters");
        assert_eq!(body["details"]["received"]["sessionId"], true);
        assert_eq!(body["details"]["received"]["deviceSpec"], false);
    }

    #[tokio::test]
    async fn test_get_apk_invalid_spec() {
        let temp = TempDir::new().unwrap();
        let app = create_router(Arc::new(test_state(&temp)));

        let response = app
            .oneshot(post_json(
                "/get-apk",
                json!({ "sessionId": "abc", "deviceSpec": { "sdkVersion": "33" } }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "invalid_device_spec");
        assert!(body.get("details").is_none());
    }

    #[tokio::test]
    async fn test_get_apk_unknown_session() {
        let temp = TempDir::new().unwrap();
        let app = create_router(Arc::new(test_state(&temp)));

        let response = app
            .oneshot(post_json(
                "/get-apk",
                json!({
                    "sessionId": "missing",
                    "deviceSpec": { "sdkVersion": "33", "supportedAbis": ["arm64-v8a"] }
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["error"], "session_not_found");
    }

    #[tokio::test]
    async fn test_get_apk_rejects_malformed_json() {
        let temp = TempDir::new().unwrap();
        let app = create_router(Arc::new(test_state(&temp)));

        let request = Request::builder()
            .method("POST")
            .uri("/get-apk")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "invalid_request");
    }

    #[tokio::test]
    async fn test_upload_without_file_field() {
        let temp = TempDir::new().unwrap();
        let app = create_router(Arc::new(test_state(&temp)));

        let boundary = "XBOUNDARY";
        let body = format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"note\"\r\n\r\nhello\r\n--{boundary}--\r\n"
        );
        let request = Request::builder()
            .method("POST")
            .uri("/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "input_missing");
    }

    #[tokio::test]
    async fn test_public_object_served_from_local_store() {
        let temp = TempDir::new().unwrap();
        let state = test_state(&temp);
        state
            .local_blobs
            .as_ref()
            .unwrap()
            .upload(
                "downloads/s1/app.apk",
                b"package".to_vec(),
                &UploadOptions::new("application/vnd.android.package-archive"),
            )
            .await
            .unwrap();
        let app = create_router(Arc::new(state));

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/storage/v1/object/public/appfiles/downloads/s1/app.apk")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/vnd.android.package-archive"
        );

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/storage/v1/object/public/otherbucket/downloads/s1/app.apk")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
