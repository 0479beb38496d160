//! Web server setup and routing

use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::info;

use crate::api;
use crate::state::AppState;

/// Multipart framing allowance on top of the file size limit
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

pub fn router(state: Arc<AppState>) -> Router {
    let body_limit = usize::try_from(state.config.uploads.max_bytes())
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);

    let api = Router::new()
        .route("/convert", post(api::convert))
        .route("/health", get(api::health))
        .fallback(api::not_found);

    Router::new()
        .nest("/api", api)
        // Converted models
        .nest_service("/uploads", ServeDir::new(&state.uploads_dir))
        // Viewer bundle
        .fallback_service(ServeDir::new(&state.config.server.public_dir))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Serve until Ctrl-C
pub async fn run(state: Arc<AppState>, bind: &str) -> Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("binding {bind}"))?;
    info!(address = %bind, "Starting web server");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Web server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use dwgview_core::ConvertResponse;
    use tempfile::TempDir;
    use tower::ServiceExt;

    const BOUNDARY: &str = "dwgviewtestboundary";

    fn state_in(dir: &TempDir, config: Config) -> Arc<AppState> {
        let mut config = config;
        config.uploads.path = dir.path().join("uploads");
        config.server.public_dir = dir.path().join("web");
        std::fs::create_dir_all(&config.server.public_dir).unwrap();
        std::fs::write(config.server.public_dir.join("index.html"), "<canvas id=\"viewer-canvas\">").unwrap();
        AppState::new(config).unwrap()
    }

    fn upload_request(field: &str, file_name: &str, data: &[u8]) -> Request<Body> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri("/api/convert")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let dir = TempDir::new().unwrap();
        let app = router(state_in(&dir, Config::default()));
        let response = app
            .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["status"], "OK");
        assert!(json["timestamp"].as_str().unwrap().ends_with('Z'));
    }

    #[tokio::test]
    async fn test_unknown_api_route() {
        let dir = TempDir::new().unwrap();
        let app = router(state_in(&dir, Config::default()));
        let response = app
            .oneshot(Request::get("/api/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = json_body(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "Endpoint not found");
    }

    #[tokio::test]
    async fn test_serves_viewer_bundle() {
        let dir = TempDir::new().unwrap();
        let app = router(state_in(&dir, Config::default()));
        let response = app
            .oneshot(Request::get("/index.html").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_convert_without_file() {
        let dir = TempDir::new().unwrap();
        let app = router(state_in(&dir, Config::default()));
        let response = app
            .oneshot(upload_request("notes", "plan.dwg", b"AC1032"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "No file uploaded");
    }

    #[tokio::test]
    async fn test_convert_rejects_other_extensions() {
        let dir = TempDir::new().unwrap();
        let app = router(state_in(&dir, Config::default()));
        let response = app
            .oneshot(upload_request("dwgFile", "plan.dxf", b"0\nSECTION"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "Only DWG files are allowed");
    }

    #[tokio::test]
    async fn test_convert_rejects_oversized_upload() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.uploads.max_size_mb = 1;
        let state = state_in(&dir, config);
        let uploads = state.uploads_dir.clone();
        let app = router(state);

        let data = vec![0u8; 1024 * 1024 + 10];
        let response = app
            .oneshot(upload_request("dwgFile", "big.dwg", &data))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(json_body(response).await["error"]
            .as_str()
            .unwrap()
            .contains("Maximum size is 1MB"));
        assert_eq!(std::fs::read_dir(uploads).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_convert_while_busy() {
        let dir = TempDir::new().unwrap();
        let state = state_in(&dir, Config::default());
        let _permit = state.conversions.try_acquire().unwrap();
        let app = router(state.clone());

        let response = app
            .oneshot(upload_request("dwgFile", "plan.dwg", b"AC1032"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(
            json_body(response).await["error"],
            "A conversion is already in progress"
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_convert_success() {
        let dir = TempDir::new().unwrap();
        let tools = TempDir::new().unwrap();
        let config = Config {
            converter: crate::converter::tests::working_tools(tools.path()),
            ..Default::default()
        };
        let state = state_in(&dir, config);
        let uploads = state.uploads_dir.clone();
        let app = router(state);

        let response = app
            .clone()
            .oneshot(upload_request("dwgFile", "Floor Plan.DWG", b"AC1032"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: ConvertResponse = serde_json::from_value(json_body(response).await).unwrap();
        assert!(body.success);
        let model_url = body.model_url.unwrap();
        assert!(model_url.starts_with("/uploads/"));
        assert!(model_url.ends_with("Floor_Plan.gltf"));

        // Only the model is left behind: no DWG, no DXF
        let names: Vec<String> = std::fs::read_dir(&uploads)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 1);
        assert!(names[0].ends_with(".gltf"));

        let response = app
            .oneshot(Request::get(model_url.as_str()).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_convert_failure_is_500() {
        let dir = TempDir::new().unwrap();
        let tools = TempDir::new().unwrap();
        let mut converter = crate::converter::tests::working_tools(tools.path());
        converter.dwgread =
            crate::converter::tests::script(tools.path(), "dwgread-bad", "echo 'bad header' >&2\nexit 1");
        let state = state_in(&dir, Config { converter, ..Default::default() });
        let uploads = state.uploads_dir.clone();
        let app = router(state);

        let response = app
            .oneshot(upload_request("dwgFile", "plan.dwg", b"garbage"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = json_body(response).await;
        assert_eq!(json["success"], false);
        assert!(json["error"].as_str().unwrap().contains("bad header"));
        assert_eq!(std::fs::read_dir(uploads).unwrap().count(), 0);
    }
}
