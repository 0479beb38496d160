//! REST API handlers

use axum::{
    extract::{multipart::Field, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use dwgview_core::upload::{
    sanitize_file_name, validate_upload, ConvertResponse, UploadRejection, UPLOAD_FIELD,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use crate::converter::Converter;
use crate::state::AppState;

/// Error body: `{success: false, error}` with a status code
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    error: String,
}

impl ApiError {
    fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            error: msg.into(),
        }
    }
}

impl From<UploadRejection> for ApiError {
    fn from(rejection: UploadRejection) -> Self {
        let error = match rejection {
            UploadRejection::TooLarge { max, .. } => format!(
                "File size too large. Maximum size is {}MB.",
                max / (1024 * 1024)
            ),
            other => other.to_string(),
        };
        Self::new(StatusCode::BAD_REQUEST, error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ConvertResponse::failed(self.error))).into_response()
    }
}

/// Service liveness
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "OK",
        "timestamp": chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
    }))
}

/// Unknown `/api` route
pub async fn not_found() -> impl IntoResponse {
    ApiError::new(StatusCode::NOT_FOUND, "Endpoint not found")
}

/// Accept a DWG upload, convert it and return the model URL
pub async fn convert(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<ConvertResponse>, ApiError> {
    let Ok(_permit) = state.conversions.try_acquire() else {
        return Err(ApiError::new(
            StatusCode::CONFLICT,
            "A conversion is already in progress",
        ));
    };

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, format!("Malformed upload: {e}")))?
    {
        if field.name() == Some(UPLOAD_FIELD) {
            upload = Some(receive_upload(&state, field).await?);
            break;
        }
    }
    let Some((original_name, dwg_path)) = upload else {
        return Err(UploadRejection::NoFile.into());
    };
    info!(file = %original_name, path = %dwg_path.display(), "Processing upload");

    let output = Converter::output_path_for(&dwg_path);
    let result = state.converter.convert(&dwg_path, &output).await;
    remove_quietly(&dwg_path).await;

    let model = result.map_err(|e| {
        ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("DWG conversion failed: {e}"),
        )
    })?;
    let file_name = model
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok(Json(ConvertResponse::converted(format!("/uploads/{file_name}"))))
}

/// Stream the drawing to disk, enforcing the extension and size limit.
/// Returns the client's file name and the stored path.
async fn receive_upload(state: &AppState, mut field: Field<'_>) -> Result<(String, PathBuf), ApiError> {
    let original_name = field.file_name().unwrap_or_default().to_string();
    let max = state.config.uploads.max_bytes();
    validate_upload(&original_name, 0, max)?;

    let id = uuid::Uuid::new_v4().simple().to_string();
    let path = state
        .uploads_dir
        .join(format!("{}-{}", &id[..8], sanitize_file_name(&original_name)));

    let mut file = tokio::fs::File::create(&path).await.map_err(|e| {
        ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to store upload: {e}"),
        )
    })?;

    let mut size: u64 = 0;
    loop {
        let chunk = match field.chunk().await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => break,
            Err(e) => {
                drop(file);
                remove_quietly(&path).await;
                if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
                    return Err(UploadRejection::TooLarge { size: max + 1, max }.into());
                }
                return Err(ApiError::new(StatusCode::BAD_REQUEST, format!("Malformed upload: {e}")));
            }
        };
        size += chunk.len() as u64;
        if let Err(rejection) = validate_upload(&original_name, size, max) {
            drop(file);
            remove_quietly(&path).await;
            return Err(rejection.into());
        }
        if let Err(e) = file.write_all(&chunk).await {
            drop(file);
            remove_quietly(&path).await;
            return Err(ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to store upload: {e}"),
            ));
        }
    }
    if let Err(e) = file.flush().await {
        warn!(path = %path.display(), error = %e, "Failed to flush upload");
    }

    Ok((original_name, path))
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "Failed to remove file");
        }
    }
}
