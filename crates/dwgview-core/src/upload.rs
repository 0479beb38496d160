//! Upload rules and wire types shared by the conversion server and the
//! browser viewer

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Multipart field carrying the drawing
pub const UPLOAD_FIELD: &str = "dwgFile";

/// Largest accepted drawing (50 MB)
pub const MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

pub const DWG_EXTENSION: &str = "dwg";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UploadRejection {
    #[error("No file uploaded")]
    NoFile,
    #[error("Only DWG files are allowed")]
    NotDwg,
    #[error("File too large: {size} bytes exceeds the {max} byte limit")]
    TooLarge { size: u64, max: u64 },
}

/// True if `name` ends in `.dwg`, in any letter case
pub fn has_dwg_extension(name: &str) -> bool {
    std::path::Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(DWG_EXTENSION))
        .unwrap_or(false)
}

/// Check a drawing before it is accepted for conversion
pub fn validate_upload(name: &str, size: u64, max: u64) -> Result<(), UploadRejection> {
    if name.is_empty() {
        return Err(UploadRejection::NoFile);
    }
    if !has_dwg_extension(name) {
        return Err(UploadRejection::NotDwg);
    }
    if size > max {
        return Err(UploadRejection::TooLarge { size, max });
    }
    Ok(())
}

/// Reduce a client-supplied file name to `[A-Za-z0-9._-]`, with no
/// directory components. Never returns an empty or dot-only name.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        "drawing.dwg".to_string()
    } else {
        cleaned
    }
}

/// Body returned by `POST /api/convert`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ConvertResponse {
    pub fn converted(model_url: impl Into<String>) -> Self {
        Self {
            success: true,
            model_url: Some(model_url.into()),
            message: Some("DWG converted successfully".to_string()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            model_url: None,
            message: None,
            error: Some(error.into()),
        }
    }
}
