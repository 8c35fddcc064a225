//! Turns raw attachments into inline payloads the provider accepts.

use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::AttachmentReadError;

const FALLBACK_MEDIA_TYPE: &str = "application/octet-stream";

/// Base64-encoded bytes tagged with their media type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlinePayload {
    pub media_type: String,
    pub data: String,
}

pub fn normalize_bytes(bytes: &[u8], media_type: &str) -> InlinePayload {
    InlinePayload {
        media_type: media_type.to_string(),
        data: STANDARD.encode(bytes),
    }
}

/// Read an image from disk and encode it for transport.
pub async fn load_attachment(path: &Path) -> Result<InlinePayload, AttachmentReadError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| AttachmentReadError {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(normalize_bytes(&bytes, media_type_for_path(path)))
}

pub fn media_type_for_path(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("heic") => "image/heic",
        Some("heif") => "image/heif",
        Some("bmp") => "image/bmp",
        _ => FALLBACK_MEDIA_TYPE,
    }
}

pub fn is_image_path(path: &Path) -> bool {
    media_type_for_path(path).starts_with("image/")
}
