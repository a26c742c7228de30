//! Multipart upload extraction.

use axum::extract::Multipart;

use crate::error::{ApiError, ApiResult};

/// An uploaded file pulled out of a multipart request.
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Extract the `file` field from a multipart form.
///
/// A request without that field is a missing parameter (422); a broken
/// multipart body is a bad request (400).
pub async fn read_file_field(mut multipart: Multipart) -> ApiResult<UploadedFile> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("multipart error: {e}")))?
    {
        if field.name() == Some("file") {
            let file_name = field.file_name().unwrap_or("upload").to_string();
            let content_type = field.content_type().map(|s| s.to_string());
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::bad_request(format!("failed to read upload: {e}")))?;
            return Ok(UploadedFile {
                file_name,
                content_type,
                bytes: bytes.to_vec(),
            });
        }
    }

    Err(ApiError::unprocessable("missing file field 'file'"))
}

/// Reject uploads whose declared content type is not in the allowed set.
pub fn ensure_content_type(upload: &UploadedFile, allowed: &[&str]) -> ApiResult<()> {
    match upload.content_type.as_deref() {
        Some(ct) if allowed.contains(&ct) => Ok(()),
        other => Err(ApiError::bad_request(format!(
            "invalid file type '{}'. Must be one of: {}",
            other.unwrap_or("unknown"),
            allowed.join(", ")
        ))),
    }
}
