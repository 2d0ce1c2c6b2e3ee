use axum::extract::multipart::Field;

use crate::api::errors::ApiError;
use crate::api::validation::validate_image_upload;
use crate::core::config::Settings;
use crate::services::image_prep::{prepare_for_ocr, ImagePrepError, PREPARED_MIME_TYPE};

/// One image read from a multipart form, already normalized for OCR.
#[derive(Debug)]
pub(crate) struct UploadedImage {
    pub(crate) filename: String,
    pub(crate) mime_type: String,
    pub(crate) bytes: Vec<u8>,
}

/// Streams an image field into memory, enforcing the configured size limit and
/// extension/MIME rules, then decodes and re-encodes it off the runtime.
/// Undecodable uploads are rejected here, before any OCR call.
pub(crate) async fn read_image_field(
    mut field: Field<'_>,
    settings: &Settings,
) -> Result<UploadedImage, ApiError> {
    let storage = settings.storage();
    let filename = field
        .file_name()
        .map(str::to_string)
        .filter(|name| !name.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Uploaded file has no filename".to_string()))?;
    let content_type = field.content_type().unwrap_or("").to_string();
    validate_image_upload(&filename, &content_type, &storage.allowed_image_extensions)?;

    let max_bytes = storage.max_upload_size_mb * 1024 * 1024;
    let mut bytes = Vec::new();
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|_| ApiError::BadRequest(format!("Failed to read file {filename}")))?
    {
        let next_size = bytes.len() as u64 + chunk.len() as u64;
        if next_size > max_bytes {
            return Err(ApiError::PayloadTooLarge(format!(
                "File {filename} exceeds {}MB limit",
                storage.max_upload_size_mb
            )));
        }
        bytes.extend_from_slice(&chunk);
    }

    if bytes.is_empty() {
        return Err(ApiError::BadRequest(format!("File {filename} is empty")));
    }

    let uploaded_size = bytes.len();
    let prepared = tokio::task::spawn_blocking(move || prepare_for_ocr(&bytes))
        .await
        .map_err(|e| ApiError::internal(e, "Image preprocessing task failed"))?;
    let bytes = match prepared {
        Ok(bytes) => bytes,
        Err(ImagePrepError::Decode(err)) => {
            tracing::warn!(filename = %filename, error = %err, "Rejected undecodable upload");
            return Err(ApiError::BadRequest(format!("File {filename} is not a valid image")));
        }
        Err(err @ ImagePrepError::Encode(_)) => {
            return Err(ApiError::internal(err, "Failed to prepare image for OCR"));
        }
    };
    tracing::debug!(
        filename = %filename,
        uploaded_bytes = uploaded_size,
        prepared_bytes = bytes.len(),
        "Image prepared for OCR"
    );

    Ok(UploadedImage { filename, mime_type: PREPARED_MIME_TYPE.to_string(), bytes })
}

pub(crate) async fn read_text_field(field: Field<'_>, name: &str) -> Result<String, ApiError> {
    field
        .text()
        .await
        .map(|text| text.trim().to_string())
        .map_err(|_| ApiError::BadRequest(format!("Invalid {name} field")))
}

/// Body limit for multipart routes: every image at the maximum size plus form overhead.
pub(crate) fn multipart_body_limit(settings: &Settings) -> usize {
    let storage = settings.storage();
    let per_file = storage.max_upload_size_mb.saturating_mul(1024 * 1024);
    let total = per_file.saturating_mul(storage.max_images_per_submission.max(1));
    usize::try_from(total.saturating_add(1024 * 1024)).unwrap_or(usize::MAX)
}
