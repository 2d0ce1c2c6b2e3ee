use crate::api::errors::ApiError;
use std::path::Path;

pub(crate) const MAX_ROLL_NUMBER_LEN: usize = 50;

/// Accepts ASCII letters, digits, `-` and `_`; returns the upper-cased form.
pub(crate) fn normalize_roll_number(roll_number: &str) -> Result<String, ApiError> {
    let trimmed = roll_number.trim();
    if trimmed.is_empty() {
        return Err(ApiError::BadRequest("Roll number is required".to_string()));
    }
    if trimmed.len() > MAX_ROLL_NUMBER_LEN {
        return Err(ApiError::BadRequest(format!(
            "Roll number must be at most {MAX_ROLL_NUMBER_LEN} characters"
        )));
    }

    let valid = trimmed.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(trimmed.to_ascii_uppercase())
    } else {
        Err(ApiError::BadRequest(
            "Roll number may contain only letters, digits, '-' and '_'".to_string(),
        ))
    }
}

pub(crate) fn validate_image_upload(
    filename: &str,
    content_type: &str,
    allowed_extensions: &[String],
) -> Result<(), ApiError> {
    let extension = Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .ok_or_else(|| ApiError::BadRequest("File must have an extension".to_string()))?;

    if !allowed_extensions.iter().any(|allowed| allowed == &extension) {
        return Err(ApiError::BadRequest(format!("File extension '{extension}' is not allowed")));
    }

    let mime = content_type.trim().to_ascii_lowercase();
    if mime.is_empty() || mime == "application/octet-stream" {
        return Ok(());
    }

    if mime_allowed_for_extension(&mime, &extension) {
        Ok(())
    } else {
        Err(ApiError::BadRequest(format!(
            "MIME type '{mime}' does not match extension '.{extension}'"
        )))
    }
}

fn mime_allowed_for_extension(mime: &str, extension: &str) -> bool {
    match extension {
        "jpg" | "jpeg" => matches!(mime, "image/jpeg" | "image/jpg"),
        "png" => mime == "image/png",
        "webp" => mime == "image/webp",
        "gif" => mime == "image/gif",
        "bmp" => matches!(mime, "image/bmp" | "image/x-ms-bmp"),
        _ => false,
    }
}

/// Keeps ASCII alphanumerics plus `._-`; anything else becomes `_`.
pub(crate) fn sanitized_filename(name: &str, fallback: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') { c } else { '_' })
        .collect();
    let cleaned = cleaned.trim_matches('_');

    if cleaned.is_empty() {
        fallback.to_string()
    } else {
        cleaned.to_string()
    }
}
