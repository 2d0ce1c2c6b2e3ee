use std::env;

use super::types::{ConfigError, Environment};

const DEFAULT_CORS_ORIGINS: &[&str] =
    &["http://localhost:5173", "http://localhost:3000", "http://localhost:5000"];

pub(super) fn env_optional(key: &str) -> Option<String> {
    env::var(key).ok().map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

pub(super) fn env_or_default(key: &str, default: &str) -> String {
    env_optional(key).unwrap_or_else(|| default.to_string())
}

pub(super) fn parse_u16(field: &'static str, value: String) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidValue { field, value })
}

pub(super) fn parse_u64(field: &'static str, value: String) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidValue { field, value })
}

/// Accepts a JSON array or a comma-separated list; empty input falls back to
/// the local dev origins.
pub(super) fn parse_cors_origins(value: Option<String>) -> Result<Vec<String>, ConfigError> {
    let raw = value.unwrap_or_default();
    let origins = if raw.trim_start().starts_with('[') {
        serde_json::from_str::<Vec<String>>(&raw).map_err(|_| ConfigError::InvalidCors(raw))?
    } else {
        split_list(&raw).map(str::to_string).collect()
    };

    if origins.is_empty() {
        Ok(default_cors_origins())
    } else {
        Ok(origins)
    }
}

pub(super) fn parse_string_list(value: Option<String>, defaults: &[&str]) -> Vec<String> {
    match value {
        Some(raw) => split_list(&raw).map(str::to_ascii_lowercase).collect(),
        None => defaults.iter().map(|item| item.to_string()).collect(),
    }
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|item| !item.is_empty())
}

/// Collects the primary key and its numbered backups, skipping unset slots and
/// dropping exact duplicates so the pool never rotates onto the same secret.
pub(super) fn collect_api_keys(
    primary: Option<String>,
    backups: impl IntoIterator<Item = Option<String>>,
) -> Vec<String> {
    let mut keys: Vec<String> = Vec::new();
    for key in std::iter::once(primary).chain(backups).flatten() {
        if !keys.contains(&key) {
            keys.push(key);
        }
    }
    keys
}

pub(super) fn parse_bool(value: &str) -> bool {
    matches!(value, "1" | "true" | "TRUE" | "yes" | "YES" | "on" | "ON")
}

pub(super) fn parse_environment(value: Option<String>) -> Environment {
    match value.as_deref().map(|item| item.to_lowercase()) {
        Some(ref val) if val == "production" || val == "prod" => Environment::Production,
        Some(ref val) if val == "staging" => Environment::Staging,
        Some(ref val) if val == "test" || val == "testing" => Environment::Test,
        _ => Environment::Development,
    }
}

pub(super) fn is_supported_image_extension(extension: &str) -> bool {
    matches!(extension, "jpg" | "jpeg" | "png" | "webp" | "gif" | "bmp")
}

fn default_cors_origins() -> Vec<String> {
    DEFAULT_CORS_ORIGINS.iter().map(|item| item.to_string()).collect()
}
