use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};

pub(crate) mod paper;
pub(crate) mod result;
pub(crate) mod submission;

#[derive(Debug, Serialize)]
pub(crate) struct HealthResponse {
    pub(crate) service: String,
    pub(crate) status: String,
    pub(crate) components: HashMap<String, String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct RootResponse {
    pub(crate) message: String,
    pub(crate) version: String,
    pub(crate) environment: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LabelValue {
    Text(String),
    Number(serde_json::Number),
}

impl LabelValue {
    fn into_text(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Number(number) => number.to_string(),
        }
    }
}

/// Option labels arrive as strings or bare numbers (`1` for `A`).
pub(crate) fn deserialize_labels<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = Option::<Vec<LabelValue>>::deserialize(deserializer)?;
    Ok(values.unwrap_or_default().into_iter().map(LabelValue::into_text).collect())
}

pub(crate) fn deserialize_optional_label<'de, D>(
    deserializer: D,
) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<LabelValue>::deserialize(deserializer)?;
    Ok(value.map(LabelValue::into_text))
}

/// Free text that OCR may also return as a number (`"total_marks": 50`).
pub(crate) fn deserialize_optional_text<'de, D>(
    deserializer: D,
) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<LabelValue>::deserialize(deserializer)?;
    Ok(value.map(LabelValue::into_text).map(|text| text.trim().to_string()).filter(|text| {
        !text.is_empty() && !text.eq_ignore_ascii_case("null")
    }))
}
