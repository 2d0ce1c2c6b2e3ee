use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::Engine;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::core::config::Settings;
use crate::schemas::paper::KeyAnswerInput;
use crate::schemas::submission::{PaperInfo, StudentAnswerInput};
use crate::services::credentials::{is_quota_error, CredentialPool, InvokeError};

const MAX_OPTION_LEN: usize = 10;
const VALID_SELECTIONS: [&str; 4] = ["A", "B", "C", "D"];

const ANSWER_KEY_PROMPT: &str = r#"You are reading a teacher's answer key for a multiple-choice paper.

For every question find:
1. The question number.
2. Every option marked as correct (ticked, circled or underlined). Options are A, B, C, D or 1, 2, 3, 4. A question may have several correct options; list all of them.
3. The marks for the question. Look for handwritten notes such as "marks-2", "2 marks", "mar 1.5", "max 4", "[2]", "(3)", "2pts", "3 points", "worth 2" or "2m", or a lone number written beside the question. Copy the raw note into "marks_text".

Return ONLY a JSON object in this format:
{
  "total_questions": 3,
  "answers": [
    {"question_number": 1, "correct_options": ["A"], "marks": 3, "marks_text": "marks-3", "question_type": "single"},
    {"question_number": 2, "correct_options": ["A", "B"], "marks": 2, "marks_text": "mar 2", "question_type": "multiple"}
  ]
}

"correct_options" is always an array. "question_type" is "single" for one correct option and "multiple" otherwise. No markdown, no commentary."#;

const STUDENT_SHEET_PROMPT: &str = r#"You are reading a student's multiple-choice answer sheet.

Extract the header fields printed or handwritten at the top: roll number, section, student name, paper name, subject, date, duration, total marks and class/grade. Use null for anything that is not visible.

Then, for every question, report which options (A, B, C, D) the student marked. A mark is any tick, check, cross, circle or filled bubble made by hand on or next to an option, darker than the printed text. Ignore printed option letters, stray dots and smudges that do not sit on an option. A question may have several marked options; list all of them. Use an empty array when nothing is marked.

Return ONLY a JSON object in this format:
{
  "roll_number": "21CS045",
  "section": "B",
  "student_name": "Name as written",
  "paper_info": {"paper_name": null, "subject": null, "date": null, "duration": null, "total_marks": null, "class_grade": null},
  "answers": [
    {"question_number": 1, "selected_options": ["B"]},
    {"question_number": 2, "selected_options": ["A", "C"]},
    {"question_number": 3, "selected_options": []}
  ]
}

No markdown, no commentary."#;

#[derive(Debug, Error)]
pub(crate) enum OcrError {
    #[error("all Gemini API keys are rate-limited; retry after the quota resets")]
    CredentialsExhausted,
    #[error("Gemini request failed: {0}")]
    Transport(String),
    #[error("Gemini returned {status}: {message}")]
    Upstream { status: StatusCode, message: String },
    #[error("empty response from Gemini")]
    EmptyResponse,
    #[error("invalid JSON in Gemini response: {0}")]
    InvalidJson(String),
    #[error("{0}")]
    Rejected(String),
}

impl From<InvokeError<OcrError>> for OcrError {
    fn from(err: InvokeError<OcrError>) -> Self {
        match err {
            InvokeError::AllCredentialsExhausted => Self::CredentialsExhausted,
            InvokeError::NonRecoverable(inner) => inner,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct KeyExtraction {
    #[serde(default)]
    pub(crate) total_questions: Option<i64>,
    #[serde(default)]
    pub(crate) answers: Vec<KeyAnswerInput>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SheetExtraction {
    #[serde(default, deserialize_with = "crate::schemas::deserialize_optional_text")]
    pub(crate) roll_number: Option<String>,
    #[serde(default, deserialize_with = "crate::schemas::deserialize_optional_text")]
    pub(crate) section: Option<String>,
    #[serde(default, deserialize_with = "crate::schemas::deserialize_optional_text")]
    pub(crate) student_name: Option<String>,
    #[serde(default)]
    pub(crate) paper_info: PaperInfo,
    #[serde(default)]
    pub(crate) answers: Vec<StudentAnswerInput>,
}

/// Reads answer keys and student sheets from images.
#[async_trait]
pub(crate) trait AnswerSheetReader: Send + Sync {
    async fn read_answer_key(
        &self,
        image: &[u8],
        mime_type: &str,
    ) -> Result<KeyExtraction, OcrError>;

    async fn read_student_sheet(
        &self,
        image: &[u8],
        mime_type: &str,
    ) -> Result<SheetExtraction, OcrError>;
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ContentPart>,
}

#[derive(Debug, Deserialize)]
struct ContentPart {
    #[serde(default)]
    text: Option<String>,
}

pub(crate) struct GeminiReader {
    client: Client,
    base_url: String,
    model: String,
    pool: Arc<CredentialPool>,
}

impl GeminiReader {
    pub(crate) fn from_settings(
        settings: &Settings,
        pool: Arc<CredentialPool>,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .timeout(Duration::from_secs(settings.gemini().request_timeout))
            .build()
            .map_err(|err| anyhow::anyhow!("Failed to build Gemini HTTP client: {err}"))?;

        Ok(Self {
            client,
            base_url: settings.gemini().base_url.clone(),
            model: settings.gemini().model.clone(),
            pool,
        })
    }

    async fn generate(
        &self,
        prompt: &str,
        image: &[u8],
        mime_type: &str,
    ) -> Result<String, OcrError> {
        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model);
        let payload = json!({
            "contents": [{
                "parts": [
                    {"text": prompt},
                    {"inline_data": {
                        "mime_type": mime_type,
                        "data": base64::engine::general_purpose::STANDARD.encode(image)
                    }}
                ]
            }],
            "generationConfig": {
                "temperature": 0.0,
                "responseMimeType": "application/json"
            }
        });

        let timer = Instant::now();
        let text = self
            .pool
            .invoke_with_retry(|lease| {
                let request =
                    self.client.post(&url).header("x-goog-api-key", lease.secret()).json(&payload);
                let credential = lease.index();
                async move {
                    tracing::debug!(credential, "Sending Gemini request");
                    let response =
                        request.send().await.map_err(|err| OcrError::Transport(err.to_string()))?;
                    let status = response.status();
                    let body = response
                        .text()
                        .await
                        .map_err(|err| OcrError::Transport(err.to_string()))?;

                    if !status.is_success() {
                        let message = upstream_message(&body);
                        return Err(OcrError::Upstream { status, message });
                    }

                    extract_text(&body)
                }
            })
            .await?;

        metrics::histogram!("ocr_request_duration_seconds").record(timer.elapsed().as_secs_f64());
        tracing::info!(
            model = %self.model,
            elapsed_ms = timer.elapsed().as_millis() as u64,
            "Gemini extraction completed"
        );
        Ok(text)
    }
}

#[async_trait]
impl AnswerSheetReader for GeminiReader {
    async fn read_answer_key(
        &self,
        image: &[u8],
        mime_type: &str,
    ) -> Result<KeyExtraction, OcrError> {
        let text = self.generate(ANSWER_KEY_PROMPT, image, mime_type).await?;
        parse_key_extraction(&text)
    }

    async fn read_student_sheet(
        &self,
        image: &[u8],
        mime_type: &str,
    ) -> Result<SheetExtraction, OcrError> {
        let text = self.generate(STUDENT_SHEET_PROMPT, image, mime_type).await?;
        parse_sheet_extraction(&text)
    }
}

fn upstream_message(body: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let error = parsed.as_ref().and_then(|value| value.get("error"));
    let status = error.and_then(|err| err.get("status")).and_then(Value::as_str);
    let message = error.and_then(|err| err.get("message")).and_then(Value::as_str);

    match (status, message) {
        (Some(status), Some(message)) => format!("{status}: {message}"),
        (None, Some(message)) => message.to_string(),
        _ => body.chars().take(500).collect(),
    }
}

/// Quota markers, plus a bare 429 status for throttled responses whose body
/// carries no quota wording.
pub(crate) fn is_rate_limited(message: &str) -> bool {
    message.contains(" 429 ") || is_quota_error(message)
}

fn extract_text(body: &str) -> Result<String, OcrError> {
    let response: GenerateResponse =
        serde_json::from_str(body).map_err(|err| OcrError::InvalidJson(err.to_string()))?;

    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .map(|content| content.parts.into_iter().filter_map(|part| part.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(OcrError::EmptyResponse);
    }
    Ok(text)
}

/// Drops a surrounding Markdown code fence (```json ... ```), if present.
pub(crate) fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

pub(crate) fn parse_key_extraction(text: &str) -> Result<KeyExtraction, OcrError> {
    let extraction: KeyExtraction = serde_json::from_str(strip_code_fences(text))
        .map_err(|err| OcrError::InvalidJson(err.to_string()))?;

    if extraction.answers.is_empty() {
        return Err(OcrError::Rejected("No answers found in the image".to_string()));
    }

    for answer in &extraction.answers {
        if answer.question_number <= 0 {
            return Err(OcrError::Rejected(format!(
                "Invalid question number: {}",
                answer.question_number
            )));
        }

        let mut options =
            answer.correct_options.iter().chain(answer.correct_option.iter()).peekable();
        if options.peek().is_none() {
            return Err(OcrError::Rejected(format!(
                "No correct options for question {}",
                answer.question_number
            )));
        }
        for option in options {
            if option.trim().is_empty() || option.chars().count() > MAX_OPTION_LEN {
                return Err(OcrError::Rejected(format!(
                    "Invalid option in question {}: {option}",
                    answer.question_number
                )));
            }
        }
    }

    Ok(extraction)
}

pub(crate) fn parse_sheet_extraction(text: &str) -> Result<SheetExtraction, OcrError> {
    let extraction: SheetExtraction = serde_json::from_str(strip_code_fences(text))
        .map_err(|err| OcrError::InvalidJson(err.to_string()))?;

    if extraction.answers.is_empty() {
        return Err(OcrError::Rejected("No answers found in the image".to_string()));
    }

    for answer in &extraction.answers {
        if answer.question_number <= 0 {
            return Err(OcrError::Rejected(format!(
                "Invalid question number: {}",
                answer.question_number
            )));
        }
        for option in answer.raw_labels() {
            let upper = option.trim().to_uppercase();
            if !VALID_SELECTIONS.contains(&upper.as_str()) {
                return Err(OcrError::Rejected(format!(
                    "Invalid option letter in question {}: {option}",
                    answer.question_number
                )));
            }
        }
    }

    for warning in suspicious_patterns(&extraction) {
        tracing::warn!(roll_number = ?extraction.roll_number, "{warning}");
    }

    Ok(extraction)
}

/// Shapes that usually mean the model misread the sheet rather than that the
/// student answered that way.
pub(crate) fn suspicious_patterns(extraction: &SheetExtraction) -> Vec<String> {
    let total = extraction.answers.len();
    if total == 0 {
        return Vec::new();
    }

    let mut warnings = Vec::new();
    let only_a = extraction
        .answers
        .iter()
        .filter(|answer| {
            let labels = answer.raw_labels();
            labels.len() == 1 && labels[0].trim().eq_ignore_ascii_case("A")
        })
        .count();
    if only_a as f64 > total as f64 * 0.7 {
        warnings.push(format!("{only_a}/{total} questions show only 'A' selected"));
    }

    let unanswered =
        extraction.answers.iter().filter(|answer| answer.raw_labels().is_empty()).count();
    if unanswered as f64 > total as f64 * 0.5 {
        warnings.push(format!("{unanswered}/{total} questions have no selections"));
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::State;
    use axum::http::HeaderMap;
    use axum::routing::post;
    use axum::{Json, Router};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn strip_code_fences_handles_json_blocks() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("  {\"b\":2} "), "{\"b\":2}");
    }

    #[test]
    fn parse_key_accepts_numbers_and_legacy_fields() {
        let text = r#"```json
        {"total_questions": 2, "answers": [
            {"question_number": 1, "correct_options": ["A", 3], "marks": 2, "marks_text": "marks-2"},
            {"question_number": 2, "correct_option": "b", "marks_text": 4}
        ]}
        ```"#;

        let extraction = parse_key_extraction(text).expect("key");
        assert_eq!(extraction.total_questions, Some(2));
        assert_eq!(extraction.answers[0].correct_options, vec!["A".to_string(), "3".to_string()]);
        assert_eq!(extraction.answers[1].correct_option.as_deref(), Some("b"));
        assert_eq!(extraction.answers[1].marks_text.as_deref(), Some("4"));
    }

    #[test]
    fn parse_key_rejects_bad_entries() {
        let zero = r#"{"answers": [{"question_number": 0, "correct_options": ["A"]}]}"#;
        assert!(matches!(parse_key_extraction(zero), Err(OcrError::Rejected(_))));

        let empty_options = r#"{"answers": [{"question_number": 1, "correct_options": []}]}"#;
        assert!(matches!(parse_key_extraction(empty_options), Err(OcrError::Rejected(_))));

        let long_option =
            r#"{"answers": [{"question_number": 1, "correct_options": ["ABCDEFGHIJK"]}]}"#;
        assert!(matches!(parse_key_extraction(long_option), Err(OcrError::Rejected(_))));

        assert!(matches!(parse_key_extraction(r#"{"answers": []}"#), Err(OcrError::Rejected(_))));
        assert!(matches!(parse_key_extraction("not json"), Err(OcrError::InvalidJson(_))));
    }

    #[test]
    fn parse_sheet_reads_header_and_answers() {
        let text = r#"{
            "roll_number": "21cs045", "section": "B", "student_name": null,
            "paper_info": {"paper_name": "Physics", "total_marks": 50, "date": "null"},
            "answers": [
                {"question_number": 1, "selected_options": ["b"]},
                {"question_number": 2, "selected_options": []},
                {"question_number": 3, "selected_option": "C"}
            ]
        }"#;

        let extraction = parse_sheet_extraction(text).expect("sheet");
        assert_eq!(extraction.roll_number.as_deref(), Some("21cs045"));
        assert_eq!(extraction.student_name, None);
        assert_eq!(extraction.paper_info.paper_name.as_deref(), Some("Physics"));
        assert_eq!(extraction.paper_info.total_marks.as_deref(), Some("50"));
        assert_eq!(extraction.paper_info.date, None);
        assert_eq!(extraction.answers.len(), 3);
        assert_eq!(extraction.answers[2].raw_labels(), vec!["C".to_string()]);
    }

    #[test]
    fn parse_sheet_rejects_unknown_letters() {
        let text = r#"{"answers": [{"question_number": 1, "selected_options": ["E"]}]}"#;
        assert!(matches!(parse_sheet_extraction(text), Err(OcrError::Rejected(_))));
    }

    #[test]
    fn suspicious_patterns_flag_all_a_and_blank_sheets() {
        let all_a = parse_sheet_extraction(
            r#"{"answers": [
                {"question_number": 1, "selected_options": ["A"]},
                {"question_number": 2, "selected_options": ["A"]},
                {"question_number": 3, "selected_options": ["A"]},
                {"question_number": 4, "selected_options": ["B"]}
            ]}"#,
        )
        .expect("sheet");
        assert_eq!(suspicious_patterns(&all_a), vec!["3/4 questions show only 'A' selected"]);

        let blank = parse_sheet_extraction(
            r#"{"answers": [
                {"question_number": 1, "selected_options": []},
                {"question_number": 2, "selected_options": []},
                {"question_number": 3, "selected_options": ["C"]}
            ]}"#,
        )
        .expect("sheet");
        assert_eq!(suspicious_patterns(&blank), vec!["2/3 questions have no selections"]);
    }

    #[test]
    fn extract_text_joins_candidate_parts() {
        let body =
            r#"{"candidates": [{"content": {"parts": [{"text": "{\"a\":"}, {"text": "1}"}]}}]}"#;
        assert_eq!(extract_text(body).expect("text"), "{\"a\":1}");
        assert!(matches!(extract_text(r#"{"candidates": []}"#), Err(OcrError::EmptyResponse)));
    }

    #[test]
    fn upstream_message_prefers_structured_error() {
        let body = r#"{"error": {"code": 429, "status": "RESOURCE_EXHAUSTED", "message": "Quota"}}"#;
        assert_eq!(upstream_message(body), "RESOURCE_EXHAUSTED: Quota");
        assert_eq!(upstream_message("plain failure"), "plain failure");
    }

    #[test]
    fn throttled_status_counts_as_rate_limited() {
        let err = OcrError::Upstream {
            status: StatusCode::TOO_MANY_REQUESTS,
            message: "try later".to_string(),
        };
        assert!(is_rate_limited(&err.to_string()));
        assert!(!is_rate_limited("Gemini returned 400 Bad Request: bad image"));
    }

    #[derive(Clone)]
    struct FakeGemini {
        calls: Arc<AtomicUsize>,
    }

    async fn fake_generate(
        State(fake): State<FakeGemini>,
        headers: HeaderMap,
        Json(payload): Json<Value>,
    ) -> (StatusCode, Json<Value>) {
        fake.calls.fetch_add(1, Ordering::SeqCst);
        let key = headers.get("x-goog-api-key").and_then(|value| value.to_str().ok());
        let has_image = payload["contents"][0]["parts"][1]["inline_data"]["data"].is_string();

        if key == Some("rate-limited-key-0001") {
            let body = json!({"error": {"status": "RESOURCE_EXHAUSTED", "message": "Quota exceeded"}});
            return (StatusCode::TOO_MANY_REQUESTS, Json(body));
        }
        if !has_image {
            return (StatusCode::BAD_REQUEST, Json(json!({"error": {"message": "missing image"}})));
        }

        let text = r#"{"answers": [{"question_number": 1, "correct_options": ["A"], "marks": 2}]}"#;
        (StatusCode::OK, Json(json!({"candidates": [{"content": {"parts": [{"text": text}]}}]})))
    }

    #[tokio::test]
    async fn reader_fails_over_to_backup_key_over_http() {
        let calls = Arc::new(AtomicUsize::new(0));
        let app = Router::new()
            .route("/v1beta/models/:model", post(fake_generate))
            .with_state(FakeGemini { calls: Arc::clone(&calls) });
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve");
        });

        let pool = Arc::new(
            CredentialPool::new(vec![
                "rate-limited-key-0001".to_string(),
                "healthy-backup-key-0002".to_string(),
            ])
            .expect("pool"),
        );
        let reader = GeminiReader {
            client: Client::new(),
            base_url: format!("http://{addr}"),
            model: "gemini-test".to_string(),
            pool: Arc::clone(&pool),
        };

        let extraction = reader.read_answer_key(b"fake-image", "image/png").await.expect("key");
        assert_eq!(extraction.answers.len(), 1);
        assert_eq!(extraction.answers[0].marks, Some(2.0));
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let status = pool.status();
        assert_eq!(status.active_index, 1);
        assert_eq!(status.exhausted_indices, vec![0]);
        assert_eq!(status.usage_counts, vec![0, 1]);
    }
}
