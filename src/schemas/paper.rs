use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{deserialize_labels, deserialize_optional_label, deserialize_optional_text};
use crate::core::time::format_primitive;
use crate::db::models::{AnswerKey, QuestionPaper};
use crate::db::types::QuestionType;

/// One key entry as typed by a teacher or read by OCR.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct KeyAnswerInput {
    pub(crate) question_number: i64,
    #[serde(default, deserialize_with = "deserialize_labels")]
    pub(crate) correct_options: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_optional_label")]
    pub(crate) correct_option: Option<String>,
    #[serde(default)]
    pub(crate) marks: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_optional_text")]
    pub(crate) marks_text: Option<String>,
    #[serde(default)]
    pub(crate) question_type: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ManualKeyCreate {
    #[validate(length(min = 1, max = 200, message = "paper_name must be 1-200 characters"))]
    pub(crate) paper_name: String,
    #[validate(length(min = 1, message = "answers must not be empty"))]
    pub(crate) answers: Vec<KeyAnswerInput>,
}

#[derive(Debug, Serialize)]
pub(crate) struct PaperSummary {
    pub(crate) id: String,
    pub(crate) paper_name: String,
    pub(crate) total_questions: i32,
    pub(crate) answer_count: i64,
    pub(crate) created_at: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct AnswerKeyEntryResponse {
    pub(crate) question_number: i32,
    pub(crate) correct_options: Vec<String>,
    pub(crate) marks: f64,
    pub(crate) question_type: QuestionType,
}

impl From<AnswerKey> for AnswerKeyEntryResponse {
    fn from(entry: AnswerKey) -> Self {
        Self {
            question_number: entry.question_number,
            correct_options: entry.correct_options,
            marks: entry.marks,
            question_type: entry.question_type,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct PaperDetailResponse {
    pub(crate) id: String,
    pub(crate) paper_name: String,
    pub(crate) total_questions: i32,
    pub(crate) max_marks: f64,
    pub(crate) created_at: String,
    pub(crate) answers: Vec<AnswerKeyEntryResponse>,
}

impl PaperDetailResponse {
    pub(crate) fn from_parts(paper: QuestionPaper, key: Vec<AnswerKey>) -> Self {
        let max_marks = crate::services::marking::round2(key.iter().map(|entry| entry.marks).sum());
        Self {
            id: paper.id,
            paper_name: paper.paper_name,
            total_questions: paper.total_questions,
            max_marks,
            created_at: format_primitive(paper.created_at),
            answers: key.into_iter().map(AnswerKeyEntryResponse::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct PaperDeletedResponse {
    pub(crate) message: String,
    pub(crate) paper_id: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct SubmissionPreviewRow {
    pub(crate) roll_number: String,
    pub(crate) student_name: Option<String>,
    pub(crate) section: Option<String>,
    pub(crate) total_marks: f64,
    pub(crate) max_marks: f64,
    pub(crate) percentage: f64,
    pub(crate) grade: &'static str,
    pub(crate) submitted_at: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct SubmissionsPreviewResponse {
    pub(crate) paper_id: String,
    pub(crate) paper_name: String,
    pub(crate) max_marks: f64,
    pub(crate) total_submissions: i64,
    pub(crate) submissions: Vec<SubmissionPreviewRow>,
}
