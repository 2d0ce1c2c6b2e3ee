use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{deserialize_labels, deserialize_optional_label, deserialize_optional_text};
use crate::services::marking::StatusCounts;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct StudentAnswerInput {
    pub(crate) question_number: i64,
    #[serde(default, deserialize_with = "deserialize_labels")]
    pub(crate) selected_options: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_optional_label")]
    pub(crate) selected_option: Option<String>,
}

impl StudentAnswerInput {
    /// Raw labels from either the list field or the legacy single field.
    pub(crate) fn raw_labels(&self) -> Vec<String> {
        let mut labels = self.selected_options.clone();
        if let Some(single) = &self.selected_option {
            labels.push(single.clone());
        }
        labels
    }
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ManualSubmissionCreate {
    #[validate(length(min = 1, message = "paper_id is required"))]
    pub(crate) paper_id: String,
    pub(crate) roll_number: String,
    #[serde(default)]
    #[validate(length(max = 200, message = "student_name must be at most 200 characters"))]
    pub(crate) student_name: Option<String>,
    #[serde(default)]
    #[validate(length(max = 50, message = "section must be at most 50 characters"))]
    pub(crate) section: Option<String>,
    #[validate(length(min = 1, message = "answers must not be empty"))]
    pub(crate) answers: Vec<StudentAnswerInput>,
}

/// Header fields printed on a student's answer sheet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub(crate) struct PaperInfo {
    #[serde(default, deserialize_with = "deserialize_optional_text")]
    pub(crate) paper_name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_text")]
    pub(crate) subject: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_text")]
    pub(crate) date: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_text")]
    pub(crate) duration: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_text")]
    pub(crate) total_marks: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_text")]
    pub(crate) class_grade: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct DraftAnswer {
    pub(crate) question_number: i64,
    #[serde(default, deserialize_with = "deserialize_labels")]
    pub(crate) selected_options: Vec<String>,
}

/// One student's answers assembled from OCR, returned for review and sent
/// back (possibly edited) to be saved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct SheetDraft {
    #[serde(default, deserialize_with = "deserialize_optional_text")]
    pub(crate) roll_number: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_text")]
    pub(crate) student_name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_text")]
    pub(crate) section: Option<String>,
    #[serde(default)]
    pub(crate) paper_info: PaperInfo,
    #[serde(default)]
    pub(crate) images_count: i32,
    #[serde(default)]
    pub(crate) answers: Vec<DraftAnswer>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ImageFailure {
    pub(crate) filename: String,
    pub(crate) error: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct OcrPreviewResponse {
    pub(crate) paper_id: String,
    pub(crate) paper_name: String,
    pub(crate) requires_confirmation: bool,
    pub(crate) images_processed: usize,
    pub(crate) students: Vec<SheetDraft>,
    pub(crate) failed_images: Vec<ImageFailure>,
    pub(crate) warnings: Vec<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ConfirmSubmissionsRequest {
    #[validate(length(min = 1, message = "paper_id is required"))]
    pub(crate) paper_id: String,
    #[validate(length(min = 1, message = "students must not be empty"))]
    pub(crate) students: Vec<SheetDraft>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SubmissionSaved {
    pub(crate) submission_id: String,
    pub(crate) roll_number: String,
    pub(crate) total_marks: f64,
    pub(crate) max_marks: f64,
    pub(crate) percentage: f64,
    pub(crate) grade: &'static str,
    pub(crate) statistics: StatusCounts,
}

#[derive(Debug, Serialize)]
pub(crate) struct SkippedDraft {
    pub(crate) roll_number: Option<String>,
    pub(crate) reason: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct ConfirmSubmissionsResponse {
    pub(crate) saved: Vec<SubmissionSaved>,
    pub(crate) skipped: Vec<SkippedDraft>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubmissionListQuery {
    #[serde(default = "crate::api::pagination::default_limit")]
    pub(crate) limit: i64,
    #[serde(default)]
    pub(crate) offset: i64,
}

#[derive(Debug, Serialize)]
pub(crate) struct SubmissionListItem {
    pub(crate) submission_id: String,
    pub(crate) paper_id: String,
    pub(crate) paper_name: String,
    pub(crate) roll_number: String,
    pub(crate) student_name: Option<String>,
    pub(crate) section: Option<String>,
    pub(crate) total_marks: f64,
    pub(crate) max_marks: f64,
    pub(crate) percentage: f64,
    pub(crate) grade: &'static str,
    pub(crate) submitted_at: String,
}

impl From<crate::repositories::submissions::SubmissionResultRow> for SubmissionListItem {
    fn from(row: crate::repositories::submissions::SubmissionResultRow) -> Self {
        Self {
            grade: crate::services::grades::Grade::from_percentage(row.percentage).as_str(),
            submitted_at: crate::core::time::format_primitive(row.submitted_at),
            submission_id: row.submission_id,
            paper_id: row.paper_id,
            paper_name: row.paper_name,
            roll_number: row.roll_number,
            student_name: row.student_name,
            section: row.section,
            total_marks: row.total_marks,
            max_marks: row.max_marks,
            percentage: row.percentage,
        }
    }
}
