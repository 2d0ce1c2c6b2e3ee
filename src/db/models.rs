use serde::Serialize;
use sqlx::FromRow;
use time::PrimitiveDateTime;

use crate::db::types::QuestionType;

#[derive(Debug, Clone, Serialize, FromRow)]
pub(crate) struct QuestionPaper {
    pub(crate) id: String,
    pub(crate) paper_name: String,
    pub(crate) total_questions: i32,
    pub(crate) created_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub(crate) struct AnswerKey {
    pub(crate) id: String,
    pub(crate) paper_id: String,
    pub(crate) question_number: i32,
    pub(crate) correct_options: Vec<String>,
    pub(crate) marks: f64,
    pub(crate) question_type: QuestionType,
    pub(crate) created_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub(crate) struct StudentSubmission {
    pub(crate) id: String,
    pub(crate) paper_id: String,
    pub(crate) roll_number: String,
    pub(crate) section: Option<String>,
    pub(crate) student_name: Option<String>,
    pub(crate) images_count: i32,
    pub(crate) extracted_paper_name: Option<String>,
    pub(crate) extracted_subject: Option<String>,
    pub(crate) extracted_date: Option<String>,
    pub(crate) extracted_duration: Option<String>,
    pub(crate) extracted_total_marks: Option<String>,
    pub(crate) extracted_class_grade: Option<String>,
    pub(crate) submitted_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub(crate) struct StudentAnswer {
    pub(crate) id: String,
    pub(crate) submission_id: String,
    pub(crate) question_number: i32,
    pub(crate) selected_options: Vec<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub(crate) struct SubmissionResult {
    pub(crate) id: String,
    pub(crate) submission_id: String,
    pub(crate) total_questions: i32,
    pub(crate) correct_answers: i32,
    pub(crate) partial_answers: i32,
    pub(crate) incorrect_answers: i32,
    pub(crate) not_answered: i32,
    pub(crate) total_marks: f64,
    pub(crate) max_marks: f64,
    pub(crate) percentage: f64,
    pub(crate) created_at: PrimitiveDateTime,
}
