use std::collections::HashSet;

use sqlx::PgPool;
use uuid::Uuid;

use crate::core::time::primitive_now_utc;
use crate::db::models::{AnswerKey, QuestionPaper};
use crate::db::types::QuestionType;
use crate::repositories;
use crate::schemas::paper::KeyAnswerInput;
use crate::services::grading::GradingError;
use crate::services::options::{extract_marks_from_text, normalize_answer_labels};

/// A validated key entry ready to be stored.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PreparedKeyEntry {
    pub(crate) question_number: i32,
    pub(crate) correct_options: Vec<String>,
    pub(crate) marks: f64,
    pub(crate) question_type: QuestionType,
}

fn resolve_marks(answer: &KeyAnswerInput) -> f64 {
    match (answer.marks, answer.marks_text.as_deref()) {
        (Some(marks), Some(text)) if marks == 1.0 => extract_marks_from_text(text),
        (None, Some(text)) => extract_marks_from_text(text),
        (Some(marks), _) => marks,
        (None, None) => 1.0,
    }
}

/// Validates and normalizes key entries, keeping their order.
pub(crate) fn prepare_key(answers: &[KeyAnswerInput]) -> Result<Vec<PreparedKeyEntry>, GradingError> {
    if answers.is_empty() {
        return Err(GradingError::Invalid("Answer key has no answers".to_string()));
    }

    let mut seen = HashSet::new();
    let mut prepared = Vec::with_capacity(answers.len());

    for answer in answers {
        let question_number = i32::try_from(answer.question_number)
            .ok()
            .filter(|number| *number > 0)
            .ok_or_else(|| {
                GradingError::Invalid(format!(
                    "Invalid question number: {}",
                    answer.question_number
                ))
            })?;

        if !seen.insert(question_number) {
            return Err(GradingError::Invalid(format!(
                "Duplicate question number: {question_number}"
            )));
        }

        let raw = answer.correct_options.iter().chain(answer.correct_option.iter());
        let correct_options: Vec<String> = normalize_answer_labels(raw).into_iter().collect();
        if correct_options.is_empty() {
            return Err(GradingError::Invalid(format!(
                "Question {question_number} has no correct options"
            )));
        }

        let marks = resolve_marks(answer);
        if !marks.is_finite() || marks <= 0.0 {
            return Err(GradingError::Invalid(format!(
                "Question {question_number} must carry positive marks"
            )));
        }

        let question_type =
            QuestionType::resolve(answer.question_type.as_deref(), correct_options.len());

        prepared.push(PreparedKeyEntry { question_number, correct_options, marks, question_type });
    }

    Ok(prepared)
}

/// Creates a paper and its key in one transaction.
pub(crate) async fn store_answer_key(
    pool: &PgPool,
    paper_name: &str,
    entries: &[PreparedKeyEntry],
) -> Result<(QuestionPaper, Vec<AnswerKey>), GradingError> {
    let paper_name = paper_name.trim();
    if paper_name.is_empty() {
        return Err(GradingError::Invalid("paper_name must not be empty".to_string()));
    }
    let total_questions = i32::try_from(entries.len())
        .map_err(|_| GradingError::Invalid("Answer key is too large".to_string()))?;

    let now = primitive_now_utc();
    let mut tx = pool.begin().await?;

    let paper_id = Uuid::new_v4().to_string();
    let paper =
        repositories::papers::create(&mut *tx, &paper_id, paper_name, total_questions, now)
            .await?;

    let mut key = Vec::with_capacity(entries.len());
    for entry in entries {
        let id = Uuid::new_v4().to_string();
        let stored = repositories::answer_keys::create(
            &mut *tx,
            repositories::answer_keys::CreateKeyEntry {
                id: &id,
                paper_id: &paper.id,
                question_number: entry.question_number,
                correct_options: &entry.correct_options,
                marks: entry.marks,
                question_type: entry.question_type,
                created_at: now,
            },
        )
        .await?;
        key.push(stored);
    }

    tx.commit().await?;

    metrics::counter!("answer_keys_stored_total").increment(1);
    tracing::info!(paper_id = %paper.id, total_questions, "Answer key stored");

    Ok((paper, key))
}
