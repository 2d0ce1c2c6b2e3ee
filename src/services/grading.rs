//! Persists student submissions and scores them against the stored key.

use std::collections::{BTreeMap, BTreeSet};

use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::core::time::{format_primitive, primitive_now_utc};
use crate::db::models::AnswerKey;
use crate::repositories;
use crate::schemas::result::{DetailedResultResponse, QuestionBreakdown, ResultStatistics};
use crate::schemas::submission::{PaperInfo, SubmissionSaved};
use crate::services::grades::Grade;
use crate::services::marking::{score_submission, QuestionPair, ScoreSheet};
use crate::services::options::normalize_answer_labels;

#[derive(Debug, Error)]
pub(crate) enum GradingError {
    #[error("{0}")]
    Invalid(String),
    #[error("Question paper not found")]
    PaperNotFound,
    #[error("Submission not found")]
    SubmissionNotFound,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl GradingError {
    /// The database's message when it refused the row on its content rather
    /// than failing as a service.
    pub(crate) fn rejected_row_reason(&self) -> Option<String> {
        let GradingError::Database(sqlx::Error::Database(db)) = self else {
            return None;
        };
        let code = db.code()?;
        is_row_rejection(&code).then(|| db.message().to_string())
    }
}

/// SQLSTATE class 22 (data exception) or 23 (integrity constraint violation).
fn is_row_rejection(sqlstate: &str) -> bool {
    sqlstate.starts_with("22") || sqlstate.starts_with("23")
}

/// Column widths of `student_submissions.student_name` and `.section`.
pub(crate) const MAX_STUDENT_NAME_LEN: usize = 200;
pub(crate) const MAX_SECTION_LEN: usize = 50;

/// Rejects header text that would not fit its column.
pub(crate) fn check_header_lengths(
    student_name: Option<&str>,
    section: Option<&str>,
) -> Result<(), GradingError> {
    let fields = [
        ("student_name", student_name, MAX_STUDENT_NAME_LEN),
        ("section", section, MAX_SECTION_LEN),
    ];
    for (field, value, max) in fields {
        if optional_text(value).is_some_and(|text| text.chars().count() > max) {
            return Err(GradingError::Invalid(format!(
                "{field} must be at most {max} characters"
            )));
        }
    }
    Ok(())
}

/// A student's answers keyed by question number, labels already normalized.
pub(crate) type AnswerMap = BTreeMap<i32, BTreeSet<String>>;

#[derive(Debug, Clone)]
pub(crate) struct NewSubmission {
    pub(crate) roll_number: String,
    pub(crate) student_name: Option<String>,
    pub(crate) section: Option<String>,
    pub(crate) images_count: i32,
    pub(crate) paper_info: PaperInfo,
    pub(crate) answers: AnswerMap,
}

/// Normalizes raw `(question_number, labels)` pairs. Question numbers must be
/// positive and unique; an answer with no labels is kept as unanswered.
pub(crate) fn prepare_answers<I, L>(answers: I) -> Result<AnswerMap, GradingError>
where
    I: IntoIterator<Item = (i64, L)>,
    L: IntoIterator,
    L::Item: AsRef<str>,
{
    let mut prepared = AnswerMap::new();
    for (question_number, labels) in answers {
        let number = i32::try_from(question_number)
            .ok()
            .filter(|number| *number > 0)
            .ok_or_else(|| {
                GradingError::Invalid(format!("Invalid question number: {question_number}"))
            })?;
        if prepared.insert(number, normalize_answer_labels(labels)).is_some() {
            return Err(GradingError::Invalid(format!("Duplicate question number: {number}")));
        }
    }

    if prepared.is_empty() {
        return Err(GradingError::Invalid("Submission has no answers".to_string()));
    }
    Ok(prepared)
}

/// Pairs every key entry with the student's response, in key order.
pub(crate) fn pair_with_key(key: &[AnswerKey], answers: &AnswerMap) -> Vec<QuestionPair> {
    key.iter()
        .map(|entry| QuestionPair {
            question_number: entry.question_number,
            correct: entry.correct_options.iter().cloned().collect(),
            marks: entry.marks,
            selected: answers.get(&entry.question_number).cloned(),
        })
        .collect()
}

fn optional_text(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|text| !text.is_empty())
}

/// Saves one submission and its result atomically, replacing any earlier
/// submission of the same roll number for the same paper.
pub(crate) async fn save_submission(
    pool: &PgPool,
    paper_id: &str,
    submission: &NewSubmission,
) -> Result<SubmissionSaved, GradingError> {
    check_header_lengths(submission.student_name.as_deref(), submission.section.as_deref())?;
    let now = primitive_now_utc();
    let mut tx = pool.begin().await?;

    let paper = repositories::papers::find_by_id(&mut *tx, paper_id)
        .await?
        .ok_or(GradingError::PaperNotFound)?;
    let key = repositories::answer_keys::list_for_paper(&mut *tx, &paper.id).await?;

    let replaced =
        repositories::submissions::delete_for_roll(&mut *tx, &paper.id, &submission.roll_number)
            .await?;

    let submission_id = Uuid::new_v4().to_string();
    repositories::submissions::create(
        &mut *tx,
        repositories::submissions::CreateSubmission {
            id: &submission_id,
            paper_id: &paper.id,
            roll_number: &submission.roll_number,
            section: optional_text(submission.section.as_deref()),
            student_name: optional_text(submission.student_name.as_deref()),
            images_count: submission.images_count.max(1),
            paper_info: &submission.paper_info,
            submitted_at: now,
        },
    )
    .await?;

    for (question_number, selected) in &submission.answers {
        let selected: Vec<String> = selected.iter().cloned().collect();
        repositories::submissions::insert_answer(
            &mut *tx,
            &Uuid::new_v4().to_string(),
            &submission_id,
            *question_number,
            &selected,
        )
        .await?;
    }

    let sheet = score_submission(pair_with_key(&key, &submission.answers));
    repositories::results::create(&mut *tx, &Uuid::new_v4().to_string(), &submission_id, &sheet, now)
        .await?;

    tx.commit().await?;

    metrics::counter!("submissions_saved_total").increment(1);
    tracing::info!(
        paper_id = %paper.id,
        submission_id = %submission_id,
        roll_number = %submission.roll_number,
        replaced = replaced > 0,
        total_marks = sheet.total_marks,
        max_marks = sheet.max_marks,
        "Submission scored"
    );

    Ok(saved_summary(submission_id, submission.roll_number.clone(), &sheet))
}

fn saved_summary(submission_id: String, roll_number: String, sheet: &ScoreSheet) -> SubmissionSaved {
    SubmissionSaved {
        submission_id,
        roll_number,
        total_marks: sheet.total_marks,
        max_marks: sheet.max_marks,
        percentage: sheet.percentage,
        grade: Grade::from_percentage(sheet.percentage).as_str(),
        statistics: sheet.counts,
    }
}

/// Rebuilds the question-wise breakdown of a stored submission.
pub(crate) async fn detailed_result(
    pool: &PgPool,
    submission_id: &str,
) -> Result<DetailedResultResponse, GradingError> {
    let submission = repositories::submissions::find_by_id(pool, submission_id)
        .await?
        .ok_or(GradingError::SubmissionNotFound)?;
    let paper = repositories::papers::find_by_id(pool, &submission.paper_id)
        .await?
        .ok_or(GradingError::PaperNotFound)?;
    let key = repositories::answer_keys::list_for_paper(pool, &paper.id).await?;
    let answers: AnswerMap = repositories::submissions::list_answers(pool, &submission.id)
        .await?
        .into_iter()
        .map(|answer| (answer.question_number, answer.selected_options.into_iter().collect()))
        .collect();

    let sheet = score_submission(pair_with_key(&key, &answers));

    let questions = key
        .iter()
        .zip(sheet.questions.iter())
        .map(|(entry, score)| QuestionBreakdown {
            question_number: score.question_number,
            correct_options: entry.correct_options.clone(),
            selected_options: answers
                .get(&entry.question_number)
                .map(|selected| selected.iter().cloned().collect())
                .unwrap_or_default(),
            max_marks: score.max_marks,
            status: score.result.status(),
            result: score.result.clone(),
        })
        .collect();

    let total_questions = i32::try_from(sheet.questions.len()).unwrap_or(i32::MAX);

    Ok(DetailedResultResponse {
        submission_id: submission.id,
        paper_id: paper.id,
        paper_name: paper.paper_name,
        roll_number: submission.roll_number,
        student_name: submission.student_name,
        section: submission.section,
        paper_info: PaperInfo {
            paper_name: submission.extracted_paper_name,
            subject: submission.extracted_subject,
            date: submission.extracted_date,
            duration: submission.extracted_duration,
            total_marks: submission.extracted_total_marks,
            class_grade: submission.extracted_class_grade,
        },
        submitted_at: format_primitive(submission.submitted_at),
        total_marks: sheet.total_marks,
        max_marks: sheet.max_marks,
        percentage: sheet.percentage,
        grade: Grade::from_percentage(sheet.percentage).as_str(),
        statistics: ResultStatistics {
            counts: sheet.counts,
            total_questions,
            percentage: sheet.percentage,
        },
        questions,
    })
}
