use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::SubmissionResult;
use crate::repositories::submissions::SubmissionResultRow;
use crate::services::marking::ScoreSheet;

pub(crate) const COLUMNS: &str = "\
    id, submission_id, total_questions, correct_answers, partial_answers, \
    incorrect_answers, not_answered, total_marks, max_marks, percentage, created_at";

pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    submission_id: &str,
    sheet: &ScoreSheet,
    created_at: PrimitiveDateTime,
) -> Result<SubmissionResult, sqlx::Error> {
    let total_questions = i32::try_from(sheet.questions.len()).unwrap_or(i32::MAX);
    sqlx::query_as::<_, SubmissionResult>(&format!(
        "INSERT INTO results ({COLUMNS}) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) RETURNING {COLUMNS}"
    ))
    .bind(id)
    .bind(submission_id)
    .bind(total_questions)
    .bind(sheet.counts.correct)
    .bind(sheet.counts.partial)
    .bind(sheet.counts.incorrect)
    .bind(sheet.counts.not_answered)
    .bind(sheet.total_marks)
    .bind(sheet.max_marks)
    .bind(sheet.percentage)
    .bind(created_at)
    .fetch_one(executor)
    .await
}

pub(crate) async fn average_percentage(pool: &PgPool) -> Result<f64, sqlx::Error> {
    sqlx::query_scalar("SELECT COALESCE(AVG(percentage), 0)::DOUBLE PRECISION FROM results")
        .fetch_one(pool)
        .await
}

pub(crate) async fn top_performers(
    pool: &PgPool,
    limit: i64,
) -> Result<Vec<SubmissionResultRow>, sqlx::Error> {
    sqlx::query_as::<_, SubmissionResultRow>(
        "SELECT s.id AS submission_id, s.paper_id, p.paper_name, s.roll_number, s.student_name, \
                s.section, s.submitted_at, r.total_marks, r.max_marks, r.percentage \
         FROM results r \
         JOIN student_submissions s ON s.id = r.submission_id \
         JOIN question_papers p ON p.id = s.paper_id \
         ORDER BY r.percentage DESC, s.submitted_at \
         LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await
}

pub(crate) async fn all_percentages(pool: &PgPool) -> Result<Vec<f64>, sqlx::Error> {
    sqlx::query_scalar("SELECT percentage FROM results").fetch_all(pool).await
}
