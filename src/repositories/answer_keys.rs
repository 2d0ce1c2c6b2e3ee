use time::PrimitiveDateTime;

use crate::db::models::AnswerKey;
use crate::db::types::QuestionType;

pub(crate) const COLUMNS: &str =
    "id, paper_id, question_number, correct_options, marks, question_type, created_at";

pub(crate) struct CreateKeyEntry<'a> {
    pub(crate) id: &'a str,
    pub(crate) paper_id: &'a str,
    pub(crate) question_number: i32,
    pub(crate) correct_options: &'a [String],
    pub(crate) marks: f64,
    pub(crate) question_type: QuestionType,
    pub(crate) created_at: PrimitiveDateTime,
}

pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    params: CreateKeyEntry<'_>,
) -> Result<AnswerKey, sqlx::Error> {
    sqlx::query_as::<_, AnswerKey>(&format!(
        "INSERT INTO answer_keys \
         (id, paper_id, question_number, correct_options, marks, question_type, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {COLUMNS}"
    ))
    .bind(params.id)
    .bind(params.paper_id)
    .bind(params.question_number)
    .bind(params.correct_options)
    .bind(params.marks)
    .bind(params.question_type)
    .bind(params.created_at)
    .fetch_one(executor)
    .await
}

pub(crate) async fn list_for_paper(
    executor: impl sqlx::PgExecutor<'_>,
    paper_id: &str,
) -> Result<Vec<AnswerKey>, sqlx::Error> {
    sqlx::query_as::<_, AnswerKey>(&format!(
        "SELECT {COLUMNS} FROM answer_keys WHERE paper_id = $1 ORDER BY question_number"
    ))
    .bind(paper_id)
    .fetch_all(executor)
    .await
}

pub(crate) async fn max_marks_for_paper(
    executor: impl sqlx::PgExecutor<'_>,
    paper_id: &str,
) -> Result<f64, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT COALESCE(SUM(marks), 0)::DOUBLE PRECISION FROM answer_keys WHERE paper_id = $1",
    )
    .bind(paper_id)
    .fetch_one(executor)
    .await
}
