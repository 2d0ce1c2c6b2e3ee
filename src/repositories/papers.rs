use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::QuestionPaper;

pub(crate) const COLUMNS: &str = "id, paper_name, total_questions, created_at";

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct PaperListRow {
    pub(crate) id: String,
    pub(crate) paper_name: String,
    pub(crate) total_questions: i32,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) answer_count: i64,
}

pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    paper_name: &str,
    total_questions: i32,
    created_at: PrimitiveDateTime,
) -> Result<QuestionPaper, sqlx::Error> {
    sqlx::query_as::<_, QuestionPaper>(&format!(
        "INSERT INTO question_papers (id, paper_name, total_questions, created_at) \
         VALUES ($1, $2, $3, $4) RETURNING {COLUMNS}"
    ))
    .bind(id)
    .bind(paper_name)
    .bind(total_questions)
    .bind(created_at)
    .fetch_one(executor)
    .await
}

pub(crate) async fn find_by_id(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
) -> Result<Option<QuestionPaper>, sqlx::Error> {
    sqlx::query_as::<_, QuestionPaper>(&format!("SELECT {COLUMNS} FROM question_papers WHERE id = $1"))
        .bind(id)
        .fetch_optional(executor)
        .await
}

pub(crate) async fn list_with_answer_counts(pool: &PgPool) -> Result<Vec<PaperListRow>, sqlx::Error> {
    sqlx::query_as::<_, PaperListRow>(
        "SELECT p.id, p.paper_name, p.total_questions, p.created_at, \
                COUNT(k.id) AS answer_count \
         FROM question_papers p \
         LEFT JOIN answer_keys k ON k.paper_id = p.id \
         GROUP BY p.id, p.paper_name, p.total_questions, p.created_at \
         ORDER BY p.created_at DESC",
    )
    .fetch_all(pool)
    .await
}

/// Removes the paper; keys, submissions, answers and results cascade.
pub(crate) async fn delete_by_id(pool: &PgPool, id: &str) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM question_papers WHERE id = $1").bind(id).execute(pool).await?;
    Ok(result.rows_affected())
}

pub(crate) async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM question_papers").fetch_one(pool).await
}
