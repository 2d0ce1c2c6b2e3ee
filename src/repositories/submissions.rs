use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::{StudentAnswer, StudentSubmission};
use crate::schemas::submission::PaperInfo;

pub(crate) const COLUMNS: &str = "\
    id, paper_id, roll_number, section, student_name, images_count, \
    extracted_paper_name, extracted_subject, extracted_date, extracted_duration, \
    extracted_total_marks, extracted_class_grade, submitted_at";

const ANSWER_COLUMNS: &str = "id, submission_id, question_number, selected_options";

/// A submission joined with its paper and stored result.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct SubmissionResultRow {
    pub(crate) submission_id: String,
    pub(crate) paper_id: String,
    pub(crate) paper_name: String,
    pub(crate) roll_number: String,
    pub(crate) student_name: Option<String>,
    pub(crate) section: Option<String>,
    pub(crate) submitted_at: PrimitiveDateTime,
    pub(crate) total_marks: f64,
    pub(crate) max_marks: f64,
    pub(crate) percentage: f64,
}

const RESULT_ROW_SELECT: &str = "\
    SELECT s.id AS submission_id, s.paper_id, p.paper_name, s.roll_number, s.student_name, \
           s.section, s.submitted_at, r.total_marks, r.max_marks, r.percentage \
    FROM student_submissions s \
    JOIN question_papers p ON p.id = s.paper_id \
    JOIN results r ON r.submission_id = s.id";

pub(crate) struct CreateSubmission<'a> {
    pub(crate) id: &'a str,
    pub(crate) paper_id: &'a str,
    pub(crate) roll_number: &'a str,
    pub(crate) section: Option<&'a str>,
    pub(crate) student_name: Option<&'a str>,
    pub(crate) images_count: i32,
    pub(crate) paper_info: &'a PaperInfo,
    pub(crate) submitted_at: PrimitiveDateTime,
}

/// Drops an earlier submission of the same roll for the same paper.
pub(crate) async fn delete_for_roll(
    executor: impl sqlx::PgExecutor<'_>,
    paper_id: &str,
    roll_number: &str,
) -> Result<u64, sqlx::Error> {
    let result =
        sqlx::query("DELETE FROM student_submissions WHERE paper_id = $1 AND roll_number = $2")
            .bind(paper_id)
            .bind(roll_number)
            .execute(executor)
            .await?;
    Ok(result.rows_affected())
}

pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    params: CreateSubmission<'_>,
) -> Result<StudentSubmission, sqlx::Error> {
    let info = params.paper_info;
    sqlx::query_as::<_, StudentSubmission>(&format!(
        "INSERT INTO student_submissions ({COLUMNS}) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
         RETURNING {COLUMNS}"
    ))
    .bind(params.id)
    .bind(params.paper_id)
    .bind(params.roll_number)
    .bind(params.section)
    .bind(params.student_name)
    .bind(params.images_count)
    .bind(info.paper_name.as_deref())
    .bind(info.subject.as_deref())
    .bind(info.date.as_deref())
    .bind(info.duration.as_deref())
    .bind(info.total_marks.as_deref())
    .bind(info.class_grade.as_deref())
    .bind(params.submitted_at)
    .fetch_one(executor)
    .await
}

pub(crate) async fn insert_answer(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    submission_id: &str,
    question_number: i32,
    selected_options: &[String],
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO student_answers (id, submission_id, question_number, selected_options) \
         VALUES ($1, $2, $3, $4)",
    )
    .bind(id)
    .bind(submission_id)
    .bind(question_number)
    .bind(selected_options)
    .execute(executor)
    .await?;
    Ok(())
}

pub(crate) async fn find_by_id(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
) -> Result<Option<StudentSubmission>, sqlx::Error> {
    sqlx::query_as::<_, StudentSubmission>(&format!(
        "SELECT {COLUMNS} FROM student_submissions WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn list_answers(
    executor: impl sqlx::PgExecutor<'_>,
    submission_id: &str,
) -> Result<Vec<StudentAnswer>, sqlx::Error> {
    sqlx::query_as::<_, StudentAnswer>(&format!(
        "SELECT {ANSWER_COLUMNS} FROM student_answers WHERE submission_id = $1 \
         ORDER BY question_number"
    ))
    .bind(submission_id)
    .fetch_all(executor)
    .await
}

pub(crate) async fn list_with_results(
    pool: &PgPool,
    limit: i64,
    offset: i64,
) -> Result<Vec<SubmissionResultRow>, sqlx::Error> {
    sqlx::query_as::<_, SubmissionResultRow>(&format!(
        "{RESULT_ROW_SELECT} ORDER BY s.submitted_at DESC, s.id LIMIT $1 OFFSET $2"
    ))
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

pub(crate) async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM student_submissions").fetch_one(pool).await
}

pub(crate) async fn find_by_roll(
    pool: &PgPool,
    roll_number: &str,
) -> Result<Vec<SubmissionResultRow>, sqlx::Error> {
    sqlx::query_as::<_, SubmissionResultRow>(&format!(
        "{RESULT_ROW_SELECT} WHERE s.roll_number = $1 ORDER BY s.submitted_at DESC"
    ))
    .bind(roll_number)
    .fetch_all(pool)
    .await
}

/// Submissions for one paper ordered by roll number; `None` returns all of them.
pub(crate) async fn list_for_paper(
    pool: &PgPool,
    paper_id: &str,
    limit: Option<i64>,
) -> Result<Vec<SubmissionResultRow>, sqlx::Error> {
    sqlx::query_as::<_, SubmissionResultRow>(&format!(
        "{RESULT_ROW_SELECT} WHERE s.paper_id = $1 ORDER BY s.roll_number LIMIT $2"
    ))
    .bind(paper_id)
    .bind(limit)
    .fetch_all(pool)
    .await
}

pub(crate) async fn count_for_paper(pool: &PgPool, paper_id: &str) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM student_submissions WHERE paper_id = $1")
        .bind(paper_id)
        .fetch_one(pool)
        .await
}

pub(crate) async fn count_unique_students(pool: &PgPool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(DISTINCT roll_number) FROM student_submissions")
        .fetch_one(pool)
        .await
}
