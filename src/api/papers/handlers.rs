use axum::extract::{Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use time::macros::format_description;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::uploads::{read_image_field, read_text_field, UploadedImage};
use crate::api::validation::sanitized_filename;
use crate::core::state::AppState;
use crate::core::time::{format_primitive, primitive_now_utc};
use crate::repositories;
use crate::schemas::paper::{
    ManualKeyCreate, PaperDeletedResponse, PaperDetailResponse, PaperSummary,
    SubmissionPreviewRow, SubmissionsPreviewResponse,
};
use crate::services::answer_keys::{prepare_key, store_answer_key};
use crate::services::export::results_workbook;
use crate::services::grades::Grade;

const PREVIEW_LIMIT: i64 = 50;
const MAX_PAPER_NAME_LEN: usize = 200;
const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

pub(super) async fn list_papers(
    State(state): State<AppState>,
) -> Result<Json<Vec<PaperSummary>>, ApiError> {
    let rows = repositories::papers::list_with_answer_counts(state.db())
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list question papers"))?;

    Ok(Json(
        rows.into_iter()
            .map(|row| PaperSummary {
                id: row.id,
                paper_name: row.paper_name,
                total_questions: row.total_questions,
                answer_count: row.answer_count,
                created_at: format_primitive(row.created_at),
            })
            .collect(),
    ))
}

pub(super) async fn create_manual_key(
    State(state): State<AppState>,
    Json(payload): Json<ManualKeyCreate>,
) -> Result<(StatusCode, Json<PaperDetailResponse>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let entries = prepare_key(&payload.answers)?;
    let (paper, key) = store_answer_key(state.db(), &payload.paper_name, &entries).await?;

    Ok((StatusCode::CREATED, Json(PaperDetailResponse::from_parts(paper, key))))
}

pub(super) async fn create_key_from_image(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<PaperDetailResponse>), ApiError> {
    let mut paper_name: Option<String> = None;
    let mut image: Option<UploadedImage> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| ApiError::BadRequest("Invalid multipart data".to_string()))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "paper_name" => paper_name = Some(read_text_field(field, "paper_name").await?),
            "image" | "file" => image = Some(read_image_field(field, state.settings()).await?),
            _ => {}
        }
    }

    let paper_name = paper_name
        .filter(|name| !name.is_empty())
        .ok_or_else(|| ApiError::BadRequest("paper_name is required".to_string()))?;
    if paper_name.chars().count() > MAX_PAPER_NAME_LEN {
        return Err(ApiError::BadRequest(format!(
            "paper_name must be at most {MAX_PAPER_NAME_LEN} characters"
        )));
    }
    let image = image.ok_or_else(|| ApiError::BadRequest("image is required".to_string()))?;

    let extraction = state.reader().read_answer_key(&image.bytes, &image.mime_type).await?;
    tracing::info!(
        filename = %image.filename,
        reported_questions = ?extraction.total_questions,
        extracted_answers = extraction.answers.len(),
        "Answer key extracted"
    );

    let entries = prepare_key(&extraction.answers)?;
    let (paper, key) = store_answer_key(state.db(), &paper_name, &entries).await?;

    Ok((StatusCode::CREATED, Json(PaperDetailResponse::from_parts(paper, key))))
}

pub(super) async fn get_paper_answers(
    Path(paper_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<PaperDetailResponse>, ApiError> {
    let paper = repositories::papers::find_by_id(state.db(), &paper_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch question paper"))?
        .ok_or_else(|| ApiError::NotFound("Question paper not found".to_string()))?;
    let key = repositories::answer_keys::list_for_paper(state.db(), &paper.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch answer key"))?;

    Ok(Json(PaperDetailResponse::from_parts(paper, key)))
}

pub(super) async fn delete_paper(
    Path(paper_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<PaperDeletedResponse>, ApiError> {
    let deleted = repositories::papers::delete_by_id(state.db(), &paper_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to delete question paper"))?;
    if deleted == 0 {
        return Err(ApiError::NotFound("Question paper not found".to_string()));
    }

    tracing::info!(paper_id = %paper_id, "Question paper deleted");
    Ok(Json(PaperDeletedResponse {
        message: "Question paper and related submissions deleted".to_string(),
        paper_id,
    }))
}

pub(super) async fn submissions_preview(
    Path(paper_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<SubmissionsPreviewResponse>, ApiError> {
    let paper = repositories::papers::find_by_id(state.db(), &paper_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch question paper"))?
        .ok_or_else(|| ApiError::NotFound("Question paper not found".to_string()))?;
    let max_marks = repositories::answer_keys::max_marks_for_paper(state.db(), &paper.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to compute max marks"))?;
    let total_submissions = repositories::submissions::count_for_paper(state.db(), &paper.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count submissions"))?;
    let rows =
        repositories::submissions::list_for_paper(state.db(), &paper.id, Some(PREVIEW_LIMIT))
            .await
            .map_err(|e| ApiError::internal(e, "Failed to list submissions"))?;

    Ok(Json(SubmissionsPreviewResponse {
        paper_id: paper.id,
        paper_name: paper.paper_name,
        max_marks: crate::services::marking::round2(max_marks),
        total_submissions,
        submissions: rows
            .into_iter()
            .map(|row| SubmissionPreviewRow {
                roll_number: row.roll_number,
                student_name: row.student_name,
                section: row.section,
                total_marks: row.total_marks,
                max_marks: row.max_marks,
                percentage: row.percentage,
                grade: Grade::from_percentage(row.percentage).as_str(),
                submitted_at: format_primitive(row.submitted_at),
            })
            .collect(),
    }))
}

pub(super) async fn export_results(
    Path(paper_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Response, ApiError> {
    let paper = repositories::papers::find_by_id(state.db(), &paper_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch question paper"))?
        .ok_or_else(|| ApiError::NotFound("Question paper not found".to_string()))?;
    let rows = repositories::submissions::list_for_paper(state.db(), &paper.id, None)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list submissions"))?;
    if rows.is_empty() {
        return Err(ApiError::NotFound("No submissions found for this paper".to_string()));
    }

    let now = primitive_now_utc();
    let stamp = now
        .format(format_description!("[year][month][day]_[hour][minute][second]"))
        .map_err(|e| ApiError::internal(e, "Failed to format export timestamp"))?;
    let filename =
        format!("{}_Results_{stamp}.xlsx", sanitized_filename(&paper.paper_name, "paper"));

    let paper_name = paper.paper_name.clone();
    let row_count = rows.len();
    let bytes = tokio::task::spawn_blocking(move || results_workbook(&paper_name, &rows, now))
        .await
        .map_err(|e| ApiError::internal(e, "Export task failed"))?
        .map_err(|e| ApiError::internal(e, "Failed to build results workbook"))?;

    tracing::info!(paper_id = %paper.id, rows = row_count, filename = %filename, "Results exported");

    Ok((
        [
            (header::CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{filename}\"")),
        ],
        bytes,
    )
        .into_response())
}
