use axum::extract::{Path, State};
use axum::Json;

use crate::api::errors::ApiError;
use crate::api::validation::normalize_roll_number;
use crate::core::state::AppState;
use crate::repositories;
use crate::schemas::result::{
    AnalyticsResponse, DetailedResultResponse, RollSearchResponse, TopPerformer,
};
use crate::schemas::submission::SubmissionListItem;
use crate::services::grades::{distribution, Grade};
use crate::services::grading;

const TOP_PERFORMERS: i64 = 10;

pub(super) async fn detailed_result(
    Path(submission_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<DetailedResultResponse>, ApiError> {
    Ok(Json(grading::detailed_result(state.db(), &submission_id).await?))
}

pub(super) async fn results_by_roll(
    Path(roll_number): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<RollSearchResponse>, ApiError> {
    let roll_number = normalize_roll_number(&roll_number)?;
    let rows = repositories::submissions::find_by_roll(state.db(), &roll_number)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to search submissions"))?;
    if rows.is_empty() {
        return Err(ApiError::NotFound(format!("No results found for roll number {roll_number}")));
    }

    Ok(Json(RollSearchResponse {
        roll_number,
        results: rows.into_iter().map(SubmissionListItem::from).collect(),
    }))
}

pub(super) async fn analytics(
    State(state): State<AppState>,
) -> Result<Json<AnalyticsResponse>, ApiError> {
    let db = state.db();
    let total_papers = repositories::papers::count(db)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count papers"))?;
    let total_submissions = repositories::submissions::count(db)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count submissions"))?;
    let unique_students = repositories::submissions::count_unique_students(db)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count students"))?;
    let average = repositories::results::average_percentage(db)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to average results"))?;
    let top = repositories::results::top_performers(db, TOP_PERFORMERS)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load top performers"))?;
    let percentages = repositories::results::all_percentages(db)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load result percentages"))?;

    Ok(Json(AnalyticsResponse {
        total_papers,
        total_submissions,
        unique_students,
        average_percentage: (average * 10.0).round() / 10.0,
        top_performers: top
            .into_iter()
            .map(|row| TopPerformer {
                grade: Grade::from_percentage(row.percentage).as_str(),
                roll_number: row.roll_number,
                student_name: row.student_name,
                paper_name: row.paper_name,
                total_marks: row.total_marks,
                max_marks: row.max_marks,
                percentage: row.percentage,
            })
            .collect(),
        grade_distribution: distribution(percentages),
    }))
}
