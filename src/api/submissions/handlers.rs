use axum::extract::{Multipart, Query, State};
use axum::http::StatusCode;
use axum::Json;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::pagination::{check_window, PaginatedResponse};
use crate::api::uploads::{read_image_field, read_text_field, UploadedImage};
use crate::api::validation::normalize_roll_number;
use crate::core::state::AppState;
use crate::repositories;
use crate::schemas::submission::{
    ConfirmSubmissionsRequest, ConfirmSubmissionsResponse, ImageFailure,
    ManualSubmissionCreate, OcrPreviewResponse, SheetDraft, SkippedDraft, SubmissionListItem,
    SubmissionListQuery, SubmissionSaved,
};
use crate::services::gemini_ocr::{suspicious_patterns, OcrError};
use crate::services::grading::{
    check_header_lengths, prepare_answers, save_submission, GradingError, NewSubmission,
};
use crate::services::sheet_merge::{merge_readings, SheetReading};

pub(super) async fn create_manual_submission(
    State(state): State<AppState>,
    Json(payload): Json<ManualSubmissionCreate>,
) -> Result<(StatusCode, Json<SubmissionSaved>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let roll_number = normalize_roll_number(&payload.roll_number)?;
    let answers = prepare_answers(
        payload.answers.iter().map(|answer| (answer.question_number, answer.raw_labels())),
    )?;

    let submission = NewSubmission {
        roll_number,
        student_name: payload.student_name,
        section: payload.section,
        images_count: 1,
        paper_info: Default::default(),
        answers,
    };
    let saved = save_submission(state.db(), &payload.paper_id, &submission).await?;

    Ok((StatusCode::CREATED, Json(saved)))
}

pub(super) async fn preview_from_images(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<OcrPreviewResponse>, ApiError> {
    let mut paper_id: Option<String> = None;
    let mut fallback_roll: Option<String> = None;
    let mut images: Vec<UploadedImage> = Vec::new();
    let max_images = state.settings().storage().max_images_per_submission as usize;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| ApiError::BadRequest("Invalid multipart data".to_string()))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "paper_id" => paper_id = Some(read_text_field(field, "paper_id").await?),
            "roll_number" => {
                let value = read_text_field(field, "roll_number").await?;
                if !value.is_empty() {
                    fallback_roll = Some(normalize_roll_number(&value)?);
                }
            }
            "images" | "image" | "file" => {
                if images.len() >= max_images {
                    return Err(ApiError::BadRequest(format!(
                        "At most {max_images} images can be uploaded at once"
                    )));
                }
                images.push(read_image_field(field, state.settings()).await?);
            }
            _ => {}
        }
    }

    let paper_id = paper_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::BadRequest("paper_id is required".to_string()))?;
    if images.is_empty() {
        return Err(ApiError::BadRequest("At least one image is required".to_string()));
    }

    let paper = repositories::papers::find_by_id(state.db(), &paper_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch question paper"))?
        .ok_or_else(|| ApiError::NotFound("Question paper not found".to_string()))?;

    let images_processed = images.len();
    let mut readings = Vec::with_capacity(images_processed);
    let mut failed_images = Vec::new();
    let mut warnings = Vec::new();

    for image in images {
        let extraction =
            match state.reader().read_student_sheet(&image.bytes, &image.mime_type).await {
                Ok(extraction) => extraction,
                Err(OcrError::CredentialsExhausted) => {
                    return Err(OcrError::CredentialsExhausted.into());
                }
                Err(err) => {
                    tracing::warn!(filename = %image.filename, error = %err, "Sheet OCR failed");
                    failed_images
                        .push(ImageFailure { filename: image.filename, error: err.to_string() });
                    continue;
                }
            };

        let roll = extraction
            .roll_number
            .as_deref()
            .map(normalize_roll_number)
            .and_then(Result::ok)
            .or_else(|| fallback_roll.clone());
        let Some(roll_number) = roll else {
            failed_images.push(ImageFailure {
                filename: image.filename,
                error: "Roll number could not be read from the sheet".to_string(),
            });
            continue;
        };

        warnings.extend(
            suspicious_patterns(&extraction)
                .into_iter()
                .map(|warning| format!("{}: {warning}", image.filename)),
        );
        readings.push(SheetReading { roll_number, extraction });
    }

    if readings.is_empty() {
        let reasons: Vec<String> = failed_images
            .iter()
            .map(|failure| format!("{}: {}", failure.filename, failure.error))
            .collect();
        return Err(ApiError::BadRequest(format!(
            "No answer sheets could be read ({})",
            reasons.join("; ")
        )));
    }

    let students = merge_readings(readings);
    tracing::info!(
        paper_id = %paper.id,
        images = images_processed,
        students = students.len(),
        failed = failed_images.len(),
        "Answer sheets extracted for review"
    );

    Ok(Json(OcrPreviewResponse {
        paper_id: paper.id,
        paper_name: paper.paper_name,
        requires_confirmation: true,
        images_processed,
        students,
        failed_images,
        warnings,
    }))
}

fn draft_to_submission(draft: SheetDraft) -> Result<NewSubmission, SkippedDraft> {
    let skip = |roll_number: Option<String>, reason: String| SkippedDraft { roll_number, reason };

    let Some(raw_roll) = draft.roll_number.clone() else {
        return Err(skip(None, "Missing roll number".to_string()));
    };
    let roll_number = match normalize_roll_number(&raw_roll) {
        Ok(roll) => roll,
        Err(ApiError::BadRequest(reason)) => return Err(skip(Some(raw_roll), reason)),
        Err(_) => return Err(skip(Some(raw_roll), "Invalid roll number".to_string())),
    };
    if draft.answers.is_empty() {
        return Err(skip(Some(roll_number), "No answers".to_string()));
    }
    if let Err(err) = check_header_lengths(draft.student_name.as_deref(), draft.section.as_deref())
    {
        return Err(skip(Some(roll_number), err.to_string()));
    }

    let answers = prepare_answers(
        draft.answers.into_iter().map(|answer| (answer.question_number, answer.selected_options)),
    )
    .map_err(|err| skip(Some(roll_number.clone()), err.to_string()))?;

    Ok(NewSubmission {
        roll_number,
        student_name: draft.student_name,
        section: draft.section,
        images_count: draft.images_count,
        paper_info: draft.paper_info,
        answers,
    })
}

pub(super) async fn confirm_submissions(
    State(state): State<AppState>,
    Json(payload): Json<ConfirmSubmissionsRequest>,
) -> Result<Json<ConfirmSubmissionsResponse>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let mut saved = Vec::new();
    let mut skipped = Vec::new();

    for draft in payload.students {
        let submission = match draft_to_submission(draft) {
            Ok(submission) => submission,
            Err(skip) => {
                tracing::info!(roll_number = ?skip.roll_number, reason = %skip.reason, "Draft skipped");
                skipped.push(skip);
                continue;
            }
        };

        // Each draft commits on its own, so once one is saved a later failure
        // is reported per draft instead of failing the request.
        let roll_number = Some(submission.roll_number.clone());
        match save_submission(state.db(), &payload.paper_id, &submission).await {
            Ok(result) => saved.push(result),
            Err(GradingError::Invalid(reason)) => skipped.push(SkippedDraft { roll_number, reason }),
            Err(err) => {
                if let Some(reason) = err.rejected_row_reason() {
                    tracing::warn!(roll_number = ?roll_number, reason = %reason, "Draft rejected by database");
                    skipped.push(SkippedDraft { roll_number, reason });
                } else if saved.is_empty() {
                    return Err(err.into());
                } else {
                    tracing::error!(roll_number = ?roll_number, error = %err, "Draft could not be saved");
                    skipped.push(SkippedDraft {
                        roll_number,
                        reason: "Database operation failed".to_string(),
                    });
                }
            }
        }
    }

    Ok(Json(ConfirmSubmissionsResponse { saved, skipped }))
}

pub(super) async fn list_submissions(
    Query(query): Query<SubmissionListQuery>,
    State(state): State<AppState>,
) -> Result<Json<PaginatedResponse<SubmissionListItem>>, ApiError> {
    check_window(query.limit, query.offset)?;

    let total_count = repositories::submissions::count(state.db())
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count submissions"))?;
    let rows = repositories::submissions::list_with_results(state.db(), query.limit, query.offset)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list submissions"))?;

    Ok(Json(PaginatedResponse {
        items: rows.into_iter().map(SubmissionListItem::from).collect(),
        total_count,
        offset: query.offset,
        limit: query.limit,
    }))
}
