use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use axum::Router;

use crate::api::uploads::multipart_body_limit;
use crate::core::config::Settings;
use crate::core::state::AppState;

mod handlers;

pub(crate) fn router(settings: &Settings) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_papers).post(handlers::create_manual_key))
        .route(
            "/ocr",
            post(handlers::create_key_from_image)
                .layer(DefaultBodyLimit::max(multipart_body_limit(settings))),
        )
        .route("/:paper_id", delete(handlers::delete_paper))
        .route("/:paper_id/answers", get(handlers::get_paper_answers))
        .route("/:paper_id/submissions-preview", get(handlers::submissions_preview))
        .route("/:paper_id/export", get(handlers::export_results))
}
