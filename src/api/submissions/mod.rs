use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;

use crate::api::uploads::multipart_body_limit;
use crate::core::config::Settings;
use crate::core::state::AppState;

mod handlers;

pub(crate) fn router(settings: &Settings) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_submissions).post(handlers::create_manual_submission))
        .route(
            "/ocr",
            post(handlers::preview_from_images)
                .layer(DefaultBodyLimit::max(multipart_body_limit(settings))),
        )
        .route("/confirm", post(handlers::confirm_submissions))
}

#[cfg(test)]
mod tests;
