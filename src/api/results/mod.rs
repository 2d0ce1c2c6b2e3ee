use axum::routing::get;
use axum::Router;

use crate::core::state::AppState;

mod handlers;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/analytics", get(handlers::analytics))
        .route("/by-roll/:roll_number", get(handlers::results_by_roll))
        .route("/:submission_id", get(handlers::detailed_result))
}
