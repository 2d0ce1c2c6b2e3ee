use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::core::state::AppState;
use crate::services::credentials::PoolStatus;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/credentials", get(credential_status))
        .route("/credentials/reset", post(reset_credentials))
}

async fn credential_status(State(state): State<AppState>) -> Json<PoolStatus> {
    Json(state.credentials().status())
}

async fn reset_credentials(State(state): State<AppState>) -> Json<PoolStatus> {
    state.credentials().reset();
    metrics::counter!("credential_resets_total", "trigger" => "manual").increment(1);
    Json(state.credentials().status())
}
