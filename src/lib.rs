pub(crate) mod api;
pub(crate) mod core;
pub(crate) mod db;
pub(crate) mod repositories;
pub(crate) mod schemas;
pub(crate) mod services;
pub(crate) mod tasks;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::watch;

use crate::core::{config::Settings, state::AppState, telemetry};
use crate::services::credentials::CredentialPool;
use crate::services::gemini_ocr::{is_rate_limited, GeminiReader};

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings)?;
    core::metrics::init(&settings)?;

    let credentials = Arc::new(
        CredentialPool::from_settings(&settings)
            .context("GEMINI_API_KEY or GEMINI_API_KEY_BACKUP_n must be set")?
            .with_classifier(Arc::new(is_rate_limited)),
    );
    let reader = GeminiReader::from_settings(&settings, credentials.clone())?;
    tracing::info!(
        credentials = credentials.status().total_credentials,
        model = %settings.gemini().model,
        "OCR credential pool ready"
    );

    let db_pool = db::init_pool(&settings).await?;
    db::run_migrations(&db_pool).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let reset_task = tasks::scheduler::spawn_credential_reset(
        credentials.clone(),
        settings.gemini().credential_reset_interval_hours,
        shutdown_rx,
    );

    let state = AppState::new(settings, db_pool, credentials, Arc::new(reader));
    let app = api::router::router(state.clone());
    let listener = tokio::net::TcpListener::bind(state.settings().server_addr()).await?;

    tracing::info!(
        host = %state.settings().server_host(),
        port = state.settings().server_port(),
        environment = %state.settings().runtime().environment.as_str(),
        "Exam checker API listening"
    );

    let result =
        axum::serve(listener, app).with_graceful_shutdown(core::shutdown::shutdown_signal()).await;

    let _ = shutdown_tx.send(true);
    if let Some(handle) = reset_task {
        if let Err(err) = handle.await {
            tracing::error!(error = %err, "Credential reset task panicked");
        }
    }

    result?;

    Ok(())
}
