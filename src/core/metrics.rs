use std::sync::OnceLock;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::core::config::Settings;

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub(crate) fn init(settings: &Settings) -> anyhow::Result<()> {
    if !settings.telemetry().prometheus_enabled {
        return Ok(());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    let _ = PROM_HANDLE.set(handle);

    metrics::describe_counter!(
        "credential_invocations_total",
        "OCR calls routed through the credential pool, by outcome"
    );
    metrics::describe_counter!(
        "credential_rotations_total",
        "Switches to the next API credential after a quota error"
    );
    metrics::describe_counter!("credential_resets_total", "Credential pool resets, by trigger");
    metrics::describe_counter!("submissions_saved_total", "Scored student submissions");
    metrics::describe_counter!("answer_keys_stored_total", "Stored answer keys");
    metrics::describe_histogram!("ocr_request_duration_seconds", "Latency of OCR calls");

    Ok(())
}

pub(crate) fn render() -> Option<String> {
    PROM_HANDLE.get().map(|handle| handle.render())
}
