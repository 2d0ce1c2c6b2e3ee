use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Duration, Instant};

use crate::services::credentials::CredentialPool;

const SECONDS_PER_HOUR: u64 = 3600;

/// Spawns the periodic credential reset. Returns `None` when the interval is zero.
pub(crate) fn spawn_credential_reset(
    pool: Arc<CredentialPool>,
    interval_hours: u64,
    shutdown: watch::Receiver<bool>,
) -> Option<JoinHandle<()>> {
    if interval_hours == 0 {
        tracing::info!("Scheduled credential reset disabled");
        return None;
    }

    let period = Duration::from_secs(interval_hours.saturating_mul(SECONDS_PER_HOUR));
    Some(tokio::spawn(credential_reset_loop(pool, period, shutdown)))
}

async fn credential_reset_loop(
    pool: Arc<CredentialPool>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut tick = interval_at(Instant::now() + period, period);
    loop {
        if *shutdown.borrow() {
            break;
        }

        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = tick.tick() => {
                let before = pool.status();
                pool.reset();
                metrics::counter!("credential_resets_total", "trigger" => "scheduled").increment(1);
                tracing::info!(
                    exhausted_before = before.exhausted_indices.len(),
                    total = before.total_credentials,
                    "Scheduled credential reset"
                );
            }
        }
    }
}
