//! Failover across interchangeable API keys for the OCR backend.
//!
//! The pool keeps one active key and a set of keys known to be rate-limited.
//! A quota failure marks the active key exhausted and moves to the next free
//! key in circular order; the caller's operation is retried at most once per
//! configured key. Other failures are returned untouched.

use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use thiserror::Error;
use time::PrimitiveDateTime;

use crate::core::config::Settings;
use crate::core::time::{format_primitive, primitive_now_utc};

const QUOTA_MARKERS: [&str; 5] =
    ["quota", "rate limit", "exceeded", "resource_exhausted", "too many requests"];

pub(crate) type QuotaClassifier = Arc<dyn Fn(&str) -> bool + Send + Sync>;

#[derive(Debug, Error)]
pub(crate) enum CredentialPoolError {
    #[error("no API credentials configured")]
    NoCredentials,
    #[error("every API credential is currently exhausted")]
    Exhausted,
}

#[derive(Debug, Error)]
pub(crate) enum InvokeError<E> {
    #[error("all API credentials are rate-limited; retry after the quota resets")]
    AllCredentialsExhausted,
    #[error("{0}")]
    NonRecoverable(E),
}

/// Best-effort match on free-text error messages from the remote service.
pub(crate) fn is_quota_error(message: &str) -> bool {
    let lowered = message.to_lowercase();
    QUOTA_MARKERS.iter().any(|marker| lowered.contains(marker))
}

pub(crate) fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    match chars.len() {
        0..=4 => "****".to_string(),
        5..=12 => format!("{}...", chars[..2].iter().collect::<String>()),
        len => format!(
            "{}...{}",
            chars[..8].iter().collect::<String>(),
            chars[len - 4..].iter().collect::<String>()
        ),
    }
}

/// The key handed to one attempt of a wrapped operation.
#[derive(Clone)]
pub(crate) struct Lease {
    index: usize,
    secret: Arc<str>,
}

impl Lease {
    pub(crate) fn index(&self) -> usize {
        self.index
    }

    pub(crate) fn secret(&self) -> &str {
        &self.secret
    }
}

impl fmt::Debug for Lease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lease")
            .field("index", &self.index)
            .field("secret", &mask_secret(&self.secret))
            .finish()
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct PoolStatus {
    pub(crate) active_index: usize,
    pub(crate) active_credential: String,
    pub(crate) total_credentials: usize,
    pub(crate) available_credentials: usize,
    pub(crate) exhausted_indices: Vec<usize>,
    pub(crate) usage_counts: Vec<u64>,
    pub(crate) last_rotation_at: Option<String>,
}

struct PoolState {
    active: usize,
    exhausted: BTreeSet<usize>,
    usage: Vec<u64>,
    last_rotation_at: Option<PrimitiveDateTime>,
}

pub(crate) struct CredentialPool {
    credentials: Vec<Arc<str>>,
    state: Mutex<PoolState>,
    classifier: QuotaClassifier,
}

impl fmt::Debug for CredentialPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPool").field("total", &self.credentials.len()).finish()
    }
}

impl CredentialPool {
    pub(crate) fn new(credentials: Vec<String>) -> Result<Self, CredentialPoolError> {
        if credentials.is_empty() {
            return Err(CredentialPoolError::NoCredentials);
        }

        let usage = vec![0; credentials.len()];
        Ok(Self {
            credentials: credentials.into_iter().map(Arc::from).collect(),
            state: Mutex::new(PoolState {
                active: 0,
                exhausted: BTreeSet::new(),
                usage,
                last_rotation_at: None,
            }),
            classifier: Arc::new(is_quota_error),
        })
    }

    pub(crate) fn from_settings(settings: &Settings) -> Result<Self, CredentialPoolError> {
        Self::new(settings.gemini().api_keys.clone())
    }

    pub(crate) fn with_classifier(mut self, classifier: QuotaClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    fn state(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn current(&self) -> Result<Lease, CredentialPoolError> {
        let state = self.state();
        let index = state.active;
        if index >= self.credentials.len() || state.exhausted.contains(&index) {
            return Err(CredentialPoolError::Exhausted);
        }

        Ok(Lease { index, secret: Arc::clone(&self.credentials[index]) })
    }

    /// Marks the active key exhausted and advances to the next free one.
    /// Returns the new active index, or `None` once every key is exhausted.
    pub(crate) fn rotate(&self) -> Option<usize> {
        let active = self.state().active;
        self.rotate_from(active)
    }

    /// Rotation triggered by a failure observed on `failed`. When another
    /// caller already moved the pool off that key, the newer choice is kept.
    fn rotate_from(&self, failed: usize) -> Option<usize> {
        let mut state = self.state();
        state.exhausted.insert(failed);

        if state.active != failed && !state.exhausted.contains(&state.active) {
            return Some(state.active);
        }

        let total = self.credentials.len();
        let start = state.active;
        let next = (1..total)
            .map(|offset| (start + offset) % total)
            .find(|index| !state.exhausted.contains(index));

        match next {
            Some(index) => {
                state.active = index;
                state.last_rotation_at = Some(primitive_now_utc());
                metrics::counter!("credential_rotations_total").increment(1);
                tracing::warn!(
                    from = failed,
                    to = index,
                    credential = %mask_secret(&self.credentials[index]),
                    "Rotated to next API credential"
                );
                Some(index)
            }
            None => {
                tracing::error!(total, "All API credentials exhausted");
                None
            }
        }
    }

    /// Runs `operation` with the active key, failing over on quota errors.
    ///
    /// At most one attempt per configured key. A pool that is already fully
    /// exhausted fails without calling `operation` until [`reset`](Self::reset).
    pub(crate) async fn invoke_with_retry<T, E, F, Fut>(
        &self,
        mut operation: F,
    ) -> Result<T, InvokeError<E>>
    where
        F: FnMut(Lease) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        for attempt in 1..=self.credentials.len() {
            let Ok(lease) = self.current() else {
                metrics::counter!("credential_invocations_total", "outcome" => "exhausted")
                    .increment(1);
                return Err(InvokeError::AllCredentialsExhausted);
            };
            let index = lease.index;

            match operation(lease).await {
                Ok(value) => {
                    self.state().usage[index] += 1;
                    metrics::counter!("credential_invocations_total", "outcome" => "success")
                        .increment(1);
                    return Ok(value);
                }
                Err(err) => {
                    let message = err.to_string();
                    if !(self.classifier)(&message) {
                        metrics::counter!(
                            "credential_invocations_total",
                            "outcome" => "non_recoverable"
                        )
                        .increment(1);
                        return Err(InvokeError::NonRecoverable(err));
                    }

                    tracing::warn!(credential = index, attempt, error = %message, "Quota error");
                    if self.rotate_from(index).is_none() {
                        break;
                    }
                }
            }
        }

        metrics::counter!("credential_invocations_total", "outcome" => "exhausted").increment(1);
        Err(InvokeError::AllCredentialsExhausted)
    }

    /// Forgets every exhausted mark. The active index and usage counters stay.
    pub(crate) fn reset(&self) {
        let mut state = self.state();
        let cleared = state.exhausted.len();
        state.exhausted.clear();
        tracing::info!(cleared, "Credential pool reset");
    }

    pub(crate) fn status(&self) -> PoolStatus {
        let state = self.state();
        let total = self.credentials.len();
        PoolStatus {
            active_index: state.active,
            active_credential: mask_secret(&self.credentials[state.active]),
            total_credentials: total,
            available_credentials: total - state.exhausted.len(),
            exhausted_indices: state.exhausted.iter().copied().collect(),
            usage_counts: state.usage.clone(),
            last_rotation_at: state.last_rotation_at.map(format_primitive),
        }
    }
}
