use std::sync::Arc;

use sqlx::PgPool;

use crate::core::config::Settings;
use crate::services::credentials::CredentialPool;
use crate::services::gemini_ocr::AnswerSheetReader;

#[derive(Clone)]
pub(crate) struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    settings: Settings,
    db: PgPool,
    credentials: Arc<CredentialPool>,
    reader: Arc<dyn AnswerSheetReader>,
}

impl AppState {
    pub(crate) fn new(
        settings: Settings,
        db: PgPool,
        credentials: Arc<CredentialPool>,
        reader: Arc<dyn AnswerSheetReader>,
    ) -> Self {
        Self { inner: Arc::new(InnerState { settings, db, credentials, reader }) }
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub(crate) fn db(&self) -> &PgPool {
        &self.inner.db
    }

    pub(crate) fn credentials(&self) -> &Arc<CredentialPool> {
        &self.inner.credentials
    }

    pub(crate) fn reader(&self) -> &dyn AnswerSheetReader {
        self.inner.reader.as_ref()
    }
}
