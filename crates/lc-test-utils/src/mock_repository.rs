//! In-memory session repository with failure injection.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use live_controller::errors::RepositoryError;
use live_controller::session::{SessionClose, SessionId, SessionRecord, SessionRepository};

/// Mock session store: records rows like the real backend would and can be
/// told to reject creates or closes.
#[derive(Default)]
pub struct RecordingRepository {
    rows: Mutex<HashMap<SessionId, SessionRecord>>,
    fail_create: AtomicBool,
    fail_close: AtomicBool,
    create_calls: AtomicUsize,
    close_calls: AtomicUsize,
}

impl RecordingRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_close(&self, fail: bool) {
        self.fail_close.store(fail, Ordering::SeqCst);
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    pub fn session(&self, id: SessionId) -> Option<SessionRecord> {
        self.rows.lock().unwrap().get(&id).cloned()
    }

    pub fn sessions(&self) -> Vec<SessionRecord> {
        self.rows.lock().unwrap().values().cloned().collect()
    }
}

#[async_trait]
impl SessionRepository for RecordingRepository {
    async fn create_session(
        &self,
        creator_id: &str,
        started_at: DateTime<Utc>,
    ) -> Result<SessionId, RepositoryError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable(
                "injected create failure".to_string(),
            ));
        }
        let id = SessionId::new();
        self.rows.lock().unwrap().insert(
            id,
            SessionRecord {
                id,
                creator_id: creator_id.to_string(),
                started_at,
                ended_at: None,
                calls_taken: 0,
                earnings_cents: 0,
                duration_seconds: None,
            },
        );
        Ok(id)
    }

    async fn close_session(
        &self,
        id: SessionId,
        close: SessionClose,
    ) -> Result<(), RepositoryError> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_close.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable(
                "injected close failure".to_string(),
            ));
        }
        let mut rows = self.rows.lock().unwrap();
        let record = rows
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;
        record.ended_at = Some(close.ended_at);
        record.calls_taken = close.calls_taken;
        record.earnings_cents = close.earnings_cents;
        record.duration_seconds = Some(close.duration_seconds);
        Ok(())
    }
}
