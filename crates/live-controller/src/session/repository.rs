//! Session persistence seam.
//!
//! The hosted backend's session table, modeled as an injected trait: one
//! operation to create a row when a call starts and one to close it when the
//! call ends. Persistence failures are recoverable-with-notification, never
//! fatal to in-memory state.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::RepositoryError;

/// Identifier of a persisted session row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A persisted live session row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: SessionId,
    pub creator_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub calls_taken: u32,
    pub earnings_cents: u64,
    pub duration_seconds: Option<i64>,
}

/// End-of-session fields written when a call closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClose {
    pub ended_at: DateTime<Utc>,
    pub calls_taken: u32,
    pub earnings_cents: u64,
    pub duration_seconds: i64,
}

/// The backend session table.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Create a session row, returning its id.
    async fn create_session(
        &self,
        creator_id: &str,
        started_at: DateTime<Utc>,
    ) -> Result<SessionId, RepositoryError>;

    /// Write end-of-session fields onto an existing row.
    async fn close_session(&self, id: SessionId, close: SessionClose)
        -> Result<(), RepositoryError>;
}

/// In-process repository used until the hosted backend is wired, and by the
/// dev loop.
#[derive(Debug, Default)]
pub struct InMemorySessionRepository {
    rows: Mutex<HashMap<SessionId, SessionRecord>>,
}

impl InMemorySessionRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch a stored row.
    #[must_use]
    pub fn session(&self, id: SessionId) -> Option<SessionRecord> {
        self.rows.lock().ok().and_then(|rows| rows.get(&id).cloned())
    }

    /// All stored rows, unordered.
    #[must_use]
    pub fn sessions(&self) -> Vec<SessionRecord> {
        self.rows
            .lock()
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn create_session(
        &self,
        creator_id: &str,
        started_at: DateTime<Utc>,
    ) -> Result<SessionId, RepositoryError> {
        let id = SessionId::new();
        let record = SessionRecord {
            id,
            creator_id: creator_id.to_string(),
            started_at,
            ended_at: None,
            calls_taken: 0,
            earnings_cents: 0,
            duration_seconds: None,
        };
        self.rows
            .lock()
            .map_err(|_| RepositoryError::Unavailable("session store lock poisoned".to_string()))?
            .insert(id, record);
        Ok(id)
    }

    async fn close_session(
        &self,
        id: SessionId,
        close: SessionClose,
    ) -> Result<(), RepositoryError> {
        let mut rows = self
            .rows
            .lock()
            .map_err(|_| RepositoryError::Unavailable("session store lock poisoned".to_string()))?;
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

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_then_close() {
        let repo = InMemorySessionRepository::new();
        let started_at = Utc::now();
        let id = repo
            .create_session("creator-1", started_at)
            .await
            .expect("create");

        let close = SessionClose {
            ended_at: started_at + chrono::Duration::seconds(90),
            calls_taken: 1,
            earnings_cents: 500,
            duration_seconds: 90,
        };
        repo.close_session(id, close).await.expect("close");

        let record = repo.session(id).expect("stored row");
        assert_eq!(record.creator_id, "creator-1");
        assert_eq!(record.duration_seconds, Some(90));
        assert_eq!(record.earnings_cents, 500);
    }

    #[tokio::test]
    async fn test_close_unknown_session_errors() {
        let repo = InMemorySessionRepository::new();
        let close = SessionClose {
            ended_at: Utc::now(),
            calls_taken: 0,
            earnings_cents: 0,
            duration_seconds: 0,
        };
        let result = repo.close_session(SessionId::new(), close).await;
        assert!(matches!(result, Err(RepositoryError::NotFound(_))));
    }
}
