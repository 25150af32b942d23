//! Dead-letter queue.
//!
//! Holds events and mapping retries that exhausted their attempt budget or
//! failed permanently, until an operator (or automation) replays them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::error::SyncResult;
use crate::sync::retry::RetryContext;

/// Record of one failed attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptRecord {
    pub attempt_number: u32,
    pub timestamp: DateTime<Utc>,
    pub error: String,
}

impl AttemptRecord {
    pub fn new(attempt_number: u32, error: impl Into<String>) -> Self {
        Self {
            attempt_number,
            timestamp: Utc::now(),
            error: error.into(),
        }
    }
}

/// What was dead-lettered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeadLetterPayload {
    /// A whole inbound event, stored as received.
    Event { body: serde_json::Value },
    /// A mapping write whose target record already exists.
    MappingRetry { context: RetryContext },
}

impl DeadLetterPayload {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Event { .. } => "event",
            Self::MappingRetry { .. } => "mapping_retry",
        }
    }
}

/// A dead-lettered entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetter {
    pub id: Uuid,
    pub payload: DeadLetterPayload,
    pub failure_reason: String,
    pub attempt_count: u32,
    pub attempt_history: Vec<AttemptRecord>,
    pub created_at: DateTime<Utc>,
}

impl DeadLetter {
    fn new(payload: DeadLetterPayload, failure_reason: String, history: Vec<AttemptRecord>) -> Self {
        Self {
            id: Uuid::new_v4(),
            payload,
            failure_reason,
            attempt_count: u32::try_from(history.len()).unwrap_or(u32::MAX),
            attempt_history: history,
            created_at: Utc::now(),
        }
    }

    /// Dead-letter a raw inbound event.
    pub fn event(
        body: serde_json::Value,
        failure_reason: impl Into<String>,
        history: Vec<AttemptRecord>,
    ) -> Self {
        Self::new(DeadLetterPayload::Event { body }, failure_reason.into(), history)
    }

    /// Dead-letter a mapping retry context, unchanged.
    pub fn mapping_retry(
        context: RetryContext,
        failure_reason: impl Into<String>,
        history: Vec<AttemptRecord>,
    ) -> Self {
        Self::new(
            DeadLetterPayload::MappingRetry { context },
            failure_reason.into(),
            history,
        )
    }
}

/// Storage for dead-lettered entries.
#[async_trait]
pub trait DeadLetterQueue: Send + Sync {
    /// Store an entry and return its id.
    async fn push(&self, entry: DeadLetter) -> SyncResult<Uuid>;

    /// All entries, oldest first.
    async fn list(&self) -> SyncResult<Vec<DeadLetter>>;

    async fn get(&self, id: Uuid) -> SyncResult<Option<DeadLetter>>;

    /// Remove and return an entry (used by replay).
    async fn take(&self, id: Uuid) -> SyncResult<Option<DeadLetter>>;
}

/// Process-local dead-letter queue.
#[derive(Debug, Default)]
pub struct InMemoryDeadLetterQueue {
    entries: RwLock<Vec<DeadLetter>>,
}

impl InMemoryDeadLetterQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl DeadLetterQueue for InMemoryDeadLetterQueue {
    async fn push(&self, entry: DeadLetter) -> SyncResult<Uuid> {
        let id = entry.id;
        info!(
            target: "dlq",
            dlq_id = %id,
            kind = entry.payload.kind(),
            attempts = entry.attempt_count,
            reason = %entry.failure_reason,
            "Entry dead-lettered"
        );
        self.entries.write().await.push(entry);
        Ok(id)
    }

    async fn list(&self) -> SyncResult<Vec<DeadLetter>> {
        Ok(self.entries.read().await.clone())
    }

    async fn get(&self, id: Uuid) -> SyncResult<Option<DeadLetter>> {
        Ok(self
            .entries
            .read()
            .await
            .iter()
            .find(|e| e.id == id)
            .cloned())
    }

    async fn take(&self, id: Uuid) -> SyncResult<Option<DeadLetter>> {
        let mut entries = self.entries.write().await;
        Ok(entries
            .iter()
            .position(|e| e.id == id)
            .map(|index| entries.remove(index)))
    }
}

#[cfg(feature = "postgres")]
pub use postgres::PgDeadLetterQueue;

#[cfg(feature = "postgres")]
mod postgres {
    use super::{AttemptRecord, DeadLetter, DeadLetterPayload, DeadLetterQueue};
    use crate::error::{SyncError, SyncResult};
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use sqlx::types::Json;
    use sqlx::PgPool;
    use uuid::Uuid;

    const SELECT_COLUMNS: &str =
        "id, payload, failure_reason, attempt_count, attempt_history, created_at";

    #[derive(Debug, sqlx::FromRow)]
    struct DeadLetterRow {
        id: Uuid,
        payload: Json<DeadLetterPayload>,
        failure_reason: String,
        attempt_count: i32,
        attempt_history: Json<Vec<AttemptRecord>>,
        created_at: DateTime<Utc>,
    }

    impl From<DeadLetterRow> for DeadLetter {
        fn from(row: DeadLetterRow) -> Self {
            Self {
                id: row.id,
                payload: row.payload.0,
                failure_reason: row.failure_reason,
                attempt_count: u32::try_from(row.attempt_count).unwrap_or(0),
                attempt_history: row.attempt_history.0,
                created_at: row.created_at,
            }
        }
    }

    /// Dead-letter queue persisted in the `sync_dead_letters` table.
    #[derive(Clone)]
    pub struct PgDeadLetterQueue {
        pool: PgPool,
    }

    impl PgDeadLetterQueue {
        /// Create a new queue backed by `pool`.
        #[must_use]
        pub fn new(pool: PgPool) -> Self {
            Self { pool }
        }
    }

    #[async_trait]
    impl DeadLetterQueue for PgDeadLetterQueue {
        async fn push(&self, entry: DeadLetter) -> SyncResult<Uuid> {
            let attempt_count = i32::try_from(entry.attempt_count).map_err(|e| {
                SyncError::DeadLetter(format!("attempt count out of range: {e}"))
            })?;

            sqlx::query(
                "INSERT INTO sync_dead_letters \
                 (id, kind, payload, failure_reason, attempt_count, attempt_history, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(entry.id)
            .bind(entry.payload.kind())
            .bind(Json(&entry.payload))
            .bind(&entry.failure_reason)
            .bind(attempt_count)
            .bind(Json(&entry.attempt_history))
            .bind(entry.created_at)
            .execute(&self.pool)
            .await?;

            tracing::info!(
                target: "dlq",
                dlq_id = %entry.id,
                kind = entry.payload.kind(),
                attempts = entry.attempt_count,
                "Entry dead-lettered"
            );

            Ok(entry.id)
        }

        async fn list(&self) -> SyncResult<Vec<DeadLetter>> {
            let rows: Vec<DeadLetterRow> = sqlx::query_as(&format!(
                "SELECT {SELECT_COLUMNS} FROM sync_dead_letters ORDER BY created_at"
            ))
            .fetch_all(&self.pool)
            .await?;
            Ok(rows.into_iter().map(DeadLetter::from).collect())
        }

        async fn get(&self, id: Uuid) -> SyncResult<Option<DeadLetter>> {
            let row: Option<DeadLetterRow> = sqlx::query_as(&format!(
                "SELECT {SELECT_COLUMNS} FROM sync_dead_letters WHERE id = $1"
            ))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row.map(DeadLetter::from))
        }

        async fn take(&self, id: Uuid) -> SyncResult<Option<DeadLetter>> {
            let row: Option<DeadLetterRow> = sqlx::query_as(&format!(
                "DELETE FROM sync_dead_letters WHERE id = $1 RETURNING {SELECT_COLUMNS}"
            ))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row.map(DeadLetter::from))
        }
    }
}
