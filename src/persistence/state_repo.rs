//! Execution state repository for `SQLite` persistence.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::models::execution::ExecutionRecord;
use crate::preflight::BoxFuture;
use crate::{AppError, Result};

use super::db::Database;
use super::StatePersister;

/// Repository wrapper around `SQLite` for execution records.
#[derive(Clone)]
pub struct SqliteStatePersister {
    db: Arc<Database>,
}

/// Internal row struct for `SQLite` deserialization.
#[derive(sqlx::FromRow)]
struct ExecutionStateRow {
    execution_id: String,
    check_id: String,
    state: String,
    created_at: String,
}

impl ExecutionStateRow {
    /// Convert a database row into the domain model.
    fn into_record(self) -> Result<ExecutionRecord> {
        let execution_id = Uuid::parse_str(&self.execution_id)
            .map_err(|e| AppError::Persistence(format!("invalid execution_id: {e}")))?;
        let state = serde_json::from_str(&self.state)
            .map_err(|e| AppError::Persistence(format!("invalid state: {e}")))?;
        let created_at = chrono::DateTime::parse_from_rfc3339(&self.created_at)
            .map_err(|e| AppError::Persistence(format!("invalid created_at: {e}")))?
            .with_timezone(&Utc);

        Ok(ExecutionRecord {
            execution_id,
            check_id: self.check_id,
            state,
            created_at,
        })
    }
}

impl SqliteStatePersister {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    async fn upsert(&self, record: &ExecutionRecord) -> Result<()> {
        let state = serde_json::to_string(&record.state)
            .map_err(|e| AppError::Persistence(format!("serialize state: {e}")))?;
        let created_at = record.created_at.to_rfc3339();
        let updated_at = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO execution_state (execution_id, check_id, state, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(execution_id) DO UPDATE SET
                check_id = excluded.check_id,
                state = excluded.state,
                updated_at = excluded.updated_at",
        )
        .bind(record.execution_id.to_string())
        .bind(&record.check_id)
        .bind(&state)
        .bind(&created_at)
        .bind(&updated_at)
        .execute(self.db.as_ref())
        .await?;

        Ok(())
    }

    async fn fetch(&self, execution_id: Uuid) -> Result<ExecutionRecord> {
        let row: Option<ExecutionStateRow> = sqlx::query_as(
            "SELECT execution_id, check_id, state, created_at \
             FROM execution_state WHERE execution_id = ?1",
        )
        .bind(execution_id.to_string())
        .fetch_optional(self.db.as_ref())
        .await?;

        row.ok_or_else(|| AppError::StateNotFound(format!("execution {execution_id}")))?
            .into_record()
    }

    async fn fetch_ids(&self) -> Result<Vec<Uuid>> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT execution_id FROM execution_state")
            .fetch_all(self.db.as_ref())
            .await?;

        rows.into_iter()
            .map(|(id,)| {
                Uuid::parse_str(&id)
                    .map_err(|e| AppError::Persistence(format!("invalid execution_id: {e}")))
            })
            .collect()
    }

    async fn remove(&self, execution_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM execution_state WHERE execution_id = ?1")
            .bind(execution_id.to_string())
            .execute(self.db.as_ref())
            .await?;

        Ok(())
    }
}

impl StatePersister for SqliteStatePersister {
    fn persist<'a>(&'a self, record: &'a ExecutionRecord) -> BoxFuture<'a, Result<()>> {
        Box::pin(self.upsert(record))
    }

    fn get(&self, execution_id: Uuid) -> BoxFuture<'_, Result<ExecutionRecord>> {
        Box::pin(self.fetch(execution_id))
    }

    fn list_ids(&self) -> BoxFuture<'_, Result<Vec<Uuid>>> {
        Box::pin(self.fetch_ids())
    }

    fn delete(&self, execution_id: Uuid) -> BoxFuture<'_, Result<()>> {
        Box::pin(self.remove(execution_id))
    }
}
