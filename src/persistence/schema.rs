//! `SQLite` schema bootstrap logic.
//!
//! Table definitions use `CREATE TABLE IF NOT EXISTS`, so this is safe to
//! re-run on every startup.

use sqlx::SqlitePool;

use crate::Result;

/// Apply the execution state table to the connected database.
///
/// # Errors
///
/// Returns `AppError::Persistence` if the DDL statement fails.
pub async fn bootstrap_schema(pool: &SqlitePool) -> Result<()> {
    let ddl = r"
CREATE TABLE IF NOT EXISTS execution_state (
    execution_id    TEXT PRIMARY KEY NOT NULL,
    check_id        TEXT NOT NULL,
    state           TEXT NOT NULL,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_execution_state_check ON execution_state(check_id);
";

    sqlx::raw_sql(ddl).execute(pool).await?;
    Ok(())
}
