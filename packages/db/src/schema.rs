//! Database schema definitions using SurrealQL.

use crate::{Database, DbError};

/// Initialize the database schema.
///
/// Idempotent: every definition uses `IF NOT EXISTS`.
pub async fn init_schema(db: &Database) -> Result<(), DbError> {
    tracing::info!("Initializing database schema...");

    db.query(JOB_SCHEMA).await?.check()?;

    tracing::info!("Database schema initialized");

    Ok(())
}

/// Job table schema. Record keys are the integer job ids.
const JOB_SCHEMA: &str = r#"
DEFINE TABLE IF NOT EXISTS job SCHEMAFULL;

DEFINE FIELD IF NOT EXISTS status ON job TYPE string DEFAULT "inactive"
    ASSERT $value IN ["inactive", "working", "complete", "done", "error", "flagged"];
DEFINE FIELD IF NOT EXISTS created_at ON job TYPE datetime DEFAULT time::now() READONLY;
DEFINE FIELD IF NOT EXISTS updated_at ON job TYPE datetime DEFAULT time::now();
DEFINE FIELD IF NOT EXISTS start_time ON job TYPE option<datetime>;
DEFINE FIELD IF NOT EXISTS worker_url ON job TYPE option<string>;
DEFINE FIELD IF NOT EXISTS starred ON job TYPE bool DEFAULT false;

-- Claim scans and status filters
DEFINE INDEX IF NOT EXISTS job_status ON job FIELDS status;
"#;
