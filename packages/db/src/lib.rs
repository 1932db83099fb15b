//! SurrealDB-backed job store for the render queue.
//!
//! This crate provides database connectivity, the job table schema and the
//! [`JobRepository`](repositories::JobRepository) that performs every
//! mutation the queue engine relies on, including the atomic claim.
//!
//! # Features
//!
//! - `memory` (default): Use in-memory storage for testing
//! - `rocksdb`: Use RocksDB for persistent file-based storage

mod connection;
mod schema;
pub mod repositories;

pub use connection::{Database, DbConfig, DbError, connect};
pub use schema::init_schema;

/// Connect and make sure the schema exists.
///
/// The returned handle is cheap to clone and is meant to be injected into
/// repositories rather than stored globally.
pub async fn init(config: DbConfig) -> Result<Database, DbError> {
    let db = connect(&config).await?;
    init_schema(&db).await?;
    Ok(db)
}
