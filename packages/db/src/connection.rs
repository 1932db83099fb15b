//! Database connection management.

use surrealdb::Surreal;
use surrealdb::engine::any::{Any, connect as connect_any};
use surrealdb::opt::auth::Root;
use thiserror::Error;

/// Database connection handle. Cloning shares the underlying connection.
pub type Database = Surreal<Any>;

/// Database configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Connection endpoint: `mem://`, `rocksdb://path` (rocksdb feature), `ws://host:port`, ...
    pub endpoint: String,
    /// Namespace to use
    pub namespace: String,
    /// Database name to use
    pub database: String,
    /// Optional root credentials for authentication
    pub credentials: Option<(String, String)>,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            endpoint: "mem://".to_string(),
            namespace: "render_queue".to_string(),
            database: "main".to_string(),
            credentials: None,
        }
    }
}

impl DbConfig {
    /// Create a config for in-memory testing.
    pub fn memory() -> Self {
        Self::default()
    }

    /// Build a config from environment variables.
    ///
    /// - `DB_ENDPOINT` (default: `mem://`)
    /// - `DB_NAMESPACE` (default: `render_queue`)
    /// - `DB_DATABASE` (default: `main`)
    /// - `DB_USER` / `DB_PASS` (optional root credentials, both required)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let credentials = match (env_non_empty("DB_USER"), env_non_empty("DB_PASS")) {
            (Some(user), Some(pass)) => Some((user, pass)),
            _ => None,
        };

        Self {
            endpoint: env_non_empty("DB_ENDPOINT").unwrap_or(defaults.endpoint),
            namespace: env_non_empty("DB_NAMESPACE").unwrap_or(defaults.namespace),
            database: env_non_empty("DB_DATABASE").unwrap_or(defaults.database),
            credentials,
        }
    }
}

/// Storage-layer failures. Missing jobs are never reported through this type.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("Connection error: {0}")]
    Connection(#[from] surrealdb::Error),
    #[error("Query error: {0}")]
    Query(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl DbError {
    /// Whether the failure was an optimistic transaction conflict that is safe to retry.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            DbError::Connection(surrealdb::Error::Db(surrealdb::error::Db::TxRetryable))
        )
    }
}

/// Open a connection and select the configured namespace and database.
pub async fn connect(config: &DbConfig) -> Result<Database, DbError> {
    tracing::info!("Connecting to database: {}", config.endpoint);

    let db = connect_any(config.endpoint.as_str()).await?;

    if let Some((username, password)) = &config.credentials {
        db.signin(Root { username, password }).await?;
    }

    db.use_ns(&config.namespace).use_db(&config.database).await?;

    tracing::info!(
        "Connected to database: {}/{}",
        config.namespace,
        config.database
    );

    Ok(db)
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
