//! Render job queue engine.
//!
//! [`QueueEngine`] is the layer transport adapters call. It wraps the
//! SurrealDB job store with the status state machine, derives elapsed time at
//! read time, runs bulk resets, answers previews from the trait catalog and
//! publishes a [`JobEvent`](queue_core::JobEvent) after every committed change.
//!
//! # Usage
//!
//! ```ignore
//! use engine::{EngineConfig, start};
//!
//! let runtime = start(EngineConfig::from_env()?).await?;
//! let job = runtime.engine().claim_next_job(Some("http://worker-1")).await?;
//! runtime.shutdown().await;
//! ```

mod catalog;
mod cleanup;
mod config;
mod engine;
mod error;
mod init;

pub use catalog::{CatalogError, TraitCatalog, default_traits};
pub use cleanup::{CleanupReport, RenderCleanup, spawn_render_cleanup};
pub use config::EngineConfig;
pub use engine::{BulkResetReport, Health, QueueEngine};
pub use error::EngineError;
pub use init::{EngineRuntime, start};
