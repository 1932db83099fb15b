//! Boot sequence for the render queue.

use db::repositories::JobRepository;
use notifier::start_notifier;
use storage::RenderStore;
use tokio::task::JoinHandle;

use crate::catalog::TraitCatalog;
use crate::cleanup::{RenderCleanup, spawn_render_cleanup};
use crate::{EngineConfig, EngineError, QueueEngine};

/// A running engine plus the background tasks it owns.
pub struct EngineRuntime {
    engine: QueueEngine,
    cleanup: Option<RenderCleanup>,
    notifier_task: JoinHandle<()>,
    cleanup_task: Option<JoinHandle<()>>,
}

impl EngineRuntime {
    pub fn engine(&self) -> &QueueEngine {
        &self.engine
    }

    /// Cleanup counters, when render deletion is enabled.
    pub fn cleanup(&self) -> Option<&RenderCleanup> {
        self.cleanup.as_ref()
    }

    /// Stop the notifier and wait for background tasks to finish.
    pub async fn shutdown(self) {
        tracing::info!("Shutting down render queue...");
        self.engine.notifier().shutdown();

        if let Err(e) = self.notifier_task.await {
            tracing::warn!("Notifier task ended abnormally: {}", e);
        }
        if let Some(task) = self.cleanup_task
            && let Err(e) = task.await
        {
            tracing::warn!("Render cleanup task ended abnormally: {}", e);
        }

        tracing::info!("Render queue stopped");
    }
}

/// Connect the store, seed it if empty, and start the notifier and
/// render cleanup.
///
/// This should be called once at startup before serving requests.
pub async fn start(config: EngineConfig) -> Result<EngineRuntime, EngineError> {
    tracing::info!("Initializing render queue...");

    let db = db::init(config.db).await?;
    let repo = JobRepository::new(db);

    let inserted = repo.seed(&config.seed).await?;
    if inserted > 0 {
        tracing::info!("Seeded {} jobs", inserted);
    }

    let (notifier, notifier_task) = start_notifier(config.notifier_buffer).await?;

    let (cleanup, cleanup_task) = match config.render_store {
        Some(store_config) => {
            let store = RenderStore::new(store_config).await?;
            let (cleanup, task) = spawn_render_cleanup(&notifier, store).await?;
            (Some(cleanup), Some(task))
        }
        None => {
            tracing::info!("Render deletion disabled");
            (None, None)
        }
    };

    let catalog = TraitCatalog::load_or_empty(&config.traits_path);
    let engine = QueueEngine::new(repo, notifier).with_catalog(catalog);

    tracing::info!("Render queue initialized");

    Ok(EngineRuntime {
        engine,
        cleanup,
        notifier_task,
        cleanup_task,
    })
}
