//! Render cleanup driven by reset events.
//!
//! Resetting a job must not leave its old render behind. The engine only
//! publishes [`JobEvent::Reset`]; this subscriber deletes `<id>.png` from
//! render storage afterwards. Deletion failures are logged and counted and
//! never reach the caller that reset the job.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use notifier::{Notifier, NotifierError, Subscription};
use queue_core::JobEvent;
use serde::Serialize;
use storage::{DeleteOutcome, RenderStore};

/// Snapshot of cleanup activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub deleted: u64,
    /// Resets for jobs that had no render.
    pub missing: u64,
    pub failed: u64,
}

impl CleanupReport {
    /// Number of reset events handled so far.
    pub fn handled(&self) -> u64 {
        self.deleted + self.missing + self.failed
    }
}

#[derive(Debug, Default)]
struct Counters {
    deleted: AtomicU64,
    missing: AtomicU64,
    failed: AtomicU64,
}

/// Handle to a running cleanup subscriber.
#[derive(Debug, Clone)]
pub struct RenderCleanup {
    counters: Arc<Counters>,
}

impl RenderCleanup {
    pub fn report(&self) -> CleanupReport {
        CleanupReport {
            deleted: self.counters.deleted.load(Ordering::Relaxed),
            missing: self.counters.missing.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }
}

/// Subscribe to `notifier` and delete renders for every reset job.
///
/// The subscription is lossless, so a bulk reset larger than the notifier
/// buffer still deletes every render. The task ends when the notifier shuts
/// down.
pub async fn spawn_render_cleanup(
    notifier: &Notifier,
    store: RenderStore,
) -> Result<(RenderCleanup, tokio::task::JoinHandle<()>), NotifierError> {
    let subscription = notifier.subscribe_lossless().await?;
    let counters = Arc::new(Counters::default());

    tracing::info!(
        "Render cleanup subscribed ({} storage)",
        store.kind().as_str()
    );

    let handle = tokio::spawn(run(subscription, store, Arc::clone(&counters)));

    Ok((RenderCleanup { counters }, handle))
}

async fn run(mut subscription: Subscription, store: RenderStore, counters: Arc<Counters>) {
    while let Some(event) = subscription.recv().await {
        let JobEvent::Reset { job_id } = event else {
            continue;
        };

        match store.delete_render(job_id).await {
            Ok(DeleteOutcome::Deleted) => {
                counters.deleted.fetch_add(1, Ordering::Relaxed);
                tracing::info!("Deleted {}", store.render_key(job_id));
            }
            Ok(DeleteOutcome::Missing) => {
                counters.missing.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("No render to delete at {}", store.render_key(job_id));
            }
            Err(e) => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    "Failed to delete {}: {}",
                    store.render_key(job_id),
                    e
                );
            }
        }
    }

    tracing::debug!("Render cleanup stopped");
}
