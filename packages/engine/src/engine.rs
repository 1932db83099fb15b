//! The queue engine: the operations transport adapters call.

use std::sync::Arc;

use chrono::Utc;
use db::repositories::{JobFilter, JobRepository};
use notifier::{Notifier, SubscriberId, Subscription};
use queue_core::{JobEvent, JobId, JobPage, JobStats, JobStatus, JobView};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::catalog::TraitCatalog;
use crate::EngineError;

/// Outcome of a bulk reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkResetReport {
    /// Jobs moved back to inactive.
    pub reset_count: u64,
    /// Jobs whose reset failed and were skipped.
    #[serde(default)]
    pub failed: u64,
}

/// Result of [`QueueEngine::health`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub database: &'static str,
}

impl Health {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

/// Job state machine on top of the store.
///
/// Every mutation publishes a [`JobEvent`] once the store has committed it.
/// Cloning is cheap and shares the store, notifier and catalog.
#[derive(Clone)]
pub struct QueueEngine {
    repo: Arc<JobRepository>,
    notifier: Notifier,
    catalog: Arc<TraitCatalog>,
}

impl QueueEngine {
    pub fn new(repo: JobRepository, notifier: Notifier) -> Self {
        Self {
            repo: Arc::new(repo),
            notifier,
            catalog: Arc::new(TraitCatalog::empty()),
        }
    }

    pub fn with_catalog(mut self, catalog: TraitCatalog) -> Self {
        self.catalog = Arc::new(catalog);
        self
    }

    pub fn repository(&self) -> &JobRepository {
        &self.repo
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Claim the lowest-id inactive job for `worker_url`.
    pub async fn claim_next_job(
        &self,
        worker_url: Option<&str>,
    ) -> Result<Option<JobView>, EngineError> {
        let Some(job) = self.repo.claim_next(worker_url).await? else {
            tracing::debug!("No inactive jobs left to claim");
            return Ok(None);
        };

        tracing::debug!(
            "Job {} claimed by {}",
            job.id,
            worker_url.unwrap_or("anonymous worker")
        );
        self.notifier.publish(JobEvent::StatusChanged {
            job_id: job.id,
            status: JobStatus::Working,
        });

        Ok(Some(JobView::now(job)))
    }

    /// Claim a specific job. `false` when it is missing or not inactive.
    pub async fn claim_job(
        &self,
        id: JobId,
        worker_url: Option<&str>,
    ) -> Result<bool, EngineError> {
        let claimed = self.repo.claim(id, worker_url).await?;
        if claimed {
            self.notifier.publish(JobEvent::StatusChanged {
                job_id: id,
                status: JobStatus::Working,
            });
        }
        Ok(claimed)
    }

    /// Set a job's status from its wire name.
    ///
    /// Unknown status names are rejected before the store is touched.
    pub async fn update_status(&self, id: JobId, status: &str) -> Result<bool, EngineError> {
        let status = JobStatus::parse(status)?;
        self.set_status(id, status).await
    }

    pub async fn set_status(&self, id: JobId, status: JobStatus) -> Result<bool, EngineError> {
        let updated = self.repo.update_status(id, status).await?;
        if updated {
            tracing::debug!("Job {} -> {}", id, status);
            self.notifier.publish(JobEvent::StatusChanged { job_id: id, status });
        }
        Ok(updated)
    }

    pub async fn flag_job(&self, id: JobId) -> Result<bool, EngineError> {
        self.set_status(id, JobStatus::Flagged).await
    }

    /// Return a job to inactive and forget its worker.
    ///
    /// Render cleanup happens in subscribers reacting to the reset event.
    pub async fn reset_job(&self, id: JobId) -> Result<bool, EngineError> {
        let reset = self.repo.reset(id).await?;
        if reset {
            tracing::debug!("Job {} reset", id);
            self.notifier.publish(JobEvent::Reset { job_id: id });
        }
        Ok(reset)
    }

    pub async fn toggle_star(&self, id: JobId) -> Result<bool, EngineError> {
        let toggled = self.repo.toggle_star(id).await?;
        if toggled {
            self.notifier.publish(JobEvent::StarToggled { job_id: id });
        }
        Ok(toggled)
    }

    /// One page of jobs ordered by id, optionally restricted to one status.
    ///
    /// A zero `limit` is treated as one.
    pub async fn list_jobs(
        &self,
        limit: usize,
        offset: usize,
        status: Option<&str>,
    ) -> Result<JobPage, EngineError> {
        let limit = limit.max(1);
        let statuses = parse_filter(status)?;

        let filter = JobFilter::statuses(statuses.iter().copied()).page(limit, offset);
        let jobs = self.repo.list(&filter).await?;
        let total = self.repo.count(&statuses).await?;

        let now = Utc::now();
        Ok(JobPage {
            jobs: jobs.into_iter().map(|job| job.view_at(now)).collect(),
            total,
            page: (offset / limit) as u64,
            limit: limit as u64,
        })
    }

    pub async fn get_job(&self, id: JobId) -> Result<Option<JobView>, EngineError> {
        Ok(self.repo.get(id).await?.map(JobView::now))
    }

    pub async fn count_jobs(&self, status: Option<&str>) -> Result<u64, EngineError> {
        let statuses = parse_filter(status)?;
        Ok(self.repo.count(&statuses).await?)
    }

    pub async fn get_stats(&self) -> Result<JobStats, EngineError> {
        Ok(self.repo.stats().await?)
    }

    /// Reset every flagged job.
    pub async fn reset_flagged(&self) -> Result<BulkResetReport, EngineError> {
        self.reset_matching(&[JobStatus::Flagged]).await
    }

    /// Reset every job that is not already inactive.
    ///
    /// Running it twice in a row resets nothing the second time.
    pub async fn reset_all(&self) -> Result<BulkResetReport, EngineError> {
        let statuses: Vec<JobStatus> = JobStatus::ALL
            .into_iter()
            .filter(|s| *s != JobStatus::Inactive)
            .collect();
        self.reset_matching(&statuses).await
    }

    /// Best-effort loop: a failing job is logged and skipped, never fatal.
    async fn reset_matching(
        &self,
        statuses: &[JobStatus],
    ) -> Result<BulkResetReport, EngineError> {
        let ids = self.repo.list_ids(statuses).await?;
        tracing::info!("Resetting {} jobs", ids.len());

        let mut report = BulkResetReport::default();
        for id in ids {
            match self.repo.reset(id).await {
                Ok(true) => {
                    report.reset_count += 1;
                    self.notifier.publish(JobEvent::Reset { job_id: id });
                }
                Ok(false) => tracing::debug!("Job {} disappeared before reset", id),
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!("Failed to reset job {}: {}", id, e);
                }
            }
        }

        tracing::info!(
            "Bulk reset finished: {} reset, {} failed",
            report.reset_count,
            report.failed
        );
        Ok(report)
    }

    /// Trait set shown when previewing a job. Pure lookup.
    pub fn preview(&self, id: JobId) -> Value {
        self.catalog.lookup(id)
    }

    /// Whether the store answers a trivial query.
    pub async fn health(&self) -> Health {
        match self.repo.ping().await {
            Ok(()) => Health {
                status: "healthy",
                database: "connected",
            },
            Err(e) => {
                tracing::warn!("Health check failed: {}", e);
                Health {
                    status: "unhealthy",
                    database: "unreachable",
                }
            }
        }
    }

    /// Register an observer for job events.
    pub async fn subscribe(&self) -> Result<Subscription, EngineError> {
        Ok(self.notifier.subscribe().await?)
    }

    pub fn unsubscribe(&self, id: SubscriberId) {
        self.notifier.unsubscribe(id);
    }
}

fn parse_filter(status: Option<&str>) -> Result<Vec<JobStatus>, EngineError> {
    match status.map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => Ok(vec![JobStatus::parse(raw)?]),
        None => Ok(Vec::new()),
    }
}
