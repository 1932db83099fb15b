//! Job domain types for render work items.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a render job.
///
/// Ids are assigned once when the table is seeded (`1..=N`) and are the only key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub u64);

impl JobId {
    /// Build an id, rejecting zero.
    pub fn new(id: u64) -> Option<Self> {
        (id > 0).then_some(Self(id))
    }

    pub fn get(self) -> u64 {
        self.0
    }

    /// Object key of the rendered image produced for this job.
    pub fn render_file_name(self) -> String {
        format!("{}.png", self.0)
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Current status of a job in its lifecycle.
///
/// Every status is reachable from every other one through an explicit status
/// update. The only gated transition is the claim, `Inactive -> Working`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Waiting to be claimed by a worker.
    #[default]
    Inactive,
    /// Claimed and being rendered.
    Working,
    /// Rendered by the worker.
    Complete,
    /// Output collected.
    Done,
    /// Rendering failed.
    Error,
    /// Marked by an observer for re-rendering.
    Flagged,
}

impl JobStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [JobStatus; 6] = [
        JobStatus::Inactive,
        JobStatus::Working,
        JobStatus::Complete,
        JobStatus::Done,
        JobStatus::Error,
        JobStatus::Flagged,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Inactive => "inactive",
            JobStatus::Working => "working",
            JobStatus::Complete => "complete",
            JobStatus::Done => "done",
            JobStatus::Error => "error",
            JobStatus::Flagged => "flagged",
        }
    }

    pub fn is_working(self) -> bool {
        matches!(self, JobStatus::Working)
    }

    /// Parse a status string received at the engine boundary.
    pub fn parse(value: &str) -> Result<Self, InvalidStatus> {
        JobStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == value)
            .ok_or_else(|| InvalidStatus(value.to_string()))
    }
}

impl FromStr for JobStatus {
    type Err = InvalidStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A status string outside the six known values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid job status {0:?} (expected inactive|working|complete|done|error|flagged)")]
pub struct InvalidStatus(pub String);

/// A render job tracked by the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub status: JobStatus,
    /// Set once at insertion.
    pub created_at: DateTime<Utc>,
    /// Advanced by every successful mutation.
    pub updated_at: DateTime<Utc>,
    /// Present only while the job is working.
    pub start_time: Option<DateTime<Utc>>,
    /// Worker that claimed the job; kept until the job is reset.
    pub worker_url: Option<String>,
    #[serde(default)]
    pub starred: bool,
}

impl Job {
    /// Create an unstarred job with the given status, as the seeder would.
    pub fn new(id: JobId, status: JobStatus, now: DateTime<Utc>) -> Self {
        Self {
            id,
            status,
            created_at: now,
            updated_at: now,
            start_time: status.is_working().then_some(now),
            worker_url: None,
            starred: false,
        }
    }

    /// Whole seconds the job has been working, measured against `now`.
    ///
    /// `None` unless the job is working with a start time. A start time in the
    /// future of `now` yields `None` as well.
    pub fn elapsed_seconds(&self, now: DateTime<Utc>) -> Option<i64> {
        if !self.status.is_working() {
            return None;
        }
        let start = self.start_time?;
        let elapsed = now.signed_duration_since(start).num_seconds();
        (elapsed >= 0).then_some(elapsed)
    }

    /// Attach derived fields computed at `now`.
    pub fn view_at(self, now: DateTime<Utc>) -> JobView {
        let elapsed_time = self.elapsed_seconds(now);
        JobView {
            job: self,
            elapsed_time,
        }
    }
}

/// A job as reported to callers, with `elapsed_time` derived at read time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobView {
    #[serde(flatten)]
    pub job: Job,
    pub elapsed_time: Option<i64>,
}

impl JobView {
    /// View the job using the server clock.
    pub fn now(job: Job) -> Self {
        job.view_at(Utc::now())
    }
}

/// One page of jobs ordered by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobPage {
    pub jobs: Vec<JobView>,
    /// Number of jobs matching the filter, across all pages.
    pub total: u64,
    pub page: u64,
    pub limit: u64,
}
