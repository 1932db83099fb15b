//! Job repository: every read and mutation of the job table.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use queue_core::{Job, JobId, JobStats, JobStatus, SeedPolicy};
use serde::{Deserialize, Serialize};
use surrealdb::sql::{Id, Thing};
use tokio::sync::Mutex;

use crate::{Database, DbError};

/// Rows per `INSERT` while seeding.
const SEED_BATCH_SIZE: usize = 1_000;

/// Attempts made when SurrealDB reports a retryable transaction conflict.
const MAX_CONFLICT_RETRIES: u32 = 8;

/// Seeded working jobs get a start time like claimed ones.
const SEED_START_TIMES: &str = r#"
UPDATE job SET start_time = time::now() WHERE status = "working" AND start_time = NONE
"#;

/// Conditional claim: only matches while the row is still inactive.
const CLAIM: &str = r#"
UPDATE type::thing("job", $id)
SET status = "working",
    start_time = time::now(),
    updated_at = time::now(),
    worker_url = $worker_url
WHERE status = "inactive"
RETURN AFTER
"#;

const SET_WORKING: &str = r#"
UPDATE type::thing("job", $id)
SET status = $status, start_time = time::now(), updated_at = time::now()
RETURN AFTER
"#;

const SET_STATUS: &str = r#"
UPDATE type::thing("job", $id)
SET status = $status, start_time = NONE, updated_at = time::now()
RETURN AFTER
"#;

const RESET: &str = r#"
UPDATE type::thing("job", $id)
SET status = "inactive", start_time = NONE, worker_url = NONE, updated_at = time::now()
RETURN AFTER
"#;

const TOGGLE_STAR: &str = r#"
UPDATE type::thing("job", $id)
SET starred = !starred, updated_at = time::now()
RETURN AFTER
"#;

/// Repository for job persistence operations.
///
/// Claims are serialized through an in-process gate on top of the conditional
/// `WHERE status = "inactive"` update, so two claim calls never return the same job.
pub struct JobRepository {
    db: Database,
    claim_gate: Mutex<()>,
    cursor: Mutex<ClaimCursor>,
}

/// Lower bound for the next inactive id.
///
/// Every id below `floor` was seen non-inactive by a claim scan. Writes that
/// make a job inactive lower the floor and bump `generation`, so a scan that
/// raced with them does not raise it past the job they freed. This holds for
/// writes made through this repository; a scan that finds nothing above the
/// floor falls back to the whole table.
#[derive(Debug, Clone, Copy)]
struct ClaimCursor {
    floor: u64,
    generation: u64,
}

impl Default for ClaimCursor {
    fn default() -> Self {
        Self {
            floor: 1,
            generation: 0,
        }
    }
}

/// Internal record type for SurrealDB reads.
#[derive(Debug, Deserialize)]
struct JobRecord {
    id: Thing,
    status: JobStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(default)]
    start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    worker_url: Option<String>,
    #[serde(default)]
    starred: bool,
}

impl JobRecord {
    fn into_job(self) -> Result<Job, DbError> {
        Ok(Job {
            id: record_key(&self.id)?,
            status: self.status,
            created_at: self.created_at,
            updated_at: self.updated_at,
            start_time: self.start_time,
            worker_url: self.worker_url,
            starred: self.starred,
        })
    }
}

#[derive(Debug, Deserialize)]
struct IdRecord {
    id: Thing,
}

/// Row written while seeding; every other field takes its schema default.
#[derive(Debug, Serialize)]
struct SeedRow {
    id: u64,
    status: JobStatus,
}

/// Filter options for listing jobs.
#[derive(Debug, Default, Clone)]
pub struct JobFilter {
    /// Restrict to these statuses; empty means every status.
    pub statuses: Vec<JobStatus>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl JobFilter {
    pub fn status(status: JobStatus) -> Self {
        Self {
            statuses: vec![status],
            ..Default::default()
        }
    }

    pub fn statuses(statuses: impl IntoIterator<Item = JobStatus>) -> Self {
        Self {
            statuses: statuses.into_iter().collect(),
            ..Default::default()
        }
    }

    pub fn page(mut self, limit: usize, offset: usize) -> Self {
        self.limit = Some(limit);
        self.offset = Some(offset);
        self
    }
}

impl JobRepository {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            claim_gate: Mutex::new(()),
            cursor: Mutex::new(ClaimCursor::default()),
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Populate ids `1..=N` according to `policy` when the table is empty.
    ///
    /// Returns the number of jobs inserted, zero when the table was already populated.
    pub async fn seed(&self, policy: &SeedPolicy) -> Result<u64, DbError> {
        let existing = self.count(&[]).await?;
        if existing > 0 {
            tracing::info!("Job table already holds {} jobs, skipping seed", existing);
            return Ok(0);
        }

        tracing::info!("Populating database with {} jobs...", policy.count());
        let plan = policy.plan();

        // One transaction: either every id exists afterwards or none does.
        let mut query = self.db.query("BEGIN TRANSACTION");
        for (batch, statuses) in plan.chunks(SEED_BATCH_SIZE).enumerate() {
            let first_id = (batch * SEED_BATCH_SIZE) as u64 + 1;
            let rows: Vec<SeedRow> = statuses
                .iter()
                .zip(first_id..)
                .map(|(status, id)| SeedRow {
                    id,
                    status: *status,
                })
                .collect();

            let name = format!("rows_{batch}");
            query = query
                .query(format!("INSERT INTO job ${name}"))
                .bind((name, rows));
        }
        query
            .query(SEED_START_TIMES)
            .query("COMMIT TRANSACTION")
            .await?
            .check()?;

        tracing::info!("Database populated with {} jobs", plan.len());
        Ok(plan.len() as u64)
    }

    /// Atomically claim the lowest-id inactive job.
    ///
    /// Returns `None` when no inactive job remains.
    pub async fn claim_next(&self, worker_url: Option<&str>) -> Result<Option<Job>, DbError> {
        let _gate = self.claim_gate.lock().await;

        loop {
            let cursor = *self.cursor.lock().await;
            let Some(id) = self.next_inactive(cursor.floor).await? else {
                return Ok(None);
            };

            if let Some(job) = self.conditional_claim(id, worker_url).await? {
                tracing::debug!("Claimed job {} for {:?}", id, worker_url);
                self.advance_cursor(cursor, id).await;
                return Ok(Some(job));
            }

            // Another process took the candidate between select and update.
            tracing::debug!("Lost claim race for job {}, retrying", id);
        }
    }

    /// Lowest inactive id at or above `floor`, then anywhere.
    ///
    /// Record ranges are walked in key order, so the scan stops at the first
    /// inactive job instead of sorting the table.
    async fn next_inactive(&self, floor: u64) -> Result<Option<JobId>, DbError> {
        if let Some(id) = self.first_inactive_from(floor).await? {
            return Ok(Some(id));
        }
        if floor > 1 {
            return self.first_inactive_from(1).await;
        }
        Ok(None)
    }

    async fn first_inactive_from(&self, floor: u64) -> Result<Option<JobId>, DbError> {
        let query = format!(r#"SELECT id FROM job:{floor}.. WHERE status = "inactive" LIMIT 1"#);
        let mut response = self.db.query(query).await?;
        let candidates: Vec<IdRecord> = response.take(0)?;

        candidates.first().map(|r| record_key(&r.id)).transpose()
    }

    /// Raise the floor past `claimed` unless a job was freed meanwhile.
    async fn advance_cursor(&self, seen: ClaimCursor, claimed: JobId) {
        let mut cursor = self.cursor.lock().await;
        if cursor.generation == seen.generation {
            cursor.floor = cursor.floor.max(claimed.get());
        }
    }

    /// A job became inactive again; claims must look at it.
    async fn lower_cursor(&self, freed: JobId) {
        let mut cursor = self.cursor.lock().await;
        cursor.floor = cursor.floor.min(freed.get());
        cursor.generation += 1;
    }

    /// Claim a specific job. Fails without mutation unless it is currently inactive.
    pub async fn claim(&self, id: JobId, worker_url: Option<&str>) -> Result<bool, DbError> {
        let _gate = self.claim_gate.lock().await;
        Ok(self.conditional_claim(id, worker_url).await?.is_some())
    }

    async fn conditional_claim(
        &self,
        id: JobId,
        worker_url: Option<&str>,
    ) -> Result<Option<Job>, DbError> {
        let worker_url = worker_url.map(str::to_string);
        retry_conflicts(|| self.update_one(CLAIM, id, Some(worker_url.clone()), None)).await
    }

    /// Set a job's status regardless of its current one.
    ///
    /// Moving into `working` stamps `start_time`; any other status clears it.
    pub async fn update_status(&self, id: JobId, status: JobStatus) -> Result<bool, DbError> {
        let statement = if status.is_working() {
            SET_WORKING
        } else {
            SET_STATUS
        };
        let updated = retry_conflicts(|| self.update_one(statement, id, None, Some(status))).await?;
        if updated.is_some() && status == JobStatus::Inactive {
            self.lower_cursor(id).await;
        }
        Ok(updated.is_some())
    }

    /// Return a job to `inactive`, clearing its start time and claiming worker.
    pub async fn reset(&self, id: JobId) -> Result<bool, DbError> {
        let updated = retry_conflicts(|| self.update_one(RESET, id, None, None)).await?;
        if updated.is_some() {
            self.lower_cursor(id).await;
        }
        Ok(updated.is_some())
    }

    /// Flip a job's starred flag.
    pub async fn toggle_star(&self, id: JobId) -> Result<bool, DbError> {
        let updated = retry_conflicts(|| self.update_one(TOGGLE_STAR, id, None, None)).await?;
        Ok(updated.is_some())
    }

    async fn update_one(
        &self,
        statement: &'static str,
        id: JobId,
        worker_url: Option<Option<String>>,
        status: Option<JobStatus>,
    ) -> Result<Option<Job>, DbError> {
        let mut query = self.db.query(statement).bind(("id", id.get() as i64));
        if let Some(worker_url) = worker_url {
            query = query.bind(("worker_url", worker_url));
        }
        if let Some(status) = status {
            query = query.bind(("status", status));
        }

        let mut response = query.await?;
        let records: Vec<JobRecord> = response.take(0)?;

        records.into_iter().next().map(JobRecord::into_job).transpose()
    }

    /// Get a job by id.
    pub async fn get(&self, id: JobId) -> Result<Option<Job>, DbError> {
        let mut response = self
            .db
            .query(r#"SELECT * FROM type::thing("job", $id)"#)
            .bind(("id", id.get() as i64))
            .await?;

        let records: Vec<JobRecord> = response.take(0)?;

        records.into_iter().next().map(JobRecord::into_job).transpose()
    }

    /// List jobs ordered by id with optional filtering and pagination.
    pub async fn list(&self, filter: &JobFilter) -> Result<Vec<Job>, DbError> {
        let where_clause = if filter.statuses.is_empty() {
            ""
        } else {
            "WHERE status IN $statuses"
        };

        let limit_clause = filter
            .limit
            .map(|l| format!("LIMIT {}", l))
            .unwrap_or_default();

        let offset_clause = filter
            .offset
            .map(|o| format!("START {}", o))
            .unwrap_or_default();

        let query = format!(
            "SELECT * FROM job {} ORDER BY id ASC {} {}",
            where_clause, limit_clause, offset_clause
        );

        let mut response = self
            .db
            .query(&query)
            .bind(("statuses", filter.statuses.clone()))
            .await?;
        let records: Vec<JobRecord> = response.take(0)?;

        records.into_iter().map(JobRecord::into_job).collect()
    }

    /// Ids of every job in one of `statuses`, ascending. Empty means all jobs.
    pub async fn list_ids(&self, statuses: &[JobStatus]) -> Result<Vec<JobId>, DbError> {
        let query = if statuses.is_empty() {
            "SELECT id FROM job ORDER BY id ASC"
        } else {
            "SELECT id FROM job WHERE status IN $statuses ORDER BY id ASC"
        };

        let mut response = self
            .db
            .query(query)
            .bind(("statuses", statuses.to_vec()))
            .await?;
        let records: Vec<IdRecord> = response.take(0)?;

        records.iter().map(|r| record_key(&r.id)).collect()
    }

    /// Count jobs in one of `statuses`. Empty means all jobs.
    pub async fn count(&self, statuses: &[JobStatus]) -> Result<u64, DbError> {
        let query = if statuses.is_empty() {
            "SELECT count() AS count FROM job GROUP ALL"
        } else {
            "SELECT count() AS count FROM job WHERE status IN $statuses GROUP ALL"
        };

        let mut response = self
            .db
            .query(query)
            .bind(("statuses", statuses.to_vec()))
            .await?;

        #[derive(Deserialize)]
        struct CountResult {
            count: i64,
        }

        let counts: Vec<CountResult> = response.take(0)?;

        Ok(counts.first().map_or(0, |c| c.count.max(0) as u64))
    }

    /// Count jobs grouped by status. Statuses without jobs are absent.
    pub async fn stats(&self) -> Result<JobStats, DbError> {
        let mut response = self
            .db
            .query("SELECT status, count() AS count FROM job GROUP BY status")
            .await?;

        #[derive(Deserialize)]
        struct StatusCount {
            status: JobStatus,
            count: i64,
        }

        let counts: Vec<StatusCount> = response.take(0)?;

        Ok(JobStats::from_counts(
            counts
                .into_iter()
                .map(|c| (c.status, c.count.max(0) as u64)),
        ))
    }

    /// Round-trip a trivial query.
    pub async fn ping(&self) -> Result<(), DbError> {
        self.db.query("RETURN true").await?.check()?;
        Ok(())
    }
}

fn record_key(thing: &Thing) -> Result<JobId, DbError> {
    match &thing.id {
        Id::Number(n) if *n > 0 => Ok(JobId(*n as u64)),
        other => Err(DbError::Serialization(format!(
            "unexpected job record key: {}",
            other
        ))),
    }
}

async fn retry_conflicts<T, F, Fut>(mut op: F) -> Result<T, DbError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DbError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Err(err) if err.is_conflict() && attempt < MAX_CONFLICT_RETRIES => {
                attempt += 1;
                tracing::debug!("Transaction conflict (attempt {}): {}", attempt, err);
                tokio::time::sleep(Duration::from_millis(5 * u64::from(attempt))).await;
            }
            other => return other,
        }
    }
}
