use db::{DbConfig, DbError, repositories::JobRepository};
use queue_core::SeedPolicy;

/// Fresh in-memory store holding `count` inactive jobs.
pub async fn seeded_repo(count: u64) -> Result<JobRepository, DbError> {
    repo_with(SeedPolicy::uniform(count)).await
}

pub async fn repo_with(policy: SeedPolicy) -> Result<JobRepository, DbError> {
    let db = db::init(DbConfig::memory()).await?;
    let repo = JobRepository::new(db);
    repo.seed(&policy).await?;
    Ok(repo)
}
