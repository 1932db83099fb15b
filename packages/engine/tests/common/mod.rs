use std::error::Error;

use db::{DbConfig, repositories::JobRepository};
use engine::QueueEngine;
use notifier::{Notifier, start_notifier};
use queue_core::SeedPolicy;

/// Fresh engine over an in-memory store holding `count` inactive jobs.
pub async fn engine(count: u64) -> Result<QueueEngine, Box<dyn Error>> {
    let (engine, _notifier) = engine_with(SeedPolicy::uniform(count)).await?;
    Ok(engine)
}

pub async fn engine_with(policy: SeedPolicy) -> Result<(QueueEngine, Notifier), Box<dyn Error>> {
    let db = db::init(DbConfig::memory()).await?;
    let repo = JobRepository::new(db);
    repo.seed(&policy).await?;

    let (notifier, _handle) = start_notifier(64).await?;
    Ok((QueueEngine::new(repo, notifier.clone()), notifier))
}
