#![allow(clippy::disallowed_methods)]

mod common;

use std::collections::HashSet;
use std::error::Error;
use std::sync::Arc;

use futures_util::future::join_all;
use queue_core::{JobId, JobStatus, SeedPolicy};

use db::DbConfig;
use db::repositories::{JobFilter, JobRepository};

#[tokio::test]
async fn seeding_creates_inactive_unstarred_jobs() -> Result<(), Box<dyn Error>> {
    let repo = common::seeded_repo(25).await?;

    assert_eq!(repo.count(&[]).await?, 25);
    for id in 1..=25 {
        let job = repo.get(JobId(id)).await?.expect("seeded job");
        assert_eq!(job.id, JobId(id));
        assert_eq!(job.status, JobStatus::Inactive);
        assert!(!job.starred);
        assert!(job.start_time.is_none());
        assert!(job.worker_url.is_none());
    }
    assert!(repo.get(JobId(26)).await?.is_none());

    // A populated table is left alone.
    assert_eq!(repo.seed(&SeedPolicy::uniform(50)).await?, 0);
    assert_eq!(repo.count(&[]).await?, 25);
    Ok(())
}

#[tokio::test]
async fn failed_seed_leaves_no_partial_table() -> Result<(), Box<dyn Error>> {
    let repo = JobRepository::new(db::init(DbConfig::memory()).await?);
    repo.database()
        .query(
            r#"DEFINE EVENT refuse_seed ON job
                WHEN $event = "CREATE" AND $after.id = job:1500
                THEN { THROW "disk full" }"#,
        )
        .await?
        .check()?;

    assert!(repo.seed(&SeedPolicy::uniform(2_500)).await.is_err());
    assert_eq!(repo.count(&[]).await?, 0);

    // The next boot seeds the full range.
    repo.database().query("REMOVE EVENT refuse_seed ON job").await?.check()?;
    assert_eq!(repo.seed(&SeedPolicy::uniform(2_500)).await?, 2_500);
    assert_eq!(repo.count(&[]).await?, 2_500);
    assert!(repo.get(JobId(2_500)).await?.is_some());
    Ok(())
}

#[tokio::test]
async fn distribution_seed_spreads_statuses() -> Result<(), Box<dyn Error>> {
    let repo = common::repo_with(SeedPolicy::Distribution {
        count: 1_000,
        rng_seed: Some(7),
    })
    .await?;

    let stats = repo.stats().await?;
    assert_eq!(stats.get(JobStatus::Inactive), 850);
    assert_eq!(stats.get(JobStatus::Working), 80);
    assert_eq!(stats.get(JobStatus::Flagged), 2);
    assert_eq!(stats.total(), 1_000);

    let working = repo.list(&JobFilter::status(JobStatus::Working)).await?;
    assert!(working.iter().all(|job| job.start_time.is_some()));
    Ok(())
}

#[tokio::test]
async fn claim_next_takes_lowest_inactive_ids_in_order() -> Result<(), Box<dyn Error>> {
    let repo = common::seeded_repo(10).await?;

    for expected in 1..=3 {
        let job = repo.claim_next(None).await?.expect("inactive job available");
        assert_eq!(job.id, JobId(expected));
        assert_eq!(job.status, JobStatus::Working);
        assert!(job.start_time.is_some());
    }

    let stats = repo.stats().await?;
    assert_eq!(stats.len(), 2);
    assert_eq!(stats.get(JobStatus::Inactive), 7);
    assert_eq!(stats.get(JobStatus::Working), 3);
    Ok(())
}

#[tokio::test]
async fn claim_next_records_worker_and_skips_non_inactive() -> Result<(), Box<dyn Error>> {
    let repo = common::seeded_repo(3).await?;
    repo.update_status(JobId(1), JobStatus::Done).await?;

    let job = repo
        .claim_next(Some("http://worker-a:8188"))
        .await?
        .expect("job 2 is inactive");
    assert_eq!(job.id, JobId(2));
    assert_eq!(job.worker_url.as_deref(), Some("http://worker-a:8188"));

    assert_eq!(repo.claim_next(None).await?.map(|j| j.id), Some(JobId(3)));
    assert!(repo.claim_next(None).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn claims_revisit_jobs_freed_below_earlier_claims() -> Result<(), Box<dyn Error>> {
    let repo = common::seeded_repo(6).await?;
    for _ in 0..4 {
        repo.claim_next(None).await?;
    }

    assert!(repo.reset(JobId(2)).await?);
    assert!(repo.update_status(JobId(3), JobStatus::Inactive).await?);
    // Other statuses never make a job claimable.
    assert!(repo.update_status(JobId(1), JobStatus::Done).await?);

    let order: Vec<Option<JobId>> = [
        repo.claim_next(None).await?,
        repo.claim_next(None).await?,
        repo.claim_next(None).await?,
        repo.claim_next(None).await?,
        repo.claim_next(None).await?,
    ]
    .into_iter()
    .map(|job| job.map(|j| j.id))
    .collect();

    assert_eq!(
        order,
        vec![Some(JobId(2)), Some(JobId(3)), Some(JobId(5)), Some(JobId(6)), None]
    );
    Ok(())
}

#[tokio::test]
async fn claim_scan_finds_jobs_freed_outside_the_repository() -> Result<(), Box<dyn Error>> {
    let repo = common::seeded_repo(4).await?;
    for _ in 0..4 {
        repo.claim_next(None).await?;
    }
    assert!(repo.claim_next(None).await?.is_none());

    repo.database()
        .query(r#"UPDATE job:2 SET status = "inactive", start_time = NONE"#)
        .await?
        .check()?;

    assert_eq!(repo.claim_next(None).await?.map(|j| j.id), Some(JobId(2)));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_claims_never_share_a_job() -> Result<(), Box<dyn Error>> {
    let repo = Arc::new(common::seeded_repo(5).await?);

    let handles = (0..20).map(|n| {
        let repo = Arc::clone(&repo);
        tokio::spawn(async move {
            let worker = format!("worker-{n}");
            repo.claim_next(Some(&worker)).await
        })
    });

    let mut claimed = Vec::new();
    let mut empty = 0;
    for outcome in join_all(handles).await {
        match outcome?? {
            Some(job) => claimed.push(job.id),
            None => empty += 1,
        }
    }

    let distinct: HashSet<JobId> = claimed.iter().copied().collect();
    assert_eq!(claimed.len(), 5);
    assert_eq!(distinct.len(), 5);
    assert_eq!(empty, 15);
    assert_eq!(repo.count(&[JobStatus::Inactive]).await?, 0);
    Ok(())
}

#[tokio::test]
async fn claim_only_succeeds_on_inactive_job() -> Result<(), Box<dyn Error>> {
    let repo = common::seeded_repo(10).await?;

    assert!(repo.claim(JobId(5), Some("http://worker-a")).await?);
    let claimed = repo.get(JobId(5)).await?.expect("job 5");
    assert_eq!(claimed.status, JobStatus::Working);

    assert!(!repo.claim(JobId(5), Some("http://worker-b")).await?);
    let after = repo.get(JobId(5)).await?.expect("job 5");
    assert_eq!(after.updated_at, claimed.updated_at);
    assert_eq!(after.worker_url.as_deref(), Some("http://worker-a"));

    assert!(!repo.claim(JobId(99), None).await?);
    Ok(())
}

#[tokio::test]
async fn status_updates_manage_start_time() -> Result<(), Box<dyn Error>> {
    let repo = common::seeded_repo(3).await?;

    assert!(repo.update_status(JobId(1), JobStatus::Working).await?);
    let working = repo.get(JobId(1)).await?.expect("job 1");
    assert!(working.start_time.is_some());
    assert!(working.updated_at >= working.created_at);

    assert!(repo.update_status(JobId(1), JobStatus::Done).await?);
    let done = repo.get(JobId(1)).await?.expect("job 1");
    assert_eq!(done.status, JobStatus::Done);
    assert!(done.start_time.is_none());
    assert!(done.updated_at >= working.updated_at);
    assert_eq!(done.created_at, working.created_at);

    assert!(!repo.update_status(JobId(4), JobStatus::Error).await?);
    assert!(repo.get(JobId(4)).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn reset_clears_claim_details() -> Result<(), Box<dyn Error>> {
    let repo = common::seeded_repo(2).await?;
    repo.claim_next(Some("http://worker-a")).await?;

    // A plain status write keeps the worker; a reset drops it.
    repo.update_status(JobId(1), JobStatus::Complete).await?;
    let complete = repo.get(JobId(1)).await?.expect("job 1");
    assert_eq!(complete.worker_url.as_deref(), Some("http://worker-a"));

    assert!(repo.reset(JobId(1)).await?);
    let reset = repo.get(JobId(1)).await?.expect("job 1");
    assert_eq!(reset.status, JobStatus::Inactive);
    assert!(reset.start_time.is_none());
    assert!(reset.worker_url.is_none());

    assert!(!repo.reset(JobId(3)).await?);
    Ok(())
}

#[tokio::test]
async fn toggle_star_is_its_own_inverse() -> Result<(), Box<dyn Error>> {
    let repo = common::seeded_repo(2).await?;
    repo.update_status(JobId(2), JobStatus::Flagged).await?;

    assert!(repo.toggle_star(JobId(2)).await?);
    let starred = repo.get(JobId(2)).await?.expect("job 2");
    assert!(starred.starred);
    assert_eq!(starred.status, JobStatus::Flagged);

    assert!(repo.toggle_star(JobId(2)).await?);
    assert!(!repo.get(JobId(2)).await?.expect("job 2").starred);

    assert!(!repo.toggle_star(JobId(3)).await?);
    Ok(())
}

#[tokio::test]
async fn list_paginates_and_filters_by_status() -> Result<(), Box<dyn Error>> {
    let repo = common::seeded_repo(30).await?;
    for id in [4, 8, 15, 16, 23] {
        repo.update_status(JobId(id), JobStatus::Flagged).await?;
    }
    repo.update_status(JobId(30), JobStatus::Error).await?;

    let page = repo.list(&JobFilter::default().page(10, 10)).await?;
    let ids: Vec<u64> = page.iter().map(|j| j.id.get()).collect();
    assert_eq!(ids, (11..=20).collect::<Vec<_>>());

    let flagged = repo
        .list(&JobFilter::status(JobStatus::Flagged).page(2, 1))
        .await?;
    let ids: Vec<u64> = flagged.iter().map(|j| j.id.get()).collect();
    assert_eq!(ids, vec![8, 15]);

    let either = repo.list_ids(&[JobStatus::Flagged, JobStatus::Error]).await?;
    assert_eq!(either, [4, 8, 15, 16, 23, 30].map(JobId).to_vec());

    assert_eq!(repo.count(&[JobStatus::Flagged]).await?, 5);
    assert_eq!(repo.count(&[JobStatus::Done]).await?, 0);
    Ok(())
}

#[tokio::test]
async fn stats_sum_matches_total_count() -> Result<(), Box<dyn Error>> {
    let repo = common::seeded_repo(12).await?;
    repo.claim_next(None).await?;
    repo.update_status(JobId(5), JobStatus::Complete).await?;
    repo.update_status(JobId(6), JobStatus::Done).await?;
    repo.update_status(JobId(7), JobStatus::Error).await?;

    let stats = repo.stats().await?;
    assert!(!stats.contains(JobStatus::Flagged));
    assert_eq!(stats.total(), repo.count(&[]).await?);
    for (status, count) in stats.iter() {
        assert_eq!(count, repo.count(&[status]).await?);
    }

    repo.ping().await?;
    Ok(())
}
