//! Core domain types for the render job queue.
//!
//! This crate contains shared types used across all packages:
//! - Job, JobId and JobStatus for render work items
//! - JobStats for aggregate counts
//! - Events for live updates
//! - Seed policies for populating the job table

mod events;
mod job;
mod seed;
mod stats;

pub use events::{JOB_UPDATE, JobEvent, UpdateMessage};
pub use job::{InvalidStatus, Job, JobId, JobPage, JobStatus, JobView};
pub use seed::{DEFAULT_JOB_COUNT, SeedPolicy};
pub use stats::JobStats;
