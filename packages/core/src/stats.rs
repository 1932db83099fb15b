//! Aggregate job counts.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::JobStatus;

/// Number of jobs per status.
///
/// Statuses with no jobs are absent rather than zero; [`JobStats::get`] reads
/// missing keys as zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobStats {
    counts: BTreeMap<JobStatus, u64>,
}

impl JobStats {
    /// Build stats from grouped counts. Zero counts are dropped.
    pub fn from_counts(counts: impl IntoIterator<Item = (JobStatus, u64)>) -> Self {
        let mut stats = Self::default();
        for (status, count) in counts {
            if count > 0 {
                *stats.counts.entry(status).or_default() += count;
            }
        }
        stats
    }

    pub fn get(&self, status: JobStatus) -> u64 {
        self.counts.get(&status).copied().unwrap_or(0)
    }

    pub fn contains(&self, status: JobStatus) -> bool {
        self.counts.contains_key(&status)
    }

    /// Sum over every present status.
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (JobStatus, u64)> + '_ {
        self.counts.iter().map(|(status, count)| (*status, *count))
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}
