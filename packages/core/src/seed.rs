//! Policies for populating the job table.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::JobStatus;

/// Size of the production job pool.
pub const DEFAULT_JOB_COUNT: u64 = 100_000;

/// Per-mille share of each status in the demo distribution.
const DISTRIBUTION_PER_MILLE: [(JobStatus, u64); 6] = [
    (JobStatus::Inactive, 850),
    (JobStatus::Working, 80),
    (JobStatus::Complete, 40),
    (JobStatus::Done, 20),
    (JobStatus::Error, 8),
    (JobStatus::Flagged, 2),
];

/// How the ids `1..=count` are populated when the table is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedPolicy {
    /// Every job starts inactive.
    Uniform { count: u64 },
    /// Shuffled demo data with fixed proportions per status.
    ///
    /// `rng_seed` makes the shuffle reproducible.
    Distribution { count: u64, rng_seed: Option<u64> },
}

impl SeedPolicy {
    pub fn uniform(count: u64) -> Self {
        SeedPolicy::Uniform { count }
    }

    pub fn distribution(count: u64) -> Self {
        SeedPolicy::Distribution {
            count,
            rng_seed: None,
        }
    }

    pub fn count(&self) -> u64 {
        match self {
            SeedPolicy::Uniform { count } | SeedPolicy::Distribution { count, .. } => *count,
        }
    }

    /// Initial status for every job; index `i` belongs to job `i + 1`.
    pub fn plan(&self) -> Vec<JobStatus> {
        match *self {
            SeedPolicy::Uniform { count } => vec![JobStatus::Inactive; count as usize],
            SeedPolicy::Distribution { count, rng_seed } => {
                let mut statuses = Vec::with_capacity(count as usize);
                for (status, per_mille) in DISTRIBUTION_PER_MILLE.iter().skip(1) {
                    let n = count * per_mille / 1000;
                    statuses.extend(std::iter::repeat_n(*status, n as usize));
                }
                // Rounding leftovers stay inactive.
                let inactive = count as usize - statuses.len();
                statuses.extend(std::iter::repeat_n(JobStatus::Inactive, inactive));

                match rng_seed {
                    Some(seed) => statuses.shuffle(&mut StdRng::seed_from_u64(seed)),
                    None => statuses.shuffle(&mut rand::rng()),
                }
                statuses
            }
        }
    }
}
