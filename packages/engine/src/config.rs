//! Engine configuration.

use std::path::PathBuf;

use db::DbConfig;
use notifier::DEFAULT_BUFFER;
use queue_core::{DEFAULT_JOB_COUNT, SeedPolicy};
use storage::RenderStoreConfig;

use crate::EngineError;

const DEFAULT_TRAITS_PATH: &str = "traits.json";

/// Everything needed to boot a [`QueueEngine`](crate::QueueEngine).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub db: DbConfig,
    /// Applied only when the job table is empty.
    pub seed: SeedPolicy,
    pub traits_path: PathBuf,
    /// Render storage to clean up on reset. `None` disables deletion.
    pub render_store: Option<RenderStoreConfig>,
    /// Per-subscriber event buffer.
    pub notifier_buffer: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            db: DbConfig::memory(),
            seed: SeedPolicy::uniform(DEFAULT_JOB_COUNT),
            traits_path: PathBuf::from(DEFAULT_TRAITS_PATH),
            render_store: None,
            notifier_buffer: DEFAULT_BUFFER,
        }
    }
}

impl EngineConfig {
    /// In-memory engine seeded with `count` inactive jobs.
    pub fn memory(count: u64) -> Self {
        Self {
            seed: SeedPolicy::uniform(count),
            ..Self::default()
        }
    }

    pub fn with_seed(mut self, seed: SeedPolicy) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_traits_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.traits_path = path.into();
        self
    }

    pub fn with_render_store(mut self, store: RenderStoreConfig) -> Self {
        self.render_store = Some(store);
        self
    }

    /// Build a config from environment variables.
    ///
    /// - `DB_ENDPOINT`, `DB_NAMESPACE`, `DB_DATABASE` (see [`DbConfig::from_env`])
    /// - `JOB_COUNT` (default: 100000)
    /// - `SEED_MODE`: `uniform` or `distribution` (default: uniform)
    /// - `TRAITS_PATH` (default: `traits.json`)
    /// - `ENABLE_RENDER_DELETION` (default: true), with storage read from `RENDER_*`
    /// - `NOTIFIER_BUFFER` (default: 1024)
    pub fn from_env() -> Result<Self, EngineError> {
        let count = match env_non_empty("JOB_COUNT") {
            Some(raw) => parse_number("JOB_COUNT", &raw)?,
            None => DEFAULT_JOB_COUNT,
        };

        let seed = match env_non_empty("SEED_MODE").as_deref() {
            None | Some("uniform") => SeedPolicy::uniform(count),
            Some("distribution") => SeedPolicy::distribution(count),
            Some(other) => {
                return Err(EngineError::Config(format!(
                    "unsupported SEED_MODE={other} (expected uniform|distribution)"
                )));
            }
        };

        let deletion = match env_non_empty("ENABLE_RENDER_DELETION") {
            Some(raw) => parse_bool("ENABLE_RENDER_DELETION", &raw)?,
            None => true,
        };
        let render_store = if deletion {
            Some(RenderStoreConfig::from_env()?)
        } else {
            None
        };

        let notifier_buffer = match env_non_empty("NOTIFIER_BUFFER") {
            Some(raw) => parse_number("NOTIFIER_BUFFER", &raw)? as usize,
            None => DEFAULT_BUFFER,
        };

        Ok(Self {
            db: DbConfig::from_env(),
            seed,
            traits_path: env_non_empty("TRAITS_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_TRAITS_PATH)),
            render_store,
            notifier_buffer,
        })
    }
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_number(name: &str, raw: &str) -> Result<u64, EngineError> {
    raw.parse()
        .map_err(|_| EngineError::Config(format!("{name}={raw} is not a number")))
}

fn parse_bool(name: &str, raw: &str) -> Result<bool, EngineError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(EngineError::Config(format!("{name}={raw} is not a boolean"))),
    }
}
