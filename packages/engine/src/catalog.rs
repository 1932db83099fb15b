//! Trait catalog backing job previews.
//!
//! The catalog is a JSON object mapping stringified job ids to trait sets,
//! e.g. `{"1": {"prompt": "...", "filename": "..."}}`. Lookups never fail:
//! ids missing from the catalog cycle through the available entries, and an
//! empty catalog yields [`default_traits`].

use std::collections::BTreeMap;
use std::path::Path;

use queue_core::JobId;
use serde_json::{Value, json};

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to read trait catalog: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed trait catalog: {0}")]
    Json(#[from] serde_json::Error),

    #[error("trait catalog must be a JSON object")]
    NotAnObject,
}

/// Trait set used when the catalog has nothing to offer.
pub fn default_traits() -> Value {
    json!({
        "prompt": "a man wearing a gray t-shirt, short hair, in a urban alley background",
        "filename": "gray_tshirt_short_hair",
    })
}

/// Read-only, id-keyed trait catalog.
///
/// Keys are kept in sorted order, which fixes the cyclic fallback.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TraitCatalog {
    entries: BTreeMap<String, Value>,
}

impl TraitCatalog {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_value(value: Value) -> Result<Self, CatalogError> {
        match value {
            Value::Object(entries) => Ok(Self {
                entries: entries.into_iter().collect(),
            }),
            _ => Err(CatalogError::NotAnObject),
        }
    }

    pub fn from_json_str(raw: &str) -> Result<Self, CatalogError> {
        Self::from_value(serde_json::from_str(raw)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Load the catalog, falling back to an empty one when the file is
    /// missing or malformed.
    pub fn load_or_empty(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(catalog) => {
                tracing::info!(
                    "Loaded {} trait sets from {}",
                    catalog.len(),
                    path.display()
                );
                catalog
            }
            Err(e) => {
                tracing::warn!(
                    "Trait catalog {} unavailable, previews use defaults: {}",
                    path.display(),
                    e
                );
                Self::empty()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Trait set for a job.
    ///
    /// Exact key first, then entry `(id - 1) mod len` in key order, then the
    /// default traits.
    pub fn lookup(&self, job_id: JobId) -> Value {
        if let Some(traits) = self.entries.get(&job_id.to_string()) {
            return traits.clone();
        }
        if self.entries.is_empty() {
            return default_traits();
        }

        let index = job_id.get().saturating_sub(1) % self.entries.len() as u64;
        self.entries
            .values()
            .nth(index as usize)
            .cloned()
            .unwrap_or_else(default_traits)
    }
}
