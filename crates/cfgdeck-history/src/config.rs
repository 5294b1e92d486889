//! History engine configuration

use std::path::Path;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::{HistoryError, HistoryResult};

/// Prefix for environment overrides, e.g. `CFGDECK_HISTORY_CAPACITY=500`
pub const ENV_PREFIX: &str = "CFGDECK_HISTORY";

/// Default storage key for the persisted log
pub const DEFAULT_STORAGE_KEY: &str = "cfgdeck.history";

/// Tunables for a [`HistoryManager`](crate::HistoryManager)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Maximum number of entries kept in the log
    pub capacity: usize,
    /// Modify entries on the same target closer than this merge on compaction
    pub merge_window_ms: u64,
    /// Key the log is persisted under
    pub storage_key: String,
    /// Write the log to storage after every mutation
    pub persist: bool,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: 100,
            merge_window_ms: 5_000,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            persist: true,
        }
    }
}

impl HistoryConfig {
    /// Load configuration from defaults, an optional file and the environment
    ///
    /// The file is optional; a missing file leaves the defaults in place.
    pub fn load(path: Option<&Path>) -> HistoryResult<Self> {
        let defaults = Self::default();
        let mut builder = Config::builder()
            .set_default("capacity", defaults.capacity as i64)?
            .set_default("merge_window_ms", defaults.merge_window_ms as i64)?
            .set_default("storage_key", defaults.storage_key)?
            .set_default("persist", defaults.persist)?;

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(false));
        }

        let settings = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?;
        let loaded: HistoryConfig = settings.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// Reject values the engine cannot work with
    pub fn validate(&self) -> HistoryResult<()> {
        if self.capacity == 0 {
            return Err(HistoryError::InvalidCapacity(self.capacity));
        }
        if self.merge_window_ms == 0 {
            return Err(HistoryError::validation_error(
                "merge_window_ms must be greater than 0",
            ));
        }
        if self.storage_key.trim().is_empty() {
            return Err(HistoryError::validation_error("storage_key cannot be empty"));
        }
        Ok(())
    }

    /// Builder-style capacity override
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Builder-style persistence toggle
    pub fn with_persist(mut self, persist: bool) -> Self {
        self.persist = persist;
        self
    }
}
