//! Engine tuning knobs.
//!
//! # Invariants
//! - `chunk_size` stays within SQLite's bound-parameter limit (999 on the
//!   oldest supported builds), independent of which table a batch targets.
//!   Soft-delete batches bind two timestamps next to the ids, so the bound
//!   is 999 - 2.
//! - Deserialisation and every engine constructor reject out-of-range values.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

/// Default number of task ids bound into one batched statement.
pub const DEFAULT_CHUNK_SIZE: usize = 500;
/// Upper bound for `chunk_size`: the parameter limit minus the two
/// timestamps a soft-delete batch binds.
pub const MAX_CHUNK_SIZE: usize = 997;
/// Default busy timeout for runner-owned connections.
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Invalid configuration value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    ChunkSizeOutOfRange(usize),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ChunkSizeOutOfRange(value) => write!(
                f,
                "chunk_size must be between 1 and {MAX_CHUNK_SIZE}, got {value}"
            ),
        }
    }
}

impl Error for ConfigError {}

/// Settings shared by the deletion, purge and sync engines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "EngineConfigFile")]
pub struct EngineConfig {
    /// Ids per batched statement / per batch transaction.
    pub chunk_size: usize,
    /// Busy timeout applied to connections opened by the sync runner.
    pub busy_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}

/// On-disk shape of `EngineConfig`; missing fields take defaults.
#[derive(Deserialize)]
#[serde(default)]
struct EngineConfigFile {
    chunk_size: usize,
    busy_timeout_ms: u64,
}

impl Default for EngineConfigFile {
    fn default() -> Self {
        let defaults = EngineConfig::default();
        Self {
            chunk_size: defaults.chunk_size,
            busy_timeout_ms: defaults.busy_timeout_ms,
        }
    }
}

impl TryFrom<EngineConfigFile> for EngineConfig {
    type Error = ConfigError;

    fn try_from(file: EngineConfigFile) -> Result<Self, Self::Error> {
        let config = Self {
            chunk_size: file.chunk_size,
            busy_timeout_ms: file.busy_timeout_ms,
        };
        config.validate()?;
        Ok(config)
    }
}

impl EngineConfig {
    /// Returns a config with a custom chunk size and default everything else.
    pub fn with_chunk_size(chunk_size: usize) -> Result<Self, ConfigError> {
        let config = Self {
            chunk_size,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 || self.chunk_size > MAX_CHUNK_SIZE {
            return Err(ConfigError::ChunkSizeOutOfRange(self.chunk_size));
        }
        Ok(())
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}
