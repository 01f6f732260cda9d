//! # World Configuration
//!
//! Tunables for pool growth and per-system statistics. Loaded once at startup,
//! usually from a TOML file next to the game data.

use std::path::Path;

use serde::Deserialize;

use crate::error::{EcsError, EcsResult};

/// Default number of slots per pool block.
pub const DEFAULT_BLOCK_SIZE: usize = 16_384;

/// Configuration for a [`World`](crate::World).
///
/// # Example
///
/// ```rust
/// use strata_core::WorldConfig;
///
/// let config = WorldConfig::from_toml_str("entity_block_size = 1024").unwrap();
/// assert_eq!(config.entity_block_size, 1024);
/// assert_eq!(config.component_block_size, 16_384);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Slots per block in the entity pool.
    pub entity_block_size: usize,
    /// Slots per block in every component pool.
    pub component_block_size: usize,
    /// Window of the rolling tick-time average (1 = no smoothing).
    pub stats_smoothing: u32,
    /// Systems whose single run exceeds this many nanoseconds are logged.
    pub tick_budget_ns: Option<u64>,
    /// Initial reservation of the dirty-entity list.
    pub dirty_capacity: usize,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            entity_block_size: DEFAULT_BLOCK_SIZE,
            component_block_size: DEFAULT_BLOCK_SIZE,
            stats_smoothing: 16,
            tick_budget_ns: None,
            dirty_capacity: 1024,
        }
    }
}

impl WorldConfig {
    /// Parses and validates a TOML document. Missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidConfig`] on malformed TOML or invalid values.
    pub fn from_toml_str(source: &str) -> EcsResult<Self> {
        let config: Self =
            toml::from_str(source).map_err(|err| EcsError::InvalidConfig(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::ConfigIo`] if the file cannot be read, otherwise the
    /// same errors as [`WorldConfig::from_toml_str`].
    pub fn from_toml_file(path: impl AsRef<Path>) -> EcsResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|err| EcsError::ConfigIo {
            path: path.display().to_string(),
            reason: err.to_string(),
        })?;
        let config = Self::from_toml_str(&source)?;
        tracing::debug!("Loaded world configuration from {}", path.display());
        Ok(config)
    }

    /// Checks that every value is usable.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidConfig`] naming the first bad field.
    pub fn validate(&self) -> EcsResult<()> {
        check_block_size("entity_block_size", self.entity_block_size)?;
        check_block_size("component_block_size", self.component_block_size)?;
        if self.stats_smoothing == 0 {
            return Err(EcsError::InvalidConfig(
                "stats_smoothing must be at least 1".to_owned(),
            ));
        }
        Ok(())
    }
}

fn check_block_size(field: &str, value: usize) -> EcsResult<()> {
    if value == 0 || value > u32::MAX as usize {
        return Err(EcsError::InvalidConfig(format!(
            "{field} must be in 1..={}, got {value}",
            u32::MAX
        )));
    }
    Ok(())
}
