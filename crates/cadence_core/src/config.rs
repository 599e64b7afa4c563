//! # Scheduler Configuration
//!
//! Loaded once at startup, either built in code or read from TOML.
//!
//! ```toml
//! maintenance_interval = 64
//! growth_chunk = 64
//! max_delta_time = 0.3333
//! warn_on_issue = true
//!
//! [initial_capacity]
//! large = 256
//! medium = 64
//! small = 8
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{SchedulerError, SchedulerResult};
use crate::segment::Segment;

/// Initial slot counts per table size class.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InitialCapacity {
    /// Update.
    pub large: usize,
    /// FixedUpdate and SlowUpdate.
    pub medium: usize,
    /// Every other segment.
    pub small: usize,
}

impl Default for InitialCapacity {
    fn default() -> Self {
        Self {
            large: 256,
            medium: 64,
            small: 8,
        }
    }
}

/// Scheduler configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Ticks between automatic compaction passes.
    pub maintenance_interval: u16,
    /// Slots added per growth step, multiplied by the number of prior expansions.
    pub growth_chunk: usize,
    /// Initial table sizes.
    pub initial_capacity: InitialCapacity,
    /// Upper bound on delta time for editor and manual-timeframe segments.
    pub max_delta_time: f64,
    /// Emit warnings for misuse such as waiting on an unknown handle.
    pub warn_on_issue: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            maintenance_interval: 64,
            growth_chunk: 64,
            initial_capacity: InitialCapacity::default(),
            max_delta_time: 1.0 / 3.0,
            warn_on_issue: true,
        }
    }
}

impl SchedulerConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidConfig`] on malformed TOML or
    /// out-of-range values.
    pub fn from_toml_str(source: &str) -> SchedulerResult<Self> {
        let config: Self =
            toml::from_str(source).map_err(|e| SchedulerError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidConfig`] if the file cannot be read or
    /// does not validate.
    pub fn from_toml_file(path: impl AsRef<Path>) -> SchedulerResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| {
            SchedulerError::InvalidConfig(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&source)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidConfig`] naming the offending field.
    pub fn validate(&self) -> SchedulerResult<()> {
        if self.maintenance_interval == 0 {
            return Err(SchedulerError::InvalidConfig(
                "maintenance_interval must be at least 1".into(),
            ));
        }
        if self.growth_chunk == 0 {
            return Err(SchedulerError::InvalidConfig(
                "growth_chunk must be at least 1".into(),
            ));
        }
        let caps = self.initial_capacity;
        if caps.large == 0 || caps.medium == 0 || caps.small == 0 {
            return Err(SchedulerError::InvalidConfig(
                "initial capacities must be non-zero".into(),
            ));
        }
        if !(self.max_delta_time.is_finite() && self.max_delta_time > 0.0) {
            return Err(SchedulerError::InvalidConfig(format!(
                "max_delta_time must be positive, got {}",
                self.max_delta_time
            )));
        }
        Ok(())
    }

    /// Initial slot count for `segment`'s table.
    #[must_use]
    pub fn initial_capacity_for(&self, segment: Segment) -> usize {
        match segment {
            Segment::Update => self.initial_capacity.large,
            Segment::FixedUpdate | Segment::SlowUpdate => self.initial_capacity.medium,
            _ => self.initial_capacity.small,
        }
    }
}
