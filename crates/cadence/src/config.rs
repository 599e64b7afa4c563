//! Combined host configuration.
//!
//! One TOML document drives both the scheduler and the frame driver:
//!
//! ```toml
//! [scheduler]
//! maintenance_interval = 64
//!
//! [frame]
//! fixed_timestep = 0.02
//! max_fixed_steps = 8
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use cadence_core::{Scheduler, SchedulerConfig, SchedulerError, SchedulerResult};

use crate::driver::FrameDriver;

/// Frame pacing for the segments the host drives on a timer.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    /// Real seconds between slow-update phases.
    pub slow_update_interval: f64,
    /// Real seconds between editor slow-update phases.
    pub editor_slow_update_interval: f64,
    /// Fixed-update step in seconds.
    pub fixed_timestep: f64,
    /// Most fixed-update steps run in a single frame. Backlog beyond this is dropped.
    pub max_fixed_steps: u32,
    /// Tick the manual timeframe once per frame, right after Update.
    pub auto_trigger_manual_timeframe: bool,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            slow_update_interval: 1.0 / 7.0,
            editor_slow_update_interval: 1.0 / 7.0,
            fixed_timestep: 0.02,
            max_fixed_steps: 8,
            auto_trigger_manual_timeframe: true,
        }
    }
}

impl FrameConfig {
    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidConfig`] naming the offending field.
    pub fn validate(&self) -> SchedulerResult<()> {
        for (name, value) in [
            ("slow_update_interval", self.slow_update_interval),
            ("editor_slow_update_interval", self.editor_slow_update_interval),
            ("fixed_timestep", self.fixed_timestep),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(SchedulerError::InvalidConfig(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }
        if self.max_fixed_steps == 0 {
            return Err(SchedulerError::InvalidConfig(
                "max_fixed_steps must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Scheduler and frame settings loaded together.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CadenceConfig {
    /// Scheduler tables and maintenance.
    pub scheduler: SchedulerConfig,
    /// Frame driver pacing.
    pub frame: FrameConfig,
}

impl CadenceConfig {
    /// Parses and validates a TOML document with `[scheduler]` and `[frame]` tables.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidConfig`] on malformed TOML or
    /// out-of-range values in either table.
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

    /// Validates both tables.
    ///
    /// # Errors
    ///
    /// Returns the first [`SchedulerError::InvalidConfig`] found.
    pub fn validate(&self) -> SchedulerResult<()> {
        self.scheduler.validate()?;
        self.frame.validate()
    }

    /// Builds a scheduler and a driver from this configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidConfig`] if either table is invalid.
    pub fn build(self) -> SchedulerResult<(Scheduler, FrameDriver)> {
        let scheduler = Scheduler::new(self.scheduler)?;
        let driver = FrameDriver::new(self.frame)?;
        Ok((scheduler, driver))
    }
}
