//! # CADENCE
//!
//! Host integration for the [`cadence_core`] scheduler. A host owns one
//! [`Scheduler`] and one [`FrameDriver`] and calls the driver from its frame
//! callback:
//!
//! ```rust,ignore
//! use cadence::{CadenceConfig, FrameTime};
//!
//! let (mut scheduler, mut driver) = CadenceConfig::from_toml_file("config/cadence.toml")?.build()?;
//! loop {
//!     let report = driver.advance(&mut scheduler, FrameTime::new(1.0 / 60.0))?;
//!     tracing::trace!(frame = report.frame, "frame done");
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod driver;

pub use cadence_core;
pub use cadence_core::*;

pub use config::{CadenceConfig, FrameConfig};
pub use driver::{FrameDriver, FrameReport, FrameTime, HostMode};
