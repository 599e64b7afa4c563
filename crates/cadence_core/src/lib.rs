//! # CADENCE Core
//!
//! Frame-driven cooperative process scheduler. Game logic is written as
//! processes that run a little on each frame and suspend themselves until a
//! point in time, a condition, or another process finishing.
//!
//! ## Architecture
//!
//! 1. **Segments** - one process table and one clock per frame phase
//! 2. **Handles** - stable process identities that survive pause, wait and switch
//! 3. **Tags and layers** - group labels for bulk kill, pause and resume
//! 4. **Registry** - parked processes, with their remaining delay
//!
//! Processes never unwind. A failed step returns a [`ProcessError`], the
//! process is removed, and the fault is reported from [`Scheduler::tick`] or
//! routed to a handler or channel.
//!
//! ## Example
//!
//! ```rust,ignore
//! use cadence_core::{from_fn, ProcessExt, RunOptions, Scheduler, Segment, Selector, Step};
//!
//! let mut scheduler = Scheduler::default();
//! let blink = scheduler.run(
//!     from_fn(|cx| Ok(cx.wait_for_seconds(0.25))).delay(1.0),
//!     RunOptions::new().tag("ui").layer(3),
//! );
//!
//! scheduler.tick(Segment::Update, 1.0 / 60.0)?;
//! scheduler.pause(Selector::Tag("ui"));
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod combinators;
pub mod config;
pub mod error;
pub mod handle;
pub mod metadata;
pub mod process;
pub mod scheduler;
pub mod segment;

mod primitives;
mod registry;
mod table;

pub use combinators::{
    Action, Append, CancelWith, Delay, DelayUntil, Hijack, ProcessExt, Superimpose,
};
pub use config::{InitialCapacity, SchedulerConfig};
pub use error::{ProcessError, SchedulerError, SchedulerResult};
pub use handle::{Handle, SlotIndex};
pub use metadata::Selector;
pub use process::{
    delays, from_fn, BoxedProcess, Context, Delays, FnProcess, Process, Relabel, Step,
    StepResult, Substitution, Switch,
};
pub use scheduler::{RunOptions, Scheduler, SchedulerStats, Singleton, TickStats};
pub use segment::{Segment, SegmentClock};
