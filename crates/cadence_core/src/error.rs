//! # Scheduler Errors
//!
//! Faults raised by processes and the scheduler's own failure modes.
//!
//! Processes never unwind. A step that cannot continue returns a
//! [`ProcessError`], the scheduler removes the process and routes the fault to
//! the configured sink.

use thiserror::Error;

use crate::handle::Handle;
use crate::segment::Segment;

/// Failure reported by a single process step.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ProcessError {
    message: String,
}

impl ProcessError {
    /// Creates a process error with the given message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The human readable failure message.
    #[inline]
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Scheduler errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchedulerError {
    /// A process step failed and the process was removed.
    #[error("process {handle} faulted during {segment}: {source}")]
    ProcessFault {
        /// Handle of the removed process.
        handle: Handle,
        /// Segment that was ticking.
        segment: Segment,
        /// The error the step returned.
        #[source]
        source: ProcessError,
    },

    /// A tick was requested from inside a process step.
    #[error("tick of {segment} requested while a process step is in progress")]
    ReentrantTick {
        /// The segment that was asked to tick.
        segment: Segment,
    },

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl SchedulerError {
    /// Handle of the faulted process, if this is a process fault.
    #[must_use]
    pub fn handle(&self) -> Option<Handle> {
        match self {
            Self::ProcessFault { handle, .. } => Some(*handle),
            _ => None,
        }
    }
}

/// Result type for scheduler operations.
pub type SchedulerResult<T> = Result<T, SchedulerError>;
