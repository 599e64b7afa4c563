//! # Processes
//!
//! A process is a resumable unit of work. Each call to [`Process::step`]
//! advances it to its next suspension point and reports what should happen
//! next through a [`Step`].
//!
//! ## Step Outcomes
//!
//! | Outcome | Meaning |
//! |---------|---------|
//! | `Continue(t)` | resume once the segment clock reaches `t` |
//! | `Complete` | the process is finished, its slot becomes vacant |
//! | `Substitute(s)` | replace, wrap, park or move this process, then re-examine it in the same tick |
//!
//! ## Example
//!
//! ```rust,ignore
//! use cadence_core::{from_fn, Step, Scheduler, RunOptions};
//!
//! let mut remaining = 3;
//! scheduler.run(from_fn(move |cx| {
//!     remaining -= 1;
//!     Ok(if remaining == 0 { Step::Complete } else { cx.wait_for_seconds(0.5) })
//! }), RunOptions::new());
//! ```

use std::fmt;

use crate::error::ProcessError;
use crate::handle::Handle;
use crate::primitives::ConditionGate;
use crate::scheduler::Scheduler;
use crate::segment::Segment;

/// Result of one process step.
pub type StepResult = Result<Step, ProcessError>;

/// A resumable unit of work driven by the scheduler.
pub trait Process {
    /// Advances to the next suspension point.
    ///
    /// # Errors
    ///
    /// A returned error removes the process and is delivered to the fault sink.
    fn step(&mut self, cx: &mut Context<'_>) -> StepResult;
}

impl<P: Process + ?Sized> Process for Box<P> {
    #[inline]
    fn step(&mut self, cx: &mut Context<'_>) -> StepResult {
        (**self).step(cx)
    }
}

/// A type-erased process, as stored in the process tables.
pub type BoxedProcess = Box<dyn Process>;

/// What a process asks for after a step.
pub enum Step {
    /// Resume once the segment's local time reaches the given value.
    Continue(f64),
    /// The process has finished.
    Complete,
    /// Swap the process for something else and re-examine the slot immediately.
    Substitute(Substitution),
}

impl Step {
    /// Resume on the next tick of the segment.
    pub const NEXT_FRAME: Step = Step::Continue(f64::NEG_INFINITY);

    /// Resume time, if this is a `Continue`.
    #[inline]
    #[must_use]
    pub fn resume_at(&self) -> Option<f64> {
        match self {
            Step::Continue(at) => Some(*at),
            _ => None,
        }
    }

    /// Replaces the running process with `process`.
    #[must_use]
    pub fn replace(process: impl Process + 'static) -> Self {
        Step::Substitute(Substitution::Replace(Box::new(process)))
    }

    /// Wraps the running process with whatever `wrap` builds around it.
    #[must_use]
    pub fn wrap(wrap: impl FnOnce(BoxedProcess) -> BoxedProcess + 'static) -> Self {
        Step::Substitute(Substitution::Wrap(Box::new(wrap)))
    }

    /// Parks until `target` finishes. Prefer [`Context::wait_until_done`],
    /// which also handles targets that are already gone.
    #[must_use]
    pub fn wait_until_done(target: Handle) -> Self {
        Step::Substitute(Substitution::WaitUntilDone { target, warn: true })
    }

    /// Moves the process to `segment`, keeping its handle and labels.
    #[must_use]
    pub fn switch_to(segment: Segment) -> Self {
        Step::Substitute(Substitution::Switch(Switch::to(segment)))
    }

    /// Applies a segment and/or label change.
    #[must_use]
    pub fn switch(switch: Switch) -> Self {
        Step::Substitute(Substitution::Switch(switch))
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Continue(at) => f.debug_tuple("Continue").field(at).finish(),
            Step::Complete => f.write_str("Complete"),
            Step::Substitute(sub) => f.debug_tuple("Substitute").field(sub).finish(),
        }
    }
}

/// Replacement requested by a step.
pub enum Substitution {
    /// Continue with a different process under the same handle.
    Replace(BoxedProcess),
    /// Continue with a process built around the current one.
    Wrap(Box<dyn FnOnce(BoxedProcess) -> BoxedProcess>),
    /// Park until `target` finishes.
    WaitUntilDone {
        /// Process to wait for.
        target: Handle,
        /// Warn about misuse such as waiting on oneself.
        warn: bool,
    },
    /// Change segment, tag or layer.
    Switch(Switch),
}

impl fmt::Debug for Substitution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Substitution::Replace(_) => f.write_str("Replace(..)"),
            Substitution::Wrap(_) => f.write_str("Wrap(..)"),
            Substitution::WaitUntilDone { target, warn } => f
                .debug_struct("WaitUntilDone")
                .field("target", target)
                .field("warn", warn)
                .finish(),
            Substitution::Switch(switch) => f.debug_tuple("Switch").field(switch).finish(),
        }
    }
}

/// Edit applied to one label during a switch.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Relabel<T> {
    /// Leave the label as it is.
    #[default]
    Keep,
    /// Replace the label.
    Set(T),
    /// Remove the label.
    Clear,
}

impl<T> Relabel<T> {
    /// The label after the edit.
    #[must_use]
    pub fn apply(self, current: Option<T>) -> Option<T> {
        match self {
            Relabel::Keep => current,
            Relabel::Set(value) => Some(value),
            Relabel::Clear => None,
        }
    }
}

/// Segment and label change for a running process.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Switch {
    /// New segment; `None` edits labels in place.
    pub segment: Option<Segment>,
    /// Tag edit.
    pub tag: Relabel<String>,
    /// Layer edit.
    pub layer: Relabel<i32>,
}

impl Switch {
    /// Switch into `segment`.
    #[must_use]
    pub fn to(segment: Segment) -> Self {
        Self {
            segment: Some(segment),
            ..Self::default()
        }
    }

    /// Labels only.
    #[must_use]
    pub fn in_place() -> Self {
        Self::default()
    }

    /// Sets the tag.
    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Relabel::Set(tag.into());
        self
    }

    /// Removes the tag.
    #[must_use]
    pub fn clear_tag(mut self) -> Self {
        self.tag = Relabel::Clear;
        self
    }

    /// Sets the layer.
    #[must_use]
    pub fn layer(mut self, layer: i32) -> Self {
        self.layer = Relabel::Set(layer);
        self
    }

    /// Removes the layer.
    #[must_use]
    pub fn clear_layer(mut self) -> Self {
        self.layer = Relabel::Clear;
        self
    }
}

/// Execution context handed to every step.
///
/// Gives access to the process's own handle and segment clock, builds the
/// suspension primitives, and exposes the scheduler so a running process can
/// start, kill or pause other processes.
pub struct Context<'a> {
    scheduler: &'a mut Scheduler,
    handle: Handle,
    segment: Segment,
}

impl<'a> Context<'a> {
    pub(crate) fn new(scheduler: &'a mut Scheduler, handle: Handle, segment: Segment) -> Self {
        Self {
            scheduler,
            handle,
            segment,
        }
    }

    /// Handle of the running process.
    #[inline]
    #[must_use]
    pub fn handle(&self) -> Handle {
        self.handle
    }

    /// Segment the process is running in.
    #[inline]
    #[must_use]
    pub fn segment(&self) -> Segment {
        self.segment
    }

    /// Local time of the running segment.
    #[inline]
    #[must_use]
    pub fn local_time(&self) -> f64 {
        self.scheduler.local_time(self.segment)
    }

    /// Delta time of the running segment's current tick.
    #[inline]
    #[must_use]
    pub fn delta_time(&self) -> f64 {
        self.scheduler.delta_time(self.segment)
    }

    /// Resume after `seconds` of segment time. NaN counts as zero.
    #[must_use]
    pub fn wait_for_seconds(&self, seconds: f64) -> Step {
        let seconds = if seconds.is_nan() { 0.0 } else { seconds };
        Step::Continue(self.local_time() + seconds)
    }

    /// Park until `target` finishes.
    ///
    /// A null, finished or unknown target resumes on the next frame.
    #[must_use]
    pub fn wait_until_done(&self, target: Handle) -> Step {
        self.scheduler.wait_step(target, true)
    }

    /// [`Context::wait_until_done`] without misuse warnings.
    #[must_use]
    pub fn wait_until_done_quietly(&self, target: Handle) -> Step {
        self.scheduler.wait_step(target, false)
    }

    /// Resume once `condition` returns true, polled every frame.
    #[must_use]
    pub fn wait_until_true(&self, condition: impl FnMut() -> bool + 'static) -> Step {
        ConditionGate::suspend(condition, true)
    }

    /// Resume once `condition` returns false, polled every frame.
    #[must_use]
    pub fn wait_until_false(&self, condition: impl FnMut() -> bool + 'static) -> Step {
        ConditionGate::suspend(condition, false)
    }

    /// The scheduler running this process.
    #[inline]
    pub fn scheduler(&mut self) -> &mut Scheduler {
        self.scheduler
    }
}

/// Process backed by a closure.
pub struct FnProcess<F> {
    step: F,
}

/// Wraps a closure as a process.
#[must_use]
pub fn from_fn<F>(step: F) -> FnProcess<F>
where
    F: FnMut(&mut Context<'_>) -> StepResult,
{
    FnProcess { step }
}

impl<F> Process for FnProcess<F>
where
    F: FnMut(&mut Context<'_>) -> StepResult,
{
    #[inline]
    fn step(&mut self, cx: &mut Context<'_>) -> StepResult {
        (self.step)(cx)
    }
}

/// Process that waits out a sequence of delays, then completes.
pub struct Delays<I> {
    delays: I,
}

/// Builds a process that waits each delay in turn.
#[must_use]
pub fn delays<I>(delays: I) -> Delays<I::IntoIter>
where
    I: IntoIterator<Item = f64>,
{
    Delays {
        delays: delays.into_iter(),
    }
}

impl<I: Iterator<Item = f64>> Process for Delays<I> {
    fn step(&mut self, cx: &mut Context<'_>) -> StepResult {
        Ok(match self.delays.next() {
            Some(seconds) => cx.wait_for_seconds(seconds),
            None => Step::Complete,
        })
    }
}
