//! # Suspension Primitives
//!
//! Helper processes behind the waits, and the delayed/periodic call helpers.

use tracing::trace;

use crate::handle::Handle;
use crate::process::{BoxedProcess, Context, Process, Step, StepResult, Substitution};
use crate::scheduler::{RunOptions, Scheduler};
use crate::segment::Segment;

/// Holds a process back until a condition reaches the wanted value.
pub(crate) struct ConditionGate {
    condition: Box<dyn FnMut() -> bool>,
    resume_on: bool,
    inner: Option<BoxedProcess>,
}

impl ConditionGate {
    /// The step that suspends the caller until `condition() == resume_on`.
    ///
    /// An already satisfied condition resumes on the next frame.
    pub(crate) fn suspend(mut condition: impl FnMut() -> bool + 'static, resume_on: bool) -> Step {
        if condition() == resume_on {
            return Step::NEXT_FRAME;
        }
        Step::wrap(move |inner| -> BoxedProcess {
            Box::new(ConditionGate {
                condition: Box::new(condition),
                resume_on,
                inner: Some(inner),
            })
        })
    }
}

impl Process for ConditionGate {
    fn step(&mut self, _cx: &mut Context<'_>) -> StepResult {
        if (self.condition)() != self.resume_on {
            return Ok(Step::NEXT_FRAME);
        }
        Ok(match self.inner.take() {
            Some(inner) => Step::Substitute(Substitution::Replace(inner)),
            None => Step::Complete,
        })
    }
}

/// Runs a waited-on process and releases its waiters when it ends.
pub(crate) struct Drainer {
    target: Handle,
    inner: BoxedProcess,
}

impl Drainer {
    pub(crate) fn new(target: Handle, inner: BoxedProcess) -> Self {
        Self { target, inner }
    }
}

impl Process for Drainer {
    fn step(&mut self, cx: &mut Context<'_>) -> StepResult {
        match self.inner.step(cx) {
            // the replacement still carries the target's handle
            Ok(Step::Substitute(Substitution::Replace(next))) => Ok(Step::Substitute(
                Substitution::Replace(Box::new(Drainer::new(self.target, next))),
            )),
            finished @ (Ok(Step::Complete) | Err(_)) => {
                cx.scheduler().close_waiting(self.target);
                finished
            }
            other => other,
        }
    }
}

/// Parked in a paused target's bucket: yields a frame after reinstatement,
/// waits on the target again, then hands control back to the caller.
pub(crate) struct Rewait {
    target: Handle,
    warn: bool,
    stage: u8,
    inner: Option<BoxedProcess>,
}

impl Rewait {
    pub(crate) fn new(target: Handle, warn: bool, inner: BoxedProcess) -> Self {
        Self {
            target,
            warn,
            stage: 0,
            inner: Some(inner),
        }
    }
}

impl Process for Rewait {
    fn step(&mut self, cx: &mut Context<'_>) -> StepResult {
        self.stage = self.stage.saturating_add(1);
        Ok(match self.stage {
            1 => Step::NEXT_FRAME,
            2 if self.warn => cx.wait_until_done(self.target),
            2 => cx.wait_until_done_quietly(self.target),
            _ => match self.inner.take() {
                Some(inner) => Step::Substitute(Substitution::Replace(inner)),
                None => Step::Complete,
            },
        })
    }
}

/// Waits once, then runs an action.
struct DelayedCall<F> {
    delay: f64,
    waited: bool,
    action: Option<F>,
}

impl<F: FnOnce()> Process for DelayedCall<F> {
    fn step(&mut self, cx: &mut Context<'_>) -> StepResult {
        if !std::mem::replace(&mut self.waited, true) {
            return Ok(cx.wait_for_seconds(self.delay));
        }
        if let Some(action) = self.action.take() {
            action();
        }
        Ok(Step::Complete)
    }
}

/// Calls an action after every period until a timeframe has elapsed.
struct PeriodicCall<F, D> {
    timeframe: f64,
    period: f64,
    started_at: Option<f64>,
    due: bool,
    action: F,
    on_done: Option<D>,
}

impl<F: FnMut(), D: FnOnce()> Process for PeriodicCall<F, D> {
    fn step(&mut self, cx: &mut Context<'_>) -> StepResult {
        let now = cx.local_time();
        let started_at = *self.started_at.get_or_insert(now);

        if self.due {
            (self.action)();
            self.due = false;
        }

        if now <= started_at + self.timeframe {
            self.due = true;
            return Ok(cx.wait_for_seconds(self.period));
        }

        if let Some(on_done) = self.on_done.take() {
            on_done();
        }
        Ok(Step::Complete)
    }
}

impl Scheduler {
    /// Runs `action` after `delay` seconds of `segment` time.
    ///
    /// A negative delay runs the action right away and returns `None`.
    pub fn call_delayed(
        &mut self,
        delay: f64,
        segment: Segment,
        action: impl FnOnce() + 'static,
    ) -> Option<Handle> {
        if delay < 0.0 {
            action();
            return None;
        }
        trace!(delay, %segment, "delayed call scheduled");
        Some(self.run(
            DelayedCall {
                delay,
                waited: false,
                action: Some(action),
            },
            RunOptions::new().segment(segment),
        ))
    }

    /// Calls `action` every `period` seconds for `timeframe` seconds, then
    /// calls `on_done`.
    ///
    /// The action runs each time a period elapses while the segment time is
    /// still within `timeframe` of the start.
    pub fn call_periodically<F, D>(
        &mut self,
        timeframe: f64,
        period: f64,
        segment: Segment,
        action: F,
        on_done: Option<D>,
    ) -> Handle
    where
        F: FnMut() + 'static,
        D: FnOnce() + 'static,
    {
        self.run(
            PeriodicCall {
                timeframe,
                period,
                started_at: None,
                due: false,
                action,
                on_done,
            },
            RunOptions::new().segment(segment),
        )
    }

    /// Calls `action` on every tick of `segment` for `timeframe` seconds,
    /// then calls `on_done`.
    pub fn call_continuously<F, D>(
        &mut self,
        timeframe: f64,
        segment: Segment,
        action: F,
        on_done: Option<D>,
    ) -> Handle
    where
        F: FnMut() + 'static,
        D: FnOnce() + 'static,
    {
        self.call_periodically(timeframe, 0.0, segment, action, on_done)
    }
}
