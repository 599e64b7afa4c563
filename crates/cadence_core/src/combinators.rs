//! # Process Combinators
//!
//! Adapters that build new processes out of existing ones. Every adapter
//! passes substitutions from the inner process through unchanged, so waits
//! and segment switches requested inside still apply to the whole chain.
//!
//! ```rust,ignore
//! use cadence_core::{delays, ProcessExt};
//!
//! let intro = delays([0.5, 0.5])
//!     .delay(1.0)
//!     .append_action(|| println!("intro done"))
//!     .cancel_with_owner(&player);
//! ```

use std::rc::Rc;

use crate::process::{BoxedProcess, Context, Process, Step, StepResult};

/// Extension methods available on every process.
pub trait ProcessExt: Process + Sized {
    /// Waits `seconds` of segment time before the first step.
    fn delay(self, seconds: f64) -> Delay<Self> {
        Delay {
            inner: self,
            seconds,
            waited: false,
        }
    }

    /// Polls `condition` every frame and starts once it returns true.
    fn delay_until<C: FnMut() -> bool>(self, condition: C) -> DelayUntil<Self, C> {
        DelayUntil {
            inner: self,
            condition,
            started: false,
        }
    }

    /// Keeps running only while `condition` returns true; checked before every step.
    fn cancel_with<C: FnMut() -> bool>(self, condition: C) -> CancelWith<Self, C> {
        CancelWith {
            inner: self,
            condition,
        }
    }

    /// Keeps running only while `owner` has not been dropped.
    fn cancel_with_owner<T: 'static>(
        self,
        owner: &Rc<T>,
    ) -> CancelWith<Self, Box<dyn FnMut() -> bool>> {
        let owner = Rc::downgrade(owner);
        self.cancel_with(Box::new(move || owner.strong_count() > 0))
    }

    /// Runs `next` once this process completes.
    fn append<N: Process>(self, next: N) -> Append<Self, N> {
        Append {
            first: Some(self),
            second: next,
        }
    }

    /// Runs `action` once this process completes.
    fn append_action<F: FnOnce()>(self, action: F) -> Append<Self, Action<F>> {
        self.append(Action::new(action))
    }

    /// Runs `first` to completion before this process.
    fn prepend<F: Process>(self, first: F) -> Append<F, Self> {
        first.append(self)
    }

    /// Runs `action` before the first step of this process.
    fn prepend_action<F: FnOnce()>(self, action: F) -> Append<Action<F>, Self> {
        Action::new(action).append(self)
    }

    /// Runs this process and `other` side by side as one process.
    ///
    /// Each side steps only when its own resume time is reached; the pair
    /// resumes at the earlier of the two. A substitution from either side
    /// applies to the pair after both due sides have stepped.
    fn superimpose<O: Process>(self, other: O) -> Superimpose<Self, O> {
        Superimpose {
            first: Some(self),
            second: Some(other),
            first_at: f64::NEG_INFINITY,
            second_at: f64::NEG_INFINITY,
            held: None,
        }
    }

    /// Rewrites every resume time this process yields.
    fn hijack<F: FnMut(f64) -> f64>(self, rewrite: F) -> Hijack<Self, F> {
        Hijack {
            inner: self,
            rewrite,
        }
    }

    /// Type-erases the process.
    fn boxed(self) -> BoxedProcess
    where
        Self: 'static,
    {
        Box::new(self)
    }
}

impl<P: Process> ProcessExt for P {}

/// See [`ProcessExt::delay`].
pub struct Delay<P> {
    inner: P,
    seconds: f64,
    waited: bool,
}

impl<P: Process> Process for Delay<P> {
    fn step(&mut self, cx: &mut Context<'_>) -> StepResult {
        if !std::mem::replace(&mut self.waited, true) {
            return Ok(cx.wait_for_seconds(self.seconds));
        }
        self.inner.step(cx)
    }
}

/// See [`ProcessExt::delay_until`].
pub struct DelayUntil<P, C> {
    inner: P,
    condition: C,
    started: bool,
}

impl<P: Process, C: FnMut() -> bool> Process for DelayUntil<P, C> {
    fn step(&mut self, cx: &mut Context<'_>) -> StepResult {
        if !self.started {
            if !(self.condition)() {
                return Ok(Step::NEXT_FRAME);
            }
            self.started = true;
        }
        self.inner.step(cx)
    }
}

/// See [`ProcessExt::cancel_with`].
pub struct CancelWith<P, C> {
    inner: P,
    condition: C,
}

impl<P: Process, C: FnMut() -> bool> Process for CancelWith<P, C> {
    fn step(&mut self, cx: &mut Context<'_>) -> StepResult {
        if !(self.condition)() {
            return Ok(Step::Complete);
        }
        self.inner.step(cx)
    }
}

/// See [`ProcessExt::append`].
pub struct Append<A, B> {
    first: Option<A>,
    second: B,
}

impl<A: Process, B: Process> Process for Append<A, B> {
    fn step(&mut self, cx: &mut Context<'_>) -> StepResult {
        if let Some(first) = self.first.as_mut() {
            match first.step(cx)? {
                Step::Complete => self.first = None,
                other => return Ok(other),
            }
        }
        self.second.step(cx)
    }
}

/// A process that runs a closure once and completes.
pub struct Action<F> {
    action: Option<F>,
}

impl<F: FnOnce()> Action<F> {
    /// Wraps `action`.
    #[must_use]
    pub fn new(action: F) -> Self {
        Self {
            action: Some(action),
        }
    }
}

impl<F: FnOnce()> Process for Action<F> {
    fn step(&mut self, _cx: &mut Context<'_>) -> StepResult {
        if let Some(action) = self.action.take() {
            action();
        }
        Ok(Step::Complete)
    }
}

/// See [`ProcessExt::superimpose`].
pub struct Superimpose<A, B> {
    first: Option<A>,
    second: Option<B>,
    first_at: f64,
    second_at: f64,
    /// Substitution from the second side when both sides asked for one in the same step.
    held: Option<Step>,
}

impl<A: Process, B: Process> Process for Superimpose<A, B> {
    fn step(&mut self, cx: &mut Context<'_>) -> StepResult {
        if let Some(held) = self.held.take() {
            return Ok(held);
        }

        let now = cx.local_time();
        let mut substitute = None;

        if let Some(first) = self.first.as_mut() {
            if now >= self.first_at || self.first_at.is_nan() {
                match first.step(cx)? {
                    Step::Continue(at) => self.first_at = at,
                    Step::Complete => self.first = None,
                    step @ Step::Substitute(_) => substitute = Some(step),
                }
            }
        }

        if let Some(second) = self.second.as_mut() {
            if now >= self.second_at || self.second_at.is_nan() {
                match second.step(cx)? {
                    Step::Continue(at) => self.second_at = at,
                    Step::Complete => self.second = None,
                    step @ Step::Substitute(_) if substitute.is_none() => substitute = Some(step),
                    step @ Step::Substitute(_) => self.held = Some(step),
                }
            }
        }

        if let Some(step) = substitute {
            return Ok(step);
        }

        Ok(match (self.first.is_some(), self.second.is_some()) {
            (true, true) => Step::Continue(self.first_at.min(self.second_at)),
            (true, false) => Step::Continue(self.first_at),
            (false, true) => Step::Continue(self.second_at),
            (false, false) => Step::Complete,
        })
    }
}

/// See [`ProcessExt::hijack`].
pub struct Hijack<P, F> {
    inner: P,
    rewrite: F,
}

impl<P: Process, F: FnMut(f64) -> f64> Process for Hijack<P, F> {
    fn step(&mut self, cx: &mut Context<'_>) -> StepResult {
        Ok(match self.inner.step(cx)? {
            Step::Continue(at) => Step::Continue((self.rewrite)(at)),
            other => other,
        })
    }
}
