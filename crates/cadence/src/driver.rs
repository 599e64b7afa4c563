//! # Frame Driver
//!
//! Pumps every scheduler segment once per host frame:
//! ```text
//! Frame N:
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │ 1. FIXED UPDATE     accumulator drained in fixed steps (capped)     │
//! │ 2. SLOW UPDATE      when the slow interval has elapsed              │
//! │ 3. REALTIME UPDATE  unscaled delta                                  │
//! │ 4. UPDATE           scaled delta                                    │
//! │ 5. MANUAL TIMEFRAME when auto-triggered                             │
//! │ 6. LATE UPDATE      scaled delta                                    │
//! │ 7. END OF FRAME     only when it holds work                         │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Editor hosts call [`FrameDriver::advance_editor`] instead, and
//! [`FrameDriver::set_host_mode`] on every editor/live transition.

use tracing::{debug, trace, warn};

use cadence_core::{Scheduler, SchedulerError, SchedulerResult, Segment, TickStats};

use crate::config::FrameConfig;

/// Whether the host is running the game or sitting in an editor session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HostMode {
    /// Editor session. Only the editor segments are driven.
    Editor,
    /// Live game.
    #[default]
    Playing,
}

/// Time elapsed since the previous host frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameTime {
    /// Scaled game delta in seconds.
    pub delta: f64,
    /// Real delta in seconds, unaffected by time scale.
    pub unscaled_delta: f64,
}

impl FrameTime {
    /// A frame with no time scaling.
    #[must_use]
    pub const fn new(delta: f64) -> Self {
        Self {
            delta,
            unscaled_delta: delta,
        }
    }

    /// A frame whose scaled and real deltas differ.
    #[must_use]
    pub const fn scaled(delta: f64, unscaled_delta: f64) -> Self {
        Self {
            delta,
            unscaled_delta,
        }
    }
}

/// What one frame did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameReport {
    /// Frame number, starting at 1.
    pub frame: u64,
    /// Fixed-update ticks run this frame.
    pub fixed_steps: u32,
    /// Whether a slow-update tick ran.
    pub slow_update_ran: bool,
    /// Whether the manual timeframe ticked.
    pub manual_timeframe_ran: bool,
    /// Whether the end-of-frame segment was pumped.
    pub end_of_frame_ran: bool,
    /// Slots stepped across every phase that reported no fault.
    pub stepped: usize,
}

/// Drives a [`Scheduler`] from a host's frame callbacks.
pub struct FrameDriver {
    config: FrameConfig,
    mode: HostMode,
    frame: u64,
    fixed_accumulator: f64,
    slow_elapsed: f64,
    editor_slow_elapsed: f64,
    manual_elapsed: f64,
    last_report: FrameReport,
    spilled: Vec<SchedulerError>,
}

impl FrameDriver {
    /// Creates a driver in [`HostMode::Playing`].
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidConfig`] if `config` does not validate.
    pub fn new(config: FrameConfig) -> SchedulerResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            mode: HostMode::Playing,
            frame: 0,
            fixed_accumulator: 0.0,
            slow_elapsed: 0.0,
            editor_slow_elapsed: 0.0,
            manual_elapsed: 0.0,
            last_report: FrameReport::default(),
            spilled: Vec::new(),
        })
    }

    /// Driver configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    /// Current host mode.
    #[inline]
    #[must_use]
    pub fn mode(&self) -> HostMode {
        self.mode
    }

    /// Frames advanced so far.
    #[inline]
    #[must_use]
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Report of the most recent [`FrameDriver::advance`], including one that faulted.
    #[inline]
    #[must_use]
    pub fn last_report(&self) -> &FrameReport {
        &self.last_report
    }

    /// Faults reported in a frame after its first one.
    pub fn take_faults(&mut self) -> Vec<SchedulerError> {
        std::mem::take(&mut self.spilled)
    }

    /// Runs one live frame.
    ///
    /// Every phase runs even if an earlier one faulted.
    ///
    /// # Errors
    ///
    /// Returns the first fault of the frame. Later ones are kept for
    /// [`FrameDriver::take_faults`].
    pub fn advance(
        &mut self,
        scheduler: &mut Scheduler,
        time: FrameTime,
    ) -> SchedulerResult<FrameReport> {
        self.frame += 1;
        let delta = sanitize(time.delta);
        let unscaled = sanitize(time.unscaled_delta);
        let mut phase = Phase::new(self.frame);

        self.fixed_accumulator += delta;
        let step = self.config.fixed_timestep;
        while self.fixed_accumulator >= step {
            if phase.report.fixed_steps == self.config.max_fixed_steps {
                debug!(
                    backlog = self.fixed_accumulator,
                    "fixed update backlog dropped"
                );
                self.fixed_accumulator = 0.0;
                break;
            }
            self.fixed_accumulator -= step;
            phase.record(scheduler.tick(Segment::FixedUpdate, step));
            phase.report.fixed_steps += 1;
        }

        self.slow_elapsed += unscaled;
        if self.slow_elapsed >= self.config.slow_update_interval {
            let elapsed = std::mem::take(&mut self.slow_elapsed);
            phase.record(scheduler.tick(Segment::SlowUpdate, elapsed));
            phase.report.slow_update_ran = true;
        }

        phase.record(scheduler.tick(Segment::RealtimeUpdate, unscaled));
        phase.record(scheduler.tick(Segment::Update, delta));

        self.manual_elapsed += delta;
        if self.config.auto_trigger_manual_timeframe {
            let elapsed = std::mem::take(&mut self.manual_elapsed);
            phase.record(scheduler.tick(Segment::ManualTimeframe, elapsed));
            phase.report.manual_timeframe_ran = true;
        }

        phase.record(scheduler.tick(Segment::LateUpdate, delta));

        if scheduler.has_end_of_frame_work() {
            phase.record(scheduler.tick(Segment::EndOfFrame, delta));
            phase.report.end_of_frame_ran = true;
        }

        trace!(frame = self.frame, stepped = phase.report.stepped, "frame advanced");
        self.finish(phase)
    }

    /// Runs one editor frame: editor slow update when due, then editor update.
    ///
    /// Does nothing outside [`HostMode::Editor`].
    ///
    /// # Errors
    ///
    /// Returns the first fault, as [`FrameDriver::advance`] does.
    pub fn advance_editor(
        &mut self,
        scheduler: &mut Scheduler,
        delta: f64,
    ) -> SchedulerResult<FrameReport> {
        if self.mode != HostMode::Editor {
            warn!("advance_editor called while playing");
            return Ok(FrameReport {
                frame: self.frame,
                ..FrameReport::default()
            });
        }

        self.frame += 1;
        let delta = sanitize(delta);
        let mut phase = Phase::new(self.frame);

        self.editor_slow_elapsed += delta;
        if self.editor_slow_elapsed >= self.config.editor_slow_update_interval {
            let elapsed = std::mem::take(&mut self.editor_slow_elapsed);
            phase.record(scheduler.tick(Segment::EditorSlowUpdate, elapsed));
            phase.report.slow_update_ran = true;
        }
        phase.record(scheduler.tick(Segment::EditorUpdate, delta));

        self.finish(phase)
    }

    /// Switches host mode. Any change flushes the editor segments and returns
    /// the number of processes removed.
    pub fn set_host_mode(&mut self, scheduler: &mut Scheduler, mode: HostMode) -> usize {
        if mode == self.mode {
            return 0;
        }
        debug!(from = ?self.mode, to = ?mode, "host mode changed");
        self.mode = mode;
        self.editor_slow_elapsed = 0.0;
        scheduler.flush_editor_segments()
    }

    /// Ticks the manual timeframe with the scaled time accumulated since it
    /// last ran. For hosts that disable the automatic trigger.
    ///
    /// # Errors
    ///
    /// Propagates the tick's fault.
    pub fn trigger_manual_timeframe(
        &mut self,
        scheduler: &mut Scheduler,
    ) -> SchedulerResult<TickStats> {
        let elapsed = std::mem::take(&mut self.manual_elapsed);
        scheduler.tick(Segment::ManualTimeframe, elapsed)
    }

    fn finish(&mut self, phase: Phase) -> SchedulerResult<FrameReport> {
        let Phase {
            report,
            first_fault,
            spilled,
        } = phase;
        self.last_report = report;
        self.spilled.extend(spilled);
        match first_fault {
            Some(fault) => Err(fault),
            None => Ok(report),
        }
    }
}

/// Per-frame accumulator of stats and faults.
struct Phase {
    report: FrameReport,
    first_fault: Option<SchedulerError>,
    spilled: Vec<SchedulerError>,
}

impl Phase {
    fn new(frame: u64) -> Self {
        Self {
            report: FrameReport {
                frame,
                ..FrameReport::default()
            },
            first_fault: None,
            spilled: Vec::new(),
        }
    }

    fn record(&mut self, result: SchedulerResult<TickStats>) {
        match result {
            Ok(stats) => self.report.stepped += stats.stepped,
            Err(fault) if self.first_fault.is_none() => self.first_fault = Some(fault),
            Err(fault) => self.spilled.push(fault),
        }
    }
}

fn sanitize(delta: f64) -> f64 {
    if delta.is_finite() {
        delta.max(0.0)
    } else {
        0.0
    }
}
