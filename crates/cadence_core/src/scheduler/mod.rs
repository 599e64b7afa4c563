//! # Scheduler
//!
//! Owns one process table per segment, the handle directory, the tag/layer
//! index and the wait/pause registry, and drives processes one tick at a time.
//!
//! ## Tick Contract
//!
//! 1. The segment clock advances by the host's delta time.
//! 2. Every occupied slot whose resume time has been reached is stepped once,
//!    in slot order. Slots appended during the tick by resumed processes are
//!    visited in the same pass; brand new submissions wait for the next tick.
//! 3. Every `maintenance_interval` ticks, the tables are compacted.
//! 4. At most one queued fault is returned.
//!
//! ## Example
//!
//! ```rust,ignore
//! use cadence_core::{delays, RunOptions, Scheduler, Segment};
//!
//! let mut scheduler = Scheduler::default();
//! let handle = scheduler.run(delays([0.0, 1.0, 2.0]), RunOptions::new().tag("intro"));
//!
//! loop {
//!     scheduler.tick(Segment::Update, frame_delta)?;
//! }
//! ```

mod control;
mod waiting;

use std::collections::VecDeque;

use crossbeam_channel::Sender;
use tracing::{debug, error, trace};

use crate::config::SchedulerConfig;
use crate::error::{ProcessError, SchedulerError, SchedulerResult};
use crate::handle::{Handle, HandleDirectory, SlotIndex};
use crate::metadata::{MetadataIndex, Selector};
use crate::process::{BoxedProcess, Context, Process, Step, StepResult};
use crate::registry::{BucketKey, WaitRegistry};
use crate::segment::Segment;
use crate::table::{ProcessTable, Relocation};

/// Resume time meaning "as soon as the segment next looks at the slot".
pub(crate) const IMMEDIATELY: f64 = f64::NEG_INFINITY;

/// What to do when a singleton group already has a running member.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Singleton {
    /// Keep the running member and discard the new process.
    KeepExisting,
    /// Kill the whole group, then start the new process.
    Overwrite,
}

/// Options for [`Scheduler::run`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Segment to run in.
    pub segment: Segment,
    /// Optional tag.
    pub tag: Option<String>,
    /// Optional layer.
    pub layer: Option<i32>,
    /// Singleton policy for the group formed by the tag and/or layer.
    pub singleton: Option<Singleton>,
}

impl RunOptions {
    /// Update segment, no labels.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs in `segment`.
    #[must_use]
    pub fn segment(mut self, segment: Segment) -> Self {
        self.segment = segment;
        self
    }

    /// Tags the process.
    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Puts the process on a layer.
    #[must_use]
    pub fn layer(mut self, layer: i32) -> Self {
        self.layer = Some(layer);
        self
    }

    /// Applies a singleton policy.
    #[must_use]
    pub fn singleton(mut self, singleton: Singleton) -> Self {
        self.singleton = Some(singleton);
        self
    }
}

/// Statistics for one tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickStats {
    /// Segment that ticked.
    pub segment: Segment,
    /// Slots stepped.
    pub stepped: usize,
    /// Processes that completed or faulted.
    pub finished: usize,
    /// Slots reclaimed, if maintenance ran after this tick.
    pub reclaimed: Option<usize>,
}

/// Snapshot of scheduler occupancy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Processes in the tables.
    pub active: usize,
    /// Processes in the paused bucket.
    pub paused: usize,
    /// Processes parked on another process.
    pub waiting: usize,
    /// Total allocated slots across all tables.
    pub capacity: usize,
}

/// Where faults go.
enum FaultSink {
    Queue,
    Handler(Box<dyn FnMut(SchedulerError)>),
    Channel(Sender<SchedulerError>),
}

/// How a step ended, from the tick loop's point of view.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Advance {
    Suspended,
    Finished,
    Parked,
    Detached,
}

/// Outcome of applying a substitution.
pub(crate) enum Handoff {
    /// Put this process back and step it again right away.
    Again(BoxedProcess),
    /// Put this process back, due at the given time.
    Resume(BoxedProcess, f64),
    /// The process left the slot.
    Gone,
}

/// The cooperative process scheduler.
pub struct Scheduler {
    config: SchedulerConfig,
    tables: [ProcessTable; Segment::COUNT],
    directory: HandleDirectory,
    metadata: MetadataIndex,
    registry: WaitRegistry,
    faults: VecDeque<SchedulerError>,
    sink: FaultSink,
    manual_clock: Option<Box<dyn FnMut(f64) -> f64>>,
    last_handle: u64,
    ticks_since_maintenance: u16,
    /// Number of process steps currently on the call stack.
    depth: u32,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::with_config(SchedulerConfig::default())
    }
}

impl Scheduler {
    /// Creates a scheduler from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidConfig`] if `config` does not validate.
    pub fn new(config: SchedulerConfig) -> SchedulerResult<Self> {
        config.validate()?;
        Ok(Self::with_config(config))
    }

    fn with_config(config: SchedulerConfig) -> Self {
        let tables = Segment::ALL.map(|segment| {
            ProcessTable::new(
                segment,
                config.initial_capacity_for(segment),
                config.growth_chunk,
            )
        });

        Self {
            config,
            tables,
            directory: HandleDirectory::default(),
            metadata: MetadataIndex::default(),
            registry: WaitRegistry::default(),
            faults: VecDeque::new(),
            sink: FaultSink::Queue,
            manual_clock: None,
            last_handle: 0,
            ticks_since_maintenance: 0,
            depth: 0,
        }
    }

    /// The active configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    // =========================================================================
    // SUBMISSION
    // =========================================================================

    /// Starts a process and returns its handle.
    ///
    /// Outside a tick of the target segment the process takes its first step
    /// immediately. Inside one, it first runs on the segment's next tick.
    ///
    /// With a singleton policy and an already running member of the group,
    /// [`Singleton::KeepExisting`] returns that member's handle and drops
    /// `process`.
    pub fn run(&mut self, process: impl Process + 'static, options: RunOptions) -> Handle {
        self.run_boxed(Box::new(process), options)
    }

    /// [`Scheduler::run`] for an already boxed process.
    pub fn run_boxed(&mut self, process: BoxedProcess, options: RunOptions) -> Handle {
        let RunOptions {
            segment,
            tag,
            layer,
            singleton,
        } = options;

        if let Some(policy) = singleton {
            if let Some(existing) = self.apply_singleton(policy, tag.as_deref(), layer) {
                return existing;
            }
        }

        self.submit(process, segment, tag, layer, None, IMMEDIATELY)
    }

    fn apply_singleton(
        &mut self,
        policy: Singleton,
        tag: Option<&str>,
        layer: Option<i32>,
    ) -> Option<Handle> {
        let selector = match (tag, layer) {
            (Some(tag), Some(layer)) => Selector::TagAndLayer(tag, layer),
            (Some(tag), None) => Selector::Tag(tag),
            (None, Some(layer)) => Selector::Layer(layer),
            (None, None) => return None,
        };

        match policy {
            Singleton::KeepExisting => {
                let tables = &self.tables;
                let slot = self
                    .metadata
                    .find(selector, |slot| tables[slot.segment.index()].is_live(slot.offset))?;
                self.directory.handle_at(slot)
            }
            Singleton::Overwrite => {
                self.kill_group(selector);
                None
            }
        }
    }

    /// Places a process in a table. `handle` is `Some` when an existing
    /// logical process is being reinstated, which never defers and never
    /// takes an eager step.
    pub(crate) fn submit(
        &mut self,
        process: BoxedProcess,
        segment: Segment,
        tag: Option<String>,
        layer: Option<i32>,
        handle: Option<Handle>,
        resume_at: f64,
    ) -> Handle {
        let fresh = handle.is_none();
        let handle = match handle {
            Some(handle) => {
                self.directory.forget(handle);
                handle
            }
            None => self.mint_handle(),
        };

        let index = segment.index();
        let table = &mut self.tables[index];
        let not_before = if fresh && table.running {
            table.serial + 1
        } else {
            0
        };
        let slot = SlotIndex::new(segment, table.push(process, resume_at, not_before));

        self.metadata.purge(slot);
        if let Some(tag) = tag {
            self.metadata.set_tag(slot, tag);
        }
        if let Some(layer) = layer {
            self.metadata.set_layer(slot, layer);
        }
        self.directory.register(handle, slot);

        if fresh && !self.tables[index].running {
            self.tables[index].running = true;
            self.advance(slot);
            self.tables[index].running = false;
        }

        handle
    }

    fn mint_handle(&mut self) -> Handle {
        self.last_handle += 1;
        Handle::from_raw(self.last_handle)
    }

    // =========================================================================
    // TICK
    // =========================================================================

    /// Advances `segment` by `delta_time` seconds and steps every due process.
    ///
    /// # Errors
    ///
    /// - [`SchedulerError::ReentrantTick`] if called from inside a process step.
    /// - [`SchedulerError::ProcessFault`] for the oldest fault captured and
    ///   not yet reported; the tick itself still completed.
    pub fn tick(&mut self, segment: Segment, delta_time: f64) -> SchedulerResult<TickStats> {
        if self.depth > 0 {
            return Err(SchedulerError::ReentrantTick { segment });
        }

        self.advance_clock(segment, delta_time);
        let now = self.local_time(segment);
        let index = segment.index();
        let mut stats = TickStats {
            segment,
            ..TickStats::default()
        };

        self.tables[index].serial += 1;
        self.tables[index].running = true;

        let mut offset = 0;
        while offset < self.tables[index].next_free() {
            if self.tables[index].is_due(offset, now) {
                stats.stepped += 1;
                if self.advance(SlotIndex::new(segment, offset)) == Advance::Finished {
                    stats.finished += 1;
                }
            }
            offset += 1;
        }

        self.tables[index].running = false;
        trace!(%segment, now, stepped = stats.stepped, finished = stats.finished, "tick");

        self.ticks_since_maintenance += 1;
        if self.ticks_since_maintenance >= self.config.maintenance_interval {
            self.ticks_since_maintenance = 0;
            stats.reclaimed = Some(self.maintain());
        }

        match self.faults.pop_front() {
            Some(fault) => Err(fault),
            None => Ok(stats),
        }
    }

    /// Steps the process at `slot` until it suspends, finishes or leaves the slot.
    fn advance(&mut self, slot: SlotIndex) -> Advance {
        let index = slot.segment.index();
        loop {
            let Some(handle) = self.directory.handle_at(slot) else {
                return Advance::Detached;
            };
            let Some(mut process) = self.tables[index].begin_step(slot.offset) else {
                return Advance::Detached;
            };

            self.depth += 1;
            let result = process.step(&mut Context::new(self, handle, slot.segment));
            self.depth -= 1;

            // killed or paused from inside its own step
            if !self.tables[index].is_stepping(slot.offset) {
                self.settle_detached(handle, slot.segment, process, &result);
                if let Err(source) = result {
                    self.report_fault(handle, slot.segment, source);
                }
                return Advance::Detached;
            }

            match result {
                Ok(Step::Continue(at)) => {
                    let _ = self.tables[index].end_step(slot.offset, process, at);
                    return Advance::Suspended;
                }
                Ok(Step::Complete) => {
                    self.tables[index].take(slot.offset);
                    return Advance::Finished;
                }
                Ok(Step::Substitute(substitution)) => {
                    match self.substitute(slot, handle, process, substitution) {
                        Handoff::Again(next) => {
                            let _ = self.tables[index].end_step(slot.offset, next, IMMEDIATELY);
                        }
                        Handoff::Resume(next, at) => {
                            let _ = self.tables[index].end_step(slot.offset, next, at);
                            return Advance::Suspended;
                        }
                        Handoff::Gone => {
                            self.tables[index].take(slot.offset);
                            return Advance::Parked;
                        }
                    }
                }
                Err(source) => {
                    self.tables[index].take(slot.offset);
                    self.report_fault(handle, slot.segment, source);
                    return Advance::Finished;
                }
            }
        }
    }

    /// Settles a process whose slot was vacated during its own step.
    ///
    /// If it paused itself, its pending paused entry receives the process and
    /// the remaining delay. A requested substitution is dropped in that case.
    /// Otherwise it was killed and is dropped here.
    fn settle_detached(
        &mut self,
        handle: Handle,
        segment: Segment,
        process: BoxedProcess,
        result: &StepResult,
    ) {
        match result {
            Ok(Step::Continue(at)) => {
                let residual = (at - self.local_time(segment)).max(0.0);
                let _ = self.registry.fill_pending(handle, process, residual);
            }
            Ok(Step::Substitute(_)) => {
                let _ = self.registry.fill_pending(handle, process, 0.0);
            }
            Ok(Step::Complete) | Err(_) => self.registry.drop_pending(handle),
        }
    }

    fn report_fault(&mut self, handle: Handle, segment: Segment, source: ProcessError) {
        error!(%handle, %segment, error = %source, "process faulted");
        let fault = SchedulerError::ProcessFault {
            handle,
            segment,
            source,
        };
        match &mut self.sink {
            FaultSink::Queue => self.faults.push_back(fault),
            FaultSink::Handler(handler) => handler(fault),
            FaultSink::Channel(sender) => {
                if let Err(unsent) = sender.send(fault) {
                    self.faults.push_back(unsent.into_inner());
                }
            }
        }
    }

    // =========================================================================
    // FAULTS
    // =========================================================================

    /// Delivers every future fault to `handler` instead of queueing it.
    pub fn set_fault_handler(&mut self, handler: impl FnMut(SchedulerError) + 'static) {
        self.sink = FaultSink::Handler(Box::new(handler));
    }

    /// Sends every future fault down `sender`. Faults that cannot be sent are queued.
    pub fn set_fault_channel(&mut self, sender: Sender<SchedulerError>) {
        self.sink = FaultSink::Channel(sender);
    }

    /// Goes back to queueing faults and returning them from [`Scheduler::tick`].
    pub fn queue_faults(&mut self) {
        self.sink = FaultSink::Queue;
    }

    /// Removes and returns every queued fault.
    pub fn drain_faults(&mut self) -> Vec<SchedulerError> {
        self.faults.drain(..).collect()
    }

    // =========================================================================
    // CLOCKS
    // =========================================================================

    fn advance_clock(&mut self, segment: Segment, delta_time: f64) {
        let delta = if delta_time.is_finite() {
            delta_time.max(0.0)
        } else {
            0.0
        };
        let max_delta = self.config.max_delta_time;

        match segment {
            Segment::EndOfFrame => {
                let update_time = self.tables[Segment::Update.index()].clock.local_time;
                let clock = &mut self.tables[segment.index()].clock;
                clock.local_time = update_time;
                clock.delta_time = delta;
            }
            Segment::ManualTimeframe if self.manual_clock.is_some() => {
                let clock = &mut self.tables[segment.index()].clock;
                let last = clock.local_time;
                if let Some(manual_clock) = self.manual_clock.as_mut() {
                    clock.jump_to(manual_clock(last));
                }
                clock.delta_time = clock.delta_time.min(max_delta);
            }
            _ => {
                let clock = &mut self.tables[segment.index()].clock;
                clock.advance(delta);
                if segment.clamps_delta() {
                    clock.delta_time = clock.delta_time.min(max_delta);
                }
            }
        }
    }

    /// Installs a clock for the manual timeframe. It receives the previous
    /// manual time and returns the new one.
    pub fn set_manual_clock(&mut self, clock: impl FnMut(f64) -> f64 + 'static) {
        self.manual_clock = Some(Box::new(clock));
    }

    /// Removes the manual timeframe clock; the segment accumulates delta time again.
    pub fn clear_manual_clock(&mut self) {
        self.manual_clock = None;
    }

    /// Local time of `segment`. End-of-frame shares the Update clock.
    #[must_use]
    pub fn local_time(&self, segment: Segment) -> f64 {
        match segment {
            Segment::EndOfFrame => self.tables[Segment::Update.index()].clock.local_time,
            _ => self.tables[segment.index()].clock.local_time,
        }
    }

    /// Delta time of `segment`'s most recent tick.
    #[inline]
    #[must_use]
    pub fn delta_time(&self, segment: Segment) -> f64 {
        self.tables[segment.index()].clock.delta_time
    }

    /// Zeroes the Update, LateUpdate, FixedUpdate and RealtimeUpdate clocks.
    pub fn reset_clocks(&mut self) {
        for segment in [
            Segment::Update,
            Segment::LateUpdate,
            Segment::FixedUpdate,
            Segment::RealtimeUpdate,
        ] {
            self.tables[segment.index()].clock.reset();
        }
    }

    // =========================================================================
    // MAINTENANCE
    // =========================================================================

    /// Compacts every table now. Returns the number of reclaimed slots.
    ///
    /// Does nothing while a process step is in progress.
    pub fn compact(&mut self) -> usize {
        if self.depth > 0 {
            debug!("compaction skipped inside a process step");
            return 0;
        }
        self.maintain()
    }

    fn maintain(&mut self) -> usize {
        // groups whose target vanished without closing them
        for target in self.registry.group_targets() {
            if !self.is_alive(target) {
                self.close_waiting(target);
            }
        }
        let dropped_groups = self.registry.drop_empty_groups();

        let Self {
            tables,
            directory,
            metadata,
            ..
        } = self;

        let mut reclaimed = 0;
        for table in tables.iter_mut() {
            let segment = table.segment();
            reclaimed += table.compact(|event| match event {
                Relocation::Moved { from, to } => {
                    let (from, to) = (SlotIndex::new(segment, from), SlotIndex::new(segment, to));
                    directory.forget_slot(to);
                    directory.relocate(from, to);
                    metadata.migrate(from, to);
                }
                Relocation::Released(offset) => {
                    let slot = SlotIndex::new(segment, offset);
                    directory.forget_slot(slot);
                    metadata.purge(slot);
                }
            });
        }

        debug!(reclaimed, dropped_groups, "maintenance pass");
        reclaimed
    }

    /// Kills every process in the editor segments, including parked ones.
    ///
    /// Hosts call this on every editor/live mode transition. Waiting groups of
    /// the killed processes are closed first. Returns the number of processes
    /// removed.
    pub fn flush_editor_segments(&mut self) -> usize {
        let mut handles = Vec::new();
        for segment in [Segment::EditorUpdate, Segment::EditorSlowUpdate] {
            let table = &self.tables[segment.index()];
            for offset in 0..table.next_free() {
                let slot = SlotIndex::new(segment, offset);
                if table.is_live(offset) {
                    if let Some(handle) = self.directory.handle_at(slot) {
                        handles.push(handle);
                    }
                }
            }
        }

        let mut flushed = 0;
        for handle in handles {
            flushed += self.kill(handle);
        }

        let parked = self.registry.extract(|entry| entry.segment.is_editor());
        for entry in &parked {
            if self.registry.has_group(entry.handle) {
                self.close_waiting(entry.handle);
            }
        }
        flushed += parked.len();

        for segment in [Segment::EditorUpdate, Segment::EditorSlowUpdate] {
            self.directory.forget_segment(segment);
            self.metadata.purge_segment(segment);
            self.tables[segment.index()].clear();
        }

        debug!(flushed, "editor segments flushed");
        flushed
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    /// Returns true if the handle's process is in a table.
    #[must_use]
    pub fn is_running(&self, handle: Handle) -> bool {
        self.live_slot(handle).is_some()
    }

    /// Returns true if the handle's process is paused.
    #[must_use]
    pub fn is_paused(&self, handle: Handle) -> bool {
        self.registry.bucket_of(handle) == Some(BucketKey::Paused)
    }

    /// Returns true if the handle's process is waiting on another process.
    #[must_use]
    pub fn is_waiting(&self, handle: Handle) -> bool {
        matches!(self.registry.bucket_of(handle), Some(BucketKey::Waiting(_)))
    }

    /// Returns true if the handle's process is running, paused or waiting.
    #[must_use]
    pub fn is_alive(&self, handle: Handle) -> bool {
        self.is_running(handle) || self.registry.bucket_of(handle).is_some()
    }

    /// Segment the handle's process runs in, or will run in when reinstated.
    #[must_use]
    pub fn segment_of(&self, handle: Handle) -> Option<Segment> {
        match self.live_slot(handle) {
            Some(slot) => Some(slot.segment),
            None => self.registry.get(handle).map(|entry| entry.segment),
        }
    }

    /// Tag of the handle's process.
    #[must_use]
    pub fn tag_of(&self, handle: Handle) -> Option<&str> {
        match self.live_slot(handle) {
            Some(slot) => self.metadata.tag(slot),
            None => self.registry.get(handle)?.tag.as_deref(),
        }
    }

    /// Layer of the handle's process.
    #[must_use]
    pub fn layer_of(&self, handle: Handle) -> Option<i32> {
        match self.live_slot(handle) {
            Some(slot) => self.metadata.layer(slot),
            None => self.registry.get(handle)?.layer,
        }
    }

    /// Processes currently in `segment`'s table.
    #[must_use]
    pub fn process_count(&self, segment: Segment) -> usize {
        self.tables[segment.index()].live_count()
    }

    /// Processes in all tables.
    #[must_use]
    pub fn total_count(&self) -> usize {
        self.tables.iter().map(ProcessTable::live_count).sum()
    }

    /// Returns true if the end-of-frame segment has anything to run.
    #[must_use]
    pub fn has_end_of_frame_work(&self) -> bool {
        self.process_count(Segment::EndOfFrame) > 0
    }

    /// Occupancy snapshot.
    #[must_use]
    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            active: self.total_count(),
            paused: self.registry.count_paused(Selector::All),
            waiting: self.registry.waiting_count(),
            capacity: self.tables.iter().map(ProcessTable::capacity).sum(),
        }
    }

    pub(crate) fn live_slot(&self, handle: Handle) -> Option<SlotIndex> {
        self.directory
            .resolve(handle)
            .filter(|slot| self.tables[slot.segment.index()].is_live(slot.offset))
    }

    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        assert!(self.metadata.is_consistent());
        for table in &self.tables {
            for offset in 0..table.next_free() {
                let slot = SlotIndex::new(table.segment(), offset);
                if table.is_live(offset) {
                    let handle = self.directory.handle_at(slot);
                    assert!(handle.is_some(), "live slot {slot:?} has no handle");
                    assert_eq!(handle.and_then(|h| self.directory.resolve(h)), Some(slot));
                    assert!(handle.and_then(|h| self.registry.bucket_of(h)).is_none());
                }
            }
        }
        assert!(self.directory.len() + self.registry.len() >= self.total_count());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::{delays, from_fn};
    use std::cell::Cell;
    use std::rc::Rc;

    fn counter(steps: &Rc<Cell<u32>>, delay: f64) -> impl Process + 'static {
        let steps = Rc::clone(steps);
        from_fn(move |cx| {
            steps.set(steps.get() + 1);
            Ok(cx.wait_for_seconds(delay))
        })
    }

    #[test]
    fn test_run_steps_eagerly_outside_tick() {
        let mut scheduler = Scheduler::default();
        let steps = Rc::new(Cell::new(0));
        let handle = scheduler.run(counter(&steps, 1.0), RunOptions::new());

        assert_eq!(steps.get(), 1);
        assert!(scheduler.is_running(handle));
        assert_eq!(scheduler.process_count(Segment::Update), 1);
    }

    #[test]
    fn test_tick_respects_resume_time() {
        let mut scheduler = Scheduler::default();
        let steps = Rc::new(Cell::new(0));
        scheduler.run(counter(&steps, 1.0), RunOptions::new());

        scheduler.tick(Segment::Update, 0.5).unwrap();
        assert_eq!(steps.get(), 1);
        scheduler.tick(Segment::Update, 0.5).unwrap();
        assert_eq!(steps.get(), 2);
    }

    #[test]
    fn test_delay_sequence_completes() {
        let mut scheduler = Scheduler::default();
        let handle = scheduler.run(delays([0.0, 1.0, 2.0]), RunOptions::new());

        let mut ticks = 0;
        while scheduler.is_running(handle) {
            scheduler.tick(Segment::Update, 0.5).unwrap();
            ticks += 1;
            assert!(ticks < 20);
        }
        // due at 0, then 0.5 (+1.0 => 1.5), then 1.5 (+2.0 => 3.5), then completes
        assert_eq!(ticks, 7);
        scheduler.assert_consistent();
    }

    #[test]
    fn test_submission_during_tick_is_deferred() {
        let mut scheduler = Scheduler::default();
        let spawned = Rc::new(Cell::new(0));
        let spawned_in = Rc::clone(&spawned);

        scheduler.run(
            from_fn(move |cx| {
                if cx.local_time() > 0.0 {
                    let spawned = Rc::clone(&spawned_in);
                    cx.scheduler().run(
                        from_fn(move |_| {
                            spawned.set(spawned.get() + 1);
                            Ok(Step::Complete)
                        }),
                        RunOptions::new(),
                    );
                    return Ok(Step::Complete);
                }
                Ok(Step::NEXT_FRAME)
            }),
            RunOptions::new(),
        );

        scheduler.tick(Segment::Update, 0.1).unwrap();
        assert_eq!(spawned.get(), 0, "fresh submission must wait for the next tick");
        scheduler.tick(Segment::Update, 0.1).unwrap();
        assert_eq!(spawned.get(), 1);
    }

    #[test]
    fn test_submission_into_other_segment_steps_eagerly() {
        let mut scheduler = Scheduler::default();
        let spawned = Rc::new(Cell::new(0));
        let spawned_in = Rc::clone(&spawned);

        scheduler.run(
            from_fn(move |cx| {
                if cx.local_time() > 0.0 {
                    let spawned = Rc::clone(&spawned_in);
                    cx.scheduler().run(
                        from_fn(move |_| {
                            spawned.set(spawned.get() + 1);
                            Ok(Step::Complete)
                        }),
                        RunOptions::new().segment(Segment::LateUpdate),
                    );
                    return Ok(Step::Complete);
                }
                Ok(Step::NEXT_FRAME)
            }),
            RunOptions::new(),
        );

        scheduler.tick(Segment::Update, 0.1).unwrap();
        assert_eq!(spawned.get(), 1);
    }

    #[test]
    fn test_fault_is_reported_once() {
        let mut scheduler = Scheduler::default();
        let handle = scheduler.run(
            from_fn(|cx| {
                if cx.local_time() > 0.0 {
                    Err(ProcessError::new("exploded"))
                } else {
                    Ok(Step::NEXT_FRAME)
                }
            }),
            RunOptions::new().segment(Segment::FixedUpdate),
        );

        let err = scheduler.tick(Segment::FixedUpdate, 0.02).unwrap_err();
        assert_eq!(err.handle(), Some(handle));
        assert!(!scheduler.is_running(handle));
        assert!(scheduler.tick(Segment::FixedUpdate, 0.02).is_ok());
    }

    #[test]
    fn test_one_fault_surfaces_per_tick() {
        let mut scheduler = Scheduler::default();
        let faulty = || {
            from_fn(|cx| {
                if cx.local_time() > 0.0 {
                    Err(ProcessError::new("exploded"))
                } else {
                    Ok(Step::NEXT_FRAME)
                }
            })
        };
        let first = scheduler.run(faulty(), RunOptions::new());
        let second = scheduler.run(faulty(), RunOptions::new());

        let err = scheduler.tick(Segment::Update, 0.1).unwrap_err();
        assert_eq!(err.handle(), Some(first));
        assert!(!scheduler.is_alive(first));
        assert!(!scheduler.is_alive(second));

        let err = scheduler.tick(Segment::Update, 0.1).unwrap_err();
        assert_eq!(err.handle(), Some(second));
        assert!(scheduler.tick(Segment::Update, 0.1).is_ok());
    }

    #[test]
    fn test_fault_handler_receives_faults() {
        let mut scheduler = Scheduler::default();
        let seen = Rc::new(Cell::new(0));
        let seen_in = Rc::clone(&seen);
        scheduler.set_fault_handler(move |_| seen_in.set(seen_in.get() + 1));

        scheduler.run(from_fn(|_| Err(ProcessError::new("first step"))), RunOptions::new());
        assert_eq!(seen.get(), 1);
        assert!(scheduler.tick(Segment::Update, 0.1).is_ok());
        assert!(scheduler.drain_faults().is_empty());
    }

    #[test]
    fn test_reentrant_tick_rejected() {
        let mut scheduler = Scheduler::default();
        let result = Rc::new(Cell::new(false));
        let result_in = Rc::clone(&result);
        scheduler.run(
            from_fn(move |cx| {
                let rejected = matches!(
                    cx.scheduler().tick(Segment::LateUpdate, 0.1),
                    Err(SchedulerError::ReentrantTick { .. })
                );
                result_in.set(rejected);
                Ok(Step::Complete)
            }),
            RunOptions::new(),
        );
        assert!(result.get());
    }

    #[test]
    fn test_singleton_policies() {
        let mut scheduler = Scheduler::default();
        let steps = Rc::new(Cell::new(0));
        let options = RunOptions::new().tag("music");

        let first = scheduler.run(counter(&steps, 10.0), options.clone());
        let kept = scheduler.run(
            counter(&steps, 10.0),
            options.clone().singleton(Singleton::KeepExisting),
        );
        assert_eq!(first, kept);
        assert_eq!(scheduler.total_count(), 1);

        let replaced = scheduler.run(counter(&steps, 10.0), options.singleton(Singleton::Overwrite));
        assert_ne!(first, replaced);
        assert!(!scheduler.is_running(first));
        assert_eq!(scheduler.total_count(), 1);
    }

    #[test]
    fn test_end_of_frame_shares_update_clock() {
        let mut scheduler = Scheduler::default();
        scheduler.tick(Segment::Update, 0.25).unwrap();
        assert!((scheduler.local_time(Segment::EndOfFrame) - 0.25).abs() < f64::EPSILON);
        scheduler.tick(Segment::EndOfFrame, 0.25).unwrap();
        assert!((scheduler.local_time(Segment::EndOfFrame) - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_manual_clock_and_clamp() {
        let mut scheduler = Scheduler::default();
        scheduler.set_manual_clock(|last| last + 2.0);
        scheduler.tick(Segment::ManualTimeframe, 0.0).unwrap();

        assert!((scheduler.local_time(Segment::ManualTimeframe) - 2.0).abs() < f64::EPSILON);
        let max = scheduler.config().max_delta_time;
        assert!((scheduler.delta_time(Segment::ManualTimeframe) - max).abs() < f64::EPSILON);

        scheduler.tick(Segment::EditorUpdate, 5.0).unwrap();
        assert!((scheduler.delta_time(Segment::EditorUpdate) - max).abs() < f64::EPSILON);
    }

    #[test]
    fn test_reset_clocks() {
        let mut scheduler = Scheduler::default();
        scheduler.tick(Segment::Update, 1.0).unwrap();
        scheduler.tick(Segment::SlowUpdate, 1.0).unwrap();
        scheduler.reset_clocks();
        assert!(scheduler.local_time(Segment::Update).abs() < f64::EPSILON);
        assert!((scheduler.local_time(Segment::SlowUpdate) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = SchedulerConfig {
            growth_chunk: 0,
            ..SchedulerConfig::default()
        };
        assert!(Scheduler::new(config).is_err());
    }
}
