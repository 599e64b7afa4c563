//! # Process Table
//!
//! One growable slot array per segment. Slots are appended at `next_free`;
//! a finished process leaves a vacant slot behind until compaction packs the
//! live slots towards the front.

use crate::process::BoxedProcess;
use crate::segment::{Segment, SegmentClock};

/// Contents of a slot.
pub(crate) enum SlotState {
    /// Nothing here.
    Vacant,
    /// A suspended process.
    Occupied(BoxedProcess),
    /// The process has been taken out and is executing a step.
    Stepping,
}

/// One table entry.
pub(crate) struct Slot {
    pub(crate) state: SlotState,
    /// Segment time at which the process becomes due.
    pub(crate) resume_at: f64,
    /// First tick serial allowed to step this slot.
    pub(crate) not_before: u64,
}

impl Slot {
    const fn vacant() -> Self {
        Self {
            state: SlotState::Vacant,
            resume_at: f64::NEG_INFINITY,
            not_before: 0,
        }
    }

    #[inline]
    pub(crate) fn is_live(&self) -> bool {
        !matches!(self.state, SlotState::Vacant)
    }
}

/// Slot movement reported by [`ProcessTable::compact`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Relocation {
    /// A live slot moved down.
    Moved { from: usize, to: usize },
    /// The offset is past the new end and now vacant.
    Released(usize),
}

/// Slot array, clock and bookkeeping of one segment.
pub(crate) struct ProcessTable {
    segment: Segment,
    slots: Vec<Slot>,
    next_free: usize,
    expansions: usize,
    growth_chunk: usize,
    initial_capacity: usize,
    pub(crate) clock: SegmentClock,
    /// True while the segment is ticking or taking an eager first step.
    pub(crate) running: bool,
    /// Incremented at the start of every tick.
    pub(crate) serial: u64,
}

impl ProcessTable {
    pub(crate) fn new(segment: Segment, initial_capacity: usize, growth_chunk: usize) -> Self {
        Self {
            segment,
            slots: (0..initial_capacity).map(|_| Slot::vacant()).collect(),
            next_free: 0,
            expansions: 1,
            growth_chunk,
            initial_capacity,
            clock: SegmentClock::default(),
            running: false,
            serial: 0,
        }
    }

    #[inline]
    pub(crate) fn segment(&self) -> Segment {
        self.segment
    }

    #[inline]
    pub(crate) fn next_free(&self) -> usize {
        self.next_free
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of occupied or stepping slots.
    pub(crate) fn live_count(&self) -> usize {
        self.slots[..self.next_free]
            .iter()
            .filter(|slot| slot.is_live())
            .count()
    }

    #[inline]
    pub(crate) fn is_live(&self, offset: usize) -> bool {
        self.slots.get(offset).is_some_and(Slot::is_live)
    }

    #[inline]
    pub(crate) fn is_stepping(&self, offset: usize) -> bool {
        self.slots
            .get(offset)
            .is_some_and(|slot| matches!(slot.state, SlotState::Stepping))
    }

    #[inline]
    pub(crate) fn is_occupied(&self, offset: usize) -> bool {
        self.slots
            .get(offset)
            .is_some_and(|slot| matches!(slot.state, SlotState::Occupied(_)))
    }

    /// Returns true if the slot holds a process that may step now.
    #[inline]
    pub(crate) fn is_due(&self, offset: usize, now: f64) -> bool {
        self.slots.get(offset).is_some_and(|slot| {
            matches!(slot.state, SlotState::Occupied(_))
                && slot.not_before <= self.serial
                && (now >= slot.resume_at || slot.resume_at.is_nan())
        })
    }

    /// Appends a process, growing the table if it is full.
    pub(crate) fn push(&mut self, process: BoxedProcess, resume_at: f64, not_before: u64) -> usize {
        if self.next_free == self.slots.len() {
            let grown = self.slots.len() + self.growth_chunk * self.expansions;
            self.expansions += 1;
            self.slots.resize_with(grown, Slot::vacant);
        }
        let offset = self.next_free;
        self.slots[offset] = Slot {
            state: SlotState::Occupied(process),
            resume_at,
            not_before,
        };
        self.next_free += 1;
        offset
    }

    /// Takes the process out for a step, leaving the slot `Stepping`.
    pub(crate) fn begin_step(&mut self, offset: usize) -> Option<BoxedProcess> {
        let slot = self.slots.get_mut(offset)?;
        match std::mem::replace(&mut slot.state, SlotState::Stepping) {
            SlotState::Occupied(process) => Some(process),
            other => {
                slot.state = other;
                None
            }
        }
    }

    /// Puts a stepped process back. Fails if the slot was vacated meanwhile.
    pub(crate) fn end_step(
        &mut self,
        offset: usize,
        process: BoxedProcess,
        resume_at: f64,
    ) -> Result<(), BoxedProcess> {
        match self.slots.get_mut(offset) {
            Some(slot) if matches!(slot.state, SlotState::Stepping) => {
                slot.state = SlotState::Occupied(process);
                slot.resume_at = resume_at;
                Ok(())
            }
            _ => Err(process),
        }
    }

    /// Removes whatever the slot holds. A stepping slot is just marked vacant.
    pub(crate) fn take(&mut self, offset: usize) -> Option<BoxedProcess> {
        let slot = self.slots.get_mut(offset)?;
        match std::mem::replace(&mut slot.state, SlotState::Vacant) {
            SlotState::Occupied(process) => Some(process),
            SlotState::Vacant | SlotState::Stepping => None,
        }
    }

    /// Rebuilds the process in an occupied slot around itself.
    ///
    /// Returns false if the slot is not occupied.
    pub(crate) fn wrap_process(
        &mut self,
        offset: usize,
        wrap: impl FnOnce(BoxedProcess) -> BoxedProcess,
    ) -> bool {
        let Some(slot) = self.slots.get_mut(offset) else {
            return false;
        };
        match std::mem::replace(&mut slot.state, SlotState::Vacant) {
            SlotState::Occupied(process) => {
                slot.state = SlotState::Occupied(wrap(process));
                true
            }
            other => {
                slot.state = other;
                false
            }
        }
    }

    #[inline]
    pub(crate) fn resume_at(&self, offset: usize) -> Option<f64> {
        self.slots.get(offset).map(|slot| slot.resume_at)
    }

    /// Packs live slots to the front, preserving their order.
    ///
    /// Reports every moved slot and every offset past the new end to
    /// `on_event`. Returns the number of reclaimed slots.
    pub(crate) fn compact(&mut self, mut on_event: impl FnMut(Relocation)) -> usize {
        let end = self.next_free;
        let mut inner = 0;

        for outer in 0..end {
            if !self.slots[outer].is_live() {
                continue;
            }
            if outer != inner {
                self.slots.swap(outer, inner);
                on_event(Relocation::Moved {
                    from: outer,
                    to: inner,
                });
            }
            inner += 1;
        }

        for offset in inner..end {
            self.slots[offset] = Slot::vacant();
            on_event(Relocation::Released(offset));
        }

        self.next_free = inner;
        end - inner
    }

    /// Drops every slot and shrinks the growth rate.
    pub(crate) fn clear(&mut self) {
        self.slots.clear();
        self.slots.resize_with(self.initial_capacity, Slot::vacant);
        self.next_free = 0;
        self.expansions = self.expansions / 2 + 1;
    }
}
