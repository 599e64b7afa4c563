//! Kill, pause and resume.

use tracing::debug;

use super::Scheduler;
use crate::handle::{Handle, SlotIndex};
use crate::metadata::Selector;
use crate::registry::{BucketKey, ParkedProcess};
use crate::segment::Segment;

impl Scheduler {
    /// Ends the process behind `handle`, wherever it is.
    ///
    /// Processes waiting on it are reinstated first. Returns 1 if a process
    /// was removed, 0 if the handle was stale.
    pub fn kill(&mut self, handle: Handle) -> usize {
        if self.registry.has_group(handle) {
            self.close_waiting(handle);
        }

        let mut killed = false;
        if let Some(slot) = self.directory.resolve(handle) {
            killed = self.kill_slot(slot);
        }
        if self.registry.remove(handle).is_some() {
            killed = true;
        }
        usize::from(killed)
    }

    /// Kills `handle` only if its labels match `selector`.
    pub fn kill_if(&mut self, handle: Handle, selector: Selector<'_>) -> usize {
        if selector.matches(self.tag_of(handle), self.layer_of(handle)) {
            self.kill(handle)
        } else {
            0
        }
    }

    /// Kills every process in the group, running or parked.
    ///
    /// `Selector::All` behaves like [`Scheduler::kill_all`]. Returns the number
    /// of processes removed.
    pub fn kill_group(&mut self, selector: Selector<'_>) -> usize {
        if selector == Selector::All {
            return self.kill_all();
        }

        let mut killed = 0;
        for entry in self.registry.extract(|entry| entry.matches(selector)) {
            if self.registry.has_group(entry.handle) {
                self.close_waiting(entry.handle);
            }
            killed += 1;
        }

        while let Some(slot) = self.metadata.first(selector) {
            if let Some(handle) = self.directory.handle_at(slot) {
                if self.registry.has_group(handle) {
                    self.close_waiting(handle);
                }
            }
            if self.kill_slot(slot) {
                killed += 1;
            }
        }

        killed
    }

    /// Drops every process, parked ones included, and resets the tables,
    /// the indexes and the main clocks. Nothing is reinstated.
    pub fn kill_all(&mut self) -> usize {
        let killed = self.total_count() + self.registry.len();

        for table in &mut self.tables {
            table.clear();
        }
        self.directory.clear();
        self.metadata.clear();
        self.registry.clear();
        self.reset_clocks();

        debug!(killed, "killed all processes");
        killed
    }

    /// Vacates `slot` and removes its labels and handle binding.
    ///
    /// Returns true if the slot held a live process.
    fn kill_slot(&mut self, slot: SlotIndex) -> bool {
        let table = &mut self.tables[slot.segment.index()];
        let live = table.is_live(slot.offset);
        table.take(slot.offset);
        self.metadata.purge(slot);
        self.directory.forget_slot(slot);
        live
    }

    /// Moves every running member of the group into the paused bucket.
    ///
    /// Each keeps its handle, labels, segment and the time it still had to
    /// wait. Returns the number of processes paused.
    pub fn pause(&mut self, selector: Selector<'_>) -> usize {
        let mut paused = 0;

        if selector == Selector::All {
            for segment in Segment::ALL {
                for offset in 0..self.tables[segment.index()].next_free() {
                    if self.park_paused(SlotIndex::new(segment, offset)) {
                        paused += 1;
                    }
                }
            }
        } else {
            while let Some(slot) = self.metadata.first(selector) {
                if self.park_paused(slot) {
                    paused += 1;
                } else {
                    // labels left behind by a finished process
                    self.metadata.purge(slot);
                }
            }
        }

        paused
    }

    /// Parks the process at `slot` in the paused bucket.
    fn park_paused(&mut self, slot: SlotIndex) -> bool {
        let index = slot.segment.index();
        if !self.tables[index].is_live(slot.offset) {
            return false;
        }
        let Some(handle) = self.directory.forget_slot(slot) else {
            return false;
        };

        let resume_at = self.tables[index].resume_at(slot.offset).unwrap_or(0.0);
        let residual = (resume_at - self.local_time(slot.segment)).max(0.0);
        let (tag, layer) = self.metadata.purge(slot);
        // a process pausing itself is filled in once its step returns
        let process = self.tables[index].take(slot.offset);

        self.registry.park(
            BucketKey::Paused,
            ParkedProcess {
                handle,
                process,
                segment: slot.segment,
                tag,
                layer,
                residual,
            },
        );
        true
    }

    /// Reinstates every paused member of the group under its original handle.
    ///
    /// A process that still had time to wait when paused resumes that much
    /// later. Returns the number of processes resumed.
    pub fn resume(&mut self, selector: Selector<'_>) -> usize {
        let entries = self.registry.take_paused(selector);
        let resumed = entries.len();
        for entry in entries {
            self.reinstate(entry);
        }
        resumed
    }

    /// Number of paused processes in the group.
    #[must_use]
    pub fn count_paused(&self, selector: Selector<'_>) -> usize {
        self.registry.count_paused(selector)
    }
}
