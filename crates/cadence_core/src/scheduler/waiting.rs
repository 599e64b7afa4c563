//! Substitutions: waiting on other processes, wrapping and segment switches.

use tracing::{debug, warn};

use super::{Handoff, Scheduler, IMMEDIATELY};
use crate::handle::{Handle, SlotIndex};
use crate::primitives::{Drainer, Rewait};
use crate::process::{BoxedProcess, Step, Substitution, Switch};
use crate::registry::{BucketKey, ParkedProcess};

impl Scheduler {
    /// Builds the step a process returns to wait on `target`.
    pub(crate) fn wait_step(&self, target: Handle, warn: bool) -> Step {
        let warn = warn && self.config.warn_on_issue;

        if target.is_null() {
            if warn {
                warn!("wait_until_done called with a null handle");
            }
            return Step::NEXT_FRAME;
        }

        if self.registry.has_group(target)
            || self.registry.bucket_of(target).is_some()
            || self.is_running(target)
        {
            return Step::Substitute(Substitution::WaitUntilDone { target, warn });
        }

        // finished but not compacted yet
        if self.directory.resolve(target).is_none() && warn {
            warn!(%target, "wait_until_done called with an unknown handle");
        }
        Step::NEXT_FRAME
    }

    /// Applies a substitution to the process that was just stepped at `slot`.
    pub(crate) fn substitute(
        &mut self,
        slot: SlotIndex,
        handle: Handle,
        process: BoxedProcess,
        substitution: Substitution,
    ) -> Handoff {
        match substitution {
            Substitution::Replace(next) => Handoff::Again(next),
            Substitution::Wrap(wrap) => Handoff::Again(wrap(process)),
            Substitution::WaitUntilDone { target, warn } => {
                self.wait_on(slot, handle, process, target, warn)
            }
            Substitution::Switch(switch) => self.switch(slot, handle, process, switch),
        }
    }

    fn wait_on(
        &mut self,
        slot: SlotIndex,
        handle: Handle,
        process: BoxedProcess,
        target: Handle,
        warn: bool,
    ) -> Handoff {
        let warn = warn && self.config.warn_on_issue;

        if target == handle {
            if warn {
                warn!(%handle, "a process cannot wait on itself");
            }
            return Handoff::Again(process);
        }

        if self.registry.has_group(target) {
            self.park_from_slot(slot, handle, process, BucketKey::Waiting(target));
            return Handoff::Gone;
        }

        if let Some(target_slot) = self.live_slot(target) {
            let table = &mut self.tables[target_slot.segment.index()];
            if !table.is_occupied(target_slot.offset) {
                if warn {
                    warn!(%handle, %target, "wait target is in the middle of its own step");
                }
                return Handoff::Resume(process, IMMEDIATELY);
            }

            // the target's slot now runs a drainer that closes the group when it ends
            table.wrap_process(target_slot.offset, |inner| -> BoxedProcess {
                Box::new(Drainer::new(target, inner))
            });
            self.registry.open_group(target);
            self.park_from_slot(slot, handle, process, BucketKey::Waiting(target));
            return Handoff::Gone;
        }

        if let Some(key) = self.registry.bucket_of(target) {
            // the target is parked itself: join its bucket and wait again once reinstated
            let rewait: BoxedProcess = Box::new(Rewait::new(target, warn, process));
            self.park_from_slot(slot, handle, rewait, key);
            return Handoff::Gone;
        }

        if warn && self.directory.resolve(target).is_none() {
            warn!(%handle, %target, "wait_until_done called with an unknown handle");
        }
        Handoff::Resume(process, IMMEDIATELY)
    }

    /// Moves a stepping process out of its slot into a registry bucket.
    fn park_from_slot(
        &mut self,
        slot: SlotIndex,
        handle: Handle,
        process: BoxedProcess,
        key: BucketKey,
    ) {
        let (tag, layer) = self.metadata.purge(slot);
        self.directory.forget(handle);
        self.registry.park(
            key,
            ParkedProcess {
                handle,
                process: Some(process),
                segment: slot.segment,
                tag,
                layer,
                residual: 0.0,
            },
        );
    }

    fn switch(
        &mut self,
        slot: SlotIndex,
        handle: Handle,
        process: BoxedProcess,
        switch: Switch,
    ) -> Handoff {
        let Switch {
            segment,
            tag,
            layer,
        } = switch;

        match segment {
            Some(segment) => {
                let (old_tag, old_layer) = self.metadata.purge(slot);
                self.submit(
                    process,
                    segment,
                    tag.apply(old_tag),
                    layer.apply(old_layer),
                    Some(handle),
                    IMMEDIATELY,
                );
                Handoff::Gone
            }
            None => {
                let old_tag = self.metadata.remove_tag(slot);
                if let Some(tag) = tag.apply(old_tag) {
                    self.metadata.set_tag(slot, tag);
                }
                let old_layer = self.metadata.remove_layer(slot);
                if let Some(layer) = layer.apply(old_layer) {
                    self.metadata.set_layer(slot, layer);
                }
                Handoff::Again(process)
            }
        }
    }

    /// Reinstates everything waiting on `target`. Returns how many resumed.
    pub(crate) fn close_waiting(&mut self, target: Handle) -> usize {
        let members = self.registry.take_group(target);
        let resumed = members.len();
        for member in members {
            self.reinstate(member);
        }
        if resumed > 0 {
            debug!(%target, resumed, "waiting group closed");
        }
        resumed
    }

    /// Puts a parked process back into its segment under its own handle.
    pub(crate) fn reinstate(&mut self, entry: ParkedProcess) {
        let ParkedProcess {
            handle,
            process,
            segment,
            tag,
            layer,
            residual,
        } = entry;

        let Some(process) = process else {
            return;
        };
        let resume_at = if residual > 0.0 {
            self.local_time(segment) + residual
        } else {
            IMMEDIATELY
        };
        self.submit(process, segment, tag, layer, Some(handle), resume_at);
    }
}
