//! # Wait/Pause Registry
//!
//! Holds processes that are out of the tables: paused ones, and ones parked
//! until another process finishes. Every parked process lives in exactly one
//! bucket and keeps its handle, labels, segment and remaining delay.

use std::collections::HashMap;

use crate::handle::Handle;
use crate::metadata::Selector;
use crate::process::BoxedProcess;
use crate::segment::Segment;

/// Which bucket a parked process sits in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) enum BucketKey {
    /// Paused by a group pause.
    Paused,
    /// Waiting for the process with this handle to finish.
    Waiting(Handle),
}

/// A process outside the tables.
pub(crate) struct ParkedProcess {
    pub(crate) handle: Handle,
    /// `None` while the owner is still inside the step that parked it.
    pub(crate) process: Option<BoxedProcess>,
    pub(crate) segment: Segment,
    pub(crate) tag: Option<String>,
    pub(crate) layer: Option<i32>,
    /// Seconds left on the process's wait when it was parked.
    pub(crate) residual: f64,
}

impl ParkedProcess {
    #[inline]
    pub(crate) fn matches(&self, selector: Selector<'_>) -> bool {
        selector.matches(self.tag.as_deref(), self.layer)
    }
}

/// The paused bucket plus one waiting group per awaited handle.
#[derive(Default)]
pub(crate) struct WaitRegistry {
    paused: Vec<ParkedProcess>,
    groups: HashMap<Handle, Vec<ParkedProcess>>,
    bucket_of: HashMap<Handle, BucketKey>,
}

impl WaitRegistry {
    /// Adds a process to a bucket, creating a waiting group if needed.
    pub(crate) fn park(&mut self, key: BucketKey, entry: ParkedProcess) {
        self.bucket_of.insert(entry.handle, key);
        match key {
            BucketKey::Paused => self.paused.push(entry),
            BucketKey::Waiting(target) => self.groups.entry(target).or_default().push(entry),
        }
    }

    /// Ensures a (possibly empty) waiting group exists for `target`.
    pub(crate) fn open_group(&mut self, target: Handle) {
        self.groups.entry(target).or_default();
    }

    #[inline]
    pub(crate) fn has_group(&self, target: Handle) -> bool {
        self.groups.contains_key(&target)
    }

    #[inline]
    pub(crate) fn bucket_of(&self, handle: Handle) -> Option<BucketKey> {
        self.bucket_of.get(&handle).copied()
    }

    /// Removes the group waiting on `target` and hands back its members.
    pub(crate) fn take_group(&mut self, target: Handle) -> Vec<ParkedProcess> {
        let members = self.groups.remove(&target).unwrap_or_default();
        for member in &members {
            self.bucket_of.remove(&member.handle);
        }
        members
    }

    /// Removes one parked process from whatever bucket holds it.
    pub(crate) fn remove(&mut self, handle: Handle) -> Option<ParkedProcess> {
        let bucket = match self.bucket_of.remove(&handle)? {
            BucketKey::Paused => &mut self.paused,
            BucketKey::Waiting(target) => self.groups.get_mut(&target)?,
        };
        let position = bucket.iter().position(|entry| entry.handle == handle)?;
        Some(bucket.remove(position))
    }

    pub(crate) fn get(&self, handle: Handle) -> Option<&ParkedProcess> {
        let bucket = match self.bucket_of.get(&handle)? {
            BucketKey::Paused => &self.paused,
            BucketKey::Waiting(target) => self.groups.get(target)?,
        };
        bucket.iter().find(|entry| entry.handle == handle)
    }

    /// Completes an entry parked while its owner was mid-step.
    ///
    /// Returns the process back if no pending entry exists for `handle`.
    pub(crate) fn fill_pending(
        &mut self,
        handle: Handle,
        process: BoxedProcess,
        residual: f64,
    ) -> Result<(), BoxedProcess> {
        let Some(BucketKey::Paused) = self.bucket_of(handle) else {
            return Err(process);
        };
        match self
            .paused
            .iter_mut()
            .find(|entry| entry.handle == handle && entry.process.is_none())
        {
            Some(entry) => {
                entry.process = Some(process);
                entry.residual = residual;
                Ok(())
            }
            None => Err(process),
        }
    }

    /// Drops a pending entry whose owner finished during the step that paused it.
    pub(crate) fn drop_pending(&mut self, handle: Handle) {
        let pending = self
            .get(handle)
            .is_some_and(|entry| entry.process.is_none());
        if pending {
            self.remove(handle);
        }
    }

    /// Takes paused processes in the group, in the order they were paused.
    ///
    /// Pending entries stay behind.
    pub(crate) fn take_paused(&mut self, selector: Selector<'_>) -> Vec<ParkedProcess> {
        let (taken, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.paused)
            .into_iter()
            .partition(|entry| entry.process.is_some() && entry.matches(selector));
        self.paused = kept;
        for entry in &taken {
            self.bucket_of.remove(&entry.handle);
        }
        taken
    }

    pub(crate) fn count_paused(&self, selector: Selector<'_>) -> usize {
        self.paused
            .iter()
            .filter(|entry| entry.matches(selector))
            .count()
    }

    /// Removes every parked process, from any bucket, that `remove` selects.
    pub(crate) fn extract(
        &mut self,
        mut remove: impl FnMut(&ParkedProcess) -> bool,
    ) -> Vec<ParkedProcess> {
        let mut removed = Vec::new();
        let buckets = std::iter::once(&mut self.paused).chain(self.groups.values_mut());
        for bucket in buckets {
            let mut i = 0;
            while i < bucket.len() {
                if remove(&bucket[i]) {
                    removed.push(bucket.remove(i));
                } else {
                    i += 1;
                }
            }
        }
        for entry in &removed {
            self.bucket_of.remove(&entry.handle);
        }
        removed
    }

    /// Handles that currently have a waiting group, in ascending order.
    pub(crate) fn group_targets(&self) -> Vec<Handle> {
        let mut targets: Vec<Handle> = self.groups.keys().copied().collect();
        targets.sort_unstable();
        targets
    }

    /// Removes empty waiting groups. Returns how many were dropped.
    pub(crate) fn drop_empty_groups(&mut self) -> usize {
        let before = self.groups.len();
        self.groups.retain(|_, members| !members.is_empty());
        before - self.groups.len()
    }

    /// Total parked processes.
    pub(crate) fn len(&self) -> usize {
        self.bucket_of.len()
    }

    #[inline]
    pub(crate) fn waiting_count(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    pub(crate) fn clear(&mut self) {
        self.paused.clear();
        self.groups.clear();
        self.bucket_of.clear();
    }
}
