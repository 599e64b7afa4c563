//! # Handle Directory
//!
//! Handles are opaque, never reused within a scheduler instance, and map
//! one-to-one onto the slot that currently holds the process.

use std::collections::HashMap;
use std::fmt;

use crate::segment::Segment;

/// Opaque identifier of one logical process.
///
/// A handle survives pausing, waiting and segment switches; only the slot it
/// points at changes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(u64);

impl Handle {
    /// Handle that never refers to a process.
    pub const NULL: Self = Self(0);

    /// Creates a handle from its raw value.
    #[inline]
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw value.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Returns true for [`Handle::NULL`].
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Location of a process: a segment and an offset into its table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotIndex {
    /// Owning segment.
    pub segment: Segment,
    /// Offset into the segment's table.
    pub offset: usize,
}

impl SlotIndex {
    /// Creates a slot index.
    #[inline]
    #[must_use]
    pub const fn new(segment: Segment, offset: usize) -> Self {
        Self { segment, offset }
    }
}

/// Bidirectional handle <-> slot map.
#[derive(Debug, Default)]
pub(crate) struct HandleDirectory {
    slots: HashMap<Handle, SlotIndex>,
    handles: HashMap<SlotIndex, Handle>,
}

impl HandleDirectory {
    /// Binds `handle` to `slot`, dropping any earlier binding of either side.
    pub(crate) fn register(&mut self, handle: Handle, slot: SlotIndex) {
        if let Some(previous) = self.slots.insert(handle, slot) {
            if previous != slot {
                self.handles.remove(&previous);
            }
        }
        if let Some(displaced) = self.handles.insert(slot, handle) {
            if displaced != handle {
                self.slots.remove(&displaced);
            }
        }
    }

    #[inline]
    pub(crate) fn resolve(&self, handle: Handle) -> Option<SlotIndex> {
        self.slots.get(&handle).copied()
    }

    #[inline]
    pub(crate) fn handle_at(&self, slot: SlotIndex) -> Option<Handle> {
        self.handles.get(&slot).copied()
    }

    pub(crate) fn forget(&mut self, handle: Handle) -> Option<SlotIndex> {
        let slot = self.slots.remove(&handle)?;
        self.handles.remove(&slot);
        Some(slot)
    }

    pub(crate) fn forget_slot(&mut self, slot: SlotIndex) -> Option<Handle> {
        let handle = self.handles.remove(&slot)?;
        self.slots.remove(&handle);
        Some(handle)
    }

    /// Moves whatever handle sits at `from` over to `to`.
    pub(crate) fn relocate(&mut self, from: SlotIndex, to: SlotIndex) {
        if let Some(handle) = self.handles.remove(&from) {
            self.register(handle, to);
        }
    }

    /// Drops every binding in `segment`.
    pub(crate) fn forget_segment(&mut self, segment: Segment) {
        self.handles.retain(|slot, _| slot.segment != segment);
        self.slots.retain(|_, slot| slot.segment != segment);
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn clear(&mut self) {
        self.slots.clear();
        self.handles.clear();
    }
}
