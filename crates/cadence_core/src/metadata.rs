//! # Metadata Index
//!
//! Tags and layers of active slots, indexed both ways so group operations can
//! find their members without scanning the tables.

use std::collections::{BTreeSet, HashMap};

use crate::handle::SlotIndex;
use crate::segment::Segment;

/// Which processes a group operation addresses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Selector<'a> {
    /// Every process.
    All,
    /// Processes carrying this tag.
    Tag(&'a str),
    /// Processes on this layer.
    Layer(i32),
    /// Processes carrying the tag and on the layer.
    TagAndLayer(&'a str, i32),
}

impl Selector<'_> {
    /// Returns true if a process with these labels belongs to the group.
    #[must_use]
    pub fn matches(&self, tag: Option<&str>, layer: Option<i32>) -> bool {
        match *self {
            Selector::All => true,
            Selector::Tag(wanted) => tag == Some(wanted),
            Selector::Layer(wanted) => layer == Some(wanted),
            Selector::TagAndLayer(wanted_tag, wanted_layer) => {
                tag == Some(wanted_tag) && layer == Some(wanted_layer)
            }
        }
    }
}

/// Bidirectional slot <-> tag and slot <-> layer maps.
#[derive(Debug, Default)]
pub(crate) struct MetadataIndex {
    tag_of: HashMap<SlotIndex, String>,
    by_tag: HashMap<String, BTreeSet<SlotIndex>>,
    layer_of: HashMap<SlotIndex, i32>,
    by_layer: HashMap<i32, BTreeSet<SlotIndex>>,
}

impl MetadataIndex {
    pub(crate) fn set_tag(&mut self, slot: SlotIndex, tag: String) {
        self.remove_tag(slot);
        self.by_tag.entry(tag.clone()).or_default().insert(slot);
        self.tag_of.insert(slot, tag);
    }

    pub(crate) fn set_layer(&mut self, slot: SlotIndex, layer: i32) {
        self.remove_layer(slot);
        self.by_layer.entry(layer).or_default().insert(slot);
        self.layer_of.insert(slot, layer);
    }

    pub(crate) fn remove_tag(&mut self, slot: SlotIndex) -> Option<String> {
        let tag = self.tag_of.remove(&slot)?;
        if let Some(set) = self.by_tag.get_mut(&tag) {
            set.remove(&slot);
            if set.is_empty() {
                self.by_tag.remove(&tag);
            }
        }
        Some(tag)
    }

    pub(crate) fn remove_layer(&mut self, slot: SlotIndex) -> Option<i32> {
        let layer = self.layer_of.remove(&slot)?;
        if let Some(set) = self.by_layer.get_mut(&layer) {
            set.remove(&slot);
            if set.is_empty() {
                self.by_layer.remove(&layer);
            }
        }
        Some(layer)
    }

    #[inline]
    pub(crate) fn tag(&self, slot: SlotIndex) -> Option<&str> {
        self.tag_of.get(&slot).map(String::as_str)
    }

    #[inline]
    pub(crate) fn layer(&self, slot: SlotIndex) -> Option<i32> {
        self.layer_of.get(&slot).copied()
    }

    /// Removes and returns both labels of `slot`.
    pub(crate) fn purge(&mut self, slot: SlotIndex) -> (Option<String>, Option<i32>) {
        (self.remove_tag(slot), self.remove_layer(slot))
    }

    /// Moves both labels from `from` to `to`, discarding any labels `to` had.
    pub(crate) fn migrate(&mut self, from: SlotIndex, to: SlotIndex) {
        self.purge(to);
        let (tag, layer) = self.purge(from);
        if let Some(tag) = tag {
            self.set_tag(to, tag);
        }
        if let Some(layer) = layer {
            self.set_layer(to, layer);
        }
    }

    /// Lowest slot in the group that `accept` agrees to.
    ///
    /// Tag and layer together intersect the smaller set against the larger.
    pub(crate) fn find(
        &self,
        selector: Selector<'_>,
        mut accept: impl FnMut(SlotIndex) -> bool,
    ) -> Option<SlotIndex> {
        match selector {
            Selector::All => None,
            Selector::Tag(tag) => self.by_tag.get(tag)?.iter().copied().find(|s| accept(*s)),
            Selector::Layer(layer) => self
                .by_layer
                .get(&layer)?
                .iter()
                .copied()
                .find(|s| accept(*s)),
            Selector::TagAndLayer(tag, layer) => {
                let tagged = self.by_tag.get(tag)?;
                let layered = self.by_layer.get(&layer)?;
                let (small, large) = if tagged.len() <= layered.len() {
                    (tagged, layered)
                } else {
                    (layered, tagged)
                };
                small
                    .iter()
                    .copied()
                    .find(|s| large.contains(s) && accept(*s))
            }
        }
    }

    #[inline]
    pub(crate) fn first(&self, selector: Selector<'_>) -> Option<SlotIndex> {
        self.find(selector, |_| true)
    }

    /// Drops every label in `segment`.
    pub(crate) fn purge_segment(&mut self, segment: Segment) {
        let slots: Vec<SlotIndex> = self
            .tag_of
            .keys()
            .chain(self.layer_of.keys())
            .copied()
            .filter(|slot| slot.segment == segment)
            .collect();
        for slot in slots {
            self.purge(slot);
        }
    }

    pub(crate) fn clear(&mut self) {
        self.tag_of.clear();
        self.by_tag.clear();
        self.layer_of.clear();
        self.by_layer.clear();
    }

    #[cfg(test)]
    pub(crate) fn is_consistent(&self) -> bool {
        self.tag_of
            .iter()
            .all(|(slot, tag)| self.by_tag.get(tag).is_some_and(|s| s.contains(slot)))
            && self
                .by_tag
                .iter()
                .all(|(tag, set)| set.iter().all(|s| self.tag(*s) == Some(tag)))
            && self
                .layer_of
                .iter()
                .all(|(slot, layer)| self.by_layer.get(layer).is_some_and(|s| s.contains(slot)))
            && self
                .by_layer
                .iter()
                .all(|(layer, set)| set.iter().all(|s| self.layer(*s) == Some(*layer)))
    }
}
