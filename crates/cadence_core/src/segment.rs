//! # Segments
//!
//! A segment is one named phase of the host frame. Every segment owns its own
//! process table and its own clock.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A phase of the host frame in which processes may run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum Segment {
    /// Once per rendered frame.
    #[default]
    Update = 0,
    /// Once per physics step.
    FixedUpdate = 1,
    /// After every Update process has run.
    LateUpdate = 2,
    /// A few times per second.
    SlowUpdate = 3,
    /// Once per frame, driven by unscaled time.
    RealtimeUpdate = 4,
    /// Editor-only frame phase.
    EditorUpdate = 5,
    /// Editor-only slow phase.
    EditorSlowUpdate = 6,
    /// After the frame has been rendered. Shares the Update clock.
    EndOfFrame = 7,
    /// Triggered explicitly by the host, optionally with its own clock.
    ManualTimeframe = 8,
}

impl Segment {
    /// Number of segments.
    pub const COUNT: usize = 9;

    /// Every segment, in table order.
    pub const ALL: [Segment; Segment::COUNT] = [
        Segment::Update,
        Segment::FixedUpdate,
        Segment::LateUpdate,
        Segment::SlowUpdate,
        Segment::RealtimeUpdate,
        Segment::EditorUpdate,
        Segment::EditorSlowUpdate,
        Segment::EndOfFrame,
        Segment::ManualTimeframe,
    ];

    /// Index of this segment's table.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Returns true for segments that only run while the host is in editor mode.
    #[inline]
    #[must_use]
    pub const fn is_editor(self) -> bool {
        matches!(self, Segment::EditorUpdate | Segment::EditorSlowUpdate)
    }

    /// Returns true if this segment's delta time is clamped to the configured maximum.
    #[inline]
    #[must_use]
    pub const fn clamps_delta(self) -> bool {
        matches!(
            self,
            Segment::EditorUpdate | Segment::EditorSlowUpdate | Segment::ManualTimeframe
        )
    }

    /// Stable name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Segment::Update => "Update",
            Segment::FixedUpdate => "FixedUpdate",
            Segment::LateUpdate => "LateUpdate",
            Segment::SlowUpdate => "SlowUpdate",
            Segment::RealtimeUpdate => "RealtimeUpdate",
            Segment::EditorUpdate => "EditorUpdate",
            Segment::EditorSlowUpdate => "EditorSlowUpdate",
            Segment::EndOfFrame => "EndOfFrame",
            Segment::ManualTimeframe => "ManualTimeframe",
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Local time of one segment.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SegmentClock {
    /// Seconds accumulated by this segment.
    pub local_time: f64,
    /// Delta applied by the most recent tick.
    pub delta_time: f64,
}

impl SegmentClock {
    /// Advances the clock by `delta` seconds.
    #[inline]
    pub fn advance(&mut self, delta: f64) {
        self.delta_time = delta;
        self.local_time += delta;
    }

    /// Jumps the clock to `time`, recording the step taken.
    #[inline]
    pub fn jump_to(&mut self, time: f64) {
        self.delta_time = time - self.local_time;
        self.local_time = time;
    }

    /// Back to zero.
    #[inline]
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
