//! Per-vehicle route trace.

use tr_core::RoadId;

/// Ordered roads from the vehicle's origin to its destination.
///
/// `cursor` indexes the road the vehicle currently occupies.  While the
/// vehicle waits in its garage the cursor is 0 and `roads[0]` is the road it
/// intends to enter.  The committed head `roads[..=cursor]` of an on-road
/// vehicle is never rewritten; the scheduler only replaces the part after
/// the cursor.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RouteTrace {
    roads:  Vec<RoadId>,
    cursor: usize,
}

impl RouteTrace {
    pub fn new() -> Self {
        Self::default()
    }

    /// A trace starting at the first road of `roads`.
    pub fn from_roads(roads: Vec<RoadId>) -> Self {
        Self { roads, cursor: 0 }
    }

    #[inline]
    pub fn roads(&self) -> &[RoadId] {
        &self.roads
    }

    #[inline]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.roads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roads.is_empty()
    }

    #[inline]
    pub fn get(&self, i: usize) -> Option<RoadId> {
        self.roads.get(i).copied()
    }

    /// Road at the cursor.
    #[inline]
    pub fn current(&self) -> Option<RoadId> {
        self.get(self.cursor)
    }

    /// Road after the cursor.
    #[inline]
    pub fn after_current(&self) -> Option<RoadId> {
        self.get(self.cursor + 1)
    }

    /// Last road of the trace.
    pub fn tail(&self) -> Option<RoadId> {
        self.roads.last().copied()
    }

    /// Roads after the cursor.
    pub fn remaining(&self) -> &[RoadId] {
        self.roads.get(self.cursor + 1..).unwrap_or(&[])
    }

    /// Move the cursor onto the next road and return it.
    pub fn advance(&mut self) -> Option<RoadId> {
        let next = self.after_current()?;
        self.cursor += 1;
        Some(next)
    }

    /// Drop everything after the cursor.
    pub fn truncate_after_cursor(&mut self) {
        self.roads.truncate(self.cursor + 1);
    }

    /// Empty the trace and reset the cursor.
    pub fn clear(&mut self) {
        self.roads.clear();
        self.cursor = 0;
    }

    pub fn extend(&mut self, roads: &[RoadId]) {
        self.roads.extend_from_slice(roads);
    }

    /// Replace the whole trace with `roads`.
    pub fn assign(&mut self, roads: &[RoadId]) {
        self.clear();
        self.extend(roads);
    }
}
