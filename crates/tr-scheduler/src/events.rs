//! Movement events reported by the simulator.
//!
//! The movement simulator pushes events while it processes a tick; the
//! scheduler drains them once per tick in
//! [`Scheduler::handle_events`][crate::Scheduler::handle_events].

use std::collections::VecDeque;

use tr_core::{RoadId, VehicleId};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SimEvent {
    /// `vehicle` moved onto a new road or reached its goal.  `from_road` is
    /// the road it left, `None` when it came out of its garage.
    Advanced { vehicle: VehicleId, from_road: Option<RoadId> },
    /// `vehicle` became the first vehicle in its lane and will cross the
    /// next intersection soon.
    BecameFirstInLane { vehicle: VehicleId },
}

/// FIFO buffer of [`SimEvent`]s.
#[derive(Debug, Default)]
pub struct EventQueue {
    inner: VecDeque<SimEvent>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: SimEvent) {
        self.inner.push_back(event);
    }

    /// Remove and return every queued event, oldest first.
    pub fn drain(&mut self) -> impl Iterator<Item = SimEvent> + '_ {
        self.inner.drain(..)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
