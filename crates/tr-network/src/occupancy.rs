//! Per-lane occupancy snapshot.
//!
//! The movement simulator owns this structure and updates it as vehicles
//! enter and leave lanes; the scheduler only reads it.  Counts are kept per
//! road, per travel direction, per lane.  The "forward" direction is travel
//! from `road.from`; "backward" exists only on two-way roads.

use tr_core::{IntersectionId, RoadId};

use crate::RoadNetwork;

#[derive(Clone, Debug, PartialEq)]
struct RoadLanes {
    from:     IntersectionId,
    forward:  Vec<u32>,
    backward: Vec<u32>,
}

/// Vehicles queued on each lane of each road, by direction of travel.
#[derive(Clone, Debug, PartialEq)]
pub struct LaneOccupancy {
    roads: Vec<RoadLanes>,
}

impl LaneOccupancy {
    /// All lanes empty.
    pub fn new(network: &RoadNetwork) -> Self {
        let roads = network
            .roads
            .iter()
            .map(|r| RoadLanes {
                from:     r.from,
                forward:  vec![0; r.lanes as usize],
                backward: if r.two_way { vec![0; r.lanes as usize] } else { Vec::new() },
            })
            .collect();
        Self { roads }
    }

    /// Lane counters for traffic on `road` that entered at `from`.
    ///
    /// A one-way road queried from its exit side yields an empty slice.
    #[inline]
    pub fn lanes_from(&self, road: RoadId, from: IntersectionId) -> &[u32] {
        let lanes = &self.roads[road.index()];
        if lanes.from == from { &lanes.forward } else { &lanes.backward }
    }

    #[inline]
    fn lanes_from_mut(&mut self, road: RoadId, from: IntersectionId) -> &mut [u32] {
        let lanes = &mut self.roads[road.index()];
        if lanes.from == from { &mut lanes.forward } else { &mut lanes.backward }
    }

    /// Overwrite the count on one lane (lane indices start at 0).
    pub fn set(&mut self, road: RoadId, from: IntersectionId, lane: usize, count: u32) {
        self.lanes_from_mut(road, from)[lane] = count;
    }

    /// One more vehicle on `lane`.
    pub fn enter(&mut self, road: RoadId, from: IntersectionId, lane: usize) {
        self.lanes_from_mut(road, from)[lane] += 1;
    }

    /// One vehicle fewer on `lane`.  Never underflows.
    pub fn leave(&mut self, road: RoadId, from: IntersectionId, lane: usize) {
        let c = &mut self.lanes_from_mut(road, from)[lane];
        *c = c.saturating_sub(1);
    }

    /// Sum over all lanes of vehicles that entered `road` at `from`.
    #[inline]
    pub fn queued_from(&self, road: RoadId, from: IntersectionId) -> u32 {
        self.lanes_from(road, from).iter().sum()
    }

    /// Average vehicles per lane for traffic entering `road` at `from`.
    pub fn average_from(&self, network: &RoadNetwork, road: RoadId, from: IntersectionId) -> f64 {
        self.queued_from(road, from) as f64 / network.road(road).lanes as f64
    }

    /// First lane on `road` (from `from`) with fewer than `capacity` vehicles.
    pub fn free_lane(&self, road: RoadId, from: IntersectionId, capacity: u32) -> Option<usize> {
        self.lanes_from(road, from).iter().position(|&c| c < capacity)
    }

    /// Vehicles on the whole network.
    pub fn total(&self) -> u64 {
        self.roads
            .iter()
            .flat_map(|r| r.forward.iter().chain(r.backward.iter()))
            .map(|&c| c as u64)
            .sum()
    }

    /// Empty every lane.
    pub fn clear(&mut self) {
        for r in &mut self.roads {
            r.forward.fill(0);
            r.backward.fill(0);
        }
    }
}
