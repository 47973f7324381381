//! Congestion weight model shared by both routers.
//!
//! ```text
//! avg     = (extra_load + Σ queued on each lane from x) / lanes
//!         + lane penalty          (1 lane: +4, 2 lanes: +2)
//!         + (4 − usable roads at x) × connectivity_penalty
//! weight  = length × length_weight + avg³ / length
//! ```
//!
//! The cubic term makes congestion dominate length once a road approaches
//! saturation, pushing traffic away from jammed segments before they lock.

use rustc_hash::FxHashMap;

use tr_core::{IntersectionId, RoadId};

use crate::{LaneOccupancy, RoadNetwork};

/// Tunable constants of the edge cost.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WeightModel {
    /// Cost per unit of road length.
    pub length_weight:        f64,
    /// Extra average load charged to single-lane roads.
    pub single_lane_penalty:  f64,
    /// Extra average load charged to two-lane roads.
    pub double_lane_penalty:  f64,
    /// Extra average load per missing usable road at the entry intersection.
    pub connectivity_penalty: f64,
}

impl Default for WeightModel {
    fn default() -> Self {
        Self {
            length_weight:        0.1,
            single_lane_penalty:  4.0,
            double_lane_penalty:  2.0,
            connectivity_penalty: 4.0,
        }
    }
}

impl WeightModel {
    /// Cost of entering `road` at `from` under the current occupancy.
    ///
    /// `extra_load` is added to the queued vehicle count before averaging
    /// (see [`EdgeBias`]); pass `0.0` when no bias applies.
    #[inline]
    pub fn edge_weight(
        &self,
        network:    &RoadNetwork,
        occupancy:  &LaneOccupancy,
        road:       RoadId,
        from:       IntersectionId,
        extra_load: f64,
    ) -> f64 {
        let r = network.road(road);
        let queued = occupancy.queued_from(road, from) as f64;
        self.weight_of(r.lanes, r.length, queued + extra_load, network.usable_out_degree(from))
    }

    /// Pure form of [`edge_weight`](Self::edge_weight).
    pub fn weight_of(&self, lanes: u32, length: u32, load: f64, usable_out: u32) -> f64 {
        let mut avg = load / lanes as f64;
        avg += match lanes {
            1 => self.single_lane_penalty,
            2 => self.double_lane_penalty,
            _ => 0.0,
        };
        avg += (4 - usable_out.min(4)) as f64 * self.connectivity_penalty;
        let length = length as f64;
        length * self.length_weight + avg * avg * avg / length
    }
}

// ── EdgeBias ──────────────────────────────────────────────────────────────────

/// Extra load pre-charged along the remaining routes of moving priority
/// vehicles, so bulk routing keeps their path clear.
///
/// Each vehicle crossing a directed edge adds `per_vehicle`; at most `cap`
/// vehicles are counted per edge.
#[derive(Clone, Debug, Default)]
pub struct EdgeBias {
    counts:      FxHashMap<(RoadId, IntersectionId), u32>,
    per_vehicle: f64,
    cap:         u32,
}

impl EdgeBias {
    pub fn new(per_vehicle: f64, cap: u32) -> Self {
        Self { counts: FxHashMap::default(), per_vehicle, cap }
    }

    /// Count one vehicle crossing `road` from `from`.
    pub fn add(&mut self, road: RoadId, from: IntersectionId) {
        *self.counts.entry((road, from)).or_default() += 1;
    }

    /// Count one vehicle along `roads`, starting at `start`.
    pub fn add_path(&mut self, network: &RoadNetwork, start: IntersectionId, roads: &[RoadId]) {
        let mut at = start;
        for &road in roads {
            self.add(road, at);
            at = network.peer(road, at);
        }
    }

    /// Load to add to `road` entered at `from`.
    pub fn load(&self, road: RoadId, from: IntersectionId) -> f64 {
        match self.counts.get(&(road, from)) {
            Some(&n) => self.per_vehicle * n.min(self.cap) as f64,
            None => 0.0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn clear(&mut self) {
        self.counts.clear();
    }
}
