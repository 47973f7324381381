//! Synthetic hub-and-ring road network.
//!
//! Eight ring intersections joined in a cycle of two-lane roads; the hub is
//! linked to every other ring intersection by a single-lane spoke, so the hub
//! uses all four of its slots.

use anyhow::Result;

use tr_core::IntersectionId;
use tr_network::{RoadNetwork, RoadNetworkBuilder, RoadSpec};

pub const RING_SIZE: usize = 8;

/// Build the network.  Returns it with the ring intersections in order and
/// the hub.
pub fn build_network() -> Result<(RoadNetwork, Vec<IntersectionId>, IntersectionId)> {
    let mut b = RoadNetworkBuilder::new();
    let ring = b.add_intersections(RING_SIZE);
    let hub = b.add_intersection();

    for i in 0..RING_SIZE {
        let length = 8 + (i as u32 * 3) % 5;
        b.add_road(RoadSpec::two_way(ring[i], ring[(i + 1) % RING_SIZE], length).lanes(2).speed_limit(4));
    }
    for i in (0..RING_SIZE).step_by(2) {
        b.add_road(RoadSpec::two_way(hub, ring[i], 12).speed_limit(3));
    }

    Ok((b.build()?, ring, hub))
}
