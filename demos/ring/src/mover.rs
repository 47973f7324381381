//! Road-level movement model standing in for a cell-level simulator.
//!
//! A vehicle crosses a road in `⌈length / min(max_speed, speed_limit)⌉`
//! ticks counted from the tick it entered.  Two ticks before the end it is
//! reported first in its lane; one tick before, it is locked onto its next
//! road.  At the end it arrives, moves on if the next road has a lane with
//! room (one vehicle per cell), or waits.

use tr_core::{IntersectionId, RoadId, Tick};
use tr_fleet::{FleetResult, Location, SimState};
use tr_network::RoadNetwork;
use tr_scheduler::{EventQueue, SimEvent};

#[derive(Debug, Default, Clone, Copy)]
pub struct StepReport {
    pub moved:   usize,
    pub arrived: usize,
    pub blocked: usize,
}

impl StepReport {
    /// Somebody is waiting and nobody got anywhere.
    pub fn stalled(&self, departed: usize) -> bool {
        self.blocked > 0 && self.moved + self.arrived + departed == 0
    }
}

pub fn crossing_ticks(network: &RoadNetwork, road: RoadId, max_speed: u32) -> u64 {
    let r = network.road(road);
    r.length.div_ceil(max_speed.min(r.speed_limit).max(1)) as u64
}

/// First lane with room on `road` entered at its `from` side.
pub fn free_lane(network: &RoadNetwork, state: &SimState, road: RoadId, from: IntersectionId) -> Option<usize> {
    state.occupancy.free_lane(road, from, network.road(road).length)
}

/// Move every vehicle on the network by one tick.
pub fn step(network: &RoadNetwork, state: &mut SimState, tick: Tick, events: &mut EventQueue) -> FleetResult<StepReport> {
    let mut report = StepReport::default();

    for i in 0..state.len() {
        let v = &state.vehicles[i];
        let Location::OnRoad { road, heading_to, .. } = v.location else {
            continue;
        };
        let id = v.id();
        let at_goal = heading_to == v.vehicle.destination;
        let next = v.next_road();
        let due = v.last_scheduled + crossing_ticks(network, road, v.vehicle.max_speed);

        if tick < due {
            match due - tick {
                2 => events.push(SimEvent::BecameFirstInLane { vehicle: id }),
                1 if !at_goal => state.vehicles[i].locked = true,
                _ => {}
            }
            continue;
        }

        if at_goal {
            state.arrive(network, id, tick)?;
            events.push(SimEvent::Advanced { vehicle: id, from_road: Some(road) });
            report.arrived += 1;
            continue;
        }

        match next.and_then(|n| free_lane(network, state, n, heading_to)) {
            Some(lane) => {
                state.advance(network, id, lane, tick)?;
                events.push(SimEvent::Advanced { vehicle: id, from_road: Some(road) });
                report.moved += 1;
            }
            None => {
                state.vehicles[i].locked = next.is_some();
                report.blocked += 1;
            }
        }
    }
    Ok(report)
}
