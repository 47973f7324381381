//! Single-vehicle re-routing shared by the scheduler and the resolver
//! callback.

use tr_core::{RoadId, VehicleId};
use tr_fleet::{Location, SimState, SimVehicle};
use tr_network::{RerouteRequest, Rerouter, Route, RoadNetwork, WeightModel};

use crate::{ConstrainedReroute, SchedulerError, SchedulerResult};

/// Usable roads at `v`'s current intersection other than the one it is on.
pub(crate) fn admissible_first_hops(network: &RoadNetwork, v: &SimVehicle) -> Vec<RoadId> {
    let back = v.current_road();
    network
        .out_roads(v.current_intersection())
        .filter(|&r| Some(r) != back)
        .collect()
}

/// Compute the cheapest path for `id` starting with one of `first_hops` and
/// splice it after the committed head of its trace.
///
/// # Errors
///
/// [`SchedulerError::Arrived`] or [`SchedulerError::TraceLocked`] when the
/// vehicle can no longer change course.
///
/// # Panics
///
/// If the splice would put the current road twice in a row.
pub(crate) fn reroute_vehicle(
    network:    &RoadNetwork,
    rerouter:   &mut Rerouter,
    model:      &WeightModel,
    state:      &mut SimState,
    id:         VehicleId,
    first_hops: &[RoadId],
) -> SchedulerResult<Route> {
    let v = state.get(id)?;
    if v.reached_goal() {
        return Err(SchedulerError::Arrived(id));
    }
    if v.locked {
        return Err(SchedulerError::TraceLocked(id));
    }

    let req = RerouteRequest {
        from:       v.current_intersection(),
        to:         v.vehicle.destination,
        first_hops,
        back_road:  v.current_road(),
    };
    let route = rerouter.shortest_route(network, &state.occupancy, model, req)?;

    let v = state.vehicle_mut(id);
    match v.location {
        Location::OnRoad { .. } => {
            v.trace.truncate_after_cursor();
            assert_ne!(v.trace.tail(), route.first(), "{id}: U-turn spliced into trace");
            v.trace.extend(&route.roads);
        }
        _ => v.trace.assign(&route.roads),
    }
    Ok(route)
}

/// [`ConstrainedReroute`] over borrowed scheduler parts.
pub(crate) struct RerouteHandle<'a> {
    pub network:  &'a RoadNetwork,
    pub rerouter: &'a mut Rerouter,
    pub model:    &'a WeightModel,
}

impl ConstrainedReroute for RerouteHandle<'_> {
    fn first_hops(&self, state: &SimState, vehicle: VehicleId) -> Vec<RoadId> {
        admissible_first_hops(self.network, state.vehicle(vehicle))
    }

    fn reroute(&mut self, state: &mut SimState, vehicle: VehicleId, allowed: &[RoadId]) -> SchedulerResult<()> {
        reroute_vehicle(self.network, self.rerouter, self.model, state, vehicle, allowed).map(|_| ())
    }
}
