//! The `SimState` snapshot: every vehicle plus the lane occupancy.
//!
//! The movement simulator drives vehicles through [`SimState::depart`],
//! [`SimState::advance`] and [`SimState::arrive`], which keep `occupancy`
//! consistent with the vehicle locations.  The whole struct is `Clone` so a
//! deadlock resolver can checkpoint and restore it.

use tr_core::{IntersectionId, RoadId, Tick, VehicleId};
use tr_network::{LaneOccupancy, RoadNetwork};

use crate::{FleetError, FleetResult, Location, SimVehicle, Vehicle};

#[derive(Clone, Debug, PartialEq)]
pub struct SimState {
    pub occupancy: LaneOccupancy,
    /// Indexed by `VehicleId`.
    pub vehicles:  Vec<SimVehicle>,
}

impl SimState {
    /// All vehicles waiting in their garages on an empty network.
    ///
    /// # Errors
    ///
    /// Rejects non-sequential ids, endpoints outside `network`, and zero
    /// max speeds.
    pub fn new(network: &RoadNetwork, vehicles: Vec<Vehicle>) -> FleetResult<Self> {
        for (index, v) in vehicles.iter().enumerate() {
            if v.id.index() != index {
                return Err(FleetError::IdMismatch { index, found: v.id });
            }
            for x in [v.origin, v.destination] {
                if !network.contains(x) {
                    return Err(FleetError::UnknownIntersection { vehicle: v.id, intersection: x });
                }
            }
            if v.max_speed == 0 {
                return Err(FleetError::ZeroSpeed(v.id));
            }
        }
        Ok(Self {
            occupancy: LaneOccupancy::new(network),
            vehicles:  vehicles.into_iter().map(SimVehicle::new).collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.vehicles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }

    #[inline]
    pub fn vehicle(&self, id: VehicleId) -> &SimVehicle {
        &self.vehicles[id.index()]
    }

    #[inline]
    pub fn vehicle_mut(&mut self, id: VehicleId) -> &mut SimVehicle {
        &mut self.vehicles[id.index()]
    }

    /// Checked lookup.
    pub fn get(&self, id: VehicleId) -> FleetResult<&SimVehicle> {
        self.vehicles.get(id.index()).ok_or(FleetError::UnknownVehicle(id))
    }

    pub fn get_mut(&mut self, id: VehicleId) -> FleetResult<&mut SimVehicle> {
        self.vehicles.get_mut(id.index()).ok_or(FleetError::UnknownVehicle(id))
    }

    /// Vehicles currently on a road.
    pub fn on_road_count(&self) -> usize {
        self.vehicles
            .iter()
            .filter(|v| matches!(v.location, Location::OnRoad { .. }))
            .count()
    }

    /// Vehicles still waiting in the garage at `origin`.
    pub fn waiting_at(&self, origin: IntersectionId) -> impl Iterator<Item = &SimVehicle> + '_ {
        self.vehicles
            .iter()
            .filter(move |v| v.in_garage() && v.vehicle.origin == origin)
    }

    /// `true` once every vehicle has arrived.
    pub fn is_complete(&self) -> bool {
        self.vehicles.iter().all(SimVehicle::reached_goal)
    }

    // ── Movement ─────────────────────────────────────────────────────────

    /// Move `id` from its garage onto the first road of its trace, in `lane`.
    pub fn depart(&mut self, network: &RoadNetwork, id: VehicleId, lane: usize, tick: Tick) -> FleetResult<RoadId> {
        let v = self.get(id)?;
        debug_assert!(v.in_garage());
        let road = v.next_road().ok_or(FleetError::NoNextRoad(id))?;
        self.enter(network, id, road, lane, tick)?;
        Ok(road)
    }

    /// Move `id` onto the next road of its trace.  A vehicle still in its
    /// garage departs.
    pub fn advance(&mut self, network: &RoadNetwork, id: VehicleId, lane: usize, tick: Tick) -> FleetResult<RoadId> {
        let v = self.get(id)?;
        if v.in_garage() {
            return self.depart(network, id, lane, tick);
        }
        let road = v.next_road().ok_or(FleetError::NoNextRoad(id))?;
        self.enter(network, id, road, lane, tick)?;
        self.vehicles[id.index()].trace.advance();
        Ok(road)
    }

    /// Take `id` off the network at its destination.
    pub fn arrive(&mut self, network: &RoadNetwork, id: VehicleId, tick: Tick) -> FleetResult<()> {
        let v = self.get(id)?;
        match v.location {
            Location::OnRoad { heading_to, .. } if heading_to == v.vehicle.destination => {}
            _ => return Err(FleetError::NotAtDestination { vehicle: id }),
        }
        self.leave_current(network, id);
        let v = &mut self.vehicles[id.index()];
        v.location = Location::Arrived;
        v.locked = false;
        v.last_scheduled = tick;
        Ok(())
    }

    fn enter(&mut self, network: &RoadNetwork, id: VehicleId, road: RoadId, lane: usize, tick: Tick) -> FleetResult<()> {
        let at = self.vehicles[id.index()].current_intersection();
        if !network.can_start_from(road, at) {
            return Err(FleetError::OffTrace { vehicle: id, road, at });
        }
        if lane >= network.road(road).lanes as usize {
            return Err(FleetError::NoSuchLane { road, lane });
        }
        self.leave_current(network, id);
        self.occupancy.enter(road, at, lane);
        let v = &mut self.vehicles[id.index()];
        v.location = Location::OnRoad { road, heading_to: network.peer(road, at), lane };
        v.locked = false;
        v.last_scheduled = tick;
        Ok(())
    }

    fn leave_current(&mut self, network: &RoadNetwork, id: VehicleId) {
        if let Location::OnRoad { road, heading_to, lane } = self.vehicles[id.index()].location {
            self.occupancy.leave(road, network.peer(road, heading_to), lane);
        }
    }
}
