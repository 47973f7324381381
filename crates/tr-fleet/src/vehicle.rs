//! Logical vehicles and their live simulation state.

use tr_core::{IntersectionId, RoadId, Tick, VehicleId};

use crate::RouteTrace;

/// Static description of a vehicle, as loaded from the scenario.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Vehicle {
    pub id:                VehicleId,
    pub origin:            IntersectionId,
    pub destination:       IntersectionId,
    /// Cells per tick.
    pub max_speed:         u32,
    /// Priority ("protected") vehicles are tracked until they arrive.
    pub priority:          bool,
    /// Pre-scheduled vehicles carry a fixed route and departure and are left
    /// alone unless force-released.
    pub preset:            bool,
    pub planned_departure: Tick,
}

impl Vehicle {
    /// An ordinary vehicle departing at tick 0.
    pub fn new(id: VehicleId, origin: IntersectionId, destination: IntersectionId, max_speed: u32) -> Self {
        Self {
            id,
            origin,
            destination,
            max_speed,
            priority: false,
            preset: false,
            planned_departure: Tick::ZERO,
        }
    }

    pub fn with_priority(mut self) -> Self {
        self.priority = true;
        self
    }

    pub fn with_preset(mut self) -> Self {
        self.preset = true;
        self
    }

    pub fn departing_at(mut self, tick: Tick) -> Self {
        self.planned_departure = tick;
        self
    }

    /// `true` when there is nowhere to go.
    #[inline]
    pub fn is_trivial(&self) -> bool {
        self.origin == self.destination
    }
}

/// Where a vehicle is right now.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Location {
    /// Waiting in the holding area at its origin.
    Garage,
    /// Travelling on `road` towards `heading_to`, in `lane`.
    OnRoad { road: RoadId, heading_to: IntersectionId, lane: usize },
    /// Reached its destination and left the network.
    Arrived,
}

/// Live state of one vehicle.
///
/// The movement simulator owns most of these fields.  The scheduler only
/// writes `trace`, `force_release` and `release_tick`.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SimVehicle {
    pub vehicle:        Vehicle,
    pub location:       Location,
    /// Committed to its next road; the trace must not change.
    pub locked:         bool,
    pub trace:          RouteTrace,
    /// Earliest tick the vehicle may leave its garage.
    pub release_tick:   Tick,
    /// Pre-scheduled vehicle handed over to the scheduler.
    pub force_release:  bool,
    /// Last tick the movement simulator processed this vehicle.
    pub last_scheduled: Tick,
}

impl SimVehicle {
    pub fn new(vehicle: Vehicle) -> Self {
        let release_tick = vehicle.planned_departure;
        Self {
            vehicle,
            location: Location::Garage,
            locked: false,
            trace: RouteTrace::new(),
            release_tick,
            force_release: false,
            last_scheduled: Tick::ZERO,
        }
    }

    #[inline]
    pub fn id(&self) -> VehicleId {
        self.vehicle.id
    }

    #[inline]
    pub fn in_garage(&self) -> bool {
        self.location == Location::Garage
    }

    #[inline]
    pub fn reached_goal(&self) -> bool {
        self.location == Location::Arrived
    }

    /// The road the vehicle is on, if any.
    #[inline]
    pub fn current_road(&self) -> Option<RoadId> {
        match self.location {
            Location::OnRoad { road, .. } => Some(road),
            _ => None,
        }
    }

    /// The intersection the vehicle will next decide at: its origin while in
    /// the garage, the end of its current road while travelling.
    pub fn current_intersection(&self) -> IntersectionId {
        match self.location {
            Location::Garage => self.vehicle.origin,
            Location::OnRoad { heading_to, .. } => heading_to,
            Location::Arrived => self.vehicle.destination,
        }
    }

    /// The road the vehicle intends to enter next.
    pub fn next_road(&self) -> Option<RoadId> {
        match self.location {
            Location::Garage => self.trace.current(),
            Location::OnRoad { .. } => self.trace.after_current(),
            Location::Arrived => None,
        }
    }

    /// `true` for a pre-scheduled vehicle that has not been force-released.
    #[inline]
    pub fn is_pinned(&self) -> bool {
        self.vehicle.preset && !self.force_release
    }

    /// Waiting in the garage and allowed to leave at `tick`.
    #[inline]
    pub fn is_due(&self, tick: Tick) -> bool {
        self.in_garage() && self.release_tick <= tick
    }
}
