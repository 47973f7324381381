use thiserror::Error;

use tr_core::{IntersectionId, RoadId, VehicleId};

#[derive(Debug, Error)]
pub enum FleetError {
    #[error("vehicle {0} not found")]
    UnknownVehicle(VehicleId),

    #[error("vehicle at position {index} has id {found}; ids must be sequential from 0")]
    IdMismatch { index: usize, found: VehicleId },

    #[error("{vehicle} refers to {intersection}, which is not in the network")]
    UnknownIntersection { vehicle: VehicleId, intersection: IntersectionId },

    #[error("{0} has a max speed of zero")]
    ZeroSpeed(VehicleId),

    #[error("{0} has no next road on its trace")]
    NoNextRoad(VehicleId),

    #[error("{vehicle} can not enter {road} from {at}")]
    OffTrace { vehicle: VehicleId, road: RoadId, at: IntersectionId },

    #[error("{vehicle} is not on a road leading to its destination")]
    NotAtDestination { vehicle: VehicleId },

    #[error("lane {lane} does not exist on {road}")]
    NoSuchLane { road: RoadId, lane: usize },
}

pub type FleetResult<T> = Result<T, FleetError>;
