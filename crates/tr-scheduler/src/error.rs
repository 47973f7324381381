use thiserror::Error;

use tr_core::{Tick, VehicleId};
use tr_fleet::FleetError;
use tr_network::NetworkError;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("scheduler configuration error: {0}")]
    Config(String),

    #[error("routing error: {0}")]
    Network(#[from] NetworkError),

    #[error("fleet error: {0}")]
    Fleet(#[from] FleetError),

    #[error("movement conflict at {0} could not be resolved")]
    UnresolvedDeadlock(Tick),

    #[error("scheduler used before initialize()")]
    NotInitialized,

    #[error("{0} is not waiting in its garage")]
    NotInGarage(VehicleId),

    #[error("{0} has no route to follow")]
    NoTrace(VehicleId),

    #[error("{0} has already arrived")]
    Arrived(VehicleId),

    #[error("{0} is locked onto its next road")]
    TraceLocked(VehicleId),
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
