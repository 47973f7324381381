//! Network-subsystem error type.
//!
//! Every variant is a configuration or topology fault: the scheduler assumes
//! a strongly connected, well-formed network, so none of these are retried.

use thiserror::Error;

use tr_core::{IntersectionId, RoadId};

use crate::Direction;

/// Errors produced by `tr-network`.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("no relaxed path from {from} to {to}; the network is not strongly connected")]
    Unreachable { from: IntersectionId, to: IntersectionId },

    #[error("can not find a usable road between {from} and {to}")]
    MissingRoad { from: IntersectionId, to: IntersectionId },

    #[error("no route from {from} to {to}")]
    NoRoute { from: IntersectionId, to: IntersectionId },

    #[error("no admissible first hop at {0}")]
    NoFirstHop(IntersectionId),

    #[error("{road} can not be entered from {from}")]
    InvalidFirstHop { road: RoadId, from: IntersectionId },

    #[error("intersection {0} not found in network")]
    IntersectionNotFound(IntersectionId),

    #[error("all four road slots at {0} are taken")]
    SlotsExhausted(IntersectionId),

    #[error("slot {slot:?} at {intersection} is already taken")]
    SlotTaken { intersection: IntersectionId, slot: Direction },

    #[error("road {road} is invalid: {reason}")]
    InvalidRoad { road: RoadId, reason: &'static str },

    #[error("all-pairs table has not been relaxed yet")]
    NotRelaxed,
}

pub type NetworkResult<T> = Result<T, NetworkError>;
