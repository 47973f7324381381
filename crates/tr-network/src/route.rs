//! The result of a routing query.

use tr_core::{IntersectionId, RoadId};

use crate::{NetworkError, NetworkResult, RoadNetwork};

/// An ordered list of roads from a start intersection to a destination, and
/// the congestion cost of the path that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub roads: Vec<RoadId>,
    pub cost:  f64,
}

impl Route {
    pub fn empty() -> Self {
        Self { roads: Vec::new(), cost: 0.0 }
    }

    /// `true` if the source and destination are the same intersection.
    pub fn is_trivial(&self) -> bool {
        self.roads.is_empty()
    }

    pub fn len(&self) -> usize {
        self.roads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roads.is_empty()
    }

    pub fn first(&self) -> Option<RoadId> {
        self.roads.first().copied()
    }
}

/// Translate an intersection chain (excluding `start`) into road ids using
/// [`RoadNetwork::road_between`].
pub(crate) fn chain_to_roads(
    network: &RoadNetwork,
    start:   IntersectionId,
    chain:   &[IntersectionId],
) -> NetworkResult<Vec<RoadId>> {
    let mut roads = Vec::with_capacity(chain.len());
    let mut last = start;
    for &hop in chain {
        let road = network
            .road_between(last, hop)
            .ok_or(NetworkError::MissingRoad { from: last, to: hop })?;
        roads.push(road);
        last = hop;
    }
    Ok(roads)
}
