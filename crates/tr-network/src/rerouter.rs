//! Restricted single-source Dijkstra used for per-vehicle exceptions.
//!
//! The all-pairs table is only as fresh as its last cadence tick.  The
//! rerouter recomputes one vehicle's path against the live occupancy, with
//! the first hop limited to a caller-supplied set: the roads at the current
//! intersection minus the one just arrived on, or a set imposed by the
//! deadlock resolver.
//!
//! Scratch buffers are owned by the [`Rerouter`] and only re-allocated when
//! the intersection count changes.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use tr_core::{IntersectionId, RoadId};

use crate::route::chain_to_roads;
use crate::{LaneOccupancy, NetworkError, NetworkResult, Route, RoadNetwork, WeightModel};

/// Parameters of one reroute query.
#[derive(Debug, Clone, Copy)]
pub struct RerouteRequest<'a> {
    pub from:       IntersectionId,
    pub to:         IntersectionId,
    /// Roads the path may start with.  Each must be enterable at `from`.
    pub first_hops: &'a [RoadId],
    /// Road the vehicle is leaving; never used as first hop even if listed.
    pub back_road:  Option<RoadId>,
}

/// Heap key: `f64` cost with a total order.
#[derive(Copy, Clone, Debug, PartialEq)]
struct Cost(f64);

impl Eq for Cost {}

impl PartialOrd for Cost {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Cost {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Dijkstra with reusable dense buffers.
#[derive(Debug, Default)]
pub struct Rerouter {
    dist:    Vec<f64>,
    visited: Vec<bool>,
    pred:    Vec<IntersectionId>,
    heap:    BinaryHeap<Reverse<(Cost, IntersectionId)>>,
}

impl Rerouter {
    pub fn new(intersection_count: usize) -> Self {
        let mut r = Self::default();
        r.ensure_capacity(intersection_count);
        r
    }

    /// Buffer size currently allocated.
    pub fn capacity(&self) -> usize {
        self.dist.len()
    }

    fn ensure_capacity(&mut self, n: usize) {
        if self.dist.len() != n {
            self.dist = vec![f64::INFINITY; n];
            self.visited = vec![false; n];
            self.pred = vec![IntersectionId::INVALID; n];
        }
    }

    /// Congestion-weighted shortest path honouring the first-hop restriction.
    ///
    /// # Errors
    ///
    /// - [`NetworkError::InvalidFirstHop`] if a listed road can't be entered
    ///   at `from`.
    /// - [`NetworkError::NoFirstHop`] if nothing is left after removing
    ///   `back_road`.
    /// - [`NetworkError::NoRoute`] if `to` is unreachable.
    pub fn shortest_route(
        &mut self,
        network:   &RoadNetwork,
        occupancy: &LaneOccupancy,
        model:     &WeightModel,
        req:       RerouteRequest<'_>,
    ) -> NetworkResult<Route> {
        self.search(network, req, |road, from| {
            model.edge_weight(network, occupancy, road, from, 0.0)
        })
    }

    /// Uncongested travel time in ticks from `from` to `to` at `max_speed`
    /// cells per tick, capped by each road's speed limit.
    ///
    /// Used for arrival-time estimates before the simulation starts.
    pub fn free_flow_ticks(
        &mut self,
        network:   &RoadNetwork,
        from:      IntersectionId,
        to:        IntersectionId,
        max_speed: u32,
    ) -> NetworkResult<u64> {
        let ticks = |road: RoadId| {
            let r = network.road(road);
            let speed = max_speed.min(r.speed_limit).max(1);
            r.length.div_ceil(speed) as f64
        };
        let first_hops: Vec<RoadId> = network.out_roads(from).collect();
        let req = RerouteRequest { from, to, first_hops: &first_hops, back_road: None };
        let route = self.search(network, req, |road, _| ticks(road))?;
        Ok(route.cost as u64)
    }

    fn search<F>(&mut self, network: &RoadNetwork, req: RerouteRequest<'_>, cost: F) -> NetworkResult<Route>
    where
        F: Fn(RoadId, IntersectionId) -> f64,
    {
        let RerouteRequest { from, to, first_hops, back_road } = req;
        for x in [from, to] {
            if !network.contains(x) {
                return Err(NetworkError::IntersectionNotFound(x));
            }
        }
        if from == to {
            return Ok(Route::empty());
        }

        self.ensure_capacity(network.intersection_count());
        self.dist.fill(f64::INFINITY);
        self.visited.fill(false);
        self.pred.fill(IntersectionId::INVALID);
        self.heap.clear();

        self.dist[from.index()] = 0.0;
        self.visited[from.index()] = true;

        // Seed only the admissible first hops; remember which road won each
        // seeded neighbour so the restriction survives reconstruction.
        let mut seed_road: Vec<(IntersectionId, RoadId)> = Vec::with_capacity(first_hops.len());
        for &road in first_hops {
            if Some(road) == back_road {
                continue;
            }
            if !network.can_start_from(road, from) {
                return Err(NetworkError::InvalidFirstHop { road, from });
            }
            let peer = network.peer(road, from);
            let w = cost(road, from);
            if w < self.dist[peer.index()] {
                self.dist[peer.index()] = w;
                self.pred[peer.index()] = from;
                seed_road.retain(|&(p, _)| p != peer);
                seed_road.push((peer, road));
                self.heap.push(Reverse((Cost(w), peer)));
            }
        }
        if seed_road.is_empty() {
            return Err(NetworkError::NoFirstHop(from));
        }

        while let Some(Reverse((Cost(c), node))) = self.heap.pop() {
            if self.visited[node.index()] {
                continue;
            }
            self.visited[node.index()] = true;
            if node == to {
                break;
            }
            for road in network.out_roads(node) {
                let peer = network.peer(road, node);
                if self.visited[peer.index()] {
                    continue;
                }
                let candidate = c + cost(road, node);
                if candidate < self.dist[peer.index()] {
                    self.dist[peer.index()] = candidate;
                    self.pred[peer.index()] = node;
                    self.heap.push(Reverse((Cost(candidate), peer)));
                }
            }
        }

        if !self.visited[to.index()] {
            return Err(NetworkError::NoRoute { from, to });
        }

        let mut chain = Vec::new();
        let mut cur = to;
        while cur != from {
            chain.push(cur);
            cur = self.pred[cur.index()];
        }
        chain.reverse();

        let first = chain[0];
        let first_road = seed_road
            .iter()
            .find(|&&(p, _)| p == first)
            .map(|&(_, r)| r)
            .ok_or(NetworkError::MissingRoad { from, to: first })?;
        let mut roads = vec![first_road];
        roads.extend(chain_to_roads(network, first, &chain[1..])?);

        Ok(Route { roads, cost: self.dist[to.index()] })
    }
}
