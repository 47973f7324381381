//! All-pairs shortest paths over the congestion-weighted graph.
//!
//! # Cycle
//!
//! ```text
//! refresh_weights  — reset the matrices, price every usable directed edge
//! relax            — Floyd–Warshall, O(V³); every entry must end finite
//! route(a, b)      — rebuild the hop chain from the transfer matrix, map
//!                    hops to roads, cache for the rest of the cycle
//! ```
//!
//! The relaxation is cubic in the intersection count, so the caller runs it
//! on a fixed cadence rather than every tick.
//!
//! # Transfer matrix
//!
//! `next[i][j]` starts as `j` and is overwritten with the intermediate `k`
//! whenever a relaxation through `k` improves `i → j`.  A pair whose entry
//! still points at its own column is a direct hop.  To rebuild `a → b`:
//! follow `next[a][·]` from `next[a][b]` until a direct hop `h` remains,
//! emit `h`, continue from `h`.

use log::debug;
use rustc_hash::FxHashMap;

use tr_core::IntersectionId;

use crate::route::chain_to_roads;
use crate::{EdgeBias, LaneOccupancy, NetworkError, NetworkResult, Route, RoadNetwork, WeightModel};

/// Dense `n × n` weight and transfer matrices plus a per-cycle route cache.
#[derive(Clone, Debug, Default)]
pub struct AllPairsRouter {
    n:       usize,
    /// Row-major `n × n` path costs; `f64::INFINITY` = not relaxed yet.
    weight:  Vec<f64>,
    /// Row-major `n × n` transfer intersections.
    next:    Vec<IntersectionId>,
    /// Routes materialized since the last `relax`.
    cache:   FxHashMap<(IntersectionId, IntersectionId), Route>,
    relaxed: bool,
}

impl AllPairsRouter {
    pub fn new(intersection_count: usize) -> Self {
        let mut router = Self::default();
        router.resize(intersection_count);
        router
    }

    /// Re-size the matrices for a network of `n` intersections.
    pub fn resize(&mut self, n: usize) {
        self.n = n;
        self.weight = vec![f64::INFINITY; n * n];
        self.next = vec![IntersectionId::INVALID; n * n];
        self.cache.clear();
        self.relaxed = false;
    }

    pub fn intersection_count(&self) -> usize {
        self.n
    }

    /// `true` once `relax` has succeeded and no refresh has happened since.
    pub fn is_relaxed(&self) -> bool {
        self.relaxed
    }

    #[inline]
    fn at(&self, i: IntersectionId, j: IntersectionId) -> usize {
        i.index() * self.n + j.index()
    }

    /// Current matrix entry for `a → b`.
    #[inline]
    pub fn distance(&self, a: IntersectionId, b: IntersectionId) -> f64 {
        self.weight[self.at(a, b)]
    }

    // ── Phase 1: weights ──────────────────────────────────────────────────

    /// Reset both matrices and price every usable directed edge.
    ///
    /// Parallel roads keep the cheapest weight.  `bias` adds per-edge load for
    /// moving priority vehicles.
    pub fn refresh_weights(
        &mut self,
        network:   &RoadNetwork,
        occupancy: &LaneOccupancy,
        model:     &WeightModel,
        bias:      Option<&EdgeBias>,
    ) {
        if network.intersection_count() != self.n {
            self.resize(network.intersection_count());
        }
        let n = self.n;
        for i in 0..n {
            for j in 0..n {
                self.weight[i * n + j] = if i == j { 0.0 } else { f64::INFINITY };
                self.next[i * n + j] = IntersectionId(j as u32);
            }
        }
        self.cache.clear();
        self.relaxed = false;

        for x in &network.intersections {
            for road in network.out_roads(x.id) {
                let peer = network.peer(road, x.id);
                let extra = bias.map_or(0.0, |b| b.load(road, x.id));
                let w = model.edge_weight(network, occupancy, road, x.id, extra);
                debug_assert!(w.is_finite());
                let cell = self.at(x.id, peer);
                if w < self.weight[cell] {
                    self.weight[cell] = w;
                }
            }
        }
    }

    // ── Phase 2: relaxation ───────────────────────────────────────────────

    /// Floyd–Warshall over the refreshed weights.
    ///
    /// # Errors
    ///
    /// [`NetworkError::Unreachable`] for the first pair left at `∞`.
    pub fn relax(&mut self) -> NetworkResult<()> {
        let n = self.n;
        for k in 0..n {
            for i in 0..n {
                let w_ik = self.weight[i * n + k];
                if w_ik == f64::INFINITY {
                    continue;
                }
                for j in 0..n {
                    let through = w_ik + self.weight[k * n + j];
                    if self.weight[i * n + j] > through {
                        self.weight[i * n + j] = through;
                        self.next[i * n + j] = IntersectionId(k as u32);
                    }
                }
            }
        }

        if let Some(cell) = self.weight.iter().position(|w| !w.is_finite()) {
            return Err(NetworkError::Unreachable {
                from: IntersectionId((cell / n) as u32),
                to:   IntersectionId((cell % n) as u32),
            });
        }
        self.relaxed = true;
        debug!("all-pairs table relaxed over {n} intersections");
        Ok(())
    }

    /// `refresh_weights` then `relax`.
    pub fn recompute(
        &mut self,
        network:   &RoadNetwork,
        occupancy: &LaneOccupancy,
        model:     &WeightModel,
        bias:      Option<&EdgeBias>,
    ) -> NetworkResult<()> {
        self.refresh_weights(network, occupancy, model, bias);
        self.relax()
    }

    // ── Phase 3: materialization ──────────────────────────────────────────

    /// Intersections visited on the way from `start` to `end`, excluding
    /// `start`.
    pub fn hop_chain(&self, start: IntersectionId, end: IntersectionId) -> NetworkResult<Vec<IntersectionId>> {
        if !self.relaxed {
            return Err(NetworkError::NotRelaxed);
        }
        let mut chain = Vec::new();
        let mut step = start;
        while step != end {
            let mut hop = self.next[self.at(step, end)];
            let mut guard = 0;
            while self.next[self.at(step, hop)] != hop {
                hop = self.next[self.at(step, hop)];
                guard += 1;
                if guard > self.n {
                    return Err(NetworkError::NoRoute { from: start, to: end });
                }
            }
            step = hop;
            chain.push(hop);
            if chain.len() > self.n {
                return Err(NetworkError::NoRoute { from: start, to: end });
            }
        }
        Ok(chain)
    }

    /// Road-level route from `start` to `end`, cached until the next refresh.
    ///
    /// # Errors
    ///
    /// [`NetworkError::NotRelaxed`] before the first successful `relax`;
    /// [`NetworkError::MissingRoad`] if two chain-adjacent intersections share
    /// no usable road.
    pub fn route(
        &mut self,
        network: &RoadNetwork,
        start:   IntersectionId,
        end:     IntersectionId,
    ) -> NetworkResult<&Route> {
        if !self.cache.contains_key(&(start, end)) {
            let chain = self.hop_chain(start, end)?;
            let roads = chain_to_roads(network, start, &chain)?;
            let route = Route { roads, cost: self.distance(start, end) };
            self.cache.insert((start, end), route);
        }
        Ok(&self.cache[&(start, end)])
    }

    /// Number of routes materialized this cycle.
    pub fn cached_routes(&self) -> usize {
        self.cache.len()
    }
}
