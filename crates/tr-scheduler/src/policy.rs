//! Priority and phase policy: network capacity baseline, the priority
//! release window, the force-release cohort, and the Protected-Set.
//!
//! # Capacity baseline
//!
//! ```text
//! avg            = total road length / road count        (integer)
//! base limit     = avg / 10
//! tighter limit  = base × 0.5
//! looser limit   = base × 2
//! on-road cap    = road count × avg
//! ```
//!
//! # Release window
//!
//! Over pre-scheduled priority vehicles, `last_arrival` is the latest
//! `release + estimated travel`.  The window opens at
//!
//! ```text
//! last_arrival − max(priority_count / last_arrival × 10,
//!                    max(100, preset_priority_count / 10))
//! ```
//!
//! in integer arithmetic, clamped at tick 0.

use rustc_hash::FxHashSet;

use tr_core::{Tick, VehicleId};
use tr_fleet::{SimState, SimVehicle};
use tr_network::{NetworkResult, Rerouter, RoadNetwork};

/// Capacity-derived limits and the priority bookkeeping.
#[derive(Clone, Debug, Default)]
pub struct PriorityPolicy {
    /// Average road length, truncated.
    pub capacity_average:      u64,
    pub base_limit:            f64,
    pub tighter_limit:         f64,
    pub looser_limit:          f64,
    /// Vehicles the network holds at the baseline density.
    pub on_road_capacity:      u64,
    /// Priority vehicles in the whole fleet.
    pub priority_count:        usize,
    pub preset_priority_count: usize,
    /// Latest planned release among pre-scheduled priority vehicles.
    pub last_priority_release: Option<Tick>,
    /// Latest estimated arrival among pre-scheduled priority vehicles.
    pub last_priority_arrival: Option<Tick>,
    /// Tick from which ordinary vehicles are held back.
    pub window_start:          Option<Tick>,
    protected:                 FxHashSet<VehicleId>,
}

impl PriorityPolicy {
    /// Derive the baseline from the network and the initial fleet.
    ///
    /// `estimates[i]` is the estimated travel time of vehicle `i` in ticks;
    /// only pre-scheduled priority entries are read.
    pub fn new(network: &RoadNetwork, state: &SimState, estimates: &[u64]) -> Self {
        let road_count = network.road_count() as u64;
        let capacity_average = network.total_length().checked_div(road_count).unwrap_or(0);
        let base_limit = capacity_average as f64 / 10.0;

        let mut policy = Self {
            capacity_average,
            base_limit,
            tighter_limit: base_limit * 0.5,
            looser_limit: base_limit * 2.0,
            on_road_capacity: road_count * capacity_average,
            ..Self::default()
        };

        for v in &state.vehicles {
            if !v.vehicle.priority {
                continue;
            }
            policy.priority_count += 1;
            if !v.vehicle.preset {
                continue;
            }
            policy.preset_priority_count += 1;
            let release = v.release_tick;
            let arrival = release + estimates[v.id().index()];
            policy.last_priority_release = policy.last_priority_release.max(Some(release));
            policy.last_priority_arrival = policy.last_priority_arrival.max(Some(arrival));
        }

        policy.window_start = policy.last_priority_arrival.map(|arrival| {
            let per_tick = (policy.priority_count as u64).checked_div(arrival.0).unwrap_or(0);
            let lead = (per_tick * 10).max((policy.preset_priority_count as u64 / 10).max(100));
            arrival.saturating_sub(lead)
        });

        policy.refresh_protected(state);
        policy
    }

    // ── Protected-Set ─────────────────────────────────────────────────────

    /// Rebuild the Protected-Set: every priority vehicle not yet arrived.
    pub fn refresh_protected(&mut self, state: &SimState) {
        self.protected.clear();
        self.protected.extend(
            state
                .vehicles
                .iter()
                .filter(|v| v.vehicle.priority && !v.reached_goal())
                .map(SimVehicle::id),
        );
    }

    /// Drop `vehicle` from the Protected-Set.  Returns `true` if it was there.
    pub fn on_arrival(&mut self, vehicle: VehicleId) -> bool {
        self.protected.remove(&vehicle)
    }

    #[inline]
    pub fn is_protected(&self, vehicle: VehicleId) -> bool {
        self.protected.contains(&vehicle)
    }

    #[inline]
    pub fn protected_len(&self) -> usize {
        self.protected.len()
    }

    pub fn protected(&self) -> impl Iterator<Item = VehicleId> + '_ {
        self.protected.iter().copied()
    }

    // ── Phase queries ─────────────────────────────────────────────────────

    /// The release window is open and priority vehicles are still out.
    pub fn in_release_window(&self, tick: Tick) -> bool {
        self.window_start.is_some_and(|start| tick >= start) && !self.protected.is_empty()
    }

    /// Every priority vehicle has arrived, so the end phase may run faster.
    pub fn in_end_phase(&self) -> bool {
        self.protected.is_empty() && self.last_priority_release.is_some()
    }
}

/// Pre-scheduled vehicles handed over to the scheduler at initialization.
///
/// Sorted priority first, then by descending estimated travel time (ties by
/// id); the first `fraction` of the pre-scheduled count is returned.
pub fn force_release_cohort(state: &SimState, estimates: &[u64], fraction: f64) -> Vec<VehicleId> {
    let mut preset: Vec<&SimVehicle> = state.vehicles.iter().filter(|v| v.vehicle.preset).collect();
    preset.sort_by(|a, b| {
        b.vehicle
            .priority
            .cmp(&a.vehicle.priority)
            .then(estimates[b.id().index()].cmp(&estimates[a.id().index()]))
            .then(a.id().cmp(&b.id()))
    });
    let n = (preset.len() as f64 * fraction) as usize;
    preset.iter().take(n).map(|v| v.id()).collect()
}

/// Estimated uncongested travel time of `v` in ticks.
///
/// Follows the vehicle's trace when it already has one (pre-scheduled
/// vehicles come with a fixed route), otherwise the fastest free-flow path.
pub fn estimated_travel(network: &RoadNetwork, rerouter: &mut Rerouter, v: &SimVehicle) -> NetworkResult<u64> {
    let speed = v.vehicle.max_speed;
    if v.trace.is_empty() {
        return rerouter.free_flow_ticks(network, v.vehicle.origin, v.vehicle.destination, speed);
    }
    Ok(v.trace
        .roads()
        .iter()
        .map(|&r| {
            let road = network.road(r);
            road.length.div_ceil(speed.min(road.speed_limit).max(1)) as u64
        })
        .sum())
}
