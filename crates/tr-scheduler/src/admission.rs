//! Garage admission: may a waiting vehicle enter the network this tick?
//!
//! # Decision order
//!
//! ```text
//! origin locked by the resolver            → Veto
//! current_limit ← base limit, then
//!   limit_by_network_size   on-road ≥ cap ? tighter : looser × 2
//!   faster_at_end           end phase and on-road ≤ cap → looser × 2
//!   fewer_after_deadlock    tick ≤ last deadlock → base × 1.5
//!   optimal_release_window  window open:
//!                             ordinary, not pre-scheduled     → Defer
//!                             priority, on-road ≥ cap         → Defer (unless pre-scheduled)
//!                             priority, below cap             → looser × 2
//! first road's avg occupancy > current_limit,
//!   or ordinary vehicle faster than the slowest one waiting   → Defer (unless pre-scheduled)
//! otherwise                                                    → Release
//! ```
//!
//! Every candidate limit is truncated to whole vehicles before it is used.

use tr_core::Tick;
use tr_fleet::{SimState, SimVehicle};
use tr_network::RoadNetwork;

use crate::{GarageStats, PolicyToggles, PriorityPolicy, SchedulerError, SchedulerResult};

/// Outcome of an admission check.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Admission {
    /// Leave the garage now.
    Release,
    /// Try again next tick; `release_tick` was moved forward.
    Defer,
    /// The resolver has the garages locked; nothing was changed.
    Veto,
}

/// Everything an admission decision reads.
pub struct AdmissionContext<'a> {
    pub tick:          Tick,
    pub network:       &'a RoadNetwork,
    pub state:         &'a SimState,
    pub policy:        &'a PriorityPolicy,
    pub garage:        &'a GarageStats,
    pub toggles:       &'a PolicyToggles,
    pub last_deadlock: Option<Tick>,
}

impl AdmissionContext<'_> {
    /// Release or defer `v`.  Never returns [`Admission::Veto`]; the caller
    /// checks the resolver lock first.
    pub fn decide(&self, v: &SimVehicle) -> SchedulerResult<Admission> {
        let Some(limit) = self.current_limit(v) else {
            return Ok(Admission::Defer);
        };

        let road = v.next_road().ok_or(SchedulerError::NoTrace(v.id()))?;
        if self.toggles.priority_dispatch_free {
            return Ok(Admission::Release);
        }

        let origin = v.vehicle.origin;
        let avg = self.state.occupancy.average_from(self.network, road, origin);
        let slower_waiting = !v.vehicle.priority
            && self.garage.min_speed(origin).is_some_and(|slowest| v.vehicle.max_speed > slowest);

        if (avg > limit as f64 || slower_waiting) && !v.vehicle.preset {
            return Ok(Admission::Defer);
        }
        Ok(Admission::Release)
    }

    /// The occupancy limit for `v` in whole vehicles per lane, or `None` if
    /// the release window holds it back outright.
    pub fn current_limit(&self, v: &SimVehicle) -> Option<u64> {
        let p = self.policy;
        let t = self.toggles;
        let on_road = self.state.on_road_count() as u64;
        let at_capacity = on_road >= p.on_road_capacity;
        let whole = |limit: f64| limit as u64;

        let mut limit = whole(p.base_limit);
        if t.limit_by_network_size {
            limit = if at_capacity { whole(p.tighter_limit) } else { whole(p.looser_limit * 2.0) };
        }
        if t.faster_at_end && p.in_end_phase() && on_road <= p.on_road_capacity {
            limit = whole(p.looser_limit * 2.0);
        }
        if t.fewer_after_deadlock && self.last_deadlock.is_some_and(|d| self.tick <= d) {
            limit = whole(p.base_limit * 1.5);
        }
        if t.optimal_release_window && p.in_release_window(self.tick) {
            let preset = v.vehicle.preset;
            if !v.vehicle.priority {
                if !preset {
                    return None;
                }
            } else if at_capacity {
                if !preset {
                    return None;
                }
            } else {
                limit = whole(p.looser_limit * 2.0);
            }
        }
        Some(limit)
    }
}
