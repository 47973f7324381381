//! Scheduler tunables.

use tr_network::WeightModel;

use crate::{SchedulerError, SchedulerResult};

/// Individually switchable refinements of the admission and routing policy.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PolicyToggles {
    /// Pre-charge the remaining routes of pre-scheduled priority vehicles
    /// close to their release, so bulk traffic avoids them.
    pub priority_preload:       bool,
    /// Hold back ordinary vehicles once the last priority vehicle's release
    /// window opens.
    pub optimal_release_window: bool,
    /// Tighten the admission limit when the network is at capacity.
    pub limit_by_network_size:  bool,
    /// Loosen the admission limit once every priority vehicle has arrived.
    pub faster_at_end:          bool,
    /// Use a stricter limit until the last deadlock tick has passed.
    pub fewer_after_deadlock:   bool,
    /// When the table suggests turning back, reroute with the current road
    /// excluded instead of keeping the old trace.
    pub drop_back_by_dijkstra:  bool,
    /// Release priority vehicles without the final occupancy check.
    pub priority_dispatch_free: bool,
}

impl Default for PolicyToggles {
    fn default() -> Self {
        Self {
            priority_preload:       false,
            optimal_release_window: true,
            limit_by_network_size:  true,
            faster_at_end:          true,
            fewer_after_deadlock:   false,
            drop_back_by_dijkstra:  false,
            priority_dispatch_free: false,
        }
    }
}

/// Configuration for a [`Scheduler`][crate::Scheduler].
///
/// `Default` reproduces the reference tuning.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SchedulerConfig {
    /// Rebuild the all-pairs table every N ticks.
    pub update_interval:        u64,
    /// Edge cost constants shared by both routers.
    pub weight:                 WeightModel,
    /// Extra load per preloaded priority vehicle on each edge of its route.
    pub preload_weight:         f64,
    /// Maximum number of priority vehicles counted per edge when preloading.
    pub preload_cap:            u32,
    /// Start preloading a vehicle this many ticks before its release.
    pub preload_lead:           u64,
    /// Share of pre-scheduled vehicles handed over to the scheduler at start.
    pub force_release_fraction: f64,
    /// Ask the deadlock resolver for a checkpoint every N ticks; 0 disables.
    pub backup_interval:        u64,
    /// A vehicle first in its lane reroutes when its next road's average
    /// occupancy is within this many cells of the road length.
    pub first_in_lane_margin:   f64,
    pub toggles:                PolicyToggles,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            update_interval:        2,
            weight:                 WeightModel::default(),
            preload_weight:         1.0,
            preload_cap:            4,
            preload_lead:           50,
            force_release_fraction: 0.1,
            backup_interval:        200,
            first_in_lane_margin:   3.0,
            toggles:                PolicyToggles::default(),
        }
    }
}

impl SchedulerConfig {
    /// Reject values the scheduler can not work with.
    pub fn validate(&self) -> SchedulerResult<()> {
        let bad = |msg: &str| Err(SchedulerError::Config(msg.to_owned()));

        if self.update_interval == 0 {
            return bad("update_interval must be at least 1");
        }
        let w = &self.weight;
        let non_negative = [
            ("weight.length_weight", w.length_weight),
            ("weight.single_lane_penalty", w.single_lane_penalty),
            ("weight.double_lane_penalty", w.double_lane_penalty),
            ("weight.connectivity_penalty", w.connectivity_penalty),
            ("preload_weight", self.preload_weight),
            ("first_in_lane_margin", self.first_in_lane_margin),
        ];
        for (name, v) in non_negative {
            if !v.is_finite() || v < 0.0 {
                return Err(SchedulerError::Config(format!("{name} must be finite and >= 0, got {v}")));
            }
        }
        if !(0.0..=1.0).contains(&self.force_release_fraction) {
            return Err(SchedulerError::Config(format!(
                "force_release_fraction must be within [0, 1], got {}",
                self.force_release_fraction
            )));
        }
        Ok(())
    }
}
