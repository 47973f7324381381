//! Per-origin statistics over the vehicles waiting to be released.

use tr_core::{IntersectionId, Tick};
use tr_fleet::SimState;

/// Slowest eligible waiting vehicle at each origin.
///
/// Eligible means: in the garage, not pre-scheduled, and due at the tick the
/// stats were taken.  Rebuilt from scratch on every refresh.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GarageStats {
    min_speed:          Vec<Option<u32>>,
    min_priority_speed: Vec<Option<u32>>,
}

impl GarageStats {
    pub fn new(intersection_count: usize) -> Self {
        Self {
            min_speed:          vec![None; intersection_count],
            min_priority_speed: vec![None; intersection_count],
        }
    }

    /// Recompute from `state` as of `tick`.
    pub fn refresh(&mut self, state: &SimState, tick: Tick) {
        self.min_speed.fill(None);
        self.min_priority_speed.fill(None);

        for v in &state.vehicles {
            if v.vehicle.preset || !v.is_due(tick) {
                continue;
            }
            let origin = v.vehicle.origin.index();
            let speed = v.vehicle.max_speed;
            lower(&mut self.min_speed[origin], speed);
            if v.vehicle.priority {
                lower(&mut self.min_priority_speed[origin], speed);
            }
        }
    }

    /// Lowest max speed among eligible vehicles waiting at `origin`.
    #[inline]
    pub fn min_speed(&self, origin: IntersectionId) -> Option<u32> {
        self.min_speed.get(origin.index()).copied().flatten()
    }

    /// As [`min_speed`](Self::min_speed), priority vehicles only.
    #[inline]
    pub fn min_priority_speed(&self, origin: IntersectionId) -> Option<u32> {
        self.min_priority_speed.get(origin.index()).copied().flatten()
    }
}

fn lower(slot: &mut Option<u32>, speed: u32) {
    *slot = Some(slot.map_or(speed, |m| m.min(speed)));
}
