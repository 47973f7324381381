//! Contract with the deadlock-avoidance collaborator.
//!
//! The resolver decides when the all-pairs table may be rebuilt, keeps
//! checkpoints of the simulation state, and on a movement conflict may roll
//! the state back and ask the scheduler for constrained re-routes through
//! [`ConstrainedReroute`].
//!
//! Two implementations ship with the crate: [`NoopResolver`], which never
//! resolves anything, and [`CheckpointResolver`], a reference resolver that
//! restores the last checkpoint and steers the vehicles that were stuck onto
//! a different next road.

use log::{info, warn};
use rustc_hash::FxHashSet;

use tr_core::{RoadId, Tick, VehicleId};
use tr_fleet::SimState;

use crate::SchedulerResult;

/// Re-routing service the scheduler lends to the resolver during
/// [`DeadlockResolver::handle_deadlock`].
pub trait ConstrainedReroute {
    /// Roads `vehicle` may start a new path with: every usable road at its
    /// current intersection except the one it is on.
    fn first_hops(&self, state: &SimState, vehicle: VehicleId) -> Vec<RoadId>;

    /// Replace the uncommitted part of `vehicle`'s trace with the cheapest
    /// path whose first road is in `allowed`.
    fn reroute(&mut self, state: &mut SimState, vehicle: VehicleId, allowed: &[RoadId]) -> SchedulerResult<()>;
}

/// Deadlock detection and recovery, as seen by the scheduler.
///
/// Every method except `handle_deadlock` has a permissive default.
pub trait DeadlockResolver {
    /// `false` while the resolver wants traces left alone (e.g. replaying
    /// after a rollback).
    fn needs_update(&self, _tick: Tick) -> bool {
        true
    }

    /// Try to resolve a conflict reported at `tick`.  Returns `true` if
    /// `state` was restored and the tick should be retried.
    fn handle_deadlock(
        &mut self,
        tick:    Tick,
        state:   &mut SimState,
        reroute: &mut dyn ConstrainedReroute,
    ) -> SchedulerResult<bool>;

    /// `true` while no vehicle may leave its garage.
    fn is_origin_locked(&self, _tick: Tick) -> bool {
        false
    }

    /// `true` if `vehicle`'s trace must not be touched at `tick`.
    fn is_trace_locked(&self, _tick: Tick, _vehicle: VehicleId) -> bool {
        false
    }

    /// Take a checkpoint of `state`.
    fn backup(&mut self, _tick: Tick, _state: &SimState) {}

    /// Tick of the most recent resolved deadlock.
    fn last_deadlock_tick(&self) -> Option<Tick> {
        None
    }

    /// First tick the restored state still has to run after a rollback.
    fn resume_tick(&self) -> Option<Tick> {
        None
    }
}

// ── NoopResolver ──────────────────────────────────────────────────────────────

/// Never resolves a conflict; any conflict ends the run.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopResolver;

impl DeadlockResolver for NoopResolver {
    fn handle_deadlock(&mut self, _: Tick, _: &mut SimState, _: &mut dyn ConstrainedReroute) -> SchedulerResult<bool> {
        Ok(false)
    }
}

// ── CheckpointResolver ────────────────────────────────────────────────────────

/// Rolls back to the last checkpoint and re-routes the vehicles that were
/// committed to a road when the conflict happened.
///
/// After a rollback, garages stay locked and the re-routed traces stay
/// frozen for `cooldown` ticks.  A checkpoint is restored at most
/// `max_attempts` times before the conflict is reported as unresolved.
#[derive(Debug, Clone)]
pub struct CheckpointResolver {
    checkpoint:    Option<(Tick, SimState)>,
    attempts:      u32,
    max_attempts:  u32,
    cooldown:      u64,
    locked_until:  Option<Tick>,
    locked_traces: FxHashSet<VehicleId>,
    last_deadlock: Option<Tick>,
}

impl CheckpointResolver {
    pub fn new(cooldown: u64, max_attempts: u32) -> Self {
        Self {
            checkpoint: None,
            attempts: 0,
            max_attempts,
            cooldown,
            locked_until: None,
            locked_traces: FxHashSet::default(),
            last_deadlock: None,
        }
    }

    /// Tick of the current checkpoint.
    pub fn checkpoint_tick(&self) -> Option<Tick> {
        self.checkpoint.as_ref().map(|(t, _)| *t)
    }

    fn cooling_down(&self, tick: Tick) -> bool {
        self.locked_until.is_some_and(|until| tick <= until)
    }
}

impl Default for CheckpointResolver {
    fn default() -> Self {
        Self::new(20, 3)
    }
}

impl DeadlockResolver for CheckpointResolver {
    fn needs_update(&self, tick: Tick) -> bool {
        !self.cooling_down(tick)
    }

    fn handle_deadlock(
        &mut self,
        tick:    Tick,
        state:   &mut SimState,
        reroute: &mut dyn ConstrainedReroute,
    ) -> SchedulerResult<bool> {
        let Some((saved_at, saved)) = &self.checkpoint else {
            warn!("conflict at {tick} with no checkpoint to restore");
            return Ok(false);
        };
        if self.attempts >= self.max_attempts {
            warn!("checkpoint {saved_at} already restored {} times", self.attempts);
            return Ok(false);
        }
        self.attempts += 1;

        let stuck: Vec<VehicleId> = state
            .vehicles
            .iter()
            .filter(|v| v.locked && v.current_road().is_some())
            .map(|v| v.id())
            .collect();

        info!("rolling back from {tick} to {saved_at} (attempt {})", self.attempts);
        *state = saved.clone();
        self.last_deadlock = Some(tick);
        self.locked_until = Some(tick + self.cooldown);
        self.locked_traces.clear();

        for id in stuck {
            let v = state.vehicle(id);
            if v.current_road().is_none() || v.locked {
                continue;
            }
            let planned = v.next_road();
            let allowed: Vec<RoadId> = reroute
                .first_hops(state, id)
                .into_iter()
                .filter(|&r| Some(r) != planned)
                .collect();
            if allowed.is_empty() {
                continue;
            }
            reroute.reroute(state, id, &allowed)?;
            self.locked_traces.insert(id);
        }
        Ok(true)
    }

    fn is_origin_locked(&self, tick: Tick) -> bool {
        self.cooling_down(tick)
    }

    fn is_trace_locked(&self, tick: Tick, vehicle: VehicleId) -> bool {
        self.cooling_down(tick) && self.locked_traces.contains(&vehicle)
    }

    fn backup(&mut self, tick: Tick, state: &SimState) {
        self.checkpoint = Some((tick, state.clone()));
        self.attempts = 0;
    }

    fn last_deadlock_tick(&self) -> Option<Tick> {
        self.last_deadlock
    }

    fn resume_tick(&self) -> Option<Tick> {
        self.checkpoint_tick().map(Tick::next)
    }
}
