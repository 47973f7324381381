//! The `Scheduler` and its per-tick entry points.

use log::{debug, info, warn};

use tr_core::{RoadId, Tick, VehicleId};
use tr_fleet::{Location, SimState};
use tr_network::{AllPairsRouter, EdgeBias, Rerouter, RoadNetwork, Route};

use crate::admission::AdmissionContext;
use crate::policy::{estimated_travel, force_release_cohort};
use crate::reroute::{RerouteHandle, admissible_first_hops, reroute_vehicle};
use crate::{
    Admission, DeadlockResolver, EventQueue, GarageStats, NoopObserver, PriorityPolicy, SchedulerConfig,
    SchedulerError, SchedulerObserver, SchedulerResult, SimEvent,
};

/// What the movement simulator reports after processing a tick.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct MovementOutcome {
    /// Vehicles could not all move; the network is (about to be) gridlocked.
    pub conflict: bool,
}

/// What the driver should do after [`Scheduler::handle_result`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// Proceed to the next tick.
    Continue,
    /// The state was rolled back; run the restored tick again.
    Retry,
}

/// Congestion-aware route assignment and garage admission.
///
/// Owns the road network, both routers and their buffers, the priority
/// policy and the per-origin garage stats.  The simulation state is lent in
/// by `&mut` on every call.
///
/// # Driver contract
///
/// ```text
/// initialize(state)                      once
/// per tick:
///   update(tick, state)                  before movement
///   admit(tick, state, v)                for each due vehicle in a garage
///   … movement simulator runs, pushing SimEvents …
///   handle_events(tick, state, queue)
///   handle_result(tick, state, outcome)  Retry → run the tick again
/// ```
///
/// Create via [`SchedulerBuilder`][crate::SchedulerBuilder].
pub struct Scheduler<D: DeadlockResolver, O: SchedulerObserver = NoopObserver> {
    pub(crate) config:      SchedulerConfig,
    pub(crate) network:     RoadNetwork,
    pub(crate) router:      AllPairsRouter,
    pub(crate) rerouter:    Rerouter,
    pub(crate) policy:      PriorityPolicy,
    pub(crate) garage:      GarageStats,
    pub(crate) bias:        EdgeBias,
    pub(crate) resolver:    D,
    pub(crate) observer:    O,
    pub(crate) initialized: bool,
}

impl<D: DeadlockResolver, O: SchedulerObserver> Scheduler<D, O> {
    // ── Accessors ─────────────────────────────────────────────────────────

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn network(&self) -> &RoadNetwork {
        &self.network
    }

    pub fn router(&self) -> &AllPairsRouter {
        &self.router
    }

    pub fn policy(&self) -> &PriorityPolicy {
        &self.policy
    }

    pub fn garage_stats(&self) -> &GarageStats {
        &self.garage
    }

    pub fn resolver(&self) -> &D {
        &self.resolver
    }

    pub fn resolver_mut(&mut self) -> &mut D {
        &mut self.resolver
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    // ── Initialization ────────────────────────────────────────────────────

    /// Derive the capacity baseline and priority window, pick the
    /// force-release cohort, and take the first garage stats.
    pub fn initialize(&mut self, state: &mut SimState) -> SchedulerResult<()> {
        let estimates = state
            .vehicles
            .iter()
            .map(|v| {
                if v.vehicle.preset {
                    estimated_travel(&self.network, &mut self.rerouter, v)
                } else {
                    Ok(0)
                }
            })
            .collect::<Result<Vec<u64>, _>>()?;

        self.policy = PriorityPolicy::new(&self.network, state, &estimates);
        let cohort = force_release_cohort(state, &estimates, self.config.force_release_fraction);
        for &id in &cohort {
            state.vehicle_mut(id).force_release = true;
        }

        let n = self.network.intersection_count();
        self.router.resize(n);
        self.garage = GarageStats::new(n);
        self.garage.refresh(state, Tick::ZERO);
        self.initialized = true;

        let p = &self.policy;
        info!(
            "capacity average {} → limit {:.2} (tighter {:.2}, looser {:.2}), on-road cap {}",
            p.capacity_average, p.base_limit, p.tighter_limit, p.looser_limit, p.on_road_capacity
        );
        info!(
            "{} priority vehicles ({} pre-scheduled), last estimated arrival {:?}, window opens {:?}",
            p.priority_count, p.preset_priority_count, p.last_priority_arrival, p.window_start
        );
        info!("force-released {} pre-scheduled vehicles", cohort.len());
        Ok(())
    }

    // ── Update ────────────────────────────────────────────────────────────

    /// Refresh garage stats and, on cadence, rebuild the all-pairs table and
    /// rewrite every eligible vehicle's trace.
    pub fn update(&mut self, tick: Tick, state: &mut SimState) -> SchedulerResult<()> {
        if !self.initialized {
            return Err(SchedulerError::NotInitialized);
        }
        if !self.resolver.needs_update(tick) {
            return Ok(());
        }
        self.garage.refresh(state, tick);
        if !tick.is_multiple_of(self.config.update_interval) {
            return Ok(());
        }

        let biased = self.rebuild_bias(tick, state);
        let bias = biased.then_some(&self.bias);
        self.router.recompute(&self.network, &state.occupancy, &self.config.weight, bias)?;

        let mut assigned = 0;
        for i in 0..state.vehicles.len() {
            let v = &state.vehicles[i];
            let id = v.id();
            if v.vehicle.is_trivial()
                || v.reached_goal()
                || v.is_pinned()
                || v.locked
                || self.resolver.is_trace_locked(tick, id)
            {
                continue;
            }
            let location = v.location;
            let route = self.router.route(&self.network, v.current_intersection(), v.vehicle.destination)?;

            // The table wants the vehicle to turn back onto its own road.
            let turns_back = matches!(location, Location::OnRoad { road, .. } if route.first() == Some(road));
            if turns_back {
                if self.config.toggles.drop_back_by_dijkstra {
                    let hops = admissible_first_hops(&self.network, &state.vehicles[i]);
                    if !hops.is_empty() {
                        self.reroute_within(tick, state, id, &hops)?;
                        assigned += 1;
                    }
                }
                continue;
            }

            let trace = &mut state.vehicles[i].trace;
            if location == Location::Garage {
                trace.assign(&route.roads);
            } else {
                trace.truncate_after_cursor();
                assert_ne!(trace.tail(), route.first(), "{id}: U-turn spliced into trace");
                trace.extend(&route.roads);
            }
            assigned += 1;
        }

        debug!("{tick}: all-pairs table rebuilt, {assigned} traces rewritten");
        self.observer.on_routes_recomputed(tick, assigned);
        Ok(())
    }

    /// Preload along the remaining routes of pre-scheduled priority vehicles
    /// due within `preload_lead` ticks.  Returns `false` when preloading is
    /// off or nothing is protected.
    fn rebuild_bias(&mut self, tick: Tick, state: &SimState) -> bool {
        self.bias.clear();
        if !self.config.toggles.priority_preload || self.policy.protected_len() == 0 {
            return false;
        }
        self.bias = EdgeBias::new(self.config.preload_weight, self.config.preload_cap);
        for v in &state.vehicles {
            let near_release = tick >= v.release_tick.saturating_sub(self.config.preload_lead);
            if !v.vehicle.priority || !v.is_pinned() || v.reached_goal() || !near_release {
                continue;
            }
            let roads = match v.location {
                Location::Garage => v.trace.roads(),
                _ => v.trace.remaining(),
            };
            self.bias.add_path(&self.network, v.current_intersection(), roads);
        }
        true
    }

    // ── Admission ─────────────────────────────────────────────────────────

    /// Decide whether waiting vehicle `id` may enter the network at `tick`.
    ///
    /// On [`Admission::Defer`] the vehicle's `release_tick` moves to the next
    /// tick.
    pub fn admit(&mut self, tick: Tick, state: &mut SimState, id: VehicleId) -> SchedulerResult<Admission> {
        if !self.initialized {
            return Err(SchedulerError::NotInitialized);
        }
        let v = state.get(id)?;
        if !v.in_garage() {
            return Err(SchedulerError::NotInGarage(id));
        }

        let decision = if self.resolver.is_origin_locked(tick) {
            Admission::Veto
        } else {
            let ctx = AdmissionContext {
                tick,
                network:       &self.network,
                state:         &*state,
                policy:        &self.policy,
                garage:        &self.garage,
                toggles:       &self.config.toggles,
                last_deadlock: self.resolver.last_deadlock_tick(),
            };
            ctx.decide(v)?
        };

        if decision == Admission::Defer {
            state.vehicle_mut(id).release_tick = tick.next();
        }
        self.observer.on_admission(tick, id, decision);
        Ok(decision)
    }

    // ── Events ────────────────────────────────────────────────────────────

    /// Drain `events`: maintain the Protected-Set on arrivals and reroute
    /// vehicles whose next road is nearly full.
    pub fn handle_events(&mut self, tick: Tick, state: &mut SimState, events: &mut EventQueue) -> SchedulerResult<()> {
        for event in events.drain() {
            match event {
                SimEvent::Advanced { vehicle, .. } => {
                    if state.get(vehicle)?.reached_goal() && self.policy.on_arrival(vehicle) {
                        debug!("{tick}: protected {vehicle} arrived, {} left", self.policy.protected_len());
                    }
                }
                SimEvent::BecameFirstInLane { vehicle } => {
                    if self.next_road_jammed(state, vehicle)? && !self.resolver.is_trace_locked(tick, vehicle) {
                        let hops = admissible_first_hops(&self.network, state.vehicle(vehicle));
                        if !hops.is_empty() {
                            self.reroute_within(tick, state, vehicle, &hops)?;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// `vehicle` is on a road, short of its goal, free to change course, and
    /// its next road is filled to within `first_in_lane_margin` cells.
    fn next_road_jammed(&self, state: &SimState, vehicle: VehicleId) -> SchedulerResult<bool> {
        let v = state.get(vehicle)?;
        let at = v.current_intersection();
        if v.current_road().is_none() || v.locked || at == v.vehicle.destination {
            return Ok(false);
        }
        let Some(next) = v.next_road() else {
            return Ok(false);
        };
        let avg = state.occupancy.average_from(&self.network, next, at);
        let length = self.network.road(next).length as f64;
        Ok(avg >= length - self.config.first_in_lane_margin)
    }

    // ── Result ────────────────────────────────────────────────────────────

    /// Hand a conflict to the resolver, or take a periodic checkpoint.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::UnresolvedDeadlock`] when the resolver gives up.
    pub fn handle_result(
        &mut self,
        tick:    Tick,
        state:   &mut SimState,
        outcome: MovementOutcome,
    ) -> SchedulerResult<TickOutcome> {
        if !outcome.conflict {
            if tick > Tick::ZERO && tick.is_multiple_of(self.config.backup_interval) {
                debug!("{tick}: checkpoint");
                self.resolver.backup(tick, state);
            }
            return Ok(TickOutcome::Continue);
        }

        warn!("{tick}: movement conflict");
        let mut handle = RerouteHandle {
            network:  &self.network,
            rerouter: &mut self.rerouter,
            model:    &self.config.weight,
        };
        if !self.resolver.handle_deadlock(tick, state, &mut handle)? {
            return Err(SchedulerError::UnresolvedDeadlock(tick));
        }

        let resume = self.resolver.resume_tick().unwrap_or(tick);
        self.policy.refresh_protected(state);
        self.garage.refresh(state, resume);
        warn!("{tick}: rolled back to {resume}, {} protected vehicles out", self.policy.protected_len());
        self.observer.on_rollback(tick);
        Ok(TickOutcome::Retry)
    }

    // ── Rerouting ─────────────────────────────────────────────────────────

    /// Re-route `id` from its current intersection with every usable road
    /// except the current one allowed as first hop.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::Arrived`] or [`SchedulerError::TraceLocked`] when
    /// the vehicle can no longer change course.
    pub fn reroute(&mut self, tick: Tick, state: &mut SimState, id: VehicleId) -> SchedulerResult<Route> {
        let hops = admissible_first_hops(&self.network, state.get(id)?);
        self.reroute_within(tick, state, id, &hops)
    }

    fn reroute_within(
        &mut self,
        tick:  Tick,
        state: &mut SimState,
        id:    VehicleId,
        hops:  &[RoadId],
    ) -> SchedulerResult<Route> {
        let route = reroute_vehicle(&self.network, &mut self.rerouter, &self.config.weight, state, id, hops)?;
        debug!("{tick}: rerouted {id} over {} roads", route.len());
        self.observer.on_reroute(tick, id, &route);
        Ok(route)
    }
}
