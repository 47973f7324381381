//! Unit tests for tr-scheduler.
//!
//! Scenarios run on two hand-built networks: a pentagon ring, where the two
//! arcs between opposite corners differ by one road, and a small branch
//! network with a detour around one road.

use tr_core::{IntersectionId, RoadId, Tick, VehicleId};
use tr_fleet::{SimState, Vehicle};
use tr_network::{RoadNetwork, RoadNetworkBuilder, RoadSpec, Route};

use crate::{
    Admission, ConstrainedReroute, DeadlockResolver, SchedulerBuilder, Scheduler, SchedulerObserver,
    SchedulerResult,
};

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Pentagon 0 ↔ 1 ↔ 2 ↔ 3 ↔ 4 ↔ 0, length 10, one lane; road `i` joins
/// `i` and `i + 1`.
fn ring5() -> RoadNetwork {
    let mut b = RoadNetworkBuilder::new();
    let x = b.add_intersections(5);
    for i in 0..5 {
        b.add_road(RoadSpec::two_way(x[i], x[(i + 1) % 5], 10));
    }
    b.build().unwrap()
}

/// ```text
/// 0 ── r0 ── 1 ── r1 ── 2
///            │          │
///            r2         r3
///            │          │
///            3 ─────────┘
/// ```
///
/// From 1 to 2 the direct road costs 52.2 empty; the detour over 3 costs
/// 52.2 + 173.8.
fn branch() -> RoadNetwork {
    let mut b = RoadNetworkBuilder::new();
    let x = b.add_intersections(4);
    b.add_road(RoadSpec::two_way(x[0], x[1], 10));
    b.add_road(RoadSpec::two_way(x[1], x[2], 10));
    b.add_road(RoadSpec::two_way(x[1], x[3], 10));
    b.add_road(RoadSpec::two_way(x[3], x[2], 10));
    b.build().unwrap()
}

fn x(i: u32) -> IntersectionId {
    IntersectionId(i)
}

fn r(i: u32) -> RoadId {
    RoadId(i)
}

fn car(id: u32, from: u32, to: u32) -> Vehicle {
    Vehicle::new(VehicleId(id), x(from), x(to), 4)
}

/// Resolver whose answers are set by the test.
#[derive(Default)]
struct ScriptedResolver {
    origin_locked: bool,
    frozen:        Vec<VehicleId>,
    backups:       Vec<Tick>,
    last_deadlock: Option<Tick>,
}

impl DeadlockResolver for ScriptedResolver {
    fn handle_deadlock(&mut self, _: Tick, _: &mut SimState, _: &mut dyn ConstrainedReroute) -> SchedulerResult<bool> {
        Ok(false)
    }

    fn is_origin_locked(&self, _: Tick) -> bool {
        self.origin_locked
    }

    fn is_trace_locked(&self, _: Tick, vehicle: VehicleId) -> bool {
        self.frozen.contains(&vehicle)
    }

    fn backup(&mut self, tick: Tick, _: &SimState) {
        self.backups.push(tick);
    }

    fn last_deadlock_tick(&self) -> Option<Tick> {
        self.last_deadlock
    }
}

#[derive(Default)]
struct Recorder {
    recomputes: Vec<(Tick, usize)>,
    admissions: Vec<(VehicleId, Admission)>,
    reroutes:   Vec<VehicleId>,
    rollbacks:  Vec<Tick>,
}

impl SchedulerObserver for Recorder {
    fn on_routes_recomputed(&mut self, tick: Tick, assigned: usize) {
        self.recomputes.push((tick, assigned));
    }

    fn on_admission(&mut self, _: Tick, vehicle: VehicleId, decision: Admission) {
        self.admissions.push((vehicle, decision));
    }

    fn on_reroute(&mut self, _: Tick, vehicle: VehicleId, _: &Route) {
        self.reroutes.push(vehicle);
    }

    fn on_rollback(&mut self, tick: Tick) {
        self.rollbacks.push(tick);
    }
}

/// Initialized scheduler plus state over `net`.
fn setup<D: DeadlockResolver>(
    net:      RoadNetwork,
    resolver: D,
    fleet:    Vec<Vehicle>,
) -> (Scheduler<D, Recorder>, SimState) {
    let mut state = SimState::new(&net, fleet).unwrap();
    let mut s = SchedulerBuilder::new(net, resolver).observer(Recorder::default()).build().unwrap();
    s.initialize(&mut state).unwrap();
    (s, state)
}

// ── SchedulerConfig / builder ─────────────────────────────────────────────────

#[cfg(test)]
mod config {
    use super::*;
    use crate::{NoopResolver, SchedulerConfig, SchedulerError};

    #[test]
    fn default_is_valid() {
        SchedulerConfig::default().validate().unwrap();
    }

    #[test]
    fn zero_update_interval_rejected() {
        let cfg = SchedulerConfig { update_interval: 0, ..Default::default() };
        assert!(matches!(cfg.validate(), Err(SchedulerError::Config(_))));
    }

    #[test]
    fn negative_or_nan_weights_rejected() {
        let mut cfg = SchedulerConfig::default();
        cfg.weight.single_lane_penalty = -1.0;
        assert!(cfg.validate().is_err());

        let cfg = SchedulerConfig { first_in_lane_margin: f64::NAN, ..Default::default() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn fraction_out_of_range_rejected() {
        let cfg = SchedulerConfig { force_release_fraction: 1.5, ..Default::default() };
        assert!(cfg.validate().is_err());
        let cfg = SchedulerConfig { force_release_fraction: 1.0, ..Default::default() };
        cfg.validate().unwrap();
    }

    #[test]
    fn builder_rejects_roadless_network() {
        let mut b = RoadNetworkBuilder::new();
        b.add_intersections(3);
        let net = b.build().unwrap();
        let err = SchedulerBuilder::new(net, NoopResolver).build().err().unwrap();
        assert!(matches!(err, SchedulerError::Config(_)));
    }

    #[test]
    fn builder_validates_config() {
        let cfg = SchedulerConfig { update_interval: 0, ..Default::default() };
        let err = SchedulerBuilder::new(ring5(), NoopResolver).config(cfg).build().err().unwrap();
        assert!(matches!(err, SchedulerError::Config(_)));
    }

    #[test]
    fn entry_points_require_initialize() {
        let net = ring5();
        let mut state = SimState::new(&net, vec![car(0, 0, 2)]).unwrap();
        let mut s = SchedulerBuilder::new(net, NoopResolver).build().unwrap();
        assert!(matches!(s.update(Tick::ZERO, &mut state), Err(SchedulerError::NotInitialized)));
        assert!(matches!(
            s.admit(Tick::ZERO, &mut state, VehicleId(0)),
            Err(SchedulerError::NotInitialized)
        ));
    }
}

// ── GarageStats ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod garage {
    use super::*;
    use crate::GarageStats;

    #[test]
    fn slowest_eligible_per_origin() {
        let net = ring5();
        let fleet = vec![
            car(0, 0, 2),
            Vehicle::new(VehicleId(1), x(0), x(3), 3).with_priority(),
            Vehicle::new(VehicleId(2), x(0), x(2), 1).departing_at(Tick(10)),
            Vehicle::new(VehicleId(3), x(0), x(2), 1).with_preset(),
            car(4, 1, 3),
        ];
        let state = SimState::new(&net, fleet).unwrap();
        let mut stats = GarageStats::new(5);

        stats.refresh(&state, Tick::ZERO);
        assert_eq!(stats.min_speed(x(0)), Some(3));
        assert_eq!(stats.min_priority_speed(x(0)), Some(3));
        assert_eq!(stats.min_speed(x(1)), Some(4));
        assert_eq!(stats.min_priority_speed(x(1)), None);
        assert_eq!(stats.min_speed(x(2)), None);

        // vehicle 2 becomes due; the pre-scheduled one never counts
        stats.refresh(&state, Tick(10));
        assert_eq!(stats.min_speed(x(0)), Some(1));
        assert_eq!(stats.min_priority_speed(x(0)), Some(3));
    }

    #[test]
    fn departed_vehicles_drop_out() {
        let net = ring5();
        let mut state = SimState::new(&net, vec![car(0, 0, 1)]).unwrap();
        state.vehicle_mut(VehicleId(0)).trace.assign(&[r(0)]);
        let mut stats = GarageStats::new(5);
        stats.refresh(&state, Tick::ZERO);
        assert_eq!(stats.min_speed(x(0)), Some(4));

        state.depart(&net, VehicleId(0), 0, Tick::ZERO).unwrap();
        stats.refresh(&state, Tick::ZERO);
        assert_eq!(stats.min_speed(x(0)), None);
    }
}

// ── PriorityPolicy ────────────────────────────────────────────────────────────

#[cfg(test)]
mod policy {
    use super::*;
    use crate::policy::{estimated_travel, force_release_cohort};
    use crate::PriorityPolicy;
    use tr_network::Rerouter;

    #[test]
    fn capacity_baseline() {
        let net = ring5();
        let state = SimState::new(&net, vec![car(0, 0, 2)]).unwrap();
        let p = PriorityPolicy::new(&net, &state, &[0]);
        assert_eq!(p.capacity_average, 10);
        assert_eq!(p.base_limit, 1.0);
        assert_eq!(p.tighter_limit, 0.5);
        assert_eq!(p.looser_limit, 2.0);
        assert_eq!(p.on_road_capacity, 50);
        assert_eq!(p.window_start, None);
        assert!(!p.in_end_phase());
    }

    #[test]
    fn release_window_opens_a_hundred_ticks_before_last_arrival() {
        let net = ring5();
        let fleet = vec![
            Vehicle::new(VehicleId(0), x(0), x(2), 4)
                .with_priority()
                .with_preset()
                .departing_at(Tick(300)),
            car(1, 1, 3).with_priority(),
            car(2, 1, 3),
        ];
        let state = SimState::new(&net, fleet).unwrap();
        let mut p = PriorityPolicy::new(&net, &state, &[20, 0, 0]);

        assert_eq!(p.priority_count, 2);
        assert_eq!(p.preset_priority_count, 1);
        assert_eq!(p.last_priority_release, Some(Tick(300)));
        assert_eq!(p.last_priority_arrival, Some(Tick(320)));
        assert_eq!(p.window_start, Some(Tick(220)));
        assert!(!p.in_release_window(Tick(219)));
        assert!(p.in_release_window(Tick(220)));

        assert!(p.on_arrival(VehicleId(0)));
        assert!(!p.on_arrival(VehicleId(0)));
        assert!(p.in_release_window(Tick(220)));
        assert!(!p.in_end_phase());

        p.on_arrival(VehicleId(1));
        assert!(!p.in_release_window(Tick(220)));
        assert!(p.in_end_phase());
    }

    #[test]
    fn window_start_clamps_at_zero() {
        let net = ring5();
        let fleet = vec![
            Vehicle::new(VehicleId(0), x(0), x(2), 4)
                .with_priority()
                .with_preset()
                .departing_at(Tick(5)),
        ];
        let state = SimState::new(&net, fleet).unwrap();
        let p = PriorityPolicy::new(&net, &state, &[5]);
        assert_eq!(p.window_start, Some(Tick::ZERO));
    }

    #[test]
    fn protected_set_tracks_unarrived_priority() {
        let net = ring5();
        let fleet = vec![car(0, 0, 1).with_priority(), car(1, 0, 1), car(2, 2, 3).with_priority()];
        let mut state = SimState::new(&net, fleet).unwrap();
        let mut p = PriorityPolicy::new(&net, &state, &[0, 0, 0]);
        assert_eq!(p.protected_len(), 2);
        assert!(p.is_protected(VehicleId(0)));
        assert!(!p.is_protected(VehicleId(1)));

        state.vehicle_mut(VehicleId(0)).trace.assign(&[r(0)]);
        state.depart(&net, VehicleId(0), 0, Tick::ZERO).unwrap();
        state.arrive(&net, VehicleId(0), Tick(3)).unwrap();
        p.refresh_protected(&state);
        assert_eq!(p.protected().collect::<Vec<_>>(), vec![VehicleId(2)]);
    }

    #[test]
    fn cohort_is_priority_first_then_longest() {
        let net = ring5();
        let fleet: Vec<Vehicle> = (0..20)
            .map(|i| {
                let v = car(i, 0, 2).with_preset();
                if i == 7 { v.with_priority() } else { v }
            })
            .collect();
        let state = SimState::new(&net, fleet).unwrap();
        let estimates: Vec<u64> = (0..20).collect();
        assert_eq!(force_release_cohort(&state, &estimates, 0.1), vec![VehicleId(7), VehicleId(19)]);
        assert!(force_release_cohort(&state, &estimates, 0.0).is_empty());
    }

    #[test]
    fn cohort_ignores_ordinary_vehicles() {
        let net = ring5();
        let mut fleet: Vec<Vehicle> = (0..10).map(|i| car(i, 0, 2).with_preset()).collect();
        fleet.extend((10..30).map(|i| car(i, 0, 2)));
        let state = SimState::new(&net, fleet).unwrap();
        let estimates = vec![1; 30];
        // 10% of the ten pre-scheduled vehicles; ties broken by id
        assert_eq!(force_release_cohort(&state, &estimates, 0.1), vec![VehicleId(0)]);
    }

    #[test]
    fn travel_estimate_follows_trace_or_free_flow() {
        let mut b = RoadNetworkBuilder::new();
        let xs = b.add_intersections(3);
        b.add_road(RoadSpec::two_way(xs[0], xs[1], 10).speed_limit(2));
        b.add_road(RoadSpec::two_way(xs[1], xs[2], 9));
        let net = b.build().unwrap();
        let mut state = SimState::new(&net, vec![car(0, 0, 2)]).unwrap();
        let mut rerouter = Rerouter::new(3);

        // 10 / min(4, 2) + ⌈9 / 4⌉
        assert_eq!(estimated_travel(&net, &mut rerouter, state.vehicle(VehicleId(0))).unwrap(), 8);
        state.vehicle_mut(VehicleId(0)).trace.assign(&[r(0), r(1)]);
        assert_eq!(estimated_travel(&net, &mut rerouter, state.vehicle(VehicleId(0))).unwrap(), 8);
    }

    #[test]
    fn initialize_force_releases_the_longest_trip() {
        let mut fleet = vec![car(0, 0, 2).with_preset()];
        fleet.extend((1..10).map(|i| car(i, 0, 1).with_preset()));
        let (mut s, mut state) = setup(ring5(), ScriptedResolver::default(), fleet);

        let released: Vec<VehicleId> =
            state.vehicles.iter().filter(|v| v.force_release).map(|v| v.id()).collect();
        assert_eq!(released, vec![VehicleId(0)]);

        // pinned vehicles are left alone by the router
        s.update(Tick::ZERO, &mut state).unwrap();
        assert_eq!(state.vehicle(VehicleId(0)).trace.len(), 2);
        assert!(state.vehicle(VehicleId(1)).trace.is_empty());
    }
}

// ── Admission ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod admission {
    use super::*;
    use crate::{AdmissionContext, NoopResolver, SchedulerError};

    /// The limit `admit` applies to `id` at `tick`.
    fn limit_at<D: DeadlockResolver>(
        s:     &Scheduler<D, Recorder>,
        state: &SimState,
        tick:  Tick,
        id:    VehicleId,
    ) -> Option<u64> {
        let ctx = AdmissionContext {
            tick,
            network:       s.network(),
            state,
            policy:        s.policy(),
            garage:        s.garage_stats(),
            toggles:       &s.config().toggles,
            last_deadlock: s.resolver().last_deadlock_tick(),
        };
        ctx.current_limit(state.vehicle(id))
    }

    #[test]
    fn empty_road_releases() {
        let (mut s, mut state) = setup(ring5(), NoopResolver, vec![car(0, 0, 2)]);
        s.update(Tick::ZERO, &mut state).unwrap();
        assert_eq!(s.admit(Tick::ZERO, &mut state, VehicleId(0)).unwrap(), Admission::Release);
        assert_eq!(state.vehicle(VehicleId(0)).release_tick, Tick::ZERO);
        assert_eq!(s.observer().admissions, vec![(VehicleId(0), Admission::Release)]);
    }

    #[test]
    fn crowded_first_road_defers() {
        let (mut s, mut state) = setup(ring5(), NoopResolver, vec![car(0, 0, 2)]);
        s.update(Tick::ZERO, &mut state).unwrap();
        assert_eq!(state.vehicle(VehicleId(0)).next_road(), Some(r(0)));

        // limit is looser × 2 = 4 below capacity
        state.occupancy.set(r(0), x(0), 0, 4);
        assert_eq!(s.admit(Tick::ZERO, &mut state, VehicleId(0)).unwrap(), Admission::Release);
        state.occupancy.set(r(0), x(0), 0, 5);
        assert_eq!(s.admit(Tick(1), &mut state, VehicleId(0)).unwrap(), Admission::Defer);
        assert_eq!(state.vehicle(VehicleId(0)).release_tick, Tick(2));
    }

    #[test]
    fn preset_vehicles_ignore_occupancy() {
        let fleet = vec![car(0, 0, 2).with_preset()];
        let (mut s, mut state) = setup(ring5(), NoopResolver, fleet);
        state.vehicle_mut(VehicleId(0)).trace.assign(&[r(0), r(1)]);
        state.occupancy.set(r(0), x(0), 0, 9);
        assert_eq!(s.admit(Tick::ZERO, &mut state, VehicleId(0)).unwrap(), Admission::Release);
    }

    #[test]
    fn faster_vehicle_waits_for_slower_one() {
        let fleet = vec![car(0, 0, 2), Vehicle::new(VehicleId(1), x(0), x(2), 2)];
        let (mut s, mut state) = setup(ring5(), NoopResolver, fleet);
        s.update(Tick::ZERO, &mut state).unwrap();
        assert_eq!(s.garage_stats().min_speed(x(0)), Some(2));
        assert_eq!(s.admit(Tick::ZERO, &mut state, VehicleId(0)).unwrap(), Admission::Defer);
        assert_eq!(s.admit(Tick::ZERO, &mut state, VehicleId(1)).unwrap(), Admission::Release);
    }

    #[test]
    fn priority_vehicle_skips_speed_ordering() {
        let fleet = vec![car(0, 0, 2).with_priority(), Vehicle::new(VehicleId(1), x(0), x(2), 2)];
        let (mut s, mut state) = setup(ring5(), NoopResolver, fleet);
        s.update(Tick::ZERO, &mut state).unwrap();
        assert_eq!(s.admit(Tick::ZERO, &mut state, VehicleId(0)).unwrap(), Admission::Release);
    }

    #[test]
    fn release_window_holds_ordinary_vehicles() {
        let fleet = vec![
            car(0, 0, 2).with_priority().with_preset().departing_at(Tick(300)),
            car(1, 1, 3),
        ];
        let (mut s, mut state) = setup(ring5(), NoopResolver, fleet);
        let start = s.policy().window_start.unwrap();
        assert!(start > Tick(200) && start <= Tick(210));

        // before the window opens the ordinary vehicle goes
        s.update(Tick(100), &mut state).unwrap();
        assert_eq!(s.admit(Tick(100), &mut state, VehicleId(1)).unwrap(), Admission::Release);
        assert_eq!(s.admit(Tick(250), &mut state, VehicleId(1)).unwrap(), Admission::Defer);
        assert_eq!(state.vehicle(VehicleId(1)).release_tick, Tick(251));
    }

    #[test]
    fn fractional_limit_is_truncated() {
        // one two-lane road of length 15: base limit 1.5
        let mut b = RoadNetworkBuilder::new();
        let xs = b.add_intersections(2);
        b.add_road(RoadSpec::two_way(xs[0], xs[1], 15).lanes(2));
        let (mut s, mut state) = setup(b.build().unwrap(), NoopResolver, vec![car(0, 0, 1)]);
        s.config.toggles.limit_by_network_size = false;
        s.update(Tick::ZERO, &mut state).unwrap();
        assert_eq!(s.policy().base_limit, 1.5);
        assert_eq!(limit_at(&s, &state, Tick::ZERO, VehicleId(0)), Some(1));

        state.occupancy.set(r(0), x(0), 0, 1);
        state.occupancy.set(r(0), x(0), 1, 1);
        assert_eq!(s.admit(Tick::ZERO, &mut state, VehicleId(0)).unwrap(), Admission::Release);

        // average 1.5 sits above the whole-vehicle limit
        state.occupancy.set(r(0), x(0), 0, 2);
        assert_eq!(s.admit(Tick(1), &mut state, VehicleId(0)).unwrap(), Admission::Defer);
    }

    #[test]
    fn full_network_tightens_the_limit() {
        let (mut s, mut state) = setup(ring5(), NoopResolver, vec![car(0, 0, 2), car(1, 3, 4)]);
        s.update(Tick::ZERO, &mut state).unwrap();
        state.occupancy.set(r(0), x(0), 0, 1);
        assert_eq!(limit_at(&s, &state, Tick::ZERO, VehicleId(0)), Some(4));
        assert_eq!(s.admit(Tick::ZERO, &mut state, VehicleId(0)).unwrap(), Admission::Release);

        // tighter limit 0.5 leaves no room at all
        state.depart(s.network(), VehicleId(1), 0, Tick::ZERO).unwrap();
        s.policy.on_road_capacity = 1;
        assert_eq!(limit_at(&s, &state, Tick(1), VehicleId(0)), Some(0));
        assert_eq!(s.admit(Tick(1), &mut state, VehicleId(0)).unwrap(), Admission::Defer);
        state.occupancy.set(r(0), x(0), 0, 0);
        assert_eq!(s.admit(Tick(2), &mut state, VehicleId(0)).unwrap(), Admission::Release);
    }

    #[test]
    fn end_phase_loosens_the_limit() {
        let fleet = vec![car(0, 0, 2).with_priority().with_preset(), car(1, 1, 3)];
        let (mut s, mut state) = setup(ring5(), NoopResolver, fleet);
        s.config.toggles.limit_by_network_size = false;
        s.update(Tick::ZERO, &mut state).unwrap();
        assert_eq!(state.vehicle(VehicleId(1)).next_road(), Some(r(1)));
        state.occupancy.set(r(1), x(1), 0, 3);

        // priority vehicle still out, window already open
        assert_eq!(limit_at(&s, &state, Tick(1), VehicleId(1)), None);

        s.policy.on_arrival(VehicleId(0));
        assert!(s.policy().in_end_phase());
        assert_eq!(limit_at(&s, &state, Tick(1), VehicleId(1)), Some(4));
        assert_eq!(s.admit(Tick(1), &mut state, VehicleId(1)).unwrap(), Admission::Release);

        s.config.toggles.faster_at_end = false;
        assert_eq!(limit_at(&s, &state, Tick(2), VehicleId(1)), Some(1));
        assert_eq!(s.admit(Tick(2), &mut state, VehicleId(1)).unwrap(), Admission::Defer);
    }

    #[test]
    fn stricter_limit_until_last_deadlock() {
        let resolver = ScriptedResolver { last_deadlock: Some(Tick(10)), ..Default::default() };
        let (mut s, mut state) = setup(ring5(), resolver, vec![car(0, 0, 2)]);
        s.config.toggles.fewer_after_deadlock = true;
        s.update(Tick::ZERO, &mut state).unwrap();
        state.occupancy.set(r(0), x(0), 0, 2);

        // base 1.0 × 1.5
        assert_eq!(limit_at(&s, &state, Tick(10), VehicleId(0)), Some(1));
        assert_eq!(s.admit(Tick(10), &mut state, VehicleId(0)).unwrap(), Admission::Defer);
        assert_eq!(limit_at(&s, &state, Tick(11), VehicleId(0)), Some(4));
        assert_eq!(s.admit(Tick(11), &mut state, VehicleId(0)).unwrap(), Admission::Release);
    }

    #[test]
    fn release_window_favours_priority_below_capacity() {
        let fleet = vec![
            car(0, 0, 2).with_priority().with_preset().departing_at(Tick(300)),
            car(1, 1, 3).with_priority(),
            car(2, 3, 4),
        ];
        let (mut s, mut state) = setup(ring5(), NoopResolver, fleet);
        s.config.toggles.limit_by_network_size = false;
        s.update(Tick::ZERO, &mut state).unwrap();
        state.occupancy.set(r(1), x(1), 0, 3);

        assert_eq!(limit_at(&s, &state, Tick(100), VehicleId(1)), Some(1));
        assert_eq!(s.admit(Tick(100), &mut state, VehicleId(1)).unwrap(), Admission::Defer);

        assert_eq!(limit_at(&s, &state, Tick(250), VehicleId(1)), Some(4));
        assert_eq!(s.admit(Tick(250), &mut state, VehicleId(1)).unwrap(), Admission::Release);

        // at capacity only pre-scheduled priority vehicles keep a limit
        state.depart(s.network(), VehicleId(2), 0, Tick(250)).unwrap();
        s.policy.on_road_capacity = 1;
        assert_eq!(limit_at(&s, &state, Tick(251), VehicleId(1)), None);
        assert_eq!(s.admit(Tick(251), &mut state, VehicleId(1)).unwrap(), Admission::Defer);
        assert_eq!(limit_at(&s, &state, Tick(251), VehicleId(0)), Some(1));
    }

    #[test]
    fn dispatch_free_skips_the_final_check() {
        let fleet = vec![car(0, 0, 2), Vehicle::new(VehicleId(1), x(0), x(2), 2)];
        let (mut s, mut state) = setup(ring5(), NoopResolver, fleet);
        s.update(Tick::ZERO, &mut state).unwrap();
        state.occupancy.set(r(0), x(0), 0, 9);
        assert_eq!(s.admit(Tick::ZERO, &mut state, VehicleId(0)).unwrap(), Admission::Defer);

        s.config.toggles.priority_dispatch_free = true;
        assert_eq!(limit_at(&s, &state, Tick(1), VehicleId(0)), Some(4));
        assert_eq!(s.admit(Tick(1), &mut state, VehicleId(0)).unwrap(), Admission::Release);
    }

    #[test]
    fn locked_origin_vetoes_without_side_effects() {
        let resolver = ScriptedResolver { origin_locked: true, ..Default::default() };
        let (mut s, mut state) = setup(ring5(), resolver, vec![car(0, 0, 2)]);
        s.update(Tick::ZERO, &mut state).unwrap();
        assert_eq!(s.admit(Tick(4), &mut state, VehicleId(0)).unwrap(), Admission::Veto);
        assert_eq!(state.vehicle(VehicleId(0)).release_tick, Tick::ZERO);
    }

    #[test]
    fn traceless_vehicle_is_an_error() {
        let (mut s, mut state) = setup(ring5(), NoopResolver, vec![car(0, 0, 2)]);
        assert!(matches!(
            s.admit(Tick::ZERO, &mut state, VehicleId(0)),
            Err(SchedulerError::NoTrace(_))
        ));
    }

    #[test]
    fn vehicle_on_road_is_not_admitted() {
        let (mut s, mut state) = setup(ring5(), NoopResolver, vec![car(0, 0, 2)]);
        s.update(Tick::ZERO, &mut state).unwrap();
        state.depart(s.network(), VehicleId(0), 0, Tick::ZERO).unwrap();
        assert!(matches!(
            s.admit(Tick(1), &mut state, VehicleId(0)),
            Err(SchedulerError::NotInGarage(_))
        ));
    }
}

// ── Scheduler::update ─────────────────────────────────────────────────────────

#[cfg(test)]
mod update {
    use super::*;
    use crate::{NoopResolver, PolicyToggles, SchedulerConfig};

    #[test]
    fn garage_vehicles_get_full_routes() {
        let fleet = vec![car(0, 0, 2), car(1, 3, 3), car(2, 4, 1)];
        let (mut s, mut state) = setup(ring5(), NoopResolver, fleet);
        s.update(Tick::ZERO, &mut state).unwrap();

        assert_eq!(state.vehicle(VehicleId(0)).trace.roads(), &[r(0), r(1)]);
        assert!(state.vehicle(VehicleId(1)).trace.is_empty());
        assert_eq!(state.vehicle(VehicleId(2)).trace.roads(), &[r(4), r(0)]);
        assert_eq!(s.observer().recomputes, vec![(Tick::ZERO, 2)]);
    }

    #[test]
    fn off_cadence_ticks_skip_recompute() {
        let (mut s, mut state) = setup(ring5(), NoopResolver, vec![car(0, 0, 2)]);
        s.update(Tick(1), &mut state).unwrap();
        assert!(state.vehicle(VehicleId(0)).trace.is_empty());
        assert!(!s.router().is_relaxed());
        s.update(Tick(2), &mut state).unwrap();
        assert!(s.router().is_relaxed());
    }

    #[test]
    fn congestion_switches_to_the_long_arc() {
        let (mut s, mut state) = setup(ring5(), NoopResolver, vec![car(0, 0, 2)]);

        state.occupancy.set(r(0), x(0), 0, 3);
        s.update(Tick::ZERO, &mut state).unwrap();
        assert_eq!(state.vehicle(VehicleId(0)).trace.roads(), &[r(0), r(1)]);

        state.occupancy.set(r(0), x(0), 0, 4);
        s.update(Tick(2), &mut state).unwrap();
        assert_eq!(state.vehicle(VehicleId(0)).trace.roads(), &[r(4), r(3), r(2)]);
    }

    #[test]
    fn moving_vehicle_keeps_its_committed_road() {
        let (mut s, mut state) = setup(branch(), NoopResolver, vec![car(0, 0, 2)]);
        s.update(Tick::ZERO, &mut state).unwrap();
        assert_eq!(state.vehicle(VehicleId(0)).trace.roads(), &[r(0), r(1)]);
        state.depart(s.network(), VehicleId(0), 0, Tick::ZERO).unwrap();

        // 1 → 2 jammed: the rest of the trip goes round over 3
        state.occupancy.set(r(1), x(1), 0, 9);
        s.update(Tick(2), &mut state).unwrap();
        let v = state.vehicle(VehicleId(0));
        assert_eq!(v.current_road(), Some(r(0)));
        assert_eq!(v.trace.roads(), &[r(0), r(2), r(3)]);
        assert_eq!(v.trace.cursor(), 0);
    }

    #[test]
    fn locked_traces_are_left_alone() {
        let resolver = ScriptedResolver::default();
        let (mut s, mut state) = setup(ring5(), resolver, vec![car(0, 0, 2)]);
        s.update(Tick::ZERO, &mut state).unwrap();
        state.depart(s.network(), VehicleId(0), 0, Tick::ZERO).unwrap();
        state.vehicle_mut(VehicleId(0)).trace.truncate_after_cursor();

        state.vehicle_mut(VehicleId(0)).locked = true;
        s.update(Tick(2), &mut state).unwrap();
        assert_eq!(state.vehicle(VehicleId(0)).trace.roads(), &[r(0)]);

        state.vehicle_mut(VehicleId(0)).locked = false;
        s.resolver_mut().frozen.push(VehicleId(0));
        s.update(Tick(4), &mut state).unwrap();
        assert_eq!(state.vehicle(VehicleId(0)).trace.roads(), &[r(0)]);

        s.resolver_mut().frozen.clear();
        s.update(Tick(6), &mut state).unwrap();
        assert_eq!(state.vehicle(VehicleId(0)).trace.roads(), &[r(0), r(1)]);
    }

    /// Vehicle on road 1 heading for 2, bound for 0: the table's cheapest
    /// way home is straight back over road 1.
    fn turned_around(config: SchedulerConfig) -> (Scheduler<NoopResolver, Recorder>, SimState) {
        let net = ring5();
        let mut state = SimState::new(&net, vec![car(0, 1, 0)]).unwrap();
        let mut s = SchedulerBuilder::new(net, NoopResolver)
            .config(config)
            .observer(Recorder::default())
            .build()
            .unwrap();
        s.initialize(&mut state).unwrap();
        state.vehicle_mut(VehicleId(0)).trace.assign(&[r(1)]);
        state.depart(s.network(), VehicleId(0), 0, Tick::ZERO).unwrap();
        (s, state)
    }

    #[test]
    fn u_turn_suggestion_keeps_old_trace() {
        let (mut s, mut state) = turned_around(SchedulerConfig::default());
        s.update(Tick::ZERO, &mut state).unwrap();
        assert_eq!(state.vehicle(VehicleId(0)).trace.roads(), &[r(1)]);
        assert_eq!(s.observer().recomputes, vec![(Tick::ZERO, 0)]);
        assert!(s.observer().reroutes.is_empty());
    }

    #[test]
    fn u_turn_suggestion_reroutes_when_dropping_back() {
        let config = SchedulerConfig {
            toggles: PolicyToggles { drop_back_by_dijkstra: true, ..Default::default() },
            ..Default::default()
        };
        let (mut s, mut state) = turned_around(config);
        s.update(Tick::ZERO, &mut state).unwrap();
        assert_eq!(state.vehicle(VehicleId(0)).trace.roads(), &[r(1), r(2), r(3), r(4)]);
        assert_eq!(s.observer().reroutes, vec![VehicleId(0)]);
    }

    #[test]
    fn arrived_vehicles_are_skipped() {
        let (mut s, mut state) = setup(ring5(), NoopResolver, vec![car(0, 0, 1)]);
        s.update(Tick::ZERO, &mut state).unwrap();
        state.depart(s.network(), VehicleId(0), 0, Tick::ZERO).unwrap();
        state.arrive(s.network(), VehicleId(0), Tick(3)).unwrap();
        s.update(Tick(4), &mut state).unwrap();
        assert_eq!(state.vehicle(VehicleId(0)).trace.roads(), &[r(0)]);
        assert_eq!(s.observer().recomputes.last(), Some(&(Tick(4), 0)));
    }

    #[test]
    fn preload_steers_bulk_traffic_off_priority_routes() {
        let config = SchedulerConfig {
            preload_weight: 4.0,
            toggles: PolicyToggles { priority_preload: true, ..Default::default() },
            ..Default::default()
        };
        let fleet = vec![
            car(0, 0, 2).with_priority().with_preset().departing_at(Tick(10)),
            car(1, 0, 2),
        ];
        let net = ring5();
        let mut state = SimState::new(&net, fleet).unwrap();
        state.vehicle_mut(VehicleId(0)).trace.assign(&[r(0), r(1)]);
        let mut s = SchedulerBuilder::new(net, NoopResolver).config(config).build().unwrap();
        s.initialize(&mut state).unwrap();

        // one preloaded vehicle weighs like four queued ones
        s.update(Tick::ZERO, &mut state).unwrap();
        assert_eq!(state.vehicle(VehicleId(1)).trace.roads(), &[r(4), r(3), r(2)]);
        assert_eq!(state.vehicle(VehicleId(0)).trace.roads(), &[r(0), r(1)]);
    }
}

// ── Events ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod events {
    use super::*;
    use crate::{EventQueue, NoopResolver, SchedulerError, SimEvent};

    #[test]
    fn queue_is_fifo() {
        let mut q = EventQueue::new();
        q.push(SimEvent::BecameFirstInLane { vehicle: VehicleId(2) });
        q.push(SimEvent::Advanced { vehicle: VehicleId(1), from_road: None });
        assert_eq!(q.len(), 2);
        let drained: Vec<SimEvent> = q.drain().collect();
        assert_eq!(drained[0], SimEvent::BecameFirstInLane { vehicle: VehicleId(2) });
        assert!(q.is_empty());
    }

    #[test]
    fn arrival_leaves_protected_set() {
        let fleet = vec![car(0, 0, 1).with_priority(), car(1, 0, 2).with_priority()];
        let (mut s, mut state) = setup(ring5(), NoopResolver, fleet);
        s.update(Tick::ZERO, &mut state).unwrap();
        assert_eq!(s.policy().protected_len(), 2);

        let mut q = EventQueue::new();
        state.depart(s.network(), VehicleId(0), 0, Tick::ZERO).unwrap();
        q.push(SimEvent::Advanced { vehicle: VehicleId(0), from_road: None });
        s.handle_events(Tick::ZERO, &mut state, &mut q).unwrap();
        assert_eq!(s.policy().protected_len(), 2);

        state.arrive(s.network(), VehicleId(0), Tick(3)).unwrap();
        q.push(SimEvent::Advanced { vehicle: VehicleId(0), from_road: Some(r(0)) });
        s.handle_events(Tick(3), &mut state, &mut q).unwrap();
        assert_eq!(s.policy().protected_len(), 1);
        assert!(!s.policy().is_protected(VehicleId(0)));
    }

    #[test]
    fn force_released_priority_vehicle_runs_and_leaves_protected_set() {
        let mut fleet = vec![car(0, 0, 1).with_priority().with_preset()];
        fleet.extend((1..10).map(|i| car(i, 2, 4).with_preset()));
        let (mut s, mut state) = setup(ring5(), NoopResolver, fleet);
        assert!(state.vehicle(VehicleId(0)).force_release);
        assert!(state.vehicles[1..].iter().all(|v| !v.force_release));
        assert!(s.policy().is_protected(VehicleId(0)));

        s.update(Tick::ZERO, &mut state).unwrap();
        assert_eq!(state.vehicle(VehicleId(0)).trace.roads(), &[r(0)]);
        state.depart(s.network(), VehicleId(0), 0, Tick::ZERO).unwrap();
        state.arrive(s.network(), VehicleId(0), Tick(3)).unwrap();

        let mut q = EventQueue::new();
        q.push(SimEvent::Advanced { vehicle: VehicleId(0), from_road: Some(r(0)) });
        s.handle_events(Tick(3), &mut state, &mut q).unwrap();
        assert_eq!(s.policy().protected_len(), 0);
        assert!(s.policy().in_end_phase());
    }

    #[test]
    fn jammed_next_road_triggers_detour() {
        let (mut s, mut state) = setup(branch(), NoopResolver, vec![car(0, 0, 2)]);
        s.update(Tick::ZERO, &mut state).unwrap();
        assert_eq!(state.vehicle(VehicleId(0)).trace.roads(), &[r(0), r(1)]);
        state.depart(s.network(), VehicleId(0), 0, Tick::ZERO).unwrap();

        let mut q = EventQueue::new();
        // 6 of 10 cells: not yet within the margin
        state.occupancy.set(r(1), x(1), 0, 6);
        q.push(SimEvent::BecameFirstInLane { vehicle: VehicleId(0) });
        s.handle_events(Tick(1), &mut state, &mut q).unwrap();
        assert_eq!(state.vehicle(VehicleId(0)).trace.roads(), &[r(0), r(1)]);

        state.occupancy.set(r(1), x(1), 0, 9);
        q.push(SimEvent::BecameFirstInLane { vehicle: VehicleId(0) });
        s.handle_events(Tick(2), &mut state, &mut q).unwrap();
        assert_eq!(state.vehicle(VehicleId(0)).trace.roads(), &[r(0), r(2), r(3)]);
        assert_eq!(s.observer().reroutes, vec![VehicleId(0)]);
    }

    #[test]
    fn locked_vehicle_is_not_detoured() {
        let (mut s, mut state) = setup(branch(), NoopResolver, vec![car(0, 0, 2)]);
        s.update(Tick::ZERO, &mut state).unwrap();
        state.depart(s.network(), VehicleId(0), 0, Tick::ZERO).unwrap();
        state.vehicle_mut(VehicleId(0)).locked = true;
        state.occupancy.set(r(1), x(1), 0, 9);

        let mut q = EventQueue::new();
        q.push(SimEvent::BecameFirstInLane { vehicle: VehicleId(0) });
        s.handle_events(Tick(1), &mut state, &mut q).unwrap();
        assert_eq!(state.vehicle(VehicleId(0)).trace.roads(), &[r(0), r(1)]);
        assert!(s.observer().reroutes.is_empty());
    }

    #[test]
    fn explicit_reroute_excludes_current_road() {
        let (mut s, mut state) = setup(branch(), NoopResolver, vec![car(0, 0, 2)]);
        s.update(Tick::ZERO, &mut state).unwrap();
        state.depart(s.network(), VehicleId(0), 0, Tick::ZERO).unwrap();
        let route = s.reroute(Tick(1), &mut state, VehicleId(0)).unwrap();
        assert_eq!(route.roads, vec![r(1)]);
        assert_eq!(state.vehicle(VehicleId(0)).trace.roads(), &[r(0), r(1)]);
    }

    #[test]
    fn explicit_reroute_refuses_settled_vehicles() {
        let (mut s, mut state) = setup(branch(), NoopResolver, vec![car(0, 0, 2), car(1, 0, 1)]);
        s.update(Tick::ZERO, &mut state).unwrap();
        state.depart(s.network(), VehicleId(0), 0, Tick::ZERO).unwrap();
        state.vehicle_mut(VehicleId(0)).locked = true;
        assert!(matches!(
            s.reroute(Tick(1), &mut state, VehicleId(0)),
            Err(SchedulerError::TraceLocked(_))
        ));
        assert_eq!(state.vehicle(VehicleId(0)).trace.roads(), &[r(0), r(1)]);

        state.depart(s.network(), VehicleId(1), 0, Tick::ZERO).unwrap();
        state.arrive(s.network(), VehicleId(1), Tick(3)).unwrap();
        assert!(matches!(
            s.reroute(Tick(3), &mut state, VehicleId(1)),
            Err(SchedulerError::Arrived(_))
        ));
        assert!(s.observer().reroutes.is_empty());
    }
}

// ── Scheduler::handle_result ──────────────────────────────────────────────────

#[cfg(test)]
mod result {
    use super::*;
    use crate::{CheckpointResolver, EventQueue, MovementOutcome, NoopResolver, SchedulerError, SimEvent, TickOutcome};

    const CLEAR: MovementOutcome = MovementOutcome { conflict: false };
    const STUCK: MovementOutcome = MovementOutcome { conflict: true };

    #[test]
    fn checkpoints_on_backup_cadence() {
        let (mut s, mut state) = setup(ring5(), ScriptedResolver::default(), vec![car(0, 0, 2)]);
        for t in [0, 1, 199, 200, 201, 400] {
            assert_eq!(s.handle_result(Tick(t), &mut state, CLEAR).unwrap(), TickOutcome::Continue);
        }
        assert_eq!(s.resolver().backups, vec![Tick(200), Tick(400)]);
    }

    #[test]
    fn unresolved_conflict_is_fatal() {
        let (mut s, mut state) = setup(ring5(), NoopResolver, vec![car(0, 0, 2)]);
        let err = s.handle_result(Tick(7), &mut state, STUCK).unwrap_err();
        assert!(matches!(err, SchedulerError::UnresolvedDeadlock(Tick(7))));
    }

    #[test]
    fn conflict_without_checkpoint_is_fatal() {
        let (mut s, mut state) = setup(ring5(), CheckpointResolver::default(), vec![car(0, 0, 2)]);
        assert!(s.handle_result(Tick(7), &mut state, STUCK).is_err());
    }

    #[test]
    fn rollback_restores_state_and_policy() {
        let fleet = vec![car(0, 0, 2), car(1, 0, 1).with_priority()];
        let (mut s, mut state) = setup(branch(), CheckpointResolver::default(), fleet);
        s.update(Tick::ZERO, &mut state).unwrap();
        state.depart(s.network(), VehicleId(0), 0, Tick::ZERO).unwrap();
        s.handle_result(Tick(200), &mut state, CLEAR).unwrap();
        assert_eq!(s.resolver().checkpoint_tick(), Some(Tick(200)));

        // the priority vehicle finishes after the checkpoint
        state.depart(s.network(), VehicleId(1), 0, Tick(201)).unwrap();
        state.arrive(s.network(), VehicleId(1), Tick(203)).unwrap();
        let mut q = EventQueue::new();
        q.push(SimEvent::Advanced { vehicle: VehicleId(1), from_road: Some(r(0)) });
        s.handle_events(Tick(203), &mut state, &mut q).unwrap();
        s.update(Tick(203), &mut state).unwrap();
        assert_eq!(s.policy().protected_len(), 0);
        assert_eq!(s.garage_stats().min_speed(x(0)), None);

        state.vehicle_mut(VehicleId(0)).locked = true;
        assert_eq!(s.handle_result(Tick(205), &mut state, STUCK).unwrap(), TickOutcome::Retry);

        assert!(state.vehicle(VehicleId(1)).in_garage());
        assert_eq!(s.policy().protected_len(), 1);
        assert_eq!(s.garage_stats().min_speed(x(0)), Some(4));
        assert_eq!(s.observer().rollbacks, vec![Tick(205)]);
        assert_eq!(s.resolver().last_deadlock_tick(), Some(Tick(205)));

        // the stuck vehicle is steered away from its planned road and frozen
        assert_eq!(state.vehicle(VehicleId(0)).trace.roads(), &[r(0), r(2), r(3)]);
        assert!(s.resolver().is_trace_locked(Tick(210), VehicleId(0)));
        assert!(!s.resolver().is_trace_locked(Tick(226), VehicleId(0)));

        // garages stay shut during the cooldown
        assert_eq!(s.admit(Tick(210), &mut state, VehicleId(1)).unwrap(), Admission::Veto);
        s.update(Tick(226), &mut state).unwrap();
        assert_eq!(s.admit(Tick(226), &mut state, VehicleId(1)).unwrap(), Admission::Release);
    }

    #[test]
    fn rollback_takes_garage_stats_at_resume_tick() {
        let fleet = vec![car(0, 0, 2), car(1, 3, 2).departing_at(Tick(203))];
        let (mut s, mut state) = setup(branch(), CheckpointResolver::default(), fleet);
        s.update(Tick::ZERO, &mut state).unwrap();
        state.depart(s.network(), VehicleId(0), 0, Tick::ZERO).unwrap();
        s.handle_result(Tick(200), &mut state, CLEAR).unwrap();
        s.update(Tick(204), &mut state).unwrap();
        assert_eq!(s.garage_stats().min_speed(x(3)), Some(4));

        state.vehicle_mut(VehicleId(0)).locked = true;
        assert_eq!(s.handle_result(Tick(205), &mut state, STUCK).unwrap(), TickOutcome::Retry);
        assert_eq!(s.resolver().resume_tick(), Some(Tick(201)));

        // not yet due when the replay starts
        assert_eq!(s.garage_stats().min_speed(x(3)), None);
        s.update(Tick(226), &mut state).unwrap();
        assert_eq!(s.garage_stats().min_speed(x(3)), Some(4));
    }

    #[test]
    fn repeated_rollbacks_give_up() {
        let (mut s, mut state) = setup(ring5(), CheckpointResolver::new(5, 2), vec![car(0, 0, 2)]);
        s.handle_result(Tick(200), &mut state, CLEAR).unwrap();
        assert_eq!(s.handle_result(Tick(201), &mut state, STUCK).unwrap(), TickOutcome::Retry);
        assert_eq!(s.handle_result(Tick(201), &mut state, STUCK).unwrap(), TickOutcome::Retry);
        assert!(matches!(
            s.handle_result(Tick(201), &mut state, STUCK),
            Err(SchedulerError::UnresolvedDeadlock(Tick(201)))
        ));
    }

    #[test]
    fn fresh_checkpoint_resets_attempts() {
        let (mut s, mut state) = setup(ring5(), CheckpointResolver::new(5, 1), vec![car(0, 0, 2)]);
        s.handle_result(Tick(200), &mut state, CLEAR).unwrap();
        assert_eq!(s.handle_result(Tick(201), &mut state, STUCK).unwrap(), TickOutcome::Retry);
        s.handle_result(Tick(400), &mut state, CLEAR).unwrap();
        assert_eq!(s.handle_result(Tick(401), &mut state, STUCK).unwrap(), TickOutcome::Retry);
    }
}
