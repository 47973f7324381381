//! ring — end-to-end run of the traffic-routing scheduler.
//!
//! Drives a fleet over a synthetic hub-and-ring network with a road-level
//! movement model, letting the scheduler route, admit, and recover from
//! gridlock through the checkpoint resolver.
//!
//! Run with `RUST_LOG=info cargo run -p ring` (or `debug` for per-tick detail).

mod mover;
mod network;

use std::time::Instant;

use anyhow::{Result, bail};
use log::{info, warn};

use tr_core::{IntersectionId, Tick, VehicleId};
use tr_fleet::{SimState, Vehicle};
use tr_network::{AllPairsRouter, LaneOccupancy, RoadNetwork, Route, WeightModel};
use tr_scheduler::{
    Admission, CheckpointResolver, DeadlockResolver, EventQueue, MovementOutcome, Scheduler, SchedulerBuilder,
    SchedulerConfig, SchedulerObserver, SimEvent, TickOutcome,
};

use network::{RING_SIZE, build_network};

// ── Constants ─────────────────────────────────────────────────────────────────

const VEHICLE_COUNT: usize = 120;
const MAX_TICKS:     u64   = 5_000;

// ── Observer ──────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Tally {
    released:   usize,
    deferred:   usize,
    vetoed:     usize,
    recomputes: usize,
    reroutes:   usize,
    rollbacks:  usize,
}

impl SchedulerObserver for Tally {
    fn on_routes_recomputed(&mut self, _tick: Tick, _assigned: usize) {
        self.recomputes += 1;
    }

    fn on_admission(&mut self, _tick: Tick, _vehicle: VehicleId, decision: Admission) {
        match decision {
            Admission::Release => self.released += 1,
            Admission::Defer => self.deferred += 1,
            Admission::Veto => self.vetoed += 1,
        }
    }

    fn on_reroute(&mut self, _tick: Tick, _vehicle: VehicleId, _route: &Route) {
        self.reroutes += 1;
    }

    fn on_rollback(&mut self, _tick: Tick) {
        self.rollbacks += 1;
    }
}

// ── Fleet ─────────────────────────────────────────────────────────────────────

fn build_fleet(ring: &[IntersectionId], hub: IntersectionId) -> Vec<Vehicle> {
    (0..VEHICLE_COUNT)
        .map(|i| {
            let origin = ring[i % RING_SIZE];
            let mut destination = ring[(i * 3 + 4) % RING_SIZE];
            if destination == origin || i % 9 == 0 {
                destination = hub;
            }
            let speed = 2 + (i % 4) as u32;
            let mut v = Vehicle::new(VehicleId(i as u32), origin, destination, speed).departing_at(Tick(i as u64 / 4));
            if i % 6 == 0 {
                v = v.with_priority();
            }
            if i % 10 == 3 {
                v = v.with_preset();
            }
            v
        })
        .collect()
}

/// Give pre-scheduled vehicles their fixed route: the cheapest one on the
/// empty network.
fn preset_routes(network: &RoadNetwork, state: &mut SimState) -> Result<()> {
    let empty = LaneOccupancy::new(network);
    let mut table = AllPairsRouter::new(network.intersection_count());
    table.recompute(network, &empty, &WeightModel::default(), None)?;
    for v in state.vehicles.iter_mut().filter(|v| v.vehicle.preset) {
        let route = table.route(network, v.vehicle.origin, v.vehicle.destination)?;
        v.trace.assign(&route.roads);
    }
    Ok(())
}

// ── Garage release ────────────────────────────────────────────────────────────

/// Ask the scheduler about every due vehicle and put the released ones on
/// their first road.  Returns how many left their garage.
fn release_due(
    scheduler: &mut Scheduler<CheckpointResolver, Tally>,
    state:     &mut SimState,
    tick:      Tick,
    events:    &mut EventQueue,
) -> Result<usize> {
    let due: Vec<VehicleId> = state.vehicles.iter().filter(|v| v.is_due(tick)).map(|v| v.id()).collect();
    let mut departed = 0;
    for id in due {
        if scheduler.admit(tick, state, id)? != Admission::Release {
            continue;
        }
        let v = state.vehicle(id);
        let lane = v
            .next_road()
            .and_then(|road| mover::free_lane(scheduler.network(), state, road, v.vehicle.origin));
        match lane {
            Some(lane) => {
                state.depart(scheduler.network(), id, lane, tick)?;
                events.push(SimEvent::Advanced { vehicle: id, from_road: None });
                departed += 1;
            }
            None => state.vehicle_mut(id).release_tick = tick.next(),
        }
    }
    Ok(departed)
}

// ── main ──────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    env_logger::init();

    let (network, ring, hub) = build_network()?;
    info!(
        "network: {} intersections, {} roads, {} cells",
        network.intersection_count(),
        network.road_count(),
        network.total_length()
    );

    let mut state = SimState::new(&network, build_fleet(&ring, hub))?;
    preset_routes(&network, &mut state)?;

    let config = SchedulerConfig { backup_interval: 50, ..Default::default() };
    let mut scheduler = SchedulerBuilder::new(network, CheckpointResolver::default())
        .config(config)
        .observer(Tally::default())
        .build()?;
    scheduler.initialize(&mut state)?;

    let started = Instant::now();
    let mut events = EventQueue::new();
    let mut tick = Tick::ZERO;

    while !state.is_complete() {
        if tick.0 > MAX_TICKS {
            bail!("{} vehicles still out after {MAX_TICKS} ticks", state.len() - arrived(&state));
        }

        scheduler.update(tick, &mut state)?;
        let departed = release_due(&mut scheduler, &mut state, tick, &mut events)?;
        let report = mover::step(scheduler.network(), &mut state, tick, &mut events)?;
        scheduler.handle_events(tick, &mut state, &mut events)?;

        let outcome = MovementOutcome { conflict: report.stalled(departed) };
        match scheduler.handle_result(tick, &mut state, outcome)? {
            TickOutcome::Continue => tick = tick.next(),
            TickOutcome::Retry => {
                let resume = scheduler.resolver().resume_tick().unwrap_or(tick);
                warn!("{tick}: gridlock, resuming from {resume}");
                events = EventQueue::new();
                tick = resume;
            }
        }
    }

    let t = scheduler.observer();
    info!("all {} vehicles arrived by {tick} in {:.2?}", state.len(), started.elapsed());
    info!(
        "admissions: {} released, {} deferred, {} vetoed",
        t.released, t.deferred, t.vetoed
    );
    info!(
        "{} table rebuilds, {} reroutes, {} rollbacks",
        t.recomputes, t.reroutes, t.rollbacks
    );
    Ok(())
}

fn arrived(state: &SimState) -> usize {
    state.vehicles.iter().filter(|v| v.reached_goal()).count()
}
