//! Criterion benchmarks for the route-table rebuild.
//!
//! Grid networks of 10×10, 20×20 and 30×30 intersections (two-lane roads of
//! length 10), loaded with one vehicle per road:
//!   - recompute:  Floyd–Warshall over the congestion weights alone
//!   - update:     a full scheduler update, table rebuild plus rewriting
//!                 every vehicle's trace
//!
//! Run with: cargo bench -p tr-scheduler --bench all_pairs

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use tr_core::{IntersectionId, Tick, VehicleId};
use tr_fleet::{SimState, Vehicle};
use tr_network::{AllPairsRouter, LaneOccupancy, RoadNetwork, RoadNetworkBuilder, RoadSpec, WeightModel};
use tr_scheduler::{NoopResolver, SchedulerBuilder};

// ---------------------------------------------------------------------------
// Fixture
// ---------------------------------------------------------------------------

fn grid(side: usize) -> RoadNetwork {
    let mut b = RoadNetworkBuilder::new();
    let x = b.add_intersections(side * side);
    for row in 0..side {
        for col in 0..side {
            let here = x[row * side + col];
            if col + 1 < side {
                b.add_road(RoadSpec::two_way(here, x[row * side + col + 1], 10).lanes(2));
            }
            if row + 1 < side {
                b.add_road(RoadSpec::two_way(here, x[(row + 1) * side + col], 10).lanes(2));
            }
        }
    }
    b.build().expect("grid network")
}

/// One vehicle per road, spread across corner-to-corner style trips.
fn fleet(network: &RoadNetwork) -> Vec<Vehicle> {
    let n = network.intersection_count();
    (0..network.road_count())
        .map(|i| {
            let origin = IntersectionId((i % n) as u32);
            let destination = IntersectionId(((i * 7 + n / 2) % n) as u32);
            let destination = if destination == origin { IntersectionId(((i + 1) % n) as u32) } else { destination };
            Vehicle::new(VehicleId(i as u32), origin, destination, 3)
        })
        .collect()
}

/// Queue a few vehicles on every other road so weights differ.
fn loaded(network: &RoadNetwork) -> LaneOccupancy {
    let mut occ = LaneOccupancy::new(network);
    for road in network.roads.iter().step_by(2) {
        occ.set(road.id, road.from, 0, 3);
    }
    occ
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_recompute(c: &mut Criterion) {
    let mut group = c.benchmark_group("recompute");
    for side in [10, 20, 30] {
        let network = grid(side);
        let occ = loaded(&network);
        let model = WeightModel::default();
        let mut router = AllPairsRouter::new(network.intersection_count());
        group.bench_with_input(BenchmarkId::from_parameter(side * side), &side, |b, _| {
            b.iter(|| {
                router.recompute(&network, &occ, &model, None).expect("relax");
                black_box(router.distance(IntersectionId(0), IntersectionId((side * side - 1) as u32)))
            })
        });
    }
    group.finish();
}

fn bench_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("update");
    group.sample_size(20);
    for side in [10, 20, 30] {
        let network = grid(side);
        let mut state = SimState::new(&network, fleet(&network)).expect("fleet");
        state.occupancy = loaded(&network);
        let mut scheduler = SchedulerBuilder::new(network, NoopResolver).build().expect("scheduler");
        scheduler.initialize(&mut state).expect("initialize");
        group.bench_with_input(BenchmarkId::from_parameter(side * side), &side, |b, _| {
            b.iter(|| scheduler.update(black_box(Tick::ZERO), &mut state).expect("update"))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_recompute, bench_update);
criterion_main!(benches);
