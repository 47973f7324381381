//! Road network representation and builder.
//!
//! # Data layout
//!
//! The graph is an **arena**: `intersections` and `roads` are plain `Vec`s
//! indexed by [`IntersectionId`] and [`RoadId`].  Every intersection owns four
//! directional slots (`North`, `East`, `South`, `West`); a slot holds the id of
//! the road attached on that side, or `RoadId::INVALID`.
//!
//! Slot order is also the **scan order** used everywhere a road must be
//! picked among several candidates (path materialization in both routers).
//! When two parallel roads connect the same pair of intersections, the one in
//! the earlier slot wins.  The choice is an arbitrary deterministic tie-break.
//!
//! A two-way road is a single `RoadId` usable from either endpoint.  A
//! one-way road can only be entered at `from`.

use tr_core::{IntersectionId, RoadId};

use crate::{NetworkError, NetworkResult};

// ── Direction ─────────────────────────────────────────────────────────────────

/// Side of an intersection a road is attached to.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    /// Fixed scan order.
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

// ── Intersection / Road ───────────────────────────────────────────────────────

/// A graph node with up to four attached roads.
#[derive(Clone, Debug)]
pub struct Intersection {
    pub id: IntersectionId,
    /// Road attached on each side, indexed by [`Direction::index`].
    pub slots: [RoadId; 4],
}

impl Intersection {
    /// The road attached on side `dir`, if any.
    #[inline]
    pub fn road(&self, dir: Direction) -> Option<RoadId> {
        let r = self.slots[dir.index()];
        r.is_valid().then_some(r)
    }

    /// Attached roads in scan order.
    pub fn roads(&self) -> impl Iterator<Item = RoadId> + '_ {
        self.slots.iter().copied().filter(|r| r.is_valid())
    }
}

/// A road segment between two intersections.
#[derive(Clone, Debug, PartialEq)]
pub struct Road {
    pub id:          RoadId,
    pub from:        IntersectionId,
    pub to:          IntersectionId,
    /// Lanes per direction.
    pub lanes:       u32,
    /// Length in cells.
    pub length:      u32,
    /// Maximum speed in cells per tick.
    pub speed_limit: u32,
    pub two_way:     bool,
}

impl Road {
    /// `true` if a vehicle at `x` may drive onto this road.
    #[inline]
    pub fn can_start_from(&self, x: IntersectionId) -> bool {
        self.from == x || (self.two_way && self.to == x)
    }

    /// `true` if this road can deliver a vehicle to `x`.
    #[inline]
    pub fn can_reach(&self, x: IntersectionId) -> bool {
        self.to == x || (self.two_way && self.from == x)
    }

    #[inline]
    pub fn touches(&self, x: IntersectionId) -> bool {
        self.from == x || self.to == x
    }

    /// The endpoint opposite `x`.
    #[inline]
    pub fn peer(&self, x: IntersectionId) -> IntersectionId {
        debug_assert!(self.touches(x), "{} does not touch {}", self.id, x);
        if self.from == x { self.to } else { self.from }
    }
}

// ── RoadNetwork ───────────────────────────────────────────────────────────────

/// Immutable road topology.
///
/// Fields are `pub` for indexed access on hot paths.  Do not construct
/// directly; use [`RoadNetworkBuilder`].
#[derive(Clone, Debug)]
pub struct RoadNetwork {
    pub intersections: Vec<Intersection>,
    pub roads:         Vec<Road>,
    /// Number of roads that can be entered from each intersection.
    usable_out:        Vec<u32>,
}

impl RoadNetwork {
    pub fn intersection_count(&self) -> usize {
        self.intersections.len()
    }

    pub fn road_count(&self) -> usize {
        self.roads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intersections.is_empty()
    }

    #[inline]
    pub fn road(&self, id: RoadId) -> &Road {
        &self.roads[id.index()]
    }

    #[inline]
    pub fn intersection(&self, id: IntersectionId) -> &Intersection {
        &self.intersections[id.index()]
    }

    pub fn contains(&self, id: IntersectionId) -> bool {
        id.index() < self.intersections.len()
    }

    // ── Graph traversal ───────────────────────────────────────────────────

    /// Roads attached to `x` in scan order, usable or not.
    #[inline]
    pub fn roads_at(&self, x: IntersectionId) -> impl Iterator<Item = RoadId> + '_ {
        self.intersections[x.index()].roads()
    }

    /// Roads a vehicle at `x` may drive onto, in scan order.
    #[inline]
    pub fn out_roads(&self, x: IntersectionId) -> impl Iterator<Item = RoadId> + '_ {
        self.roads_at(x).filter(move |&r| self.roads[r.index()].can_start_from(x))
    }

    #[inline]
    pub fn can_start_from(&self, road: RoadId, x: IntersectionId) -> bool {
        self.road(road).can_start_from(x)
    }

    #[inline]
    pub fn can_reach(&self, road: RoadId, x: IntersectionId) -> bool {
        self.road(road).can_reach(x)
    }

    #[inline]
    pub fn peer(&self, road: RoadId, x: IntersectionId) -> IntersectionId {
        self.road(road).peer(x)
    }

    /// Number of roads that can be entered from `x` (0–4).
    #[inline]
    pub fn usable_out_degree(&self, x: IntersectionId) -> u32 {
        self.usable_out[x.index()]
    }

    /// First road in scan order at `a` that departs `a` and arrives at `b`.
    ///
    /// This is the tie-break used when parallel roads connect the same pair.
    pub fn road_between(&self, a: IntersectionId, b: IntersectionId) -> Option<RoadId> {
        self.roads_at(a).find(|&r| {
            let road = &self.roads[r.index()];
            road.can_start_from(a) && road.can_reach(b) && road.peer(a) == b
        })
    }

    /// Sum of all road lengths.
    pub fn total_length(&self) -> u64 {
        self.roads.iter().map(|r| r.length as u64).sum()
    }
}

// ── RoadSpec ──────────────────────────────────────────────────────────────────

/// Description of a road handed to the builder.
///
/// ```
/// use tr_core::IntersectionId;
/// use tr_network::RoadSpec;
///
/// let spec = RoadSpec::two_way(IntersectionId(0), IntersectionId(1), 10)
///     .lanes(2)
///     .speed_limit(5);
/// assert_eq!(spec.lanes, 2);
/// ```
#[derive(Clone, Debug)]
pub struct RoadSpec {
    pub from:        IntersectionId,
    pub to:          IntersectionId,
    pub length:      u32,
    pub lanes:       u32,
    pub speed_limit: u32,
    pub two_way:     bool,
}

impl RoadSpec {
    /// Single-lane road usable in both directions, no speed limit.
    pub fn two_way(from: IntersectionId, to: IntersectionId, length: u32) -> Self {
        Self { from, to, length, lanes: 1, speed_limit: u32::MAX, two_way: true }
    }

    /// Single-lane road usable only from `from` to `to`.
    pub fn one_way(from: IntersectionId, to: IntersectionId, length: u32) -> Self {
        Self { two_way: false, ..Self::two_way(from, to, length) }
    }

    pub fn lanes(mut self, lanes: u32) -> Self {
        self.lanes = lanes;
        self
    }

    pub fn speed_limit(mut self, speed_limit: u32) -> Self {
        self.speed_limit = speed_limit;
        self
    }
}

// ── RoadNetworkBuilder ────────────────────────────────────────────────────────

/// Construct a [`RoadNetwork`] incrementally, then call [`build`](Self::build).
///
/// Roads added with [`add_road`](Self::add_road) take the first free slot at
/// each endpoint in scan order; [`add_road_at`](Self::add_road_at) pins them.
/// Pinned roads are placed first, so mixing both styles is safe.
///
/// # Example
///
/// ```
/// use tr_network::{RoadNetworkBuilder, RoadSpec};
///
/// let mut b = RoadNetworkBuilder::new();
/// let a = b.add_intersection();
/// let c = b.add_intersection();
/// b.add_road(RoadSpec::two_way(a, c, 12).lanes(2));
/// let net = b.build().unwrap();
/// assert_eq!(net.intersection_count(), 2);
/// assert_eq!(net.road_count(), 1);
/// assert_eq!(net.road_between(c, a), net.road_between(a, c));
/// ```
#[derive(Default)]
pub struct RoadNetworkBuilder {
    intersection_count: usize,
    raw_roads:          Vec<RawRoad>,
}

struct RawRoad {
    spec:  RoadSpec,
    /// `(from_slot, to_slot)` when pinned with `add_road_at`.
    slots: Option<(Direction, Direction)>,
}

impl RoadNetworkBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an intersection and return its id (sequential from 0).
    pub fn add_intersection(&mut self) -> IntersectionId {
        let id = IntersectionId(self.intersection_count as u32);
        self.intersection_count += 1;
        id
    }

    /// Add `n` intersections, returning their ids in order.
    pub fn add_intersections(&mut self, n: usize) -> Vec<IntersectionId> {
        (0..n).map(|_| self.add_intersection()).collect()
    }

    /// Add a road; slots are assigned at build time.
    pub fn add_road(&mut self, spec: RoadSpec) -> RoadId {
        self.push(spec, None)
    }

    /// Add a road attached on explicit sides of its endpoints.
    pub fn add_road_at(&mut self, spec: RoadSpec, from_slot: Direction, to_slot: Direction) -> RoadId {
        self.push(spec, Some((from_slot, to_slot)))
    }

    fn push(&mut self, spec: RoadSpec, slots: Option<(Direction, Direction)>) -> RoadId {
        let id = RoadId(self.raw_roads.len() as u32);
        self.raw_roads.push(RawRoad { spec, slots });
        id
    }

    pub fn intersection_count(&self) -> usize {
        self.intersection_count
    }

    pub fn road_count(&self) -> usize {
        self.raw_roads.len()
    }

    /// Validate every road, lay out the slots, and produce a [`RoadNetwork`].
    pub fn build(self) -> NetworkResult<RoadNetwork> {
        let n = self.intersection_count;
        let mut intersections: Vec<Intersection> = (0..n)
            .map(|i| Intersection { id: IntersectionId(i as u32), slots: [RoadId::INVALID; 4] })
            .collect();

        let roads: Vec<Road> = self
            .raw_roads
            .iter()
            .enumerate()
            .map(|(i, raw)| {
                let id = RoadId(i as u32);
                validate(id, &raw.spec, n)?;
                Ok(Road {
                    id,
                    from:        raw.spec.from,
                    to:          raw.spec.to,
                    lanes:       raw.spec.lanes,
                    length:      raw.spec.length,
                    speed_limit: raw.spec.speed_limit,
                    two_way:     raw.spec.two_way,
                })
            })
            .collect::<NetworkResult<_>>()?;

        // Pinned roads first, then fill remaining slots in scan order.
        for road in &roads {
            if let Some((from_slot, to_slot)) = self.raw_roads[road.id.index()].slots {
                pin(&mut intersections[road.from.index()], from_slot, road.id)?;
                pin(&mut intersections[road.to.index()], to_slot, road.id)?;
            }
        }
        for road in &roads {
            if self.raw_roads[road.id.index()].slots.is_none() {
                fill(&mut intersections[road.from.index()], road.id)?;
                fill(&mut intersections[road.to.index()], road.id)?;
            }
        }

        let usable_out = intersections
            .iter()
            .map(|x| {
                x.roads()
                    .filter(|r| roads[r.index()].can_start_from(x.id))
                    .count() as u32
            })
            .collect();

        Ok(RoadNetwork { intersections, roads, usable_out })
    }
}

fn validate(id: RoadId, spec: &RoadSpec, n: usize) -> NetworkResult<()> {
    for x in [spec.from, spec.to] {
        if x.index() >= n {
            return Err(NetworkError::IntersectionNotFound(x));
        }
    }
    let reason = if spec.from == spec.to {
        Some("both endpoints are the same intersection")
    } else if spec.lanes == 0 {
        Some("lane count must be at least 1")
    } else if spec.length == 0 {
        Some("length must be at least 1")
    } else if spec.speed_limit == 0 {
        Some("speed limit must be at least 1")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(NetworkError::InvalidRoad { road: id, reason }),
        None => Ok(()),
    }
}

fn pin(x: &mut Intersection, slot: Direction, road: RoadId) -> NetworkResult<()> {
    let cell = &mut x.slots[slot.index()];
    if cell.is_valid() {
        return Err(NetworkError::SlotTaken { intersection: x.id, slot });
    }
    *cell = road;
    Ok(())
}

fn fill(x: &mut Intersection, road: RoadId) -> NetworkResult<()> {
    let id = x.id;
    let cell = x
        .slots
        .iter_mut()
        .find(|r| !r.is_valid())
        .ok_or(NetworkError::SlotsExhausted(id))?;
    *cell = road;
    Ok(())
}
