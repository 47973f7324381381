//! `tr-core` — foundational types for the traffic-routing scheduler.
//!
//! Every other `tr-*` crate depends on this one.  It has no `tr-*`
//! dependencies and no required external ones (only optional `serde`).
//!
//! # What lives here
//!
//! | Module    | Contents                                      |
//! |-----------|-----------------------------------------------|
//! | [`ids`]   | `IntersectionId`, `RoadId`, `VehicleId`       |
//! | [`time`]  | `Tick`                                        |
//!
//! # Feature flags
//!
//! | Flag    | Effect                                                     |
//! |---------|------------------------------------------------------------|
//! | `serde` | Adds `Serialize`/`Deserialize` to all public types.        |

pub mod ids;
pub mod time;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use ids::{IntersectionId, RoadId, VehicleId};
pub use time::Tick;
