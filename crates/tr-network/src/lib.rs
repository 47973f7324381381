//! `tr-network` — road graph, congestion snapshot, and routing.
//!
//! # Crate layout
//!
//! | Module          | Contents                                                  |
//! |-----------------|-----------------------------------------------------------|
//! | [`network`]     | `RoadNetwork` arena, `RoadNetworkBuilder`, `RoadSpec`     |
//! | [`occupancy`]   | `LaneOccupancy` — per-lane queued vehicle counts          |
//! | [`weight`]      | `WeightModel` (congestion edge cost), `EdgeBias`          |
//! | [`route`]       | `Route`                                                   |
//! | [`all_pairs`]   | `AllPairsRouter` — Floyd–Warshall table + path rebuild    |
//! | [`rerouter`]    | `Rerouter` — restricted single-source Dijkstra            |
//! | [`error`]       | `NetworkError`, `NetworkResult<T>`                        |
//!
//! Both routers price edges through the same [`WeightModel::edge_weight`], so
//! a trace built by one can be extended by the other mid-route.
//!
//! # Feature flags
//!
//! | Flag    | Effect                                                       |
//! |---------|--------------------------------------------------------------|
//! | `serde` | Derives `Serialize`/`Deserialize` on public config types.    |

pub mod all_pairs;
pub mod error;
pub mod network;
pub mod occupancy;
pub mod rerouter;
pub mod route;
pub mod weight;


pub use all_pairs::AllPairsRouter;
pub use error::{NetworkError, NetworkResult};
pub use network::{Direction, Intersection, Road, RoadNetwork, RoadNetworkBuilder, RoadSpec};
pub use occupancy::LaneOccupancy;
pub use rerouter::{RerouteRequest, Rerouter};
pub use route::Route;
pub use weight::{EdgeBias, WeightModel};
