//! `tr-fleet` — vehicles, route traces, and the shared simulation state.
//!
//! # Crate layout
//!
//! | Module      | Contents                                                    |
//! |-------------|-------------------------------------------------------------|
//! | [`vehicle`] | `Vehicle` (static), `SimVehicle` (live), `Location`         |
//! | [`trace`]   | `RouteTrace` — roads + cursor                               |
//! | [`state`]   | `SimState` — all vehicles plus `LaneOccupancy`              |
//! | [`error`]   | `FleetError`, `FleetResult<T>`                              |
//!
//! The movement simulator owns `SimState` and lends it to the scheduler by
//! `&mut` for the duration of each call.

pub mod error;
pub mod state;
pub mod trace;
pub mod vehicle;


pub use error::{FleetError, FleetResult};
pub use state::SimState;
pub use trace::RouteTrace;
pub use vehicle::{Location, SimVehicle, Vehicle};
