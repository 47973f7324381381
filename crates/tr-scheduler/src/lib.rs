//! `tr-scheduler` — route assignment and admission for a tick-based traffic
//! simulation.
//!
//! # Per-tick flow
//!
//! ```text
//! update          — (on cadence) rebuild the congestion-weighted all-pairs
//!                   table and rewrite every eligible vehicle's trace
//! admit           — per waiting vehicle: Release / Defer / Veto
//! (movement)      — the external simulator moves vehicles, queues SimEvents
//! handle_events   — Protected-Set upkeep, reroute ahead of jammed roads
//! handle_result   — conflict → resolver rollback (Retry) or fatal error;
//!                   otherwise periodic checkpoint
//! ```
//!
//! # Crate layout
//!
//! | Module        | Contents                                                  |
//! |---------------|-----------------------------------------------------------|
//! | [`scheduler`] | `Scheduler<D, O>`, `MovementOutcome`, `TickOutcome`       |
//! | [`builder`]   | `SchedulerBuilder`                                        |
//! | [`config`]    | `SchedulerConfig`, `PolicyToggles`                        |
//! | [`admission`] | `Admission`, `AdmissionContext`                           |
//! | [`policy`]    | `PriorityPolicy`, force-release cohort, travel estimates  |
//! | [`garage`]    | `GarageStats`                                             |
//! | [`deadlock`]  | `DeadlockResolver`, `ConstrainedReroute`, resolvers       |
//! | [`events`]    | `SimEvent`, `EventQueue`                                  |
//! | [`observer`]  | `SchedulerObserver`, `NoopObserver`                       |
//! | [`error`]     | `SchedulerError`, `SchedulerResult<T>`                    |
//!
//! # Feature flags
//!
//! | Flag    | Effect                                                     |
//! |---------|------------------------------------------------------------|
//! | `serde` | Derives `Serialize`/`Deserialize` on the configuration.    |

pub mod admission;
pub mod builder;
pub mod config;
pub mod deadlock;
pub mod error;
pub mod events;
pub mod garage;
pub mod observer;
pub mod policy;
mod reroute;
pub mod scheduler;

#[cfg(test)]
mod tests;

pub use admission::{Admission, AdmissionContext};
pub use builder::SchedulerBuilder;
pub use config::{PolicyToggles, SchedulerConfig};
pub use deadlock::{CheckpointResolver, ConstrainedReroute, DeadlockResolver, NoopResolver};
pub use error::{SchedulerError, SchedulerResult};
pub use events::{EventQueue, SimEvent};
pub use garage::GarageStats;
pub use observer::{NoopObserver, SchedulerObserver};
pub use policy::PriorityPolicy;
pub use scheduler::{MovementOutcome, Scheduler, TickOutcome};
