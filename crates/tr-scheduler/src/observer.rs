//! Scheduler observer trait for progress reporting and data collection.

use tr_core::{Tick, VehicleId};
use tr_network::Route;

use crate::Admission;

/// Callbacks invoked by the [`Scheduler`][crate::Scheduler] at key points.
///
/// All methods have default no-op implementations so implementors only need
/// to override what they care about.
///
/// # Example — release counter
///
/// ```rust,ignore
/// #[derive(Default)]
/// struct Releases(usize);
///
/// impl SchedulerObserver for Releases {
///     fn on_admission(&mut self, _tick: Tick, _vehicle: VehicleId, decision: Admission) {
///         if decision == Admission::Release {
///             self.0 += 1;
///         }
///     }
/// }
/// ```
pub trait SchedulerObserver {
    /// The all-pairs table was rebuilt and `assigned` traces were rewritten.
    fn on_routes_recomputed(&mut self, _tick: Tick, _assigned: usize) {}

    /// A garage admission was decided.
    fn on_admission(&mut self, _tick: Tick, _vehicle: VehicleId, _decision: Admission) {}

    /// `vehicle` was re-routed by the single-source rerouter.
    fn on_reroute(&mut self, _tick: Tick, _vehicle: VehicleId, _route: &Route) {}

    /// The resolver rolled the state back; `tick` will be retried.
    fn on_rollback(&mut self, _tick: Tick) {}
}

/// A [`SchedulerObserver`] that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl SchedulerObserver for NoopObserver {}
