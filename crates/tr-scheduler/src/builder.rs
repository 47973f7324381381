//! Fluent builder for constructing a [`Scheduler`].

use tr_network::{AllPairsRouter, EdgeBias, RoadNetwork, Rerouter};

use crate::{
    DeadlockResolver, GarageStats, NoopObserver, PriorityPolicy, Scheduler, SchedulerConfig, SchedulerError,
    SchedulerObserver, SchedulerResult,
};

/// Fluent builder for [`Scheduler<D, O>`].
///
/// # Required inputs
///
/// - [`RoadNetwork`] — the topology to route over
/// - `D: DeadlockResolver` — e.g. [`NoopResolver`][crate::NoopResolver] or
///   [`CheckpointResolver`][crate::CheckpointResolver]
///
/// # Optional inputs (have defaults)
///
/// | Method          | Default                       |
/// |-----------------|-------------------------------|
/// | `.config(c)`    | `SchedulerConfig::default()`  |
/// | `.observer(o)`  | `NoopObserver`                |
///
/// # Example
///
/// ```rust,ignore
/// let mut scheduler = SchedulerBuilder::new(network, CheckpointResolver::default())
///     .config(SchedulerConfig { update_interval: 4, ..Default::default() })
///     .build()?;
/// scheduler.initialize(&mut state)?;
/// ```
pub struct SchedulerBuilder<D: DeadlockResolver, O: SchedulerObserver = NoopObserver> {
    network:  RoadNetwork,
    resolver: D,
    config:   SchedulerConfig,
    observer: O,
}

impl<D: DeadlockResolver> SchedulerBuilder<D, NoopObserver> {
    pub fn new(network: RoadNetwork, resolver: D) -> Self {
        Self {
            network,
            resolver,
            config: SchedulerConfig::default(),
            observer: NoopObserver,
        }
    }
}

impl<D: DeadlockResolver, O: SchedulerObserver> SchedulerBuilder<D, O> {
    pub fn config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    /// Attach an observer, replacing the current one.
    pub fn observer<O2: SchedulerObserver>(self, observer: O2) -> SchedulerBuilder<D, O2> {
        SchedulerBuilder {
            network: self.network,
            resolver: self.resolver,
            config: self.config,
            observer,
        }
    }

    /// Validate the configuration and network, size the buffers, and return
    /// a scheduler ready for [`Scheduler::initialize`].
    pub fn build(self) -> SchedulerResult<Scheduler<D, O>> {
        self.config.validate()?;
        if self.network.road_count() == 0 {
            return Err(SchedulerError::Config("network has no roads".into()));
        }

        let n = self.network.intersection_count();
        let bias = EdgeBias::new(self.config.preload_weight, self.config.preload_cap);
        Ok(Scheduler {
            router:      AllPairsRouter::new(n),
            rerouter:    Rerouter::new(n),
            policy:      PriorityPolicy::default(),
            garage:      GarageStats::new(n),
            bias,
            config:      self.config,
            network:     self.network,
            resolver:    self.resolver,
            observer:    self.observer,
            initialized: false,
        })
    }
}
