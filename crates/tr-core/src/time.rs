//! Simulation time model.
//!
//! Time is a monotonically increasing `Tick` counter advanced once per
//! scheduling pass by the driver loop.  All schedule arithmetic is integer, so
//! runs are exactly reproducible.

use std::fmt;

/// An absolute simulation tick counter.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tick(pub u64);

impl Tick {
    pub const ZERO: Tick = Tick(0);

    /// Return the tick `n` steps after `self`.
    #[inline]
    pub fn offset(self, n: u64) -> Tick {
        Tick(self.0 + n)
    }

    /// The following tick.  Used when a vehicle's release is deferred.
    #[inline]
    pub fn next(self) -> Tick {
        Tick(self.0 + 1)
    }

    /// Ticks elapsed from `earlier` to `self`, or 0 if `earlier` is later.
    #[inline]
    pub fn since(self, earlier: Tick) -> u64 {
        self.0.saturating_sub(earlier.0)
    }

    /// `true` if this tick falls on an `interval`-tick cadence.  An interval
    /// of 0 never fires.
    #[inline]
    pub fn is_multiple_of(self, interval: u64) -> bool {
        interval != 0 && self.0 % interval == 0
    }

    /// Tick `n` steps before `self`, clamped at [`Tick::ZERO`].
    #[inline]
    pub fn saturating_sub(self, n: u64) -> Tick {
        Tick(self.0.saturating_sub(n))
    }
}

impl std::ops::Add<u64> for Tick {
    type Output = Tick;
    #[inline]
    fn add(self, rhs: u64) -> Tick {
        Tick(self.0 + rhs)
    }
}

impl std::ops::Sub for Tick {
    type Output = u64;
    /// # Panics
    /// Panics in debug mode if `rhs > self`.
    #[inline]
    fn sub(self, rhs: Tick) -> u64 {
        self.0 - rhs.0
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}
