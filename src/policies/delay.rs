//! # Randomized delay windows.
//!
//! [`DelayWindow`] samples a delay uniformly from `[min, max)`. It models the two
//! randomized waits of the lifecycle engine:
//! - the **jitter** before an immediate action takes effect (provisioning latency);
//! - the **settle** pause between the two commits of a restart.
//!
//! A degenerate window (`max <= min`) always yields `min`, which is handy for tests.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use machinevisor::DelayWindow;
//!
//! let w = DelayWindow::from_millis(10_000, 15_000);
//! let d = w.sample();
//! assert!(d >= Duration::from_millis(10_000) && d < Duration::from_millis(15_000));
//!
//! let fixed = DelayWindow::fixed(Duration::from_secs(1));
//! assert_eq!(fixed.sample(), Duration::from_secs(1));
//! ```

use std::str::FromStr;
use std::time::Duration;

use rand::Rng;

/// Half-open window `[min, max)` of delays.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DelayWindow {
    /// Inclusive lower bound.
    pub min: Duration,
    /// Exclusive upper bound.
    pub max: Duration,
}

impl DelayWindow {
    pub const fn new(min: Duration, max: Duration) -> Self {
        Self { min, max }
    }

    pub const fn from_millis(min: u64, max: u64) -> Self {
        Self::new(Duration::from_millis(min), Duration::from_millis(max))
    }

    /// Window that always yields `d`.
    pub const fn fixed(d: Duration) -> Self {
        Self::new(d, d)
    }

    /// Jitter before immediate actions: `[10s, 15s)`.
    pub const fn provisioning() -> Self {
        Self::from_millis(10_000, 15_000)
    }

    /// Pause between the two commits of a restart: `[5s, 10s)`.
    pub const fn settle() -> Self {
        Self::from_millis(5_000, 10_000)
    }

    /// Samples a delay uniformly from `[min, max)` at millisecond resolution.
    pub fn sample(&self) -> Duration {
        let min_ms = self.min.as_millis() as u64;
        let max_ms = self.max.as_millis() as u64;
        if max_ms <= min_ms {
            return self.min;
        }
        let mut rng = rand::rng();
        Duration::from_millis(rng.random_range(min_ms..max_ms))
    }
}

/// Parses `"<min>..<max>"` in milliseconds, e.g. `"10000..15000"`.
impl FromStr for DelayWindow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (lo, hi) = s
            .split_once("..")
            .ok_or_else(|| format!("missing '..' in {s:?}"))?;
        let lo: u64 = lo.trim().parse().map_err(|e| format!("min: {e}"))?;
        let hi: u64 = hi.trim().parse().map_err(|e| format!("max: {e}"))?;
        if hi < lo {
            return Err(format!("max {hi} is below min {lo}"));
        }
        Ok(Self::from_millis(lo, hi))
    }
}
