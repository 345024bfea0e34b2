//! # Runtime configuration.
//!
//! [`Config`] centralizes the settings of the lifecycle engine: worker pool size,
//! jitter and settle windows, event bus capacity and shutdown grace.
//!
//! ## Sentinel values
//! - `max_concurrent = 0` → unlimited (no semaphore created)
//! - `grace = 0s` → do not wait for in-flight tasks on shutdown
//!
//! ## Environment overrides
//! [`Config::from_env`] starts from [`Config::default`] and applies:
//!
//! | Variable                       | Format        |
//! |--------------------------------|---------------|
//! | `MACHINEVISOR_MAX_CONCURRENT`  | integer       |
//! | `MACHINEVISOR_BUS_CAPACITY`    | integer       |
//! | `MACHINEVISOR_GRACE_SECS`      | integer       |
//! | `MACHINEVISOR_JITTER_MS`       | `min..max`    |
//! | `MACHINEVISOR_SETTLE_MS`       | `min..max`, `min > 0` |
//!
//! # Example
//! ```
//! use std::time::Duration;
//! use machinevisor::Config;
//!
//! let mut cfg = Config::default();
//! cfg.grace = Duration::from_secs(10);
//! cfg.max_concurrent = 4;
//!
//! assert_eq!(cfg.concurrency_limit(), Some(4));
//! ```

use std::time::Duration;

use crate::error::ConfigError;
use crate::policies::DelayWindow;

const ENV_MAX_CONCURRENT: &str = "MACHINEVISOR_MAX_CONCURRENT";
const ENV_BUS_CAPACITY: &str = "MACHINEVISOR_BUS_CAPACITY";
const ENV_GRACE_SECS: &str = "MACHINEVISOR_GRACE_SECS";
const ENV_JITTER_MS: &str = "MACHINEVISOR_JITTER_MS";
const ENV_SETTLE_MS: &str = "MACHINEVISOR_SETTLE_MS";

/// Configuration for the lifecycle engine.
///
/// ## Field semantics
/// - `max_concurrent`: task bodies allowed to run at once (`0` = unlimited)
/// - `jitter`: delay window before immediate actions take effect
/// - `settle`: delay window between the `STOPPED` and `RUNNING` commits of a restart
/// - `bus_capacity`: event bus ring buffer size (min 1; clamped by Bus)
/// - `grace`: how long shutdown waits for in-flight tasks before aborting them
#[derive(Clone, Debug)]
pub struct Config {
    /// Maximum number of task bodies executing simultaneously.
    ///
    /// Only execution is bounded: tasks waiting for their delay do not hold a slot.
    pub max_concurrent: usize,

    /// Jitter applied before every immediate action.
    pub jitter: DelayWindow,

    /// Settle pause between the two phases of a restart.
    pub settle: DelayWindow,

    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Slow listeners that lag behind more than `bus_capacity` messages skip older items.
    pub bus_capacity: usize,

    /// Maximum time to wait for in-flight tasks during shutdown.
    ///
    /// Scheduled tasks whose fire time lies beyond the grace window are aborted.
    pub grace: Duration,
}

impl Config {
    /// Returns the concurrency limit as an `Option`.
    ///
    /// - `None` → unlimited (no semaphore)
    /// - `Some(n)` → at most `n` concurrent task bodies
    #[inline]
    pub fn concurrency_limit(&self) -> Option<usize> {
        if self.max_concurrent == 0 {
            None
        } else {
            Some(self.max_concurrent)
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Reads overrides from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads overrides through `lookup` (key → value). Unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(v) = lookup(ENV_MAX_CONCURRENT) {
            cfg.max_concurrent = parse_int(ENV_MAX_CONCURRENT, &v)? as usize;
        }
        if let Some(v) = lookup(ENV_BUS_CAPACITY) {
            cfg.bus_capacity = parse_int(ENV_BUS_CAPACITY, &v)? as usize;
        }
        if let Some(v) = lookup(ENV_GRACE_SECS) {
            cfg.grace = Duration::from_secs(parse_int(ENV_GRACE_SECS, &v)?);
        }
        if let Some(v) = lookup(ENV_JITTER_MS) {
            cfg.jitter = parse_window(ENV_JITTER_MS, &v)?;
        }
        if let Some(v) = lookup(ENV_SETTLE_MS) {
            let settle = parse_window(ENV_SETTLE_MS, &v)?;
            if settle.min.is_zero() {
                return Err(ConfigError::Invalid {
                    key: ENV_SETTLE_MS,
                    value: v,
                    expected: "a millisecond range starting above zero like 5000..10000",
                });
            }
            cfg.settle = settle;
        }
        Ok(cfg)
    }
}

fn parse_int(key: &'static str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        key,
        value: value.to_string(),
        expected: "a non-negative integer",
    })
}

fn parse_window(key: &'static str, value: &str) -> Result<DelayWindow, ConfigError> {
    value.parse().map_err(|_| ConfigError::Invalid {
        key,
        value: value.to_string(),
        expected: "a millisecond range like 10000..15000",
    })
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `max_concurrent = 10`
    /// - `jitter = [10s, 15s)`
    /// - `settle = [5s, 10s)`
    /// - `bus_capacity = 1024`
    /// - `grace = 60s`
    fn default() -> Self {
        Self {
            max_concurrent: 10,
            jitter: DelayWindow::provisioning(),
            settle: DelayWindow::settle(),
            bus_capacity: 1024,
            grace: Duration::from_secs(60),
        }
    }
}
