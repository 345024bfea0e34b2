//! Timing policies.
//!
//! ## Contents
//! - [`DelayWindow`] uniform randomized delay in `[min, max)`
//!
//! ## Quick wiring
//! ```text
//! Config { jitter: DelayWindow, settle: DelayWindow }
//!      └─► scheduler::Scheduler uses:
//!           - jitter.sample() before every immediate action
//!           - settle.sample() between the two commits of a restart
//! ```
//!
//! ## Defaults
//! - jitter = `[10s, 15s)`
//! - settle = `[5s, 10s)`

mod delay;

pub use delay::DelayWindow;
