//! Delay scheduler: timed, one-shot jobs on a bounded worker pool.
//!
//! ## Contents
//! - [`Job`], [`JobFn`], [`JobRef`] unit of work and closure adapter
//! - [`Scheduler`] jittered / absolute / chained submission and graceful drain
//! - [`Submission`], [`IgnoredReason`] synchronous acknowledgement
//! - [`wait_for_shutdown_signal`] OS signal helper

mod job;
mod pool;
mod runner;
mod signal;

pub use job::{Job, JobFn, JobRef};
pub use pool::{IgnoredReason, Scheduler, Submission};
pub use signal::wait_for_shutdown_signal;
