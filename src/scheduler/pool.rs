//! # Scheduler: delayed, bounded-concurrency job execution.
//!
//! The [`Scheduler`] arms one timer per submitted job and runs the body once the
//! delay elapses, with at most `max_concurrent` bodies executing at a time.
//!
//! ## Submission modes
//! - **jittered**: delay drawn from the configured jitter window (immediate actions)
//! - **absolute**: delay = `at - now`; dropped when not strictly positive
//! - **chained**: follow-up after the settle window, submitted from inside a running job
//!
//! ## Architecture
//! ```text
//! submit_*() ──► TaskTracker::spawn(run_job(job, delay))
//!                    └─► sleep(delay) ─► Semaphore permit ─► job.run() ─► Bus events
//!
//! shutdown()
//!   ├─► closed = true            (new submissions → SubmitError::Closed)
//!   ├─► publish ShutdownRequested
//!   ├─► tracker.close(); timeout(grace, tracker.wait())
//!   │      ├─ Ok  → publish AllStoppedWithin
//!   │      └─ Err → abort.cancel(); publish GraceExceeded; Err(GraceExceeded)
//! ```
//!
//! ## Rules
//! - Submission never blocks the caller.
//! - No cancellation of individual jobs; only a forced abort after the grace period.
//! - Chained continuations are accepted while draining so a restart in progress can finish.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use super::job::JobRef;
use super::runner::{run_job, tagged};
use crate::config::Config;
use crate::error::{RuntimeError, SubmitError};
use crate::events::{Bus, Event, EventKind};
use crate::policies::DelayWindow;

/// Floor for the pause between the two commits of a restart.
pub(crate) const MIN_SETTLE: Duration = Duration::from_millis(1);

/// Synchronous acknowledgement of a submission.
///
/// Says nothing about the eventual outcome of the job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// A timer was armed; the job fires after `delay`.
    Queued { delay: Duration },
    /// Nothing was submitted.
    Ignored(IgnoredReason),
}

impl Submission {
    pub fn is_queued(&self) -> bool {
        matches!(self, Submission::Queued { .. })
    }
}

/// Why a submission was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoredReason {
    /// The requested fire time was not in the future.
    PastDue,
}

impl IgnoredReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            IgnoredReason::PastDue => "past_due",
        }
    }
}

pub(super) struct Shared {
    pub(super) semaphore: Option<Arc<Semaphore>>,
    pub(super) abort: CancellationToken,
    pub(super) bus: Bus,
    tracker: TaskTracker,
    closed: AtomicBool,
    jitter: DelayWindow,
    settle: DelayWindow,
    grace: Duration,
}

/// Delayed job executor with a bounded worker pool.
///
/// Cheap to clone; clones share timers, pool and shutdown state.
/// Submitting requires a running Tokio runtime.
#[derive(Clone)]
pub struct Scheduler {
    shared: Arc<Shared>,
}

impl Scheduler {
    /// Creates a scheduler publishing job events to `bus`.
    pub fn new(cfg: &Config, bus: Bus) -> Self {
        let semaphore = cfg
            .concurrency_limit()
            .map(|n| Arc::new(Semaphore::new(n)));
        Self {
            shared: Arc::new(Shared {
                semaphore,
                abort: CancellationToken::new(),
                bus,
                tracker: TaskTracker::new(),
                closed: AtomicBool::new(false),
                jitter: cfg.jitter,
                settle: cfg.settle,
                grace: cfg.grace,
            }),
        }
    }

    /// Runs `job` once after `delay`.
    pub fn submit_after(&self, delay: Duration, job: JobRef) -> Result<(), SubmitError> {
        if self.is_closed() {
            return Err(SubmitError::Closed);
        }
        self.spawn(delay, job);
        Ok(())
    }

    /// Runs `job` after a delay drawn from the jitter window; returns that delay.
    pub fn submit_jittered(&self, job: JobRef) -> Result<Duration, SubmitError> {
        let delay = self.shared.jitter.sample();
        self.submit_after(delay, job)?;
        Ok(delay)
    }

    /// Runs `job` at wall-clock time `at`.
    ///
    /// Returns [`Submission::Ignored`] without arming anything when `at` is not after now.
    pub fn submit_at(&self, at: DateTime<Utc>, job: JobRef) -> Result<Submission, SubmitError> {
        if self.is_closed() {
            return Err(SubmitError::Closed);
        }
        match delay_until(at, Utc::now()) {
            Some(delay) => {
                self.spawn(delay, job);
                Ok(Submission::Queued { delay })
            }
            None => {
                debug!(job = job.name(), %at, "fire time already passed; not submitted");
                Ok(Submission::Ignored(IgnoredReason::PastDue))
            }
        }
    }

    /// Chains `job` after a delay drawn from the settle window; returns that delay.
    ///
    /// Accepted while draining. The delay is never shorter than [`MIN_SETTLE`].
    pub(crate) fn chain_settle(&self, job: JobRef) -> Duration {
        let delay = self.shared.settle.sample().max(MIN_SETTLE);
        self.spawn(delay, job);
        delay
    }

    /// Jobs armed or running.
    pub fn pending(&self) -> usize {
        self.shared.tracker.len()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    /// Stops accepting submissions and drains in-flight jobs within the grace period.
    ///
    /// Jobs still armed or running when the grace period ends are aborted and
    /// [`RuntimeError::GraceExceeded`] is returned.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        let shared = &self.shared;
        shared.closed.store(true, Ordering::Release);
        shared.bus.publish(Event::new(EventKind::ShutdownRequested));
        info!(pending = self.pending(), grace = ?shared.grace, "scheduler draining");

        shared.tracker.close();
        let grace = shared.grace;
        match tokio::time::timeout(grace, shared.tracker.wait()).await {
            Ok(()) => {
                shared.bus.publish(Event::new(EventKind::AllStoppedWithin));
                info!("all jobs finished within grace");
                Ok(())
            }
            Err(_) => {
                let pending = self.pending();
                shared.abort.cancel();
                shared.bus.publish(
                    Event::new(EventKind::GraceExceeded).with_reason(format!("pending={pending}")),
                );
                warn!(pending, ?grace, "grace exceeded; aborting remaining jobs");
                Err(RuntimeError::GraceExceeded { grace, pending })
            }
        }
    }

    fn spawn(&self, delay: Duration, job: JobRef) {
        self.shared
            .bus
            .publish(tagged(Event::new(EventKind::JobScheduled), &job).with_delay(delay));
        debug!(job = job.name(), ?delay, "job scheduled");
        self.shared
            .tracker
            .spawn(run_job(job, delay, Arc::clone(&self.shared)));
    }
}

/// Strictly positive time from `now` until `at`, if any.
pub(crate) fn delay_until(at: DateTime<Utc>, now: DateTime<Utc>) -> Option<Duration> {
    (at - now).to_std().ok().filter(|d| !d.is_zero())
}
