//! # Runtime events emitted by the scheduler and the lifecycle service.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Job events**: delayed task flow (scheduled, starting, completed, failed, panicked, aborted)
//! - **Lifecycle events**: machine outcomes (status changed, transition rejected, schedule ignored)
//! - **Shutdown events**: drain progress (requested, all stopped within grace, grace exceeded)
//! - **Subscriber events**: delivery problems (overflow, panicked)
//!
//! The [`Event`] struct carries metadata such as timestamps, job name, machine, status,
//! reasons, and delays.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use machinevisor::{Event, EventKind, MachineStatus};
//!
//! let ev = Event::new(EventKind::StatusChanged)
//!     .with_machine(7)
//!     .with_status(MachineStatus::Running);
//!
//! assert_eq!(ev.kind, EventKind::StatusChanged);
//! assert_eq!(ev.machine, Some(7));
//! assert_eq!(ev.status, Some(MachineStatus::Running));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::model::{MachineId, MachineStatus};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Job events ===
    /// A job was accepted and its timer armed.
    ///
    /// Sets: `job`, `delay_ms`, `machine` (if any)
    JobScheduled,

    /// The job's delay elapsed and it acquired a worker slot.
    ///
    /// Sets: `job`, `machine` (if any)
    JobStarting,

    /// The job body returned `Ok`.
    ///
    /// Sets: `job`, `machine` (if any)
    JobCompleted,

    /// The job body returned an error. The job is abandoned.
    ///
    /// Sets: `job`, `reason`
    JobFailed,

    /// The job body panicked. The job is abandoned.
    ///
    /// Sets: `job`, `reason` (panic message)
    JobPanicked,

    /// The job never ran because shutdown ran out of grace.
    ///
    /// Sets: `job`
    JobAborted,

    // === Lifecycle events ===
    /// A machine status was committed.
    ///
    /// Sets: `machine`, `status`
    StatusChanged,

    /// A transition was refused at execution time.
    ///
    /// Sets: `machine`, `action`, `reason`
    TransitionRejected,

    /// A scheduled request was dropped at submission (fire time already past).
    ///
    /// Sets: `machine`, `action`, `reason`
    ScheduleIgnored,

    // === Shutdown events ===
    /// Shutdown requested; new submissions are refused from now on.
    ShutdownRequested,

    /// All in-flight jobs finished within the grace period.
    AllStoppedWithin,

    /// Grace period exceeded; the remaining jobs were aborted.
    GraceExceeded,

    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets: `job` (subscriber name), `reason`
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `job` (subscriber name), `reason`
    SubscriberOverflow,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Job (or subscriber) name, if applicable.
    pub job: Option<Arc<str>>,
    /// Machine the event concerns.
    pub machine: Option<MachineId>,
    /// Committed status (for `StatusChanged`).
    pub status: Option<MachineStatus>,
    /// Requested action as submitted (`"START"`, `"Stop"`, ...).
    pub action: Option<Arc<str>>,
    /// Delay before the job fires, in milliseconds (compact).
    pub delay_ms: Option<u64>,
    /// Human-readable reason (errors, rejection causes, overflow details).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            job: None,
            machine: None,
            status: None,
            action: None,
            delay_ms: None,
            reason: None,
        }
    }

    #[inline]
    pub fn with_job(mut self, job: impl Into<Arc<str>>) -> Self {
        self.job = Some(job.into());
        self
    }

    #[inline]
    pub fn with_machine(mut self, id: MachineId) -> Self {
        self.machine = Some(id);
        self
    }

    #[inline]
    pub fn with_status(mut self, status: MachineStatus) -> Self {
        self.status = Some(status);
        self
    }

    #[inline]
    pub fn with_action(mut self, action: impl Into<Arc<str>>) -> Self {
        self.action = Some(action.into());
        self
    }

    /// Attaches a delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay_ms = Some(d.as_millis().min(u128::from(u64::MAX)) as u64);
        self
    }

    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Creates a status change notification.
    #[inline]
    pub fn status_changed(machine: MachineId, status: MachineStatus) -> Self {
        Event::new(EventKind::StatusChanged)
            .with_machine(machine)
            .with_status(status)
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_job(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_job(subscriber)
            .with_reason(info)
    }

    #[inline]
    pub fn is_subscriber_overflow(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberOverflow)
    }
}
