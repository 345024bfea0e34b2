//! # Diagnostic event bus.
//!
//! Every runtime component reports what it did by publishing an [`Event`] here: the
//! scheduler (job flow, drain), the orchestrator (status changes, rejections, ignored
//! schedules) and subscriber workers (overflow, panics). One listener inside the service
//! forwards them to the subscriber set; tests and callers may attach more receivers via
//! [`MachineService::events`](crate::MachineService::events).
//!
//! ```text
//! Scheduler ─────┐
//! Orchestrator ──┼──► Bus (ring buffer, `capacity` slots) ──► service listener ──► SubscriberSet
//! Sub workers ───┘                                       └──► extra receivers
//! ```
//!
//! Publishing never waits. A receiver that falls more than `capacity` events behind
//! gets `RecvError::Lagged` and loses the oldest ones. Events published while nobody
//! listens are gone.

use tokio::sync::broadcast;

use super::event::Event;

/// Cloneable handle to the event channel.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a bus buffering up to `capacity` events (at least one).
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Sends `ev` to every current receiver.
    pub fn publish(&self, ev: Event) {
        if self.tx.send(ev).is_err() {
            tracing::trace!("event dropped; no receivers");
        }
    }

    /// Attaches a receiver that sees events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Number of attached receivers.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
