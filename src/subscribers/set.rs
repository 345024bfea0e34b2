//! # Subscriber fan-out with a lossless status lane.
//!
//! [`SubscriberSet`] hands events to every registered [`Subscribe`] implementation,
//! each served by its own worker task. A worker reads from two queues:
//!
//! ```text
//! deliver(StatusChanged) ──► status lane (unbounded) ─┐
//!                                                     ├─► worker ─► on_event()
//! emit(diagnostic)       ──► diag lane (bounded)   ───┘      └─► panic ─► SubscriberPanicked
//! ```
//!
//! ## Lanes
//! - **status**: committed status changes. Never dropped; a slow subscriber grows its own
//!   backlog instead. The worker always drains this lane first.
//! - **diagnostics**: job flow, rejections, shutdown. Bounded by
//!   [`Subscribe::queue_capacity`]; when full the event is dropped for that subscriber and
//!   `SubscriberOverflow` goes to the bus.
//!
//! Neither call blocks the caller. Each lane is FIFO per subscriber; there is no ordering
//! between lanes or between subscribers.
//!
//! A panic inside `on_event` is caught with `AssertUnwindSafe`, so state shared with the
//! panicking subscriber may be left half-updated.

use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, warn};

use crate::events::{Bus, Event};
use crate::subscribers::Subscribe;

struct Lanes {
    name: &'static str,
    status: mpsc::UnboundedSender<Arc<Event>>,
    diag: mpsc::Sender<Arc<Event>>,
}

/// Per-subscriber workers fed by a lossless status lane and a bounded diagnostic lane.
pub struct SubscriberSet {
    lanes: Vec<Lanes>,
    workers: Vec<JoinHandle<()>>,
    bus: Bus,
}

impl SubscriberSet {
    /// Spawns one worker per subscriber. Panics and overflows are reported on `bus`.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>, bus: Bus) -> Self {
        let mut lanes = Vec::with_capacity(subs.len());
        let mut workers = Vec::with_capacity(subs.len());

        for sub in subs {
            let (status_tx, status_rx) = mpsc::unbounded_channel();
            let (diag_tx, diag_rx) = mpsc::channel(sub.queue_capacity().max(1));
            lanes.push(Lanes {
                name: sub.name(),
                status: status_tx,
                diag: diag_tx,
            });
            workers.push(tokio::spawn(serve(sub, status_rx, diag_rx, bus.clone())));
        }
        Self {
            lanes,
            workers,
            bus,
        }
    }

    pub fn len(&self) -> usize {
        self.lanes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lanes.is_empty()
    }

    /// Queues a status change for every subscriber. Never drops it.
    pub fn deliver(&self, event: Event) {
        let event = Arc::new(event);
        for lane in &self.lanes {
            if lane.status.send(Arc::clone(&event)).is_err() {
                warn!(subscriber = lane.name, seq = event.seq, "subscriber worker gone; status change not delivered");
            }
        }
    }

    /// Offers a diagnostic event to every subscriber; full queues drop it.
    ///
    /// `SubscriberOverflow` events that overflow themselves are not re-published.
    pub fn emit(&self, event: &Event) {
        let event = Arc::new(event.clone());
        let quiet = event.is_subscriber_overflow();

        for lane in &self.lanes {
            let reason = match lane.diag.try_send(Arc::clone(&event)) {
                Ok(()) => continue,
                Err(mpsc::error::TrySendError::Full(_)) => "full",
                Err(mpsc::error::TrySendError::Closed(_)) => "closed",
            };
            if !quiet {
                warn!(subscriber = lane.name, seq = event.seq, reason, "diagnostic event dropped");
                self.bus.publish(Event::subscriber_overflow(lane.name, reason));
            }
        }
    }

    /// Closes both lanes and waits until every worker has handled what was queued.
    pub async fn shutdown(self) {
        drop(self.lanes);
        for worker in self.workers {
            let _ = worker.await;
        }
    }
}

async fn serve(
    sub: Arc<dyn Subscribe>,
    mut status: mpsc::UnboundedReceiver<Arc<Event>>,
    mut diag: mpsc::Receiver<Arc<Event>>,
    bus: Bus,
) {
    loop {
        let ev = tokio::select! {
            biased;
            Some(ev) = status.recv() => ev,
            Some(ev) = diag.recv() => ev,
            else => break,
        };
        let handled = std::panic::AssertUnwindSafe(sub.on_event(&ev))
            .catch_unwind()
            .await;
        if let Err(panic) = handled {
            let info = panic_message(panic.as_ref());
            error!(subscriber = sub.name(), %info, seq = ev.seq, "subscriber panicked");
            bus.publish(Event::subscriber_panicked(sub.name(), info));
        }
    }
}

pub(crate) fn panic_message(any: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = any.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = any.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
