use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::events::{Bus, Event};
use crate::model::{MachineId, MachineStatus};

/// Pushes committed status changes to subscribers.
///
/// Every change goes down an unbounded channel to the service listener, which hands it to
/// the status lane of each subscriber, so none is lost however busy the runtime is. A copy
/// is also published on the [`Bus`] for [`MachineService::events`](crate::MachineService::events)
/// receivers, where it may be lagged out like any other diagnostic.
#[derive(Clone, Debug)]
pub struct Dispatcher {
    feed: mpsc::UnboundedSender<Event>,
    bus: Bus,
}

impl Dispatcher {
    /// Creates a dispatcher and the receiving end of its status feed.
    pub fn channel(bus: Bus) -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (feed, rx) = mpsc::unbounded_channel();
        (Self { feed, bus }, rx)
    }

    /// Announces that `machine` now has `status`. Never blocks.
    pub fn notify(&self, machine: MachineId, status: MachineStatus) {
        info!(machine, %status, "status changed");
        let ev = Event::status_changed(machine, status);
        if self.feed.send(ev.clone()).is_err() {
            warn!(machine, %status, "status feed closed; notification not delivered");
        }
        self.bus.publish(ev);
    }
}
