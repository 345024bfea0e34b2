//! # TopicBroker: per-machine status topics
//!
//! Fans committed status changes out to clients, one topic per machine:
//!
//! ```text
//! StatusChanged { machine: 42, status: RUNNING }
//!        │
//!        ▼
//! "/topic/machine-status/42" ──► broadcast::Sender<MachineStatus> ──► client receivers
//! ```
//!
//! Topics are created lazily on first subscribe. Publishing to a topic without
//! receivers is a no-op.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::events::{Event, EventKind};
use crate::model::{MachineId, MachineStatus};
use crate::subscribers::Subscribe;

/// Prefix shared by all machine status topics.
pub const TOPIC_PREFIX: &str = "/topic/machine-status/";

/// Topic name for a machine, e.g. `/topic/machine-status/42`.
pub fn topic_for(machine: MachineId) -> String {
    format!("{TOPIC_PREFIX}{machine}")
}

/// Publish/subscribe broker keyed by topic name.
pub struct TopicBroker {
    capacity: usize,
    topics: Mutex<HashMap<String, broadcast::Sender<MachineStatus>>>,
}

impl TopicBroker {
    /// Creates a broker whose topics buffer up to `capacity` statuses per receiver.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            topics: Mutex::new(HashMap::new()),
        }
    }

    /// Subscribes to the status topic of `machine`.
    pub fn subscribe(&self, machine: MachineId) -> broadcast::Receiver<MachineStatus> {
        self.subscribe_topic(&topic_for(machine))
    }

    /// Subscribes to a topic by name.
    pub fn subscribe_topic(&self, topic: &str) -> broadcast::Receiver<MachineStatus> {
        let mut topics = self.topics.lock().unwrap_or_else(|p| p.into_inner());
        topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Sends `status` to the machine's topic. Returns the number of receivers reached.
    pub fn publish(&self, machine: MachineId, status: MachineStatus) -> usize {
        let topics = self.topics.lock().unwrap_or_else(|p| p.into_inner());
        match topics.get(&topic_for(machine)) {
            Some(tx) => tx.send(status).unwrap_or(0),
            None => 0,
        }
    }
}

impl Default for TopicBroker {
    fn default() -> Self {
        Self::new(64)
    }
}

#[async_trait]
impl Subscribe for TopicBroker {
    async fn on_event(&self, event: &Event) {
        if event.kind != EventKind::StatusChanged {
            return;
        }
        if let (Some(machine), Some(status)) = (event.machine, event.status) {
            let reached = self.publish(machine, status);
            tracing::trace!(machine, %status, reached, "status pushed to topic");
        }
    }

    fn name(&self) -> &'static str {
        "TopicBroker"
    }
}
