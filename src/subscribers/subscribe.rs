//! # Subscriber trait
//!
//! Anything that wants to react to runtime events implements [`Subscribe`]: pushing
//! status changes to clients ([`TopicBroker`](crate::TopicBroker)), writing logs, auditing.
//!
//! Each subscriber gets its own worker and bounded queue inside the
//! [`SubscriberSet`](crate::subscribers::SubscriberSet), so a slow one never delays a
//! commit or another subscriber. When its queue is full the event is dropped for that
//! subscriber only and a `SubscriberOverflow` event is published.
//!
//! ## Example
//! ```rust
//! use machinevisor::{Event, EventKind, Subscribe};
//!
//! struct Audit;
//!
//! #[async_trait::async_trait]
//! impl Subscribe for Audit {
//!     async fn on_event(&self, ev: &Event) {
//!         if ev.kind == EventKind::StatusChanged {
//!             println!("machine {:?} is now {:?}", ev.machine, ev.status);
//!         }
//!     }
//!     fn name(&self) -> &'static str { "audit" }
//! }
//! ```

use async_trait::async_trait;

use crate::events::Event;

/// Event handler driven by a dedicated worker.
///
/// Handlers run on the tokio runtime and must not block it.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handles one event. Events arrive in publish order.
    async fn on_event(&self, event: &Event);

    /// Name used in logs and overflow events.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Queue length before events start being dropped.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
