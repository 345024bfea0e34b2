//! # Event subscribers.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out and
//! built-in implementations for handling events broadcast through the
//! [`Bus`](crate::events::Bus).
//!
//! ## Architecture
//! ```text
//! Job ── publish(Event) ──► Bus ──► service listener ──► SubscriberSet::emit
//!                                                            │
//!                                              ┌─────────────┼─────────────┐
//!                                              ▼             ▼             ▼
//!                                          LogWriter    TopicBroker     Custom
//! ```
//!
//! ## Built-in subscribers
//! - [`TopicBroker`]: per-machine status topics for client delivery
//! - [`LogWriter`]: renders events through `tracing` (feature `logging`)

mod set;
mod subscribe;
mod topics;

#[cfg(feature = "logging")]
mod log;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use set::SubscriberSet;
pub(crate) use set::panic_message;
pub use subscribe::Subscribe;
pub use topics::{TOPIC_PREFIX, TopicBroker, topic_for};
