//! Lifecycle orchestration: the public service API.
//!
//! ## Contents
//! - [`MachineService`] transitions, schedules, retirement, lookups and shutdown
//! - [`MachineServiceBuilder`] store and subscriber wiring
//! - [`Dispatcher`] status-change notifications
//! - [`Origin`], [`Retirement`] request origin and retirement outcome

mod builder;
mod dispatch;
mod orchestrator;

pub use builder::MachineServiceBuilder;
pub use dispatch::Dispatcher;
pub use orchestrator::{MachineService, Origin, Retirement};
