//! # machinevisor
//!
//! **Machinevisor** is a lifecycle engine for virtual machines.
//!
//! It decides whether a machine may be started, stopped or restarted, applies the
//! change after a simulated provisioning delay or at a future wall-clock time, and
//! reports outcomes through status notifications and a persistent error log.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   request_transition()     schedule_transition()      destroy() / find_status()
//!          │                         │                          │
//!          ▼                         ▼                          │ (synchronous)
//! ┌───────────────────────────────────────────────────┐         │
//! │  MachineService (orchestrator)                    │         │
//! │  - Scheduler  (timers + bounded worker pool)      │         │
//! │  - Registry   (per-machine serialized commits)  ◄─┼─────────┘
//! │  - ErrorLog   (rejections of scheduled requests)  │
//! │  - Dispatcher (status-change notifications)       │
//! └──────┬───────────────────────┬──────────────┬─────┘
//!        │ jobs fire after delay │ notify()     │ publish(Event)
//!        ▼                       ▼              ▼
//!  lifecycle::decide()    status feed     ┌─────────────────┐
//!  (pure rules)           (unbounded)     │ Bus (broadcast) │
//!                                │        └────────┬────────┘
//!                                ▼                 ▼
//!                              service listener ◄──┘
//!                                       ▼
//!                                 SubscriberSet
//!                     (status lane: lossless, diagnostic lane: bounded)
//!                          ┌────────────┼────────────┐
//!                          ▼            ▼            ▼
//!                     TopicBroker   LogWriter     custom
//! ```
//!
//! ### Transition job
//! ```text
//! submit ──► sleep(jitter | until at) ──► permit ──► re-read machine ──► decide()
//!                                                     ├─ Accept ─► commit ─► notify
//!                                                     │            (RESTART: STOPPED, settle, RUNNING)
//!                                                     └─ Reject ─► scheduled? ErrorLog : drop
//! ```
//!
//! ## Features
//! | Area              | Description                                                  | Key types / traits                          |
//! |-------------------|--------------------------------------------------------------|---------------------------------------------|
//! | **Service**       | Transitions, schedules, retirement, lookups, shutdown.       | [`MachineService`], [`Origin`]              |
//! | **Rules**         | Pure lifecycle decisions.                                    | [`decide`], [`Decision`], [`Rejection`]     |
//! | **Scheduling**    | Jittered, absolute and chained one-shot jobs.                | [`Scheduler`], [`Job`], [`Submission`]      |
//! | **Persistence**   | Storage seam for machines and error records.                 | [`MachineStore`], [`MemoryStore`]           |
//! | **Subscriber API**| Hook into runtime events (topics, logging, custom).          | [`Subscribe`], [`TopicBroker`]              |
//! | **Errors**        | Typed errors for operations, jobs and shutdown.              | [`ServiceError`], [`TaskError`], [`RuntimeError`] |
//! | **Configuration** | Pool size, delay windows, grace, env overrides.              | [`Config`], [`DelayWindow`]                 |
//!
//! ## Optional features
//! - `logging` (default): exports the built-in [`LogWriter`] subscriber.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use machinevisor::{
//!     Action, Config, DelayWindow, MachineService, MachineStatus, Origin, Subscribe, TopicBroker,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut cfg = Config::default();
//!     cfg.jitter = DelayWindow::fixed(Duration::from_millis(10));
//!
//!     let topics = Arc::new(TopicBroker::default());
//!     let subs: Vec<Arc<dyn Subscribe>> = vec![topics.clone()];
//!     let svc = MachineService::builder(cfg).with_subscribers(subs).build();
//!
//!     let m = svc.create_machine("web-1", "ana").await?;
//!     let mut updates = topics.subscribe(m.id);
//!
//!     svc.request_transition(m.id, Action::Start, Origin::Direct).await?;
//!     assert_eq!(updates.recv().await?, MachineStatus::Running);
//!
//!     svc.shutdown().await?;
//!     Ok(())
//! }
//! ```

mod config;
mod error;
mod error_log;
mod events;
mod lifecycle;
mod model;
mod policies;
mod registry;
mod scheduler;
mod service;
mod store;
mod subscribers;

// ---- Public re-exports ----

pub use config::Config;
pub use error::{ConfigError, RuntimeError, ServiceError, StoreError, SubmitError, TaskError};
pub use error_log::ErrorLog;
pub use events::{Bus, Event, EventKind};
pub use lifecycle::{Decision, Rejection, decide, decide_retire, required_status, resulting_status};
pub use model::{
    Action, ErrorId, ErrorMessage, Machine, MachineFilter, MachineId, MachineStatus,
    NewErrorMessage, NewMachine, UnknownStatus,
};
pub use policies::DelayWindow;
pub use registry::Registry;
pub use scheduler::{
    IgnoredReason, Job, JobFn, JobRef, Scheduler, Submission, wait_for_shutdown_signal,
};
pub use service::{Dispatcher, MachineService, MachineServiceBuilder, Origin, Retirement};
pub use store::{MachineStore, MemoryStore};
pub use subscribers::{Subscribe, SubscriberSet, TOPIC_PREFIX, TopicBroker, topic_for};

// Built-in event renderer.
// Disable with: `--no-default-features`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
