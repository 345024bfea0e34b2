//! # Job abstraction and function-backed job implementation.
//!
//! A [`Job`] is a one-shot unit of work executed by the [`Scheduler`](super::Scheduler)
//! once its delay elapses. [`JobFn`] wraps a closure; [`JobRef`] is the shared handle.
//!
//! ## Example
//! ```rust
//! use machinevisor::{JobFn, JobRef, TaskError};
//!
//! let j: JobRef = JobFn::arc("hello", || async { Ok::<_, TaskError>(()) });
//! assert_eq!(j.name(), "hello");
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::TaskError;
use crate::model::MachineId;

/// Shared handle to a job.
pub type JobRef = Arc<dyn Job>;

/// # Asynchronous one-shot unit of work.
///
/// Errors and panics are terminal: the scheduler logs them and abandons the job.
#[async_trait]
pub trait Job: Send + Sync + 'static {
    /// Stable, human-readable job name (e.g. `start:42`).
    fn name(&self) -> &str;

    /// Machine this job concerns, if any (used for event metadata).
    fn machine(&self) -> Option<MachineId> {
        None
    }

    /// Executes the job body.
    async fn run(&self) -> Result<(), TaskError>;
}

/// Function-backed job.
///
/// Wraps a closure that *creates* the future to run.
pub struct JobFn<F> {
    name: Cow<'static, str>,
    machine: Option<MachineId>,
    f: F,
}

impl<F> JobFn<F> {
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            machine: None,
            f,
        }
    }

    /// Tags the job with the machine it concerns.
    pub fn for_machine(mut self, machine: MachineId) -> Self {
        self.machine = Some(machine);
        self
    }

    /// Creates the job and returns it as a shared handle.
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

#[async_trait]
impl<F, Fut> Job for JobFn<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn machine(&self) -> Option<MachineId> {
        self.machine
    }

    async fn run(&self) -> Result<(), TaskError> {
        (self.f)().await
    }
}
