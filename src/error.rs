//! Error types used by the machinevisor runtime, the store and task bodies.
//!
//! - [`RuntimeError`]: the scheduler could not drain within its grace period.
//! - [`TaskError`]: a task body failed; logged and abandoned, never retried.
//! - [`StoreError`]: the persistence store failed.
//! - [`SubmitError`]: a request could not be accepted for execution.
//! - [`ServiceError`]: result of synchronous service operations.
//! - [`ConfigError`]: a configuration override could not be parsed.
//!
//! Each type provides `as_label` (stable snake_case) for logs and events.

use std::time::Duration;
use thiserror::Error;

use crate::model::MachineId;

/// # Errors produced by the scheduler runtime.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Shutdown grace period was exceeded; the remaining tasks were aborted.
    #[error("shutdown timeout {grace:?} exceeded; {pending} task(s) aborted")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Number of tasks still in flight when the grace period ran out.
        pending: usize,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use machinevisor::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5), pending: 2 };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
        }
    }
}

/// # Errors produced by the persistence store.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backing store could not be reached or refused the operation.
    #[error("store unavailable: {error}")]
    Unavailable { error: String },

    /// A write referenced a record that does not exist.
    #[error("machine {id} does not exist")]
    Missing { id: MachineId },
}

impl StoreError {
    pub fn as_label(&self) -> &'static str {
        match self {
            StoreError::Unavailable { .. } => "store_unavailable",
            StoreError::Missing { .. } => "store_missing",
        }
    }
}

/// # Errors produced by task execution.
///
/// All of them are terminal for the task: there is no retry anywhere in this crate.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TaskError {
    /// The store failed while the task was reading or committing.
    #[error("store failure: {0}")]
    Store(#[from] StoreError),

    /// Any other execution failure.
    #[error("execution failed: {error}")]
    Fail { error: String },
}

impl TaskError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use machinevisor::TaskError;
    ///
    /// let err = TaskError::Fail { error: "boom".into() };
    /// assert_eq!(err.as_label(), "task_failed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Store(_) => "task_store",
            TaskError::Fail { .. } => "task_failed",
        }
    }
}

/// # Errors returned when a request cannot be submitted.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    /// The scheduler is draining or stopped and no longer accepts work.
    #[error("scheduler is closed")]
    Closed,

    /// Date/time input could not be parsed into a timestamp.
    #[error("invalid schedule {input:?}: {reason}")]
    InvalidSchedule { input: String, reason: String },
}

impl SubmitError {
    pub fn as_label(&self) -> &'static str {
        match self {
            SubmitError::Closed => "submit_closed",
            SubmitError::InvalidSchedule { .. } => "submit_invalid_schedule",
        }
    }
}

/// # Errors returned by synchronous service operations.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ServiceError {
    /// No machine has this id.
    #[error("machine {id} not found")]
    MachineNotFound { id: MachineId },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Submit(#[from] SubmitError),
}

impl ServiceError {
    pub fn as_label(&self) -> &'static str {
        match self {
            ServiceError::MachineNotFound { .. } => "machine_not_found",
            ServiceError::Store(e) => e.as_label(),
            ServiceError::Submit(e) => e.as_label(),
        }
    }

    #[inline]
    pub fn is_not_found(&self) -> bool {
        matches!(self, ServiceError::MachineNotFound { .. })
    }
}

/// # Errors produced while reading configuration overrides.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable was set but its value could not be parsed.
    #[error("invalid value {value:?} for {key}: expected {expected}")]
    Invalid {
        key: &'static str,
        value: String,
        expected: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_convert_into_task_and_service_errors() {
        let e = StoreError::Unavailable {
            error: "disk".into(),
        };
        let task: TaskError = e.clone().into();
        assert_eq!(task.as_label(), "task_store");
        let svc: ServiceError = e.into();
        assert_eq!(svc.as_label(), "store_unavailable");
        assert!(!svc.is_not_found());
    }

    #[test]
    fn not_found_is_distinguishable() {
        let e = ServiceError::MachineNotFound { id: 9 };
        assert!(e.is_not_found());
        assert_eq!(e.to_string(), "machine 9 not found");
    }
}
