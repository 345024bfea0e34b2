//! # Persistence store seam.
//!
//! [`MachineStore`] is the contract the lifecycle engine consumes for machine and error
//! records. How records reach disk is the implementor's business; [`MemoryStore`] keeps
//! everything in process.
//!
//! ## Rules
//! - `get` returns `Ok(None)` for unknown ids; only infrastructure faults are errors.
//! - `save` overwrites the whole record; atomic read-modify-write per machine is provided
//!   one level up by [`Registry`](crate::registry::Registry).
//! - `append_error` is append-only and must be safe to call concurrently.

mod memory;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::model::{ErrorMessage, Machine, MachineId, NewErrorMessage, NewMachine};

pub use memory::MemoryStore;

/// Storage for machines and their error history.
#[async_trait]
pub trait MachineStore: Send + Sync + 'static {
    /// Loads a machine by id.
    async fn get(&self, id: MachineId) -> Result<Option<Machine>, StoreError>;

    /// Persists an existing machine and returns the stored record.
    async fn save(&self, machine: Machine) -> Result<Machine, StoreError>;

    /// Persists a new machine, assigning its id.
    async fn insert(&self, machine: NewMachine) -> Result<Machine, StoreError>;

    /// All machines attributed to `owner`, ordered by id.
    async fn list_by_owner(&self, owner: &str) -> Result<Vec<Machine>, StoreError>;

    /// Appends an error record, assigning its id.
    async fn append_error(&self, error: NewErrorMessage) -> Result<ErrorMessage, StoreError>;

    /// Error history of a machine, oldest first.
    async fn errors_for(&self, machine: MachineId) -> Result<Vec<ErrorMessage>, StoreError>;
}
