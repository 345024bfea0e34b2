//! # Machine registry: serialized access to machine records.
//!
//! The registry is the only writer of machine state. It wraps a [`MachineStore`] and
//! serializes read-modify-write sequences per machine id, so two commits to the same
//! machine never interleave and no update is lost. Different machines never contend.
//!
//! ## Architecture
//! ```text
//! update(id, f)
//!   ├─► lock_for(id)          (per-id async mutex, created on demand)
//!   ├─► store.get(id)         (fresh read inside the lock)
//!   ├─► f(&mut machine) → R
//!   ├─► store.save(machine)   (only if the record changed)
//!   └─► unlock
//! ```
//!
//! ## Rules
//! - No ordering is promised between updates to the same machine; whichever runs last wins.
//! - Reads outside `update` are plain store reads and may observe a stale record.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use crate::error::StoreError;
use crate::model::{Machine, MachineId, NewMachine};
use crate::store::MachineStore;

/// Per-machine serialized access to a [`MachineStore`].
pub struct Registry {
    store: Arc<dyn MachineStore>,
    locks: RwLock<HashMap<MachineId, Arc<Mutex<()>>>>,
}

impl Registry {
    pub fn new(store: Arc<dyn MachineStore>) -> Self {
        Self {
            store,
            locks: RwLock::new(HashMap::new()),
        }
    }

    /// Plain read of a machine.
    pub async fn get(&self, id: MachineId) -> Result<Option<Machine>, StoreError> {
        self.store.get(id).await
    }

    /// Creates a new machine.
    pub async fn create(&self, machine: NewMachine) -> Result<Machine, StoreError> {
        self.store.insert(machine).await
    }

    pub async fn list_by_owner(&self, owner: &str) -> Result<Vec<Machine>, StoreError> {
        self.store.list_by_owner(owner).await
    }

    /// Atomically re-reads machine `id`, applies `f` and saves the result if it changed.
    ///
    /// Returns `Ok(None)` when the machine does not exist; `f` is not called then.
    pub async fn update<F, R>(&self, id: MachineId, f: F) -> Result<Option<R>, StoreError>
    where
        F: FnOnce(&mut Machine) -> R + Send,
        R: Send,
    {
        let lock = self.lock_for(id).await;
        let _guard = lock.lock().await;

        let Some(current) = self.store.get(id).await? else {
            return Ok(None);
        };
        let mut next = current.clone();
        let out = f(&mut next);
        if next != current {
            self.store.save(next).await?;
        }
        Ok(Some(out))
    }

    /// Returns the lock guarding machine `id`, creating it if needed.
    async fn lock_for(&self, id: MachineId) -> Arc<Mutex<()>> {
        {
            let locks = self.locks.read().await;
            if let Some(lock) = locks.get(&id) {
                return Arc::clone(lock);
            }
        }
        let mut locks = self.locks.write().await;
        Arc::clone(locks.entry(id).or_default())
    }
}
