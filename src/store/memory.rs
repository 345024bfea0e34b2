use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::MachineStore;
use crate::error::StoreError;
use crate::model::{ErrorMessage, Machine, MachineId, NewErrorMessage, NewMachine};

/// In-process [`MachineStore`].
///
/// Ids start at 1 and are never reused.
#[derive(Debug)]
pub struct MemoryStore {
    machines: RwLock<BTreeMap<MachineId, Machine>>,
    errors: RwLock<Vec<ErrorMessage>>,
    next_machine: AtomicU64,
    next_error: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            machines: RwLock::new(BTreeMap::new()),
            errors: RwLock::new(Vec::new()),
            next_machine: AtomicU64::new(1),
            next_error: AtomicU64::new(1),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MachineStore for MemoryStore {
    async fn get(&self, id: MachineId) -> Result<Option<Machine>, StoreError> {
        Ok(self.machines.read().await.get(&id).cloned())
    }

    async fn save(&self, machine: Machine) -> Result<Machine, StoreError> {
        let mut machines = self.machines.write().await;
        match machines.get_mut(&machine.id) {
            Some(slot) => {
                *slot = machine.clone();
                Ok(machine)
            }
            None => Err(StoreError::Missing { id: machine.id }),
        }
    }

    async fn insert(&self, machine: NewMachine) -> Result<Machine, StoreError> {
        let id = self.next_machine.fetch_add(1, Ordering::Relaxed);
        let machine = machine.into_machine(id);
        self.machines.write().await.insert(id, machine.clone());
        Ok(machine)
    }

    async fn list_by_owner(&self, owner: &str) -> Result<Vec<Machine>, StoreError> {
        Ok(self
            .machines
            .read()
            .await
            .values()
            .filter(|m| m.owner == owner)
            .cloned()
            .collect())
    }

    async fn append_error(&self, error: NewErrorMessage) -> Result<ErrorMessage, StoreError> {
        let id = self.next_error.fetch_add(1, Ordering::Relaxed);
        let msg = error.into_message(id);
        self.errors.write().await.push(msg.clone());
        Ok(msg)
    }

    async fn errors_for(&self, machine: MachineId) -> Result<Vec<ErrorMessage>, StoreError> {
        Ok(self
            .errors
            .read()
            .await
            .iter()
            .filter(|e| e.machine == machine)
            .cloned()
            .collect())
    }
}
