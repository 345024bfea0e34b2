//! # Error log: append-only record of rejected scheduled transitions.
//!
//! Records are built as values with
//! [`NewErrorMessage::rejected`](crate::model::NewErrorMessage::rejected) and handed to
//! [`ErrorLog::record`]. Nothing here mutates or deletes existing records.

use std::sync::Arc;

use chrono::Utc;

use crate::error::StoreError;
use crate::lifecycle::Rejection;
use crate::model::{ErrorMessage, MachineId, NewErrorMessage};
use crate::store::MachineStore;

/// Append-only error history, keyed by machine.
#[derive(Clone)]
pub struct ErrorLog {
    store: Arc<dyn MachineStore>,
}

impl ErrorLog {
    pub fn new(store: Arc<dyn MachineStore>) -> Self {
        Self { store }
    }

    /// Appends a record.
    pub async fn record(&self, error: NewErrorMessage) -> Result<ErrorMessage, StoreError> {
        let stored = self.store.append_error(error).await?;
        tracing::debug!(
            machine = stored.machine,
            action = %stored.action,
            id = stored.id,
            "error recorded"
        );
        Ok(stored)
    }

    /// Builds and appends the record for a rejected transition, dated today (UTC).
    pub async fn record_rejection(
        &self,
        machine: MachineId,
        action: &str,
        rejection: Rejection,
    ) -> Result<ErrorMessage, StoreError> {
        let today = Utc::now().date_naive();
        self.record(NewErrorMessage::rejected(machine, action, rejection, today))
            .await
    }

    /// Error history of a machine, oldest first.
    pub async fn for_machine(&self, machine: MachineId) -> Result<Vec<ErrorMessage>, StoreError> {
        self.store.errors_for(machine).await
    }
}
