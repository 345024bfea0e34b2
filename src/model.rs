//! # Machine and error records.
//!
//! Plain data shared by the store, the lifecycle rules and the service:
//! - [`Machine`] the persisted machine record;
//! - [`MachineStatus`] the two persisted statuses;
//! - [`Action`] a requested lifecycle transition;
//! - [`ErrorMessage`] an append-only record of a rejected scheduled transition.
//!
//! Records are built as values ([`NewMachine`], [`NewErrorMessage`]) and handed to a
//! [`MachineStore`](crate::store::MachineStore), which assigns identifiers.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Machine identifier (assigned by the store, immutable).
pub type MachineId = u64;

/// Error record identifier (assigned by the store).
pub type ErrorId = u64;

/// Persisted machine status. There are no transitional states.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MachineStatus {
    #[default]
    Stopped,
    Running,
}

impl MachineStatus {
    /// Stable upper-case name (`"STOPPED"` / `"RUNNING"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            MachineStatus::Stopped => "STOPPED",
            MachineStatus::Running => "RUNNING",
        }
    }
}

impl fmt::Display for MachineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MachineStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "STOPPED" => Ok(MachineStatus::Stopped),
            "RUNNING" => Ok(MachineStatus::Running),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Returned when a status name is neither `STOPPED` nor `RUNNING`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown machine status {0:?}")]
pub struct UnknownStatus(pub String);

/// A requested lifecycle transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Start,
    Stop,
    Restart,
}

impl Action {
    /// Upper-case identifier (`"START"`, `"STOP"`, `"RESTART"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Start => "START",
            Action::Stop => "STOP",
            Action::Restart => "RESTART",
        }
    }

    /// Label accepted by the scheduling entry point (`"Start"`, `"Stop"`, `"Restart"`).
    pub fn label(&self) -> &'static str {
        match self {
            Action::Start => "Start",
            Action::Stop => "Stop",
            Action::Restart => "Restart",
        }
    }

    /// Parses a scheduling label. Matching is case-sensitive.
    pub fn from_label(label: &str) -> Option<Action> {
        match label {
            "Start" => Some(Action::Start),
            "Stop" => Some(Action::Stop),
            "Restart" => Some(Action::Restart),
            _ => None,
        }
    }

    /// True when the accepted effect commits `STOPPED` first and `RUNNING` after a settle delay.
    #[inline]
    pub fn is_two_phase(&self) -> bool {
        matches!(self, Action::Restart)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted machine record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Machine {
    /// Store-assigned identifier.
    pub id: MachineId,
    /// Display name.
    pub name: String,
    /// Current status.
    pub status: MachineStatus,
    /// `false` once the machine is retired; retired machines never change status again.
    pub active: bool,
    /// Owner attribution (user mail).
    pub owner: String,
    /// Creation date.
    pub created_at: NaiveDate,
}

/// Machine fields before the store assigns an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMachine {
    pub name: String,
    pub owner: String,
    pub created_at: NaiveDate,
}

impl NewMachine {
    pub fn new(name: impl Into<String>, owner: impl Into<String>, created_at: NaiveDate) -> Self {
        Self {
            name: name.into(),
            owner: owner.into(),
            created_at,
        }
    }

    /// Materializes the record with its id. New machines start `STOPPED` and active.
    pub fn into_machine(self, id: MachineId) -> Machine {
        Machine {
            id,
            name: self.name,
            status: MachineStatus::Stopped,
            active: true,
            owner: self.owner,
            created_at: self.created_at,
        }
    }
}

/// Record of a rejected scheduled transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMessage {
    pub id: ErrorId,
    /// Machine the error concerns.
    pub machine: MachineId,
    /// Action as it was requested (e.g. `"Stop"`).
    pub action: String,
    /// Human-readable cause.
    pub message: String,
    pub timestamp: NaiveDate,
}

/// Error record before the store assigns an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewErrorMessage {
    pub machine: MachineId,
    pub action: String,
    pub message: String,
    pub timestamp: NaiveDate,
}

impl NewErrorMessage {
    /// Builds the record for a rejected transition. Pure; nothing is persisted.
    pub fn rejected(
        machine: MachineId,
        action: impl Into<String>,
        reason: impl fmt::Display,
        timestamp: NaiveDate,
    ) -> Self {
        Self {
            machine,
            action: action.into(),
            message: reason.to_string(),
            timestamp,
        }
    }

    pub fn into_message(self, id: ErrorId) -> ErrorMessage {
        ErrorMessage {
            id,
            machine: self.machine,
            action: self.action,
            message: self.message,
            timestamp: self.timestamp,
        }
    }
}

/// Search criteria over an owner's machines.
///
/// - `name`: case-insensitive substring
/// - `statuses`: keep machines whose status is listed (`None` = any)
/// - `created_after` / `created_before`: exclusive bounds, applied only when both are set
#[derive(Debug, Clone, Default)]
pub struct MachineFilter {
    pub owner: String,
    pub name: Option<String>,
    pub statuses: Option<Vec<MachineStatus>>,
    pub created_after: Option<NaiveDate>,
    pub created_before: Option<NaiveDate>,
}

impl MachineFilter {
    pub fn for_owner(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_statuses(mut self, statuses: Vec<MachineStatus>) -> Self {
        self.statuses = Some(statuses);
        self
    }

    pub fn created_between(mut self, after: NaiveDate, before: NaiveDate) -> Self {
        self.created_after = Some(after);
        self.created_before = Some(before);
        self
    }

    /// Returns true if `machine` satisfies every criterion.
    pub fn matches(&self, machine: &Machine) -> bool {
        if machine.owner != self.owner {
            return false;
        }
        if let Some(name) = &self.name {
            if !machine.name.to_lowercase().contains(&name.to_lowercase()) {
                return false;
            }
        }
        if let Some(statuses) = &self.statuses {
            if !statuses.contains(&machine.status) {
                return false;
            }
        }
        match (self.created_after, self.created_before) {
            (Some(after), Some(before)) => machine.created_at > after && machine.created_at < before,
            _ => true,
        }
    }
}
