//! # Lifecycle rules.
//!
//! Pure decision logic: given a machine's current status, its `active` flag and a
//! requested [`Action`], decide whether the transition is legal and what status results.
//!
//! ```text
//! active == false        ─► Reject(Deactivated)
//! START   on STOPPED     ─► Accept(RUNNING)
//! STOP    on RUNNING     ─► Accept(STOPPED)
//! RESTART on RUNNING     ─► Accept(RUNNING)   (STOPPED committed first, then RUNNING after settle)
//! anything else          ─► Reject(StatusMismatch { expected })
//! ```
//!
//! No side effects; safe to call from any task without synchronization.

use std::fmt;

use crate::model::{Action, MachineStatus};

/// Why a transition was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// The machine is retired (`active == false`).
    Deactivated,
    /// The machine is not in the status the action requires.
    StatusMismatch { expected: MachineStatus },
}

impl Rejection {
    /// Short stable label for logs/events.
    pub fn as_label(&self) -> &'static str {
        match self {
            Rejection::Deactivated => "deactivated",
            Rejection::StatusMismatch { .. } => "status_mismatch",
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Deactivated => f.write_str("machine is deactivated"),
            Rejection::StatusMismatch { expected } => write!(f, "status is not {expected}"),
        }
    }
}

/// Outcome of [`decide`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Transition is legal; the machine ends in this status.
    Accept(MachineStatus),
    /// Transition is refused.
    Reject(Rejection),
}

impl Decision {
    #[inline]
    pub fn is_accept(&self) -> bool {
        matches!(self, Decision::Accept(_))
    }
}

/// Status the action requires before it can run.
pub fn required_status(action: Action) -> MachineStatus {
    match action {
        Action::Start => MachineStatus::Stopped,
        Action::Stop | Action::Restart => MachineStatus::Running,
    }
}

/// Status the machine ends in once the action is fully applied.
pub fn resulting_status(action: Action) -> MachineStatus {
    match action {
        Action::Start | Action::Restart => MachineStatus::Running,
        Action::Stop => MachineStatus::Stopped,
    }
}

/// Decides whether `action` may run against a machine in `status`.
pub fn decide(status: MachineStatus, active: bool, action: Action) -> Decision {
    if !active {
        return Decision::Reject(Rejection::Deactivated);
    }
    let expected = required_status(action);
    if status != expected {
        return Decision::Reject(Rejection::StatusMismatch { expected });
    }
    Decision::Accept(resulting_status(action))
}

/// Decides whether a machine may be retired.
///
/// Only `STOPPED` machines can be retired. Retiring an already retired machine is accepted
/// and leaves it retired.
pub fn decide_retire(status: MachineStatus) -> Result<(), Rejection> {
    match status {
        MachineStatus::Stopped => Ok(()),
        MachineStatus::Running => Err(Rejection::StatusMismatch {
            expected: MachineStatus::Stopped,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATUSES: [MachineStatus; 2] = [MachineStatus::Stopped, MachineStatus::Running];
    const ACTIONS: [Action; 3] = [Action::Start, Action::Stop, Action::Restart];

    #[test]
    fn start_accepts_only_stopped_active() {
        assert_eq!(
            decide(MachineStatus::Stopped, true, Action::Start),
            Decision::Accept(MachineStatus::Running)
        );
        assert_eq!(
            decide(MachineStatus::Running, true, Action::Start),
            Decision::Reject(Rejection::StatusMismatch {
                expected: MachineStatus::Stopped
            })
        );
    }

    #[test]
    fn stop_accepts_only_running_active() {
        assert_eq!(
            decide(MachineStatus::Running, true, Action::Stop),
            Decision::Accept(MachineStatus::Stopped)
        );
        assert!(!decide(MachineStatus::Stopped, true, Action::Stop).is_accept());
    }

    #[test]
    fn restart_requires_running() {
        assert_eq!(
            decide(MachineStatus::Running, true, Action::Restart),
            Decision::Accept(MachineStatus::Running)
        );
        assert_eq!(
            decide(MachineStatus::Stopped, true, Action::Restart),
            Decision::Reject(Rejection::StatusMismatch {
                expected: MachineStatus::Running
            })
        );
    }

    #[test]
    fn deactivated_rejects_everything() {
        for status in STATUSES {
            for action in ACTIONS {
                assert_eq!(
                    decide(status, false, action),
                    Decision::Reject(Rejection::Deactivated),
                    "{action} on {status}"
                );
            }
        }
    }

    #[test]
    fn accept_iff_required_status_matches() {
        for status in STATUSES {
            for action in ACTIONS {
                let accepted = decide(status, true, action).is_accept();
                assert_eq!(accepted, status == required_status(action), "{action} on {status}");
            }
        }
    }

    #[test]
    fn rejection_messages_name_the_expected_status() {
        let r = Rejection::StatusMismatch {
            expected: MachineStatus::Running,
        };
        assert_eq!(r.to_string(), "status is not RUNNING");
        assert_eq!(Rejection::Deactivated.to_string(), "machine is deactivated");
    }

    #[test]
    fn retire_requires_stopped() {
        assert!(decide_retire(MachineStatus::Stopped).is_ok());
        assert_eq!(
            decide_retire(MachineStatus::Running),
            Err(Rejection::StatusMismatch {
                expected: MachineStatus::Stopped
            })
        );
    }
}
