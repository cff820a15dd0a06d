//! Task lifecycle state.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle state of an approval task.
///
/// Lifecycle:
/// - Pending -> Submitted -> Approving -> Approved / Rejected / Timeout
/// - Submitted / Approving -> Pending (withdraw)
/// - any non-terminal -> Paused -> back to the remembered state
/// - Pending / Submitted / Approving -> Cancelled
///
/// The allowed edges live in [`crate::state_machine::StateMachine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Created, not yet submitted.
    Pending,
    /// Submitted; no decision recorded yet.
    Submitted,
    /// At least one decision recorded.
    Approving,
    Approved,
    Rejected,
    Cancelled,
    Timeout,
    /// Suspended; `Task::paused_state` remembers where to resume.
    Paused,
}

impl TaskState {
    pub const ALL: [TaskState; 8] = [
        TaskState::Pending,
        TaskState::Submitted,
        TaskState::Approving,
        TaskState::Approved,
        TaskState::Rejected,
        TaskState::Cancelled,
        TaskState::Timeout,
        TaskState::Paused,
    ];

    /// Is this a terminal state (no further transitions)?
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Approved | TaskState::Rejected | TaskState::Cancelled | TaskState::Timeout
        )
    }

    /// Can approvers record decisions in this state?
    pub fn accepts_decisions(self) -> bool {
        matches!(self, TaskState::Submitted | TaskState::Approving)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskState::Pending => "pending",
            TaskState::Submitted => "submitted",
            TaskState::Approving => "approving",
            TaskState::Approved => "approved",
            TaskState::Rejected => "rejected",
            TaskState::Cancelled => "cancelled",
            TaskState::Timeout => "timeout",
            TaskState::Paused => "paused",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskState::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| format!("invalid task state: {s}"))
    }
}
