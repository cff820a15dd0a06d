//! Audit history: approval records and state changes.
//!
//! Both are append-only on the task. A record is produced by every
//! approval-related operation, a state change by every state machine
//! transition.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::errors::{FlowError, FlowResult};
use super::ids::{RecordId, TaskId};
use super::state::TaskState;

/// What an audit record documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordResult {
    Approve,
    Reject,
    Transfer,
    AddApprover,
    RemoveApprover,
    Replace,
}

impl RecordResult {
    pub fn as_str(self) -> &'static str {
        match self {
            RecordResult::Approve => "approve",
            RecordResult::Reject => "reject",
            RecordResult::Transfer => "transfer",
            RecordResult::AddApprover => "add_approver",
            RecordResult::RemoveApprover => "remove_approver",
            RecordResult::Replace => "replace",
        }
    }
}

impl fmt::Display for RecordResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordResult {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approve" => Ok(RecordResult::Approve),
            "reject" => Ok(RecordResult::Reject),
            "transfer" => Ok(RecordResult::Transfer),
            "add_approver" => Ok(RecordResult::AddApprover),
            "remove_approver" => Ok(RecordResult::RemoveApprover),
            "replace" => Ok(RecordResult::Replace),
            other => Err(FlowError::validation(format!(
                "unknown record result '{other}'"
            ))),
        }
    }
}

/// Immutable audit entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub task_id: TaskId,
    pub node_id: String,
    pub approver: String,
    pub result: RecordResult,
    pub comment: String,
    pub attachments: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Record {
    /// Checks that every identity field and the timestamp are present.
    pub fn validate(&self) -> FlowResult<()> {
        let missing = if self.id.is_nil() {
            Some("id")
        } else if self.task_id.is_nil() {
            Some("task_id")
        } else if self.node_id.trim().is_empty() {
            Some("node_id")
        } else if self.approver.trim().is_empty() {
            Some("approver")
        } else if self.created_at == DateTime::<Utc>::UNIX_EPOCH {
            Some("created_at")
        } else {
            None
        };

        match missing {
            Some(field) => Err(FlowError::validation(format!("record {field} is required"))),
            None => Ok(()),
        }
    }
}

/// Immutable state machine history entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChange {
    pub from: TaskState,
    pub to: TaskState,
    pub reason: String,
    pub time: DateTime<Utc>,
}

impl StateChange {
    pub fn validate(&self) -> FlowResult<()> {
        if self.from == self.to {
            return Err(FlowError::validation(format!(
                "state change must change state (both {})",
                self.from
            )));
        }
        if self.time == DateTime::<Utc>::UNIX_EPOCH {
            return Err(FlowError::validation("state change time is required"));
        }
        Ok(())
    }
}
