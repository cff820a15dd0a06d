//! Task aggregate: one running instance of a template.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::TaskId;
use super::record::{Record, StateChange};
use super::state::TaskState;

/// An approver's decision on a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalResult {
    Approve,
    Reject,
}

impl ApprovalResult {
    pub fn as_str(self) -> &'static str {
        match self {
            ApprovalResult::Approve => "approve",
            ApprovalResult::Reject => "reject",
        }
    }
}

/// Latest decision of one approver on one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Approval {
    pub result: ApprovalResult,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

/// Approval task.
///
/// The store owns every `Task`; callers receive clones, so mutating a
/// returned value never reaches the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub template_id: String,
    pub template_version: u32,
    pub business_id: String,
    pub params: serde_json::Value,
    pub state: TaskState,
    pub current_node: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub paused_at: Option<DateTime<Utc>>,
    pub paused_state: Option<TaskState>,
    pub node_outputs: HashMap<String, serde_json::Value>,
    /// node id -> ordered approver ids
    pub approvers: BTreeMap<String, Vec<String>>,
    /// node id -> approver id -> latest decision
    pub approvals: BTreeMap<String, HashMap<String, Approval>>,
    pub records: Vec<Record>,
    pub state_history: Vec<StateChange>,
}

impl Task {
    pub fn approvers_of(&self, node_id: &str) -> &[String] {
        self.approvers.get(node_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn approval_of(&self, node_id: &str, approver: &str) -> Option<&Approval> {
        self.approvals.get(node_id)?.get(approver)
    }

    pub fn has_approved(&self, node_id: &str, approver: &str) -> bool {
        self.approval_of(node_id, approver)
            .is_some_and(|approval| approval.result == ApprovalResult::Approve)
    }

    pub fn is_listed_anywhere(&self, approver: &str) -> bool {
        self.approvers
            .values()
            .any(|list| list.iter().any(|a| a == approver))
    }

    pub fn last_state_change(&self) -> Option<&StateChange> {
        self.state_history.last()
    }
}

/// AND-filter for `TaskManager::query`. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    pub state: Option<TaskState>,
    pub template_id: Option<String>,
    pub business_id: Option<String>,
    pub approver: Option<String>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
}

impl TaskFilter {
    pub fn state(mut self, state: TaskState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn template(mut self, template_id: impl Into<String>) -> Self {
        self.template_id = Some(template_id.into());
        self
    }

    pub fn business(mut self, business_id: impl Into<String>) -> Self {
        self.business_id = Some(business_id.into());
        self
    }

    pub fn approver(mut self, approver: impl Into<String>) -> Self {
        self.approver = Some(approver.into());
        self
    }

    pub fn created_between(mut self, after: DateTime<Utc>, before: DateTime<Utc>) -> Self {
        self.created_after = Some(after);
        self.created_before = Some(before);
        self
    }

    /// Bounds are inclusive.
    pub fn matches(&self, task: &Task) -> bool {
        self.state.is_none_or(|state| task.state == state)
            && self
                .template_id
                .as_deref()
                .is_none_or(|id| task.template_id == id)
            && self
                .business_id
                .as_deref()
                .is_none_or(|id| task.business_id == id)
            && self
                .approver
                .as_deref()
                .is_none_or(|approver| task.is_listed_anywhere(approver))
            && self.created_after.is_none_or(|t| task.created_at >= t)
            && self.created_before.is_none_or(|t| task.created_at <= t)
    }
}
