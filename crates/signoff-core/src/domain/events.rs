//! Events - タスク・ノード・承認の変更通知
//!
//! Event は永続化されない一時的なメッセージ。TaskManager が成功時に組み立て、
//! EventSink に渡す（fire-and-forget）。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::EventId;
use super::task::Task;
use super::template::Template;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    TaskCreated,
    TaskSubmitted,
    NodeActivated,
    ApprovalOperation,
    TaskApproved,
    TaskRejected,
    TaskTimeout,
    TaskCancelled,
    TaskWithdrawn,
    TaskPaused,
    TaskResumed,
    NodeCompleted,
}

impl EventType {
    pub fn as_str(self) -> &'static str {
        match self {
            EventType::TaskCreated => "task_created",
            EventType::TaskSubmitted => "task_submitted",
            EventType::NodeActivated => "node_activated",
            EventType::ApprovalOperation => "approval_operation",
            EventType::TaskApproved => "task_approved",
            EventType::TaskRejected => "task_rejected",
            EventType::TaskTimeout => "task_timeout",
            EventType::TaskCancelled => "task_cancelled",
            EventType::TaskWithdrawn => "task_withdrawn",
            EventType::TaskPaused => "task_paused",
            EventType::TaskResumed => "task_resumed",
            EventType::NodeCompleted => "node_completed",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskInfo {
    pub id: String,
    #[serde(rename = "templateID")]
    pub template_id: String,
    #[serde(rename = "businessID")]
    pub business_id: String,
    pub state: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalInfo {
    #[serde(rename = "nodeID")]
    pub node_id: String,
    pub approver: String,
    pub result: String,
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessInfo {
    pub id: String,
    pub data: serde_json::Value,
}

/// Notification about a task, node or approval change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub time: DateTime<Utc>,
    pub task: TaskInfo,
    pub node: NodeInfo,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub approval: Option<ApprovalInfo>,
    pub business: BusinessInfo,
}

impl Event {
    /// Builds an event describing `task` at `node_id`.
    ///
    /// A node missing from the template is reported with its id only.
    pub fn for_task(
        id: EventId,
        event_type: EventType,
        time: DateTime<Utc>,
        task: &Task,
        template: &Template,
        node_id: &str,
    ) -> Self {
        let node = match template.node(node_id) {
            Some(node) => NodeInfo {
                id: node.id.clone(),
                name: node.name.clone(),
                node_type: node.node_type().as_str().to_string(),
            },
            None => NodeInfo {
                id: node_id.to_string(),
                name: String::new(),
                node_type: String::new(),
            },
        };

        Self {
            id,
            event_type,
            time,
            task: TaskInfo {
                id: task.id.to_string(),
                template_id: task.template_id.clone(),
                business_id: task.business_id.clone(),
                state: task.state.to_string(),
            },
            node,
            approval: None,
            business: BusinessInfo {
                id: task.business_id.clone(),
                data: task.params.clone(),
            },
        }
    }

    /// `result` is an approval result or an approver-list operation
    /// (`transfer`, `add_approver`, ...).
    pub fn with_approval(mut self, node_id: &str, approver: &str, result: &str, comment: &str) -> Self {
        self.approval = Some(ApprovalInfo {
            node_id: node_id.to_string(),
            approver: approver.to_string(),
            result: result.to_string(),
            comment: comment.to_string(),
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ids::TaskId;
    use crate::domain::state::TaskState;
    use crate::domain::template::{ApprovalNodeConfig, Node};
    use chrono::TimeZone;
    use std::collections::{BTreeMap, HashMap};
    use ulid::Ulid;

    fn fixture() -> (Task, Template) {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        let template = Template::new("leave", 2).with_node(Node::approval(
            "lead",
            "Team lead",
            ApprovalNodeConfig::default(),
        ));
        let task = Task {
            id: TaskId::from_ulid(Ulid::new()),
            template_id: "leave".into(),
            template_version: 2,
            business_id: "LV-9".into(),
            params: serde_json::json!({ "days": 3 }),
            state: TaskState::Approving,
            current_node: "lead".into(),
            created_at: now,
            updated_at: now,
            submitted_at: Some(now),
            paused_at: None,
            paused_state: None,
            node_outputs: HashMap::new(),
            approvers: BTreeMap::new(),
            approvals: BTreeMap::new(),
            records: vec![],
            state_history: vec![],
        };
        (task, template)
    }

    #[test]
    fn json_layout_matches_the_wire_contract() {
        let (task, template) = fixture();
        let event = Event::for_task(
            EventId::from_ulid(Ulid::new()),
            EventType::ApprovalOperation,
            task.updated_at,
            &task,
            &template,
            "lead",
        )
        .with_approval("lead", "alice", "approve", "fine");

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "approval_operation");
        assert_eq!(json["task"]["templateID"], "leave");
        assert_eq!(json["task"]["businessID"], "LV-9");
        assert_eq!(json["task"]["state"], "approving");
        assert_eq!(json["node"]["type"], "approval");
        assert_eq!(json["node"]["name"], "Team lead");
        assert_eq!(json["approval"]["nodeID"], "lead");
        assert_eq!(json["approval"]["result"], "approve");
        assert_eq!(json["business"]["data"]["days"], 3);
    }

    #[test]
    fn approval_is_omitted_when_absent() {
        let (task, template) = fixture();
        let event = Event::for_task(
            EventId::from_ulid(Ulid::new()),
            EventType::TaskCreated,
            task.created_at,
            &task,
            &template,
            "missing",
        );
        let json = serde_json::to_value(&event).unwrap();
        assert!(json.get("approval").is_none());
        assert_eq!(json["node"]["id"], "missing");
    }
}
