//! TaskManager - 承認フローのオーケストレーション
//!
//! 全操作は同期で、呼び出し元のスレッドで完結する。
//!
//! # 1 操作の流れ
//! 1. タスクのテンプレートを解決
//! 2. ストアの write ロック下で作業コピーを検証・変更（失敗時は何も残らない）
//! 3. ロック解放後にイベントを EventSink へ渡す（fire-and-forget）
//! 4. 呼び出し元にはクローンを返す
//!
//! 操作は用途ごとにファイルを分けている:
//! - approval: approve / reject
//! - approvers: transfer / add / remove / replace
//! - lifecycle: cancel / withdraw / pause / resume / handle_timeout

mod approval;
mod approvers;
pub mod builder;
mod lifecycle;

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::domain::errors::{FlowError, FlowResult};
use crate::domain::events::{Event, EventType};
use crate::domain::ids::TaskId;
use crate::domain::record::{Record, RecordResult};
use crate::domain::state::TaskState;
use crate::domain::task::{Task, TaskFilter};
use crate::domain::template::{NodeType, Template};
use crate::impls::InMemoryTaskStore;
use crate::ports::{ApproverSource, Clock, EventSink, IdGenerator, TemplateSource};
use crate::state_machine::StateMachine;

pub use self::builder::{BuildError, TaskManagerBuilder};

pub struct TaskManager {
    store: InMemoryTaskStore,
    templates: Arc<dyn TemplateSource>,
    approvers: Option<Arc<dyn ApproverSource>>,
    state_machine: StateMachine,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    events: Arc<dyn EventSink>,
}

/// An event to publish once the store lock is released.
struct Outgoing {
    event_type: EventType,
    node_id: String,
    approval: Option<(String, &'static str, String)>,
}

impl Outgoing {
    fn new(event_type: EventType, node_id: &str) -> Self {
        Self {
            event_type,
            node_id: node_id.to_string(),
            approval: None,
        }
    }

    fn approval(mut self, approver: &str, result: &'static str, comment: &str) -> Self {
        self.approval = Some((approver.to_string(), result, comment.to_string()));
        self
    }
}

impl TaskManager {
    pub fn builder() -> TaskManagerBuilder {
        TaskManagerBuilder::new()
    }

    /// Creates a pending task on the latest version of `template_id`.
    ///
    /// Approver lists are seeded from each approval node's configured
    /// approvers, then overridden per node by the approver source if one is
    /// set. Approver source failures are logged and ignored.
    pub fn create(
        &self,
        template_id: &str,
        business_id: &str,
        params: Option<serde_json::Value>,
    ) -> FlowResult<Task> {
        let template = self
            .templates
            .get(template_id, None)
            .ok_or_else(|| FlowError::TemplateNotFound(template_id.to_string()))?;
        if business_id.trim().is_empty() {
            return Err(FlowError::validation("business id is required"));
        }
        let entry = template.entry_node().ok_or_else(|| {
            FlowError::validation(format!("template '{}' has no nodes", template.id))
        })?;

        let approvers: BTreeMap<String, Vec<String>> = template
            .approval_nodes()
            .filter(|(_, config)| !config.approvers.is_empty())
            .map(|(node, config)| (node.id.clone(), distinct(&config.approvers)))
            .collect();

        let now = self.clock.now();
        let mut task = Task {
            id: self.ids.task_id(),
            template_id: template.id.clone(),
            template_version: template.version,
            business_id: business_id.to_string(),
            params: params.unwrap_or_else(|| serde_json::json!({})),
            state: TaskState::Pending,
            current_node: entry.id.clone(),
            created_at: now,
            updated_at: now,
            submitted_at: None,
            paused_at: None,
            paused_state: None,
            node_outputs: Default::default(),
            approvers,
            approvals: BTreeMap::new(),
            records: Vec::new(),
            state_history: Vec::new(),
        };
        self.apply_approver_source(&mut task, &template);

        self.store.insert(task.clone());
        info!(
            task_id = %task.id,
            template_id = %task.template_id,
            template_version = task.template_version,
            business_id = %task.business_id,
            "task created"
        );

        self.publish(
            &task,
            &template,
            vec![Outgoing::new(EventType::TaskCreated, &task.current_node)],
        );
        Ok(task)
    }

    pub fn get(&self, id: TaskId) -> FlowResult<Task> {
        self.store.get(id).ok_or(FlowError::TaskNotFound(id))
    }

    /// Tasks matching every set field of `filter`, oldest first.
    pub fn query(&self, filter: &TaskFilter) -> Vec<Task> {
        self.store.list(filter)
    }

    /// Submits a pending task.
    ///
    /// A task sitting on a start node advances to the start node's successor.
    pub fn submit(&self, id: TaskId) -> FlowResult<Task> {
        self.mutate(id, |task, template| {
            if task.state != TaskState::Pending {
                return Err(FlowError::InvalidState {
                    state: task.state,
                    operation: "submit",
                });
            }
            self.move_to(task, TaskState::Submitted, "submitted")?;
            task.submitted_at = Some(task.updated_at);

            if template
                .node(&task.current_node)
                .is_some_and(|node| node.node_type() == NodeType::Start)
                && let Some(next) = template.successor(&task.current_node)
            {
                task.current_node = next.to_string();
            }

            Ok(vec![
                Outgoing::new(EventType::TaskSubmitted, &task.current_node),
                Outgoing::new(EventType::NodeActivated, &task.current_node),
            ])
        })
    }

    fn apply_approver_source(&self, task: &mut Task, template: &Template) {
        let Some(source) = &self.approvers else {
            return;
        };
        match source.fetch(task, template) {
            Ok(lists) => {
                for (node_id, list) in lists {
                    if template.approval_config(&node_id).is_err() {
                        warn!(
                            task_id = %task.id,
                            node_id = %node_id,
                            "approver source returned a node that is not an approval node; ignored"
                        );
                        continue;
                    }
                    task.approvers.insert(node_id, distinct(&list));
                }
            }
            Err(err) => {
                warn!(
                    task_id = %task.id,
                    error = %err,
                    "approver source failed; keeping template approvers"
                );
            }
        }
    }

    fn template_of(&self, task: &Task) -> FlowResult<Template> {
        self.templates
            .get(&task.template_id, Some(task.template_version))
            .ok_or_else(|| {
                FlowError::TemplateNotFound(format!(
                    "{}@{}",
                    task.template_id, task.template_version
                ))
            })
    }

    /// Runs `op` on a working copy of the task under the store write lock,
    /// then publishes the events it returned.
    ///
    /// Nothing is stored when `op` fails.
    fn mutate(
        &self,
        id: TaskId,
        op: impl FnOnce(&mut Task, &Template) -> FlowResult<Vec<Outgoing>>,
    ) -> FlowResult<Task> {
        let template = self.template_of(&self.get(id)?)?;
        let (task, outgoing) = self.store.update(id, |task| {
            let outgoing = op(task, &template)?;
            Ok((task.clone(), outgoing))
        })?;
        self.publish(&task, &template, outgoing);
        Ok(task)
    }

    fn move_to(&self, task: &mut Task, to: TaskState, reason: &str) -> FlowResult<()> {
        let from = task.state;
        *task = self.state_machine.transition(task, to, reason)?;
        info!(task_id = %task.id, %from, %to, reason, "task state changed");
        Ok(())
    }

    fn append_record(
        &self,
        task: &mut Task,
        node_id: &str,
        approver: &str,
        result: RecordResult,
        comment: &str,
        attachments: Vec<String>,
    ) -> FlowResult<()> {
        let record = Record {
            id: self.ids.record_id(),
            task_id: task.id,
            node_id: node_id.to_string(),
            approver: approver.to_string(),
            result,
            comment: comment.to_string(),
            attachments,
            created_at: self.clock.now(),
        };
        record.validate()?;
        task.updated_at = record.created_at;
        task.records.push(record);
        Ok(())
    }

    fn publish(&self, task: &Task, template: &Template, outgoing: Vec<Outgoing>) {
        for out in outgoing {
            let mut event = Event::for_task(
                self.ids.event_id(),
                out.event_type,
                self.clock.now(),
                task,
                template,
                &out.node_id,
            );
            if let Some((approver, result, comment)) = &out.approval {
                event = event.with_approval(&out.node_id, approver, result, comment);
            }
            debug!(
                task_id = %task.id,
                event_type = %out.event_type,
                node_id = %out.node_id,
                "emitting event"
            );
            self.events.notify(event);
        }
    }
}

/// Approver ids in list order with repeats removed.
fn distinct(approvers: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    approvers
        .iter()
        .filter(|approver| seen.insert(approver.as_str()))
        .cloned()
        .collect()
}
