//! Approve / Reject
//!
//! # 判定
//! - ノード完了は approve のときだけ、ノードの ApprovalMode で判定する
//! - reject の振る舞いは RejectBehavior（terminate / rollback / jump）
//! - rollback / jump は状態を approving のまま current_node だけ差し替える
//!
//! `*_with_attachments` は判定を行わず、記録だけ残す。

use crate::domain::errors::{FlowError, FlowResult};
use crate::domain::events::EventType;
use crate::domain::ids::TaskId;
use crate::domain::record::RecordResult;
use crate::domain::state::TaskState;
use crate::domain::task::{Approval, ApprovalResult, Task};
use crate::domain::template::{ApprovalMode, ApprovalNodeConfig, RejectBehavior, Template};

use super::{Outgoing, TaskManager};

/// Whether a decision should drive node completion / reject dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dispatch {
    Evaluate,
    RecordOnly,
}

/// Where a reject sends the task.
enum RejectOutcome {
    Terminate,
    Redirect(String),
}

impl TaskManager {
    /// Records an approve decision and completes the task when the node's
    /// approval mode is satisfied.
    pub fn approve(
        &self,
        id: TaskId,
        node_id: &str,
        approver: &str,
        comment: &str,
    ) -> FlowResult<Task> {
        self.approve_inner(id, node_id, approver, comment, Vec::new(), Dispatch::Evaluate)
    }

    /// Records an approve decision with attachments. Never completes the node.
    pub fn approve_with_attachments(
        &self,
        id: TaskId,
        node_id: &str,
        approver: &str,
        comment: &str,
        attachments: Vec<String>,
    ) -> FlowResult<Task> {
        self.approve_inner(id, node_id, approver, comment, attachments, Dispatch::RecordOnly)
    }

    /// Records a reject decision and applies the node's reject behavior.
    ///
    /// A jump to a node missing from the template fails with `NodeNotFound`
    /// before anything is recorded.
    pub fn reject(
        &self,
        id: TaskId,
        node_id: &str,
        approver: &str,
        comment: &str,
    ) -> FlowResult<Task> {
        self.reject_inner(id, node_id, approver, comment, Vec::new(), Dispatch::Evaluate)
    }

    /// Records a reject decision with attachments. The reject behavior is not applied.
    pub fn reject_with_attachments(
        &self,
        id: TaskId,
        node_id: &str,
        approver: &str,
        comment: &str,
        attachments: Vec<String>,
    ) -> FlowResult<Task> {
        self.reject_inner(id, node_id, approver, comment, attachments, Dispatch::RecordOnly)
    }

    fn approve_inner(
        &self,
        id: TaskId,
        node_id: &str,
        approver: &str,
        comment: &str,
        attachments: Vec<String>,
        dispatch: Dispatch,
    ) -> FlowResult<Task> {
        self.mutate(id, |task, template| {
            let config = check_decision(task, template, node_id, approver, comment, &attachments)?;
            self.record_decision(
                task,
                node_id,
                approver,
                ApprovalResult::Approve,
                comment,
                attachments,
            )?;

            let note = |out: Outgoing| {
                out.approval(approver, ApprovalResult::Approve.as_str(), comment)
            };

            if dispatch == Dispatch::Evaluate
                && node_complete(task, node_id, approver, config.approval_mode)
            {
                self.move_to(
                    task,
                    TaskState::Approved,
                    &format!("node {node_id} approved"),
                )?;
                return Ok(vec![
                    note(Outgoing::new(EventType::NodeCompleted, node_id)),
                    Outgoing::new(EventType::TaskApproved, node_id),
                ]);
            }
            Ok(vec![note(Outgoing::new(EventType::ApprovalOperation, node_id))])
        })
    }

    fn reject_inner(
        &self,
        id: TaskId,
        node_id: &str,
        approver: &str,
        comment: &str,
        attachments: Vec<String>,
        dispatch: Dispatch,
    ) -> FlowResult<Task> {
        self.mutate(id, |task, template| {
            let config = check_decision(task, template, node_id, approver, comment, &attachments)?;
            let outcome = match dispatch {
                Dispatch::Evaluate => Some(reject_outcome(template, node_id, config)?),
                Dispatch::RecordOnly => None,
            };

            let was_approving = task.state == TaskState::Approving;
            self.record_decision(
                task,
                node_id,
                approver,
                ApprovalResult::Reject,
                comment,
                attachments,
            )?;

            let mut outgoing = Vec::new();
            let note = Outgoing::new(EventType::ApprovalOperation, node_id).approval(
                approver,
                ApprovalResult::Reject.as_str(),
                comment,
            );
            if was_approving || outcome.is_none() {
                outgoing.push(note);
            }

            match outcome {
                None => {}
                Some(RejectOutcome::Terminate) => {
                    self.move_to(
                        task,
                        TaskState::Rejected,
                        &format!("node {node_id} rejected"),
                    )?;
                    outgoing.push(Outgoing::new(EventType::NodeCompleted, node_id));
                    outgoing.push(Outgoing::new(EventType::TaskRejected, node_id));
                }
                Some(RejectOutcome::Redirect(target)) => {
                    tracing::info!(
                        task_id = %task.id,
                        node_id,
                        target = %target,
                        "reject redirected task"
                    );
                    task.current_node = target;
                    outgoing.push(Outgoing::new(EventType::NodeActivated, &task.current_node));
                }
            }
            Ok(outgoing)
        })
    }

    /// Moves submitted -> approving, upserts the approval and appends the record.
    fn record_decision(
        &self,
        task: &mut Task,
        node_id: &str,
        approver: &str,
        result: ApprovalResult,
        comment: &str,
        attachments: Vec<String>,
    ) -> FlowResult<()> {
        if task.state == TaskState::Submitted {
            self.move_to(task, TaskState::Approving, "first decision recorded")?;
        }

        let record_result = match result {
            ApprovalResult::Approve => RecordResult::Approve,
            ApprovalResult::Reject => RecordResult::Reject,
        };
        self.append_record(task, node_id, approver, record_result, comment, attachments)?;

        task.approvals.entry(node_id.to_string()).or_default().insert(
            approver.to_string(),
            Approval {
                result,
                comment: comment.to_string(),
                created_at: task.updated_at,
            },
        );
        Ok(())
    }
}

/// Shared preconditions of approve and reject.
fn check_decision<'t>(
    task: &Task,
    template: &'t Template,
    node_id: &str,
    approver: &str,
    comment: &str,
    attachments: &[String],
) -> FlowResult<&'t ApprovalNodeConfig> {
    if !task.state.accepts_decisions() {
        return Err(FlowError::InvalidState {
            state: task.state,
            operation: "decide on",
        });
    }

    let config = template.approval_config(node_id)?;
    if config.require_comment && comment.trim().is_empty() {
        return Err(FlowError::validation(format!(
            "node '{node_id}' requires a comment"
        )));
    }
    if config.require_attachments && attachments.is_empty() {
        return Err(FlowError::validation(format!(
            "node '{node_id}' requires attachments"
        )));
    }

    if config.approval_mode == ApprovalMode::Sequential
        && let Some(expected) = next_in_turn(task, node_id)
        && expected != approver
    {
        return Err(FlowError::validation(format!(
            "approver '{approver}' must wait for '{expected}' on node '{node_id}'"
        )));
    }
    Ok(config)
}

/// First listed approver on `node_id` who has not approved yet.
fn next_in_turn<'a>(task: &'a Task, node_id: &str) -> Option<&'a str> {
    task.approvers_of(node_id)
        .iter()
        .find(|listed| !task.has_approved(node_id, listed))
        .map(String::as_str)
}

/// Does the node's approval mode consider the node complete?
///
/// A node without listed approvers completes on the deciding approver's
/// own approve.
fn node_complete(task: &Task, node_id: &str, approver: &str, mode: ApprovalMode) -> bool {
    let listed = task.approvers_of(node_id);
    if listed.is_empty() {
        return task.has_approved(node_id, approver);
    }

    let approved = listed
        .iter()
        .filter(|listed| task.has_approved(node_id, listed))
        .count();
    match mode {
        ApprovalMode::Single | ApprovalMode::Any => approved >= 1,
        ApprovalMode::Unanimous | ApprovalMode::Sequential => approved == listed.len(),
        ApprovalMode::Proportional { percent } => approved >= required_approvals(listed.len(), percent),
    }
}

/// ceil(len * percent / 100), at least one, at most `len`.
fn required_approvals(len: usize, percent: u8) -> usize {
    let percent = usize::from(percent.min(100));
    (len * percent).div_ceil(100).clamp(1, len.max(1))
}

fn reject_outcome(
    template: &Template,
    node_id: &str,
    config: &ApprovalNodeConfig,
) -> FlowResult<RejectOutcome> {
    match config.reject_behavior {
        RejectBehavior::Terminate => Ok(RejectOutcome::Terminate),
        RejectBehavior::Rollback => Ok(match template.predecessor(node_id) {
            Some(previous) => RejectOutcome::Redirect(previous.to_string()),
            None => RejectOutcome::Terminate,
        }),
        RejectBehavior::Jump => match config.jump_target() {
            None => Ok(RejectOutcome::Terminate),
            Some(target) => {
                template.require_node(target)?;
                Ok(RejectOutcome::Redirect(target.to_string()))
            }
        },
    }
}
