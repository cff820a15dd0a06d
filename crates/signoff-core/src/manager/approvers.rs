//! 承認者リストの操作（transfer / add / remove / replace）
//!
//! いずれもノードの Permissions で許可されている必要があり、終端状態のタスクには使えない。
//! 既存の承認（approvals）は消さない。完了判定はリストに載っている承認者だけを数える。

use crate::domain::errors::{FlowError, FlowResult};
use crate::domain::events::EventType;
use crate::domain::ids::TaskId;
use crate::domain::record::RecordResult;
use crate::domain::task::Task;
use crate::domain::template::{ApprovalNodeConfig, Template};

use super::{Outgoing, TaskManager};

impl TaskManager {
    /// Hands `from`'s place in the node's approver list to `to`.
    ///
    /// If `to` is already listed, `from` is simply removed. `from`'s existing
    /// approval stays on the task.
    pub fn transfer(
        &self,
        id: TaskId,
        node_id: &str,
        from: &str,
        to: &str,
        reason: &str,
    ) -> FlowResult<Task> {
        self.mutate(id, |task, template| {
            let config = check_list_operation(task, template, node_id, "transfer")?;
            if !config.permissions.allow_transfer {
                return Err(denied("transfer", node_id));
            }
            require_approver(to)?;
            if from == to {
                return Err(FlowError::validation(format!(
                    "cannot transfer '{from}' to itself"
                )));
            }

            let list = task.approvers.entry(node_id.to_string()).or_default();
            let position = position_of(list, node_id, from)?;
            if list.iter().any(|listed| listed == to) {
                list.remove(position);
            } else {
                list[position] = to.to_string();
            }

            let comment = with_reason(format!("transfer to {to}"), reason);
            self.append_record(task, node_id, from, RecordResult::Transfer, &comment, Vec::new())?;
            Ok(vec![list_changed(node_id, from, RecordResult::Transfer, &comment)])
        })
    }

    pub fn add_approver(
        &self,
        id: TaskId,
        node_id: &str,
        approver: &str,
        reason: &str,
    ) -> FlowResult<Task> {
        self.mutate(id, |task, template| {
            let config = check_list_operation(task, template, node_id, "add approvers to")?;
            if !config.permissions.allow_add_approver {
                return Err(denied("adding approvers", node_id));
            }
            require_approver(approver)?;

            let list = task.approvers.entry(node_id.to_string()).or_default();
            if list.iter().any(|listed| listed == approver) {
                return Err(FlowError::ApproverAlreadyExists {
                    node: node_id.to_string(),
                    approver: approver.to_string(),
                });
            }
            list.push(approver.to_string());

            self.append_record(task, node_id, approver, RecordResult::AddApprover, reason, Vec::new())?;
            Ok(vec![list_changed(node_id, approver, RecordResult::AddApprover, reason)])
        })
    }

    pub fn remove_approver(
        &self,
        id: TaskId,
        node_id: &str,
        approver: &str,
        reason: &str,
    ) -> FlowResult<Task> {
        self.mutate(id, |task, template| {
            let config = check_list_operation(task, template, node_id, "remove approvers from")?;
            if !config.permissions.allow_remove_approver {
                return Err(denied("removing approvers", node_id));
            }

            let list = task.approvers.entry(node_id.to_string()).or_default();
            let position = position_of(list, node_id, approver)?;
            list.remove(position);

            self.append_record(
                task,
                node_id,
                approver,
                RecordResult::RemoveApprover,
                reason,
                Vec::new(),
            )?;
            Ok(vec![list_changed(node_id, approver, RecordResult::RemoveApprover, reason)])
        })
    }

    /// Swaps `old` for `new` in place. Only approvers who have not decided
    /// yet can be replaced. Gated by `allow_transfer`.
    pub fn replace_approver(
        &self,
        id: TaskId,
        node_id: &str,
        old: &str,
        new: &str,
        reason: &str,
    ) -> FlowResult<Task> {
        self.mutate(id, |task, template| {
            let config = check_list_operation(task, template, node_id, "replace approvers on")?;
            if !config.permissions.allow_transfer {
                return Err(denied("replacing approvers", node_id));
            }
            require_approver(new)?;
            if task.approval_of(node_id, old).is_some() {
                return Err(FlowError::validation(format!(
                    "approver '{old}' has already decided on node '{node_id}'"
                )));
            }

            let list = task.approvers.entry(node_id.to_string()).or_default();
            let position = position_of(list, node_id, old)?;
            if list.iter().any(|listed| listed == new) {
                return Err(FlowError::ApproverAlreadyExists {
                    node: node_id.to_string(),
                    approver: new.to_string(),
                });
            }
            list[position] = new.to_string();

            let comment = with_reason(format!("replace with {new}"), reason);
            self.append_record(task, node_id, old, RecordResult::Replace, &comment, Vec::new())?;
            Ok(vec![list_changed(node_id, old, RecordResult::Replace, &comment)])
        })
    }
}

fn check_list_operation<'t>(
    task: &Task,
    template: &'t Template,
    node_id: &str,
    operation: &'static str,
) -> FlowResult<&'t ApprovalNodeConfig> {
    if task.state.is_terminal() {
        return Err(FlowError::InvalidState {
            state: task.state,
            operation,
        });
    }
    template.approval_config(node_id)
}

fn denied(what: &str, node_id: &str) -> FlowError {
    FlowError::PermissionDenied(format!("{what} is not allowed on node '{node_id}'"))
}

fn require_approver(approver: &str) -> FlowResult<()> {
    if approver.trim().is_empty() {
        return Err(FlowError::validation("approver is required"));
    }
    Ok(())
}

fn position_of(list: &[String], node_id: &str, approver: &str) -> FlowResult<usize> {
    list.iter()
        .position(|listed| listed == approver)
        .ok_or_else(|| FlowError::ApproverNotFound {
            node: node_id.to_string(),
            approver: approver.to_string(),
        })
}

fn with_reason(action: String, reason: &str) -> String {
    if reason.trim().is_empty() {
        action
    } else {
        format!("{action}: {reason}")
    }
}

fn list_changed(node_id: &str, approver: &str, result: RecordResult, comment: &str) -> Outgoing {
    Outgoing::new(EventType::ApprovalOperation, node_id).approval(approver, result.as_str(), comment)
}
