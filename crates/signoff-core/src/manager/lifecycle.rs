//! Cancel / Withdraw / Pause / Resume / HandleTimeout
//!
//! 目標状態を決めて StateMachine に委ねるだけ。遷移表にない組み合わせは
//! `InvalidStateTransition` になる。

use tracing::debug;

use crate::domain::errors::{FlowError, FlowResult};
use crate::domain::events::EventType;
use crate::domain::ids::TaskId;
use crate::domain::state::TaskState;
use crate::domain::task::Task;

use super::{Outgoing, TaskManager};

impl TaskManager {
    pub fn cancel(&self, id: TaskId, reason: &str) -> FlowResult<Task> {
        self.mutate(id, |task, _| {
            self.move_to(task, TaskState::Cancelled, reason)?;
            Ok(vec![Outgoing::new(EventType::TaskCancelled, &task.current_node)])
        })
    }

    /// Pulls a submitted task back to pending so it can be edited and
    /// resubmitted. Not possible once any record exists.
    pub fn withdraw(&self, id: TaskId, reason: &str) -> FlowResult<Task> {
        self.mutate(id, |task, template| {
            if !task.records.is_empty() {
                return Err(FlowError::validation(
                    "cannot withdraw a task that already has approval records",
                ));
            }
            self.move_to(task, TaskState::Pending, reason)?;
            task.submitted_at = None;
            task.paused_at = None;
            task.paused_state = None;
            if let Some(entry) = template.entry_node() {
                task.current_node = entry.id.clone();
            }
            Ok(vec![Outgoing::new(EventType::TaskWithdrawn, &task.current_node)])
        })
    }

    /// Suspends the task, remembering its state for `resume`.
    pub fn pause(&self, id: TaskId, reason: &str) -> FlowResult<Task> {
        self.mutate(id, |task, _| {
            let previous = task.state;
            self.move_to(task, TaskState::Paused, reason)?;
            task.paused_state = Some(previous);
            task.paused_at = Some(task.updated_at);
            Ok(vec![Outgoing::new(EventType::TaskPaused, &task.current_node)])
        })
    }

    /// Returns a paused task to the state it was paused in.
    pub fn resume(&self, id: TaskId, reason: &str) -> FlowResult<Task> {
        self.mutate(id, |task, _| {
            if task.state != TaskState::Paused {
                return Err(FlowError::InvalidState {
                    state: task.state,
                    operation: "resume",
                });
            }
            let previous = task
                .paused_state
                .ok_or_else(|| FlowError::validation("paused task has no state to resume to"))?;
            self.move_to(task, previous, reason)?;
            task.paused_state = None;
            task.paused_at = None;
            Ok(vec![Outgoing::new(EventType::TaskResumed, &task.current_node)])
        })
    }

    /// Times the task out if its current node's timeout has elapsed since
    /// submission. Otherwise the task is returned unchanged.
    ///
    /// A submitted task with no decisions passes through `approving` first.
    pub fn handle_timeout(&self, id: TaskId) -> FlowResult<Task> {
        let now = self.clock.now();
        self.mutate(id, |task, template| {
            if !task.state.accepts_decisions() {
                return Err(FlowError::InvalidState {
                    state: task.state,
                    operation: "time out",
                });
            }

            let timeout = template
                .node(&task.current_node)
                .and_then(|node| node.approval_config())
                .and_then(|config| config.timeout());
            let (Some(timeout), Some(submitted_at)) = (timeout, task.submitted_at) else {
                return Ok(Vec::new());
            };
            // a submission in the future counts as zero elapsed
            let elapsed = now
                .signed_duration_since(submitted_at)
                .to_std()
                .unwrap_or_default();
            if elapsed < timeout {
                debug!(task_id = %task.id, node_id = %task.current_node, "timeout not reached");
                return Ok(Vec::new());
            }

            let reason = format!("node {} timed out", task.current_node);
            if task.state == TaskState::Submitted {
                self.move_to(task, TaskState::Approving, &reason)?;
            }
            self.move_to(task, TaskState::Timeout, &reason)?;
            Ok(vec![Outgoing::new(EventType::TaskTimeout, &task.current_node)])
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::domain::template::ApprovalNodeConfig;
    use crate::test_support::{harness, linear, submitted};
    use crate::ports::clock::Clock;

    #[test]
    fn cancel_from_live_states() {
        let h = harness(vec![linear(ApprovalNodeConfig::default().with_approvers(["alice", "bob"]))]);

        let pending = h.manager.create("expense", "INV-1", None).unwrap();
        assert_eq!(h.manager.cancel(pending.id, "typo").unwrap().state, TaskState::Cancelled);

        let approving = submitted(&h, "expense");
        h.manager.approve(approving.id, "A", "alice", "").unwrap();
        h.sink.clear();
        let t = h.manager.cancel(approving.id, "budget cut").unwrap();
        assert_eq!(t.state, TaskState::Cancelled);
        assert_eq!(t.last_state_change().unwrap().reason, "budget cut");
        assert_eq!(h.sink.types(), [EventType::TaskCancelled]);

        assert_eq!(
            h.manager.cancel(approving.id, "again").unwrap_err(),
            FlowError::InvalidStateTransition {
                from: TaskState::Cancelled,
                to: TaskState::Cancelled
            }
        );
    }

    #[test]
    fn withdraw_returns_to_pending_and_allows_resubmit() {
        let h = harness(vec![linear(ApprovalNodeConfig::default())]);
        let task = submitted(&h, "expense");
        h.sink.clear();

        let t = h.manager.withdraw(task.id, "forgot receipt").unwrap();
        assert_eq!(t.state, TaskState::Pending);
        assert_eq!(t.current_node, "start");
        assert!(t.submitted_at.is_none());
        assert_eq!(h.sink.types(), [EventType::TaskWithdrawn]);

        let t = h.manager.submit(task.id).unwrap();
        assert_eq!(t.current_node, "A");
    }

    #[test]
    fn withdraw_fails_once_records_exist() {
        let h = harness(vec![linear(ApprovalNodeConfig::default().with_approvers(["alice", "bob"]))]);
        let task = submitted(&h, "expense");
        h.manager.approve(task.id, "A", "alice", "").unwrap();

        let err = h.manager.withdraw(task.id, "never mind").unwrap_err();
        assert!(matches!(err, FlowError::Validation(_)));
        assert_eq!(h.manager.get(task.id).unwrap().state, TaskState::Approving);
    }

    #[test]
    fn withdraw_pending_task_is_an_invalid_transition() {
        let h = harness(vec![linear(ApprovalNodeConfig::default())]);
        let task = h.manager.create("expense", "INV-1", None).unwrap();
        assert!(matches!(
            h.manager.withdraw(task.id, ""),
            Err(FlowError::InvalidStateTransition { .. })
        ));
    }

    #[test]
    fn pause_and_resume_round_trip() {
        let h = harness(vec![linear(ApprovalNodeConfig::default().with_approvers(["alice", "bob"]))]);
        let task = submitted(&h, "expense");
        h.manager.approve(task.id, "A", "alice", "").unwrap();
        h.sink.clear();

        h.clock.advance(chrono::Duration::hours(1));
        let paused = h.manager.pause(task.id, "audit").unwrap();
        assert_eq!(paused.state, TaskState::Paused);
        assert_eq!(paused.paused_state, Some(TaskState::Approving));
        assert_eq!(paused.paused_at, Some(h.clock.now()));

        assert!(matches!(
            h.manager.approve(task.id, "A", "bob", ""),
            Err(FlowError::InvalidState { .. })
        ));

        let resumed = h.manager.resume(task.id, "audit done").unwrap();
        assert_eq!(resumed.state, TaskState::Approving);
        assert!(resumed.paused_state.is_none());
        assert!(resumed.paused_at.is_none());
        assert_eq!(h.sink.types(), [EventType::TaskPaused, EventType::TaskResumed]);

        let done = h.manager.approve(task.id, "A", "bob", "").unwrap();
        assert_eq!(done.state, TaskState::Approved);
    }

    #[test]
    fn resume_requires_a_paused_task() {
        let h = harness(vec![linear(ApprovalNodeConfig::default())]);
        let task = submitted(&h, "expense");
        assert_eq!(
            h.manager.resume(task.id, "").unwrap_err(),
            FlowError::InvalidState {
                state: TaskState::Submitted,
                operation: "resume"
            }
        );
    }

    #[test]
    fn pause_terminal_task_fails() {
        let h = harness(vec![linear(ApprovalNodeConfig::default())]);
        let task = submitted(&h, "expense");
        h.manager.cancel(task.id, "").unwrap();
        assert!(matches!(
            h.manager.pause(task.id, ""),
            Err(FlowError::InvalidStateTransition { .. })
        ));
    }

    #[test]
    fn timeout_is_polled() {
        let h = harness(vec![linear(
            ApprovalNodeConfig::default()
                .with_approvers(["alice", "bob"])
                .with_timeout(Duration::from_secs(3600)),
        )]);
        let task = submitted(&h, "expense");
        h.manager.approve(task.id, "A", "alice", "").unwrap();
        h.sink.clear();

        h.clock.advance(chrono::Duration::minutes(59));
        let t = h.manager.handle_timeout(task.id).unwrap();
        assert_eq!(t.state, TaskState::Approving);
        assert!(h.sink.types().is_empty());

        h.clock.advance(chrono::Duration::minutes(1));
        let t = h.manager.handle_timeout(task.id).unwrap();
        assert_eq!(t.state, TaskState::Timeout);
        assert_eq!(h.sink.types(), [EventType::TaskTimeout]);

        assert!(matches!(
            h.manager.handle_timeout(task.id),
            Err(FlowError::InvalidState { .. })
        ));
    }

    #[test]
    fn submitted_task_times_out_through_approving() {
        let h = harness(vec![linear(
            ApprovalNodeConfig::default().with_timeout(Duration::from_secs(60)),
        )]);
        let task = submitted(&h, "expense");
        h.clock.advance(chrono::Duration::minutes(2));

        let t = h.manager.handle_timeout(task.id).unwrap();

        let path: Vec<_> = t.state_history.iter().map(|c| c.to).collect();
        assert_eq!(
            path,
            [TaskState::Submitted, TaskState::Approving, TaskState::Timeout]
        );
    }

    #[test]
    fn node_without_timeout_never_expires() {
        let h = harness(vec![linear(ApprovalNodeConfig::default())]);
        let task = submitted(&h, "expense");
        h.clock.advance(chrono::Duration::days(365));
        let t = h.manager.handle_timeout(task.id).unwrap();
        assert_eq!(t.state, TaskState::Submitted);
    }
}
