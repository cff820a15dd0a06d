//! StateMachine - タスク状態遷移の唯一の入口
//!
//! 遷移表にない遷移は `InvalidStateTransition` で拒否する。
//! `transition` は入力を変更せず、更新済みのクローンを返す。

use std::sync::Arc;

use crate::domain::errors::{FlowError, FlowResult};
use crate::domain::record::StateChange;
use crate::domain::state::TaskState;
use crate::domain::task::Task;
use crate::ports::Clock;

/// 遷移表
///
/// 終端状態（approved / rejected / cancelled / timeout）の行は空。
fn allowed(from: TaskState) -> &'static [TaskState] {
    use TaskState::*;
    match from {
        Pending => &[Submitted, Cancelled, Paused],
        Submitted => &[Approving, Cancelled, Pending, Paused],
        Approving => &[Approved, Rejected, Cancelled, Timeout, Pending, Paused],
        Paused => &[Pending, Submitted, Approving],
        Approved | Rejected | Cancelled | Timeout => &[],
    }
}

#[derive(Clone)]
pub struct StateMachine {
    clock: Arc<dyn Clock>,
}

impl StateMachine {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    pub fn can_transition(&self, from: TaskState, to: TaskState) -> bool {
        from != to && allowed(from).contains(&to)
    }

    /// Returns a copy of `task` moved to `to`, with `updated_at` set and a
    /// `StateChange` appended.
    ///
    /// # Errors
    /// `InvalidStateTransition` when the edge is not in the table,
    /// `Validation` when the clock reading is unset (the epoch).
    pub fn transition(&self, task: &Task, to: TaskState, reason: &str) -> FlowResult<Task> {
        let from = task.state;
        if !self.can_transition(from, to) {
            return Err(FlowError::InvalidStateTransition { from, to });
        }

        let change = StateChange {
            from,
            to,
            reason: reason.to_string(),
            time: self.clock.now(),
        };
        change.validate()?;

        let mut next = task.clone();
        next.state = to;
        next.updated_at = change.time;
        next.state_history.push(change);
        Ok(next)
    }

    pub fn valid_transitions(&self, state: TaskState) -> Vec<TaskState> {
        allowed(state).to_vec()
    }
}

impl std::fmt::Debug for StateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateMachine").finish_non_exhaustive()
    }
}
