//! Errors - エラー型と分類
//!
//! 業務呼び出し側に返るのは NotFound / InvalidState / Validation /
//! PermissionDenied / Conflict のいずれか。Delivery は EventNotifier の内部でのみ使われ、
//! ログに残るだけで呼び出し側には返らない。

use thiserror::Error;

use super::ids::TaskId;
use super::state::TaskState;

/// ErrorKind は運用上の分類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidState,
    Validation,
    PermissionDenied,
    Conflict,
    Delivery,
}

/// Errors returned by the approval engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlowError {
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("template not found: {0}")]
    TemplateNotFound(String),

    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: TaskState, to: TaskState },

    #[error("cannot {operation} a task in state {state}")]
    InvalidState {
        state: TaskState,
        operation: &'static str,
    },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("approver '{approver}' not found on node '{node}'")]
    ApproverNotFound { node: String, approver: String },

    #[error("approver '{approver}' already exists on node '{node}'")]
    ApproverAlreadyExists { node: String, approver: String },

    #[error("event push failed: {0}")]
    EventPush(String),

    #[error("handler failed: {0}")]
    Handler(String),
}

impl FlowError {
    pub fn validation(msg: impl Into<String>) -> Self {
        FlowError::Validation(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            FlowError::TaskNotFound(_)
            | FlowError::TemplateNotFound(_)
            | FlowError::NodeNotFound(_)
            | FlowError::ApproverNotFound { .. } => ErrorKind::NotFound,
            FlowError::InvalidStateTransition { .. } | FlowError::InvalidState { .. } => {
                ErrorKind::InvalidState
            }
            FlowError::Validation(_) => ErrorKind::Validation,
            FlowError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            FlowError::ApproverAlreadyExists { .. } => ErrorKind::Conflict,
            FlowError::EventPush(_) | FlowError::Handler(_) => ErrorKind::Delivery,
        }
    }
}

pub type FlowResult<T> = Result<T, FlowError>;
