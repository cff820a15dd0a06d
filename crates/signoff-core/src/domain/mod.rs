//! Domain model (IDs, state, templates, tasks, records, events, errors).
//!
//! ドメイン層は副作用を持たない。時刻・ID・永続化・通知は ports 経由で注入される。

pub mod errors;
pub mod events;
pub mod ids;
pub mod record;
pub mod state;
pub mod task;
pub mod template;

pub use self::errors::{ErrorKind, FlowError, FlowResult};
pub use self::events::{ApprovalInfo, BusinessInfo, Event, EventType, NodeInfo, TaskInfo};
pub use self::ids::{EventId, RecordId, TaskId};
pub use self::record::{Record, RecordResult, StateChange};
pub use self::state::TaskState;
pub use self::task::{Approval, ApprovalResult, Task, TaskFilter};
pub use self::template::{
    ApprovalMode, ApprovalNodeConfig, Edge, Node, NodeConfig, NodeType, Permissions,
    RejectBehavior, Template,
};
