//! signoff-core
//!
//! Multi-step approval workflow engine.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, state, template, task, record, events, errors）
//! - **ports**: 抽象化レイヤー（Clock, IdGenerator, TemplateSource, ApproverSource, EventSink, EventHandler）
//! - **state_machine**: 状態遷移表と遷移の適用
//! - **manager**: TaskManager（作成・提出・承認・却下・承認者操作・ライフサイクル）
//! - **notifier**: EventNotifier（有界キュー + 再試行付き非同期配送）
//! - **impls**: InMemoryTaskStore, InMemoryTemplateSource, WebhookHandler
//! - **observability**: 通知の集計、tracing 初期化

pub mod domain;
pub mod impls;
pub mod manager;
pub mod notifier;
pub mod observability;
pub mod ports;
pub mod state_machine;

#[cfg(test)]
pub(crate) mod test_support;

pub use crate::domain::{ErrorKind, Event, EventType, FlowError, FlowResult, Task, TaskId, TaskState};
pub use crate::manager::{TaskManager, TaskManagerBuilder};
pub use crate::notifier::{EventNotifier, NotifierConfig, RetryPolicy};
pub use crate::state_machine::StateMachine;
