//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **InMemoryTaskStore**: タスクの正本（プロセス内のみ、永続化しない）
//! - **InMemoryTemplateSource**: バージョン付きテンプレートの参照
//! - **WebhookHandler**: イベントを HTTP で配送する EventHandler

pub mod inmem_store;
pub mod inmem_templates;
pub mod webhook;

// 主要な型を再エクスポート
pub use self::inmem_store::InMemoryTaskStore;
pub use self::inmem_templates::InMemoryTemplateSource;
pub use self::webhook::{WebhookConfig, WebhookHandler};
