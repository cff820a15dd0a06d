//! Ports - 抽象化レイヤー
//!
//! エンジンが外部に依存する箇所（時刻、ID 生成、テンプレート取得、承認者取得、
//! イベント通知）を trait として定義します。実装は impls / notifier 側にあり、
//! TaskManagerBuilder で差し替えられます。

pub mod approver_source;
pub mod clock;
pub mod event_sink;
pub mod id_generator;
pub mod template_source;

// 主要な trait を再エクスポート
pub use self::approver_source::ApproverSource;
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::event_sink::{EventHandler, EventSink, NoopEventSink};
pub use self::id_generator::{IdGenerator, SequentialIdGenerator, UlidGenerator};
pub use self::template_source::TemplateSource;
