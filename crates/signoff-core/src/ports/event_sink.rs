//! EventSink port - イベント通知の抽象化
//!
//! - EventSink: TaskManager から見た通知口。fire-and-forget で、決して失敗を返さない。
//! - EventHandler: EventNotifier が配送する先（Webhook など）。

use async_trait::async_trait;

use crate::domain::errors::FlowResult;
use crate::domain::events::Event;

/// EventSink はドメインイベントを受け取る
///
/// 呼び出し側をブロックしてはいけない。
pub trait EventSink: Send + Sync {
    fn notify(&self, event: Event);
}

/// 何もしない EventSink（通知不要な構成用）
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn notify(&self, _event: Event) {}
}

/// 配送先ハンドラ
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// ログに出す名前
    fn name(&self) -> &str;

    async fn handle(&self, event: &Event) -> FlowResult<()>;
}
