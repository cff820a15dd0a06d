//! ApproverSource port - 承認者の動的取得
//!
//! タスク作成時に一度だけ呼ばれ、ノードごとの承認者リストを返す。
//! 返ったノードのリストはテンプレート固定の承認者を置き換える。
//! 失敗はログに残すだけで、タスク作成は止めない。

use std::collections::HashMap;

use crate::domain::errors::FlowResult;
use crate::domain::task::Task;
use crate::domain::template::Template;

pub trait ApproverSource: Send + Sync {
    /// node id -> ordered approver ids
    fn fetch(&self, task: &Task, template: &Template) -> FlowResult<HashMap<String, Vec<String>>>;
}
