//! TemplateSource port - テンプレート取得
//!
//! テンプレートの作成・保存・バージョン管理はエンジンの外側の責務。
//! エンジンは ID（と任意のバージョン）で読むだけ。

use crate::domain::template::Template;

pub trait TemplateSource: Send + Sync {
    /// `version` が `None` なら最新版。見つからなければ `None`。
    fn get(&self, template_id: &str, version: Option<u32>) -> Option<Template>;
}
