//! InMemoryTemplateSource - バージョン付きテンプレートの参照

use std::collections::{BTreeMap, HashMap};

use parking_lot::RwLock;

use crate::domain::template::Template;
use crate::ports::TemplateSource;

/// template id -> version -> template
#[derive(Debug, Default)]
pub struct InMemoryTemplateSource {
    templates: RwLock<HashMap<String, BTreeMap<u32, Template>>>,
}

impl InMemoryTemplateSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// 同じ (id, version) は上書き
    pub fn register(&self, template: Template) {
        self.templates
            .write()
            .entry(template.id.clone())
            .or_default()
            .insert(template.version, template);
    }

    pub fn with_template(self, template: Template) -> Self {
        self.register(template);
        self
    }
}

impl TemplateSource for InMemoryTemplateSource {
    fn get(&self, template_id: &str, version: Option<u32>) -> Option<Template> {
        let templates = self.templates.read();
        let versions = templates.get(template_id)?;
        match version {
            Some(version) => versions.get(&version).cloned(),
            None => versions.values().next_back().cloned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_version_wins_when_unspecified() {
        let source = InMemoryTemplateSource::new()
            .with_template(Template::new("leave", 1))
            .with_template(Template::new("leave", 3))
            .with_template(Template::new("leave", 2));

        assert_eq!(source.get("leave", None).map(|t| t.version), Some(3));
        assert_eq!(source.get("leave", Some(2)).map(|t| t.version), Some(2));
        assert!(source.get("leave", Some(9)).is_none());
        assert!(source.get("expense", None).is_none());
    }
}
