//! TaskManagerBuilder - TaskManager の構築とワイヤリング
//!
//! テンプレート取得元だけが必須。それ以外は既定値で埋まる:
//! - Clock: SystemClock
//! - IdGenerator: 同じ Clock を使う UlidGenerator
//! - EventSink: NoopEventSink
//! - ApproverSource: なし

use std::sync::Arc;

use crate::impls::InMemoryTaskStore;
use crate::ports::{
    ApproverSource, Clock, EventSink, IdGenerator, NoopEventSink, SystemClock, TemplateSource,
    UlidGenerator,
};
use crate::state_machine::StateMachine;

use super::TaskManager;

/// BuildError は TaskManager 構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("template source is required")]
    MissingTemplates,
}

#[derive(Default)]
pub struct TaskManagerBuilder {
    templates: Option<Arc<dyn TemplateSource>>,
    clock: Option<Arc<dyn Clock>>,
    ids: Option<Arc<dyn IdGenerator>>,
    events: Option<Arc<dyn EventSink>>,
    approvers: Option<Arc<dyn ApproverSource>>,
}

impl TaskManagerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn templates(mut self, templates: Arc<dyn TemplateSource>) -> Self {
        self.templates = Some(templates);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    pub fn event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn approver_source(mut self, approvers: Arc<dyn ApproverSource>) -> Self {
        self.approvers = Some(approvers);
        self
    }

    /// # Errors
    /// `MissingTemplates` when no template source was set.
    pub fn build(self) -> Result<TaskManager, BuildError> {
        let templates = self.templates.ok_or(BuildError::MissingTemplates)?;
        let clock: Arc<dyn Clock> = match self.clock {
            Some(clock) => clock,
            None => Arc::new(SystemClock),
        };
        let ids: Arc<dyn IdGenerator> = match self.ids {
            Some(ids) => ids,
            None => Arc::new(UlidGenerator::new(Arc::clone(&clock))),
        };
        let events: Arc<dyn EventSink> = match self.events {
            Some(events) => events,
            None => Arc::new(NoopEventSink),
        };

        Ok(TaskManager {
            store: InMemoryTaskStore::new(),
            templates,
            approvers: self.approvers,
            state_machine: StateMachine::new(Arc::clone(&clock)),
            clock,
            ids,
            events,
        })
    }
}
