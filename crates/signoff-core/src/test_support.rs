//! テスト用のフィクスチャ

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, TimeZone, Utc};
use ulid::Ulid;

use crate::domain::events::{Event, EventType};
use crate::domain::ids::{EventId, TaskId};
use crate::domain::state::TaskState;
use crate::domain::task::Task;
use crate::domain::template::{ApprovalNodeConfig, Node, Template};

pub(crate) fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).unwrap()
}

pub(crate) fn bare_task(state: TaskState) -> Task {
    Task {
        id: TaskId::from_ulid(Ulid::new()),
        template_id: "expense".into(),
        template_version: 1,
        business_id: "INV-1".into(),
        params: serde_json::json!({ "amount": 120 }),
        state,
        current_node: "A".into(),
        created_at: t0(),
        updated_at: t0(),
        submitted_at: None,
        paused_at: None,
        paused_state: None,
        node_outputs: HashMap::new(),
        approvers: BTreeMap::new(),
        approvals: BTreeMap::new(),
        records: vec![],
        state_history: vec![],
    }
}

pub(crate) fn event(event_type: EventType) -> Event {
    let template = Template::new("expense", 1).with_node(Node::approval(
        "A",
        "Finance",
        ApprovalNodeConfig::default(),
    ));
    Event::for_task(
        EventId::from_ulid(Ulid::new()),
        event_type,
        t0(),
        &bare_task(TaskState::Approving),
        &template,
        "A",
    )
}

/// 受け取ったイベントを記録するだけの EventSink
#[derive(Default)]
pub(crate) struct RecordingSink {
    events: parking_lot::Mutex<Vec<Event>>,
}

impl RecordingSink {
    pub(crate) fn types(&self) -> Vec<EventType> {
        self.events.lock().iter().map(|e| e.event_type).collect()
    }

    pub(crate) fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub(crate) fn clear(&self) {
        self.events.lock().clear();
    }
}

impl crate::ports::EventSink for RecordingSink {
    fn notify(&self, event: Event) {
        self.events.lock().push(event);
    }
}

pub(crate) struct Harness {
    pub(crate) manager: crate::manager::TaskManager,
    pub(crate) clock: std::sync::Arc<crate::ports::FixedClock>,
    pub(crate) sink: std::sync::Arc<RecordingSink>,
}

/// TaskManager wired with a fixed clock, sequential ids and a recording sink.
pub(crate) fn harness(templates: Vec<Template>) -> Harness {
    use std::sync::Arc;

    let source = crate::impls::InMemoryTemplateSource::new();
    for template in templates {
        source.register(template);
    }
    let clock = Arc::new(crate::ports::FixedClock::new(t0()));
    let sink = Arc::new(RecordingSink::default());
    let manager = crate::manager::TaskManager::builder()
        .templates(Arc::new(source))
        .clock(clock.clone())
        .id_generator(Arc::new(crate::ports::SequentialIdGenerator::new()))
        .event_sink(sink.clone())
        .build()
        .unwrap();
    Harness {
        manager,
        clock,
        sink,
    }
}

/// start -> A (approval) -> end
pub(crate) fn linear(config: ApprovalNodeConfig) -> Template {
    Template::new("expense", 1)
        .with_node(Node::start("start"))
        .with_node(Node::approval("A", "Finance", config))
        .with_node(Node::end("end"))
        .with_edge("start", "A")
        .with_edge("A", "end")
}

/// Creates and submits a task on `template_id`; it sits on its first approval node.
pub(crate) fn submitted(h: &Harness, template_id: &str) -> Task {
    let task = h.manager.create(template_id, "INV-1", None).unwrap();
    h.manager.submit(task.id).unwrap()
}
