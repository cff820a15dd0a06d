//! InMemoryTaskStore - タスクの正本
//!
//! # ロック方針
//! - 外側: ストア全体の RwLock。変更系はすべて write を取り、直列化される。
//! - 内側: タスクごとの RwLock。読み取りはこのロックの下でクローンする。
//! - ロックを持ったまま await しない（全メソッド同期）。

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::domain::errors::{FlowError, FlowResult};
use crate::domain::ids::TaskId;
use crate::domain::task::{Task, TaskFilter};

#[derive(Debug, Default)]
pub struct InMemoryTaskStore {
    tasks: RwLock<HashMap<TaskId, Arc<RwLock<Task>>>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, task: Task) {
        let mut tasks = self.tasks.write();
        tasks.insert(task.id, Arc::new(RwLock::new(task)));
    }

    /// 返り値はクローン。変更してもストアには影響しない。
    pub fn get(&self, id: TaskId) -> Option<Task> {
        let tasks = self.tasks.read();
        tasks.get(&id).map(|task| task.read().clone())
    }

    /// Matching tasks, oldest first.
    pub fn list(&self, filter: &TaskFilter) -> Vec<Task> {
        let tasks = self.tasks.read();
        let mut found: Vec<Task> = tasks
            .values()
            .filter_map(|task| {
                let task = task.read();
                filter.matches(&task).then(|| task.clone())
            })
            .collect();
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        found
    }

    /// Applies `f` to a working copy under the store write lock.
    ///
    /// The copy replaces the stored task only when `f` returns `Ok`; on error
    /// the stored task is left untouched.
    pub fn update<R>(
        &self,
        id: TaskId,
        f: impl FnOnce(&mut Task) -> FlowResult<R>,
    ) -> FlowResult<R> {
        let tasks = self.tasks.write();
        let slot = tasks.get(&id).ok_or(FlowError::TaskNotFound(id))?;
        let mut task = slot.write();

        let mut working = task.clone();
        let out = f(&mut working)?;
        *task = working;
        Ok(out)
    }

    pub fn len(&self) -> usize {
        self.tasks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::state::TaskState;
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;
    use ulid::Ulid;

    fn task(business_id: &str, minute: u32) -> Task {
        let at = Utc.with_ymd_and_hms(2024, 4, 1, 9, minute, 0).unwrap();
        Task {
            id: TaskId::from_ulid(Ulid::new()),
            template_id: "t".into(),
            template_version: 1,
            business_id: business_id.into(),
            params: serde_json::json!({}),
            state: TaskState::Pending,
            current_node: "start".into(),
            created_at: at,
            updated_at: at,
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

    #[test]
    fn get_returns_isolated_clones() {
        let store = InMemoryTaskStore::new();
        let t = task("B-1", 0);
        let id = t.id;
        store.insert(t);

        let mut first = store.get(id).unwrap();
        first.business_id = "tampered".into();
        first.params["x"] = serde_json::json!(1);

        let second = store.get(id).unwrap();
        assert_eq!(second.business_id, "B-1");
        assert_eq!(second.params, serde_json::json!({}));
    }

    #[test]
    fn failed_update_leaves_task_untouched() {
        let store = InMemoryTaskStore::new();
        let t = task("B-1", 0);
        let id = t.id;
        store.insert(t);

        let result: FlowResult<()> = store.update(id, |task| {
            task.business_id = "half-done".into();
            Err(FlowError::validation("boom"))
        });
        assert!(result.is_err());
        assert_eq!(store.get(id).unwrap().business_id, "B-1");

        store
            .update(id, |task| {
                task.business_id = "done".into();
                Ok(())
            })
            .unwrap();
        assert_eq!(store.get(id).unwrap().business_id, "done");
    }

    #[test]
    fn update_of_unknown_task_is_not_found() {
        let store = InMemoryTaskStore::new();
        let id = TaskId::from_ulid(Ulid::new());
        let err = store.update(id, |_| Ok(())).unwrap_err();
        assert_eq!(err, FlowError::TaskNotFound(id));
    }

    #[test]
    fn list_filters_and_orders_by_creation() {
        let store = InMemoryTaskStore::new();
        store.insert(task("late", 30));
        store.insert(task("early", 5));
        store.insert(task("other", 10));

        let all = store.list(&TaskFilter::default());
        let order: Vec<_> = all.iter().map(|t| t.business_id.as_str()).collect();
        assert_eq!(order, ["early", "other", "late"]);

        let one = store.list(&TaskFilter::default().business("late"));
        assert_eq!(one.len(), 1);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn concurrent_updates_are_serialized() {
        let store = Arc::new(InMemoryTaskStore::new());
        let t = task("B-1", 0);
        let id = t.id;
        store.insert(t);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for j in 0..50 {
                        store
                            .update(id, |task| {
                                task.node_outputs
                                    .insert(format!("{i}-{j}"), serde_json::json!(j));
                                Ok(())
                            })
                            .unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(store.get(id).unwrap().node_outputs.len(), 400);
    }
}
