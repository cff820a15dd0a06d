//! IdGenerator port - ID 生成の抽象化
//!
//! # 実装
//! - **UlidGenerator**: ULID ベース（本番用）
//! - **SequentialIdGenerator**: 連番（テスト用、決定的）

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use parking_lot::Mutex;
use ulid::{Generator, Ulid};

use crate::domain::ids::{EventId, RecordId, TaskId};
use crate::ports::Clock;

/// IdGenerator はタスク・記録・イベントの ID を生成
///
/// # Thread Safety
/// - `Send + Sync` を要求（複数スレッドから使える）
pub trait IdGenerator: Send + Sync {
    fn task_id(&self) -> TaskId;

    fn record_id(&self) -> RecordId;

    fn event_id(&self) -> EventId;
}

/// UlidGenerator は ULID ベースの ID 生成器
///
/// Clock を使って現在時刻ベースの ULID を生成します。
/// 同じミリ秒内ではランダム部分をインクリメントするので、生成順に並びます。
/// FixedClock を渡すと timestamp 部分が固定されます。
pub struct UlidGenerator<C> {
    clock: C,
    generator: Mutex<Generator>,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            generator: Mutex::new(Generator::new()),
        }
    }

    fn next_ulid(&self) -> Ulid {
        let now = SystemTime::from(self.clock.now());
        // random part exhausted within one millisecond: fall back to a fresh random id
        self.generator
            .lock()
            .generate_from_datetime(now)
            .unwrap_or_else(|_| Ulid::from_datetime(now))
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn task_id(&self) -> TaskId {
        TaskId::from(self.next_ulid())
    }

    fn record_id(&self) -> RecordId {
        RecordId::from(self.next_ulid())
    }

    fn event_id(&self) -> EventId {
        EventId::from(self.next_ulid())
    }
}

/// 1 から始まる連番。全 ID 種別で 1 つのカウンタを共有する。
#[derive(Debug)]
pub struct SequentialIdGenerator {
    next: AtomicU64,
}

impl SequentialIdGenerator {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    fn next_ulid(&self) -> Ulid {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        Ulid::from_parts(0, u128::from(n))
    }
}

impl Default for SequentialIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn task_id(&self) -> TaskId {
        TaskId::from(self.next_ulid())
    }

    fn record_id(&self) -> RecordId {
        RecordId::from(self.next_ulid())
    }

    fn event_id(&self) -> EventId {
        EventId::from(self.next_ulid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{FixedClock, SystemClock};
    use chrono::{TimeZone, Utc};

    #[test]
    fn ulid_generator_generates_unique_ids() {
        let id_gen = UlidGenerator::new(SystemClock);

        let id1 = id_gen.task_id();
        let id2 = id_gen.task_id();
        let id3 = id_gen.task_id();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }

    #[test]
    fn ulid_generator_with_fixed_clock_shares_timestamp() {
        let fixed_time = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let id_gen = UlidGenerator::new(FixedClock::new(fixed_time));

        let id1 = id_gen.record_id();
        let id2 = id_gen.record_id();

        // 同じミリ秒でも ID は異なる
        assert_ne!(id1, id2);
        assert_eq!(id1.as_ulid().timestamp_ms(), id2.as_ulid().timestamp_ms());
        assert_eq!(
            id1.as_ulid().timestamp_ms(),
            fixed_time.timestamp_millis() as u64
        );
    }

    #[test]
    fn ulid_generator_orders_ids_within_one_millisecond() {
        let fixed_time = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let id_gen = UlidGenerator::new(FixedClock::new(fixed_time));

        let ids: Vec<_> = (0..100).map(|_| id_gen.event_id().as_ulid()).collect();

        assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn sequential_generator_is_deterministic() {
        let a = SequentialIdGenerator::new();
        let b = SequentialIdGenerator::new();

        assert_eq!(a.task_id(), b.task_id());
        assert_eq!(a.event_id(), b.event_id());
        assert!(!a.record_id().is_nil());
    }

    #[test]
    fn prefixes_follow_the_id_type() {
        let id_gen = SequentialIdGenerator::new();
        assert!(id_gen.task_id().to_string().starts_with("task-"));
        assert!(id_gen.record_id().to_string().starts_with("rec-"));
        assert!(id_gen.event_id().to_string().starts_with("evt-"));
    }
}
