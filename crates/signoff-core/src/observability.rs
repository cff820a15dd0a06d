//! Observability - 通知の集計とログ初期化

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

/// EventNotifier の集計値（スナップショット）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifierStats {
    /// Accepted into the queue.
    pub enqueued: u64,
    /// Refused because the queue was full or the notifier was stopped.
    pub dropped: u64,
    /// Handler deliveries that eventually succeeded.
    pub delivered: u64,
    /// Handler deliveries that ran out of attempts.
    pub failed: u64,
}

/// 共有カウンタ。ワーカーと配送タスクから更新される。
#[derive(Debug, Default)]
pub(crate) struct NotifierCounters {
    enqueued: AtomicU64,
    dropped: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
}

impl NotifierCounters {
    pub(crate) fn enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> NotifierStats {
        NotifierStats {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Installs a fmt subscriber filtered by `RUST_LOG` (default `info`).
///
/// Safe to call more than once; later calls keep the existing subscriber.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_err()
    {
        tracing::debug!("global tracing subscriber already initialized");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_snapshot() {
        let counters = NotifierCounters::default();
        counters.enqueued();
        counters.enqueued();
        counters.dropped();
        counters.delivered();
        assert_eq!(
            counters.snapshot(),
            NotifierStats {
                enqueued: 2,
                dropped: 1,
                delivered: 1,
                failed: 0
            }
        );
    }

    #[test]
    fn init_tracing_twice_is_harmless() {
        init_tracing();
        init_tracing();
    }
}
