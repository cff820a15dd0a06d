//! EventNotifier - 非同期・再試行付きのイベント配送
//!
//! # 構成
//! - `notify` は有界キューへの `try_send` だけ。満杯なら捨ててカウントする（呼び出し元を止めない）
//! - ワーカー 1 つがキューを読み、イベントごとにハンドラ数だけ配送タスクを JoinSet に spawn する
//! - 配送タスクは RetryPolicy に従って再試行し、使い切ったらログに残して捨てる
//!
//! # 停止
//! `stop()` はワーカーに停止を伝え、キューに残っているイベントを配り、
//! 実行中の配送タスクがすべて終わるまで待つ。何度呼んでもよい。

mod retry;

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, warn};

use crate::domain::events::Event;
use crate::observability::{NotifierCounters, NotifierStats};
use crate::ports::{EventHandler, EventSink};

pub use self::retry::RetryPolicy;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    /// Bounded queue size. Events beyond it are dropped.
    pub queue_capacity: usize,
    pub retry: RetryPolicy,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 100,
            retry: RetryPolicy::default(),
        }
    }
}

pub struct EventNotifier {
    tx: mpsc::Sender<Event>,
    shutdown_tx: watch::Sender<bool>,
    worker: Mutex<Option<JoinHandle<()>>>,
    counters: Arc<NotifierCounters>,
}

impl EventNotifier {
    /// Spawns the delivery worker. Must be called within a Tokio runtime.
    pub fn start(config: NotifierConfig, handlers: Vec<Arc<dyn EventHandler>>) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let counters = Arc::new(NotifierCounters::default());

        let worker = Worker {
            handlers: handlers.into(),
            retry: config.retry,
            counters: Arc::clone(&counters),
            deliveries: JoinSet::new(),
        };
        let join = tokio::spawn(worker.run(rx, shutdown_rx));

        Self {
            tx,
            shutdown_tx,
            worker: Mutex::new(Some(join)),
            counters,
        }
    }

    pub fn stats(&self) -> NotifierStats {
        self.counters.snapshot()
    }

    /// Stops taking events and waits for queued and in-flight deliveries.
    pub async fn stop(&self) {
        // ignore send error: the worker may already be gone
        let _ = self.shutdown_tx.send(true);

        let join = self.worker.lock().take();
        if let Some(join) = join
            && let Err(err) = join.await
        {
            error!(error = %err, "event notifier worker panicked");
        }
    }
}

impl EventSink for EventNotifier {
    fn notify(&self, event: Event) {
        if *self.shutdown_tx.borrow() {
            self.counters.dropped();
            warn!(event_id = %event.id, event_type = %event.event_type, "event notifier stopped; event dropped");
            return;
        }

        match self.tx.try_send(event) {
            Ok(()) => self.counters.enqueued(),
            Err(mpsc::error::TrySendError::Full(event)) => {
                self.counters.dropped();
                warn!(event_id = %event.id, event_type = %event.event_type, "event queue full; event dropped");
            }
            Err(mpsc::error::TrySendError::Closed(event)) => {
                self.counters.dropped();
                warn!(event_id = %event.id, event_type = %event.event_type, "event queue closed; event dropped");
            }
        }
    }
}

struct Worker {
    handlers: Arc<[Arc<dyn EventHandler>]>,
    retry: RetryPolicy,
    counters: Arc<NotifierCounters>,
    deliveries: JoinSet<()>,
}

impl Worker {
    async fn run(mut self, mut rx: mpsc::Receiver<Event>, mut shutdown_rx: watch::Receiver<bool>) {
        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            tokio::select! {
                biased;
                // sender dropped counts as shutdown too
                changed = shutdown_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                event = rx.recv() => match event {
                    Some(event) => self.dispatch(event),
                    None => break,
                },
                Some(joined) = self.deliveries.join_next(), if !self.deliveries.is_empty() => {
                    log_join(joined);
                }
            }
        }

        rx.close();
        while let Some(event) = rx.recv().await {
            self.dispatch(event);
        }
        while let Some(joined) = self.deliveries.join_next().await {
            log_join(joined);
        }
        debug!("event notifier worker stopped");
    }

    fn dispatch(&mut self, event: Event) {
        let event = Arc::new(event);
        for handler in self.handlers.iter() {
            self.deliveries.spawn(deliver(
                Arc::clone(handler),
                Arc::clone(&event),
                self.retry.clone(),
                Arc::clone(&self.counters),
            ));
        }
    }
}

fn log_join(joined: Result<(), tokio::task::JoinError>) {
    if let Err(err) = joined {
        error!(error = %err, "event delivery task panicked");
    }
}

/// Delivers one event to one handler, retrying with backoff.
async fn deliver(
    handler: Arc<dyn EventHandler>,
    event: Arc<Event>,
    retry: RetryPolicy,
    counters: Arc<NotifierCounters>,
) {
    let mut attempt = 0;
    loop {
        attempt += 1;
        match handler.handle(&event).await {
            Ok(()) => {
                counters.delivered();
                debug!(
                    handler = handler.name(),
                    event_id = %event.id,
                    event_type = %event.event_type,
                    attempt,
                    "event delivered"
                );
                return;
            }
            Err(err) if retry.should_retry(attempt) => {
                let delay = retry.next_delay(attempt);
                warn!(
                    handler = handler.name(),
                    event_id = %event.id,
                    event_type = %event.event_type,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "event delivery failed; retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => {
                counters.failed();
                error!(
                    handler = handler.name(),
                    event_id = %event.id,
                    event_type = %event.event_type,
                    attempt,
                    error = %err,
                    "event delivery failed; giving up"
                );
                return;
            }
        }
    }
}
