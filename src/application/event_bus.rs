use crate::domain::events::{EventHandler, TradingEvent};
use futures::FutureExt;
use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, Notify, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// A subscriber registered against either a specific event kind or every event.
struct Subscription {
    kind: Option<&'static str>,
    handler: Arc<dyn EventHandler>,
}

struct QueueItem {
    priority: u8,
    sequence: u64,
    event: TradingEvent,
}

impl PartialEq for QueueItem {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.sequence == other.sequence
    }
}
impl Eq for QueueItem {}

impl Ord for QueueItem {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        // BinaryHeap is a max-heap; invert priority so lower value sorts first,
        // and invert sequence so earlier insertions win FIFO ties.
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}
impl PartialOrd for QueueItem {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

/// Priority queue + worker pool event bus (spec §4.1). Lower priority value is
/// more urgent; ties break FIFO by insertion sequence.
pub struct EventBus {
    queue: Arc<Mutex<BinaryHeap<QueueItem>>>,
    capacity: usize,
    notify: Arc<Notify>,
    sequence: Arc<AtomicU64>,
    subscriptions: Arc<RwLock<Vec<Subscription>>>,
    pub(crate) running: Arc<AtomicBool>,
    workers: Arc<Mutex<Vec<JoinHandle<()>>>>,
    dropped_count: Arc<AtomicU64>,
    handled_count: Arc<AtomicU64>,
    error_count: Arc<AtomicU64>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: Arc::new(Mutex::new(BinaryHeap::new())),
            capacity,
            notify: Arc::new(Notify::new()),
            sequence: Arc::new(AtomicU64::new(0)),
            subscriptions: Arc::new(RwLock::new(Vec::new())),
            running: Arc::new(AtomicBool::new(false)),
            workers: Arc::new(Mutex::new(Vec::new())),
            dropped_count: Arc::new(AtomicU64::new(0)),
            handled_count: Arc::new(AtomicU64::new(0)),
            error_count: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped_count.load(Ordering::Relaxed)
    }

    pub fn handled_count(&self) -> u64 {
        self.handled_count.load(Ordering::Relaxed)
    }

    pub fn error_count(&self) -> u64 {
        self.error_count.load(Ordering::Relaxed)
    }

    pub async fn queue_depth(&self) -> usize {
        self.queue.lock().await.len()
    }

    pub async fn subscribe(&self, kind: &'static str, handler: Arc<dyn EventHandler>) {
        self.subscriptions
            .write()
            .await
            .push(Subscription { kind: Some(kind), handler });
    }

    pub async fn subscribe_all(&self, handler: Arc<dyn EventHandler>) {
        self.subscriptions
            .write()
            .await
            .push(Subscription { kind: None, handler });
    }

    /// Enqueues an event at its default priority. Returns `true` if queued,
    /// `false` if dropped (queue full or bus stopped).
    pub async fn publish(&self, event: TradingEvent) -> bool {
        self.publish_with_priority(event.default_priority(), event).await
    }

    pub async fn publish_with_priority(&self, priority: u8, event: TradingEvent) -> bool {
        if !self.running.load(Ordering::Acquire) {
            self.dropped_count.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        let mut queue = self.queue.lock().await;
        if queue.len() >= self.capacity {
            self.dropped_count.fetch_add(1, Ordering::Relaxed);
            warn!(event = event.name(), "event bus queue full, dropping event");
            return false;
        }
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        queue.push(QueueItem { priority, sequence, event });
        drop(queue);
        self.notify.notify_one();
        true
    }

    /// Spawns `worker_count` worker tasks that dequeue and dispatch events.
    pub async fn start(&self, worker_count: usize) {
        if self.running.swap(true, Ordering::AcqRel) {
            return;
        }
        info!(worker_count, "event bus starting");
        let mut workers = self.workers.lock().await;
        for id in 0..worker_count.max(1) {
            let queue = self.queue.clone();
            let notify = self.notify.clone();
            let subscriptions = self.subscriptions.clone();
            let running = self.running.clone();
            let handled_count = self.handled_count.clone();
            let error_count = self.error_count.clone();
            workers.push(tokio::spawn(async move {
                Self::worker_loop(id, queue, notify, subscriptions, running, handled_count, error_count).await;
            }));
        }
    }

    async fn worker_loop(
        id: usize,
        queue: Arc<Mutex<BinaryHeap<QueueItem>>>,
        notify: Arc<Notify>,
        subscriptions: Arc<RwLock<Vec<Subscription>>>,
        running: Arc<AtomicBool>,
        handled_count: Arc<AtomicU64>,
        error_count: Arc<AtomicU64>,
    ) {
        loop {
            let item = {
                let mut q = queue.lock().await;
                q.pop()
            };
            let item = match item {
                Some(item) => item,
                None => {
                    if !running.load(Ordering::Acquire) {
                        break;
                    }
                    notify.notified().await;
                    continue;
                }
            };

            let subs = subscriptions.read().await;
            let name = item.event.name();
            for sub in subs.iter() {
                if sub.kind.is_some_and(|k| k != name) {
                    continue;
                }
                let handler = sub.handler.clone();
                let event = item.event.clone();
                handled_count.fetch_add(1, Ordering::Relaxed);
                let error_count = error_count.clone();
                tokio::spawn(async move {
                    let outcome = std::panic::AssertUnwindSafe(handler.handle(&event)).catch_unwind().await;
                    if let Err(panic) = outcome {
                        error_count.fetch_add(1, Ordering::Relaxed);
                        let message = panic
                            .downcast_ref::<&str>()
                            .map(|s| s.to_string())
                            .or_else(|| panic.downcast_ref::<String>().cloned())
                            .unwrap_or_else(|| "handler panicked".to_string());
                        handler.on_error(&event, &message);
                    }
                });
            }
            drop(subs);

            if !running.load(Ordering::Acquire) {
                let remaining = queue.lock().await.is_empty();
                if remaining {
                    break;
                }
            }
        }
        debug!(worker = id, "event bus worker exiting");
    }

    /// Idempotent: signals workers, lets in-flight handlers complete, then
    /// discards anything still queued.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::AcqRel) {
            return;
        }
        self.notify.notify_waiters();
        let mut workers = self.workers.lock().await;
        for worker in workers.drain(..) {
            let _ = worker.await;
        }
        let mut queue = self.queue.lock().await;
        queue.clear();
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            queue: self.queue.clone(),
            capacity: self.capacity,
            notify: self.notify.clone(),
            sequence: self.sequence.clone(),
            subscriptions: self.subscriptions.clone(),
            running: self.running.clone(),
            workers: self.workers.clone(),
            dropped_count: self.dropped_count.clone(),
            handled_count: self.handled_count.clone(),
            error_count: self.error_count.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    struct CountingHandler {
        count: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl EventHandler for CountingHandler {
        async fn handle(&self, _event: &TradingEvent) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn publish_fans_out_to_all_subscribers() {
        let bus = EventBus::new(10);
        bus.start(2).await;
        let count = Arc::new(AtomicUsize::new(0));
        bus.subscribe_all(Arc::new(CountingHandler { count: count.clone() })).await;

        bus.publish(TradingEvent::SystemStart { timestamp: 0 }).await;
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        bus.stop().await;
    }

    #[tokio::test]
    async fn publish_drops_when_queue_full() {
        let bus = EventBus::new(1);
        bus.running.store(true, Ordering::SeqCst);
        let accepted1 = bus.publish(TradingEvent::SystemStart { timestamp: 0 }).await;
        let accepted2 = bus.publish(TradingEvent::SystemStart { timestamp: 1 }).await;
        assert!(accepted1);
        assert!(!accepted2);
        assert_eq!(bus.dropped_count(), 1);
    }

    #[tokio::test]
    async fn start_and_stop_are_idempotent() {
        let bus = EventBus::new(10);
        bus.start(1).await;
        bus.start(1).await;
        bus.stop().await;
        bus.stop().await;
        assert!(!bus.is_running());
    }
}
