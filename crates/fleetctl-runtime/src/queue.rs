//! Rate-limited, deduplicating, per-key work queue (spec.md 4.B, 5).
//!
//! Per-key ordering is preserved: a key that is re-added while its reconcile
//! is in flight is marked dirty and redelivered only after that reconcile
//! returns, never dispatched to a second worker concurrently.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex, Notify};
use tokio::time::Instant;

use crate::object_store::ObjectKey;

/// Per-key exponential back-off with a floor and a ceiling (spec.md 4.B:
/// "initial ~5ms, cap ~1000s").
#[derive(Debug, Clone, Copy)]
pub struct BackoffConfig {
    pub base: Duration,
    pub max: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(5),
            max: Duration::from_secs(1000),
        }
    }
}

struct RateLimiter {
    config: BackoffConfig,
    failures: HashMap<ObjectKey, u32>,
}

impl RateLimiter {
    fn new(config: BackoffConfig) -> Self {
        Self {
            config,
            failures: HashMap::new(),
        }
    }

    /// Exponential back-off for the key's current failure count, doubling
    /// from `base` and saturating at `max`.
    fn delay_for(&self, key: &ObjectKey) -> Duration {
        let failures = self.failures.get(key).copied().unwrap_or(0);
        let scaled = self.config.base.as_millis().saturating_mul(1u128 << failures.min(30));
        Duration::from_millis(scaled.min(self.config.max.as_millis()) as u64)
    }

    fn record_failure(&mut self, key: &ObjectKey) -> Duration {
        let count = self.failures.entry(key.clone()).or_insert(0);
        *count += 1;
        self.delay_for(key)
    }

    fn forget(&mut self, key: &ObjectKey) {
        self.failures.remove(key);
    }
}

struct QueueState {
    /// Keys waiting to be dispatched, in FIFO order, deduplicated.
    pending: Vec<ObjectKey>,
    pending_set: HashSet<ObjectKey>,
    /// Keys currently out for processing.
    processing: HashSet<ObjectKey>,
    /// Keys re-added while they were processing; redelivered on completion.
    dirty: HashSet<ObjectKey>,
    shutting_down: bool,
    rate_limiter: RateLimiter,
}

/// A rate-limited, deduplicating, per-key work queue. One instance per
/// reconciler kind (spec.md 2: "A watch on each object kind feeds B").
pub struct WorkQueue {
    state: Arc<Mutex<QueueState>>,
    notify: Arc<Notify>,
}

impl Clone for WorkQueue {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            notify: self.notify.clone(),
        }
    }
}

impl WorkQueue {
    pub fn new(backoff: BackoffConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(QueueState {
                pending: Vec::new(),
                pending_set: HashSet::new(),
                processing: HashSet::new(),
                dirty: HashSet::new(),
                shutting_down: false,
                rate_limiter: RateLimiter::new(backoff),
            })),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Enqueues `key` immediately. A no-op if already pending; marks the key
    /// dirty for redelivery if it is currently being processed.
    pub async fn add(&self, key: ObjectKey) {
        let mut state = self.state.lock().await;
        if state.shutting_down {
            return;
        }
        if state.processing.contains(&key) {
            state.dirty.insert(key);
            return;
        }
        if state.pending_set.insert(key.clone()) {
            state.pending.push(key);
            drop(state);
            self.notify.notify_one();
        }
    }

    /// Enqueues `key` after `delay` -- used for `requeue-after` outcomes and
    /// the exponential back-off applied to failed reconciles.
    pub fn add_after(&self, key: ObjectKey, delay: Duration) {
        let this = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            this.add(key).await;
        });
    }

    /// Marks a reconcile of `key` as having failed transiently; re-adds it
    /// after the key's current back-off delay.
    pub async fn add_rate_limited(&self, key: ObjectKey) {
        let delay = {
            let mut state = self.state.lock().await;
            state.rate_limiter.record_failure(&key)
        };
        self.add_after(key, delay);
    }

    /// Clears a key's back-off history; call after a successful reconcile.
    pub async fn forget(&self, key: &ObjectKey) {
        let mut state = self.state.lock().await;
        state.rate_limiter.forget(key);
    }

    /// Blocks until a key is available, marking it as processing. Returns
    /// `None` once the queue is shut down and drained.
    pub async fn get(&self) -> Option<ObjectKey> {
        loop {
            {
                let mut state = self.state.lock().await;
                if !state.pending.is_empty() {
                    let key = state.pending.remove(0);
                    state.pending_set.remove(&key);
                    state.processing.insert(key.clone());
                    return Some(key);
                }
                if state.shutting_down {
                    return None;
                }
            }
            self.notify.notified().await;
        }
    }

    /// Signals that processing of `key` has finished. If the key was marked
    /// dirty while in flight, it is redelivered now.
    pub async fn done(&self, key: &ObjectKey) {
        let mut state = self.state.lock().await;
        state.processing.remove(key);
        if state.dirty.remove(key) && state.pending_set.insert(key.clone()) {
            state.pending.push(key.clone());
            drop(state);
            self.notify.notify_one();
        }
    }

    /// Stops accepting new keys; `get` continues draining what's pending
    /// until empty, then returns `None` (spec.md 4.B: "Shutdown drains
    /// pending keys and refuses new additions").
    pub async fn shutdown(&self) {
        let mut state = self.state.lock().await;
        state.shutting_down = true;
        drop(state);
        self.notify.notify_waiters();
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.pending.len()
    }
}

/// Spawns `worker_count` tasks that each loop `queue.get()` -> `reconcile`
/// -> `queue.done()`, the per-kind worker pool of spec.md 5.
pub fn spawn_workers<F, Fut>(queue: WorkQueue, worker_count: usize, reconcile: F) -> Vec<tokio::task::JoinHandle<()>>
where
    F: Fn(ObjectKey) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = ()> + Send,
{
    let reconcile = Arc::new(reconcile);
    (0..worker_count)
        .map(|_| {
            let queue = queue.clone();
            let reconcile = reconcile.clone();
            tokio::spawn(async move {
                while let Some(key) = queue.get().await {
                    let started = Instant::now();
                    reconcile(key.clone()).await;
                    tracing::debug!(key = %key, elapsed = ?started.elapsed(), "reconcile completed");
                    queue.done(&key).await;
                }
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(n: &str) -> ObjectKey {
        ObjectKey::new("default", n)
    }

    #[tokio::test]
    async fn readding_a_pending_key_is_a_no_op() {
        let q = WorkQueue::new(BackoffConfig::default());
        q.add(key("a")).await;
        q.add(key("a")).await;
        assert_eq!(q.len().await, 1);
    }

    #[tokio::test]
    async fn readding_while_processing_redelivers_after_done() {
        let q = WorkQueue::new(BackoffConfig::default());
        q.add(key("a")).await;
        let got = q.get().await.unwrap();
        assert_eq!(got, key("a"));

        // Re-added while in flight: must not be dispatched to a second
        // worker, only redelivered once `done` is called.
        q.add(key("a")).await;
        assert_eq!(q.len().await, 0);

        q.done(&key("a")).await;
        assert_eq!(q.len().await, 1);
    }

    #[tokio::test]
    async fn shutdown_drains_then_refuses_new_keys() {
        let q = WorkQueue::new(BackoffConfig::default());
        q.add(key("a")).await;
        q.shutdown().await;
        q.add(key("b")).await;

        assert_eq!(q.get().await, Some(key("a")));
        q.done(&key("a")).await;
        assert_eq!(q.get().await, None);
    }

    #[test]
    fn backoff_doubles_and_saturates_at_cap() {
        let limiter = RateLimiter::new(BackoffConfig {
            base: Duration::from_millis(5),
            max: Duration::from_millis(40),
        });
        let k = key("a");
        assert_eq!(limiter.delay_for(&k), Duration::from_millis(5));

        let mut limiter = limiter;
        limiter.record_failure(&k);
        assert_eq!(limiter.delay_for(&k), Duration::from_millis(10));
        limiter.record_failure(&k);
        limiter.record_failure(&k);
        // 5 * 2^3 = 40, exactly at the cap
        assert_eq!(limiter.delay_for(&k), Duration::from_millis(40));
        limiter.record_failure(&k);
        // would be 80 uncapped; saturates at 40
        assert_eq!(limiter.delay_for(&k), Duration::from_millis(40));
    }
}
