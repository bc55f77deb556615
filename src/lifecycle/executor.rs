//! Shared background executor for remote buffer flushes.
//!
//! # Responsibilities
//! - Periodically flush every registered buffer
//! - Run on-demand flushes (sink stop, explicit flush)
//! - Bound flush concurrency with a semaphore
//! - Drain outstanding flushes at shutdown within a grace period
//!
//! # Design Decisions
//! - One executor per process, owned by the lifecycle manager and injected
//!   into every remote sink
//! - Buffers are held weakly; a dropped sink simply stops being ticked
//! - Same-buffer exclusivity is the buffer's job (`flush_pending` serializes)

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tokio_util::task::TaskTracker;

/// Default period between background flushes.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(60);

/// Default number of flushes allowed to run at once.
pub const DEFAULT_MAX_CONCURRENT_FLUSHES: usize = 4;

/// A buffer the executor knows how to flush.
#[async_trait]
pub trait PendingFlush: Send + Sync {
    /// Name used in diagnostics.
    fn label(&self) -> &str;

    /// Persist whatever is pending. Must serialize concurrent calls itself.
    async fn flush_pending(&self);
}

/// Result of [`FlushExecutor::drain`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    /// All flushes finished inside the grace period.
    pub completed: bool,
    /// Flush tasks still running when the grace period ran out.
    pub abandoned: usize,
}

pub struct FlushExecutor {
    handle: Handle,
    tracker: TaskTracker,
    permits: Arc<Semaphore>,
    buffers: DashMap<u64, Weak<dyn PendingFlush>>,
    next_id: AtomicU64,
    accepting: AtomicBool,
    interval: Duration,
}

impl FlushExecutor {
    /// Create an executor that spawns onto `handle`.
    pub fn new(handle: Handle, interval: Duration, max_concurrent: usize) -> Self {
        Self {
            handle,
            tracker: TaskTracker::new(),
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            buffers: DashMap::new(),
            next_id: AtomicU64::new(1),
            accepting: AtomicBool::new(true),
            interval,
        }
    }

    /// Create an executor on the current Tokio runtime.
    ///
    /// # Panics
    /// Panics when called outside a Tokio runtime.
    pub fn on_current_runtime(interval: Duration, max_concurrent: usize) -> Self {
        Self::new(Handle::current(), interval, max_concurrent)
    }

    /// Add a buffer to the periodic flush set. Returns its registration id.
    pub fn register(&self, buffer: &Arc<dyn PendingFlush>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.buffers.insert(id, Arc::downgrade(buffer));
        id
    }

    pub fn deregister(&self, id: u64) {
        self.buffers.remove(&id);
    }

    /// Number of buffers in the periodic flush set.
    pub fn registered(&self) -> usize {
        self.buffers.len()
    }

    /// Flush tasks spawned and not yet finished.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::SeqCst)
    }

    /// Schedule one flush of `buffer`. Returns false once draining has begun.
    pub fn submit(&self, buffer: Arc<dyn PendingFlush>) -> bool {
        if !self.is_accepting() {
            tracing::warn!(buffer = %buffer.label(), "Flush executor stopped, flush request dropped");
            return false;
        }
        let permits = self.permits.clone();
        self.tracker.spawn_on(
            async move {
                let Ok(_permit) = permits.acquire_owned().await else {
                    return;
                };
                buffer.flush_pending().await;
            },
            &self.handle,
        );
        true
    }

    /// Schedule a flush of every registered buffer.
    pub fn flush_all(&self) -> usize {
        let live: Vec<Arc<dyn PendingFlush>> = self
            .buffers
            .iter()
            .filter_map(|entry| entry.value().upgrade())
            .collect();
        self.buffers.retain(|_, weak| weak.strong_count() > 0);

        let count = live.len();
        for buffer in live {
            self.submit(buffer);
        }
        count
    }

    /// Start the periodic flush loop. Exits on the shutdown signal.
    pub fn spawn_ticker(self: &Arc<Self>, mut shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        let executor = Arc::clone(self);
        self.handle.spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + executor.interval, executor.interval);
            tracing::debug!(interval_ms = executor.interval.as_millis() as u64, "Flush ticker started");
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let flushed = executor.flush_all();
                        tracing::trace!(buffers = flushed, "Periodic flush scheduled");
                    }
                    _ = shutdown.recv() => {
                        tracing::debug!("Flush ticker received shutdown signal, exiting loop");
                        break;
                    }
                }
            }
        })
    }

    /// Flush every registered buffer one last time, stop accepting work and
    /// wait up to `grace` for outstanding flushes.
    pub async fn drain(&self, grace: Duration) -> DrainReport {
        self.flush_all();
        self.accepting.store(false, Ordering::SeqCst);
        self.tracker.close();

        match time::timeout(grace, self.tracker.wait()).await {
            Ok(()) => {
                tracing::info!("Flush executor drained");
                DrainReport {
                    completed: true,
                    abandoned: 0,
                }
            }
            Err(_) => {
                let abandoned = self.tracker.len();
                tracing::warn!(
                    abandoned,
                    grace_ms = grace.as_millis() as u64,
                    "Shutdown grace period exceeded, dropping pending remote log batches"
                );
                DrainReport {
                    completed: false,
                    abandoned,
                }
            }
        }
    }
}

impl std::fmt::Debug for FlushExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlushExecutor")
            .field("interval", &self.interval)
            .field("registered", &self.buffers.len())
            .field("in_flight", &self.tracker.len())
            .field("accepting", &self.is_accepting())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct Counting {
        flushes: AtomicUsize,
        delay: Duration,
    }

    impl Counting {
        fn new(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                flushes: AtomicUsize::new(0),
                delay,
            })
        }
    }

    #[async_trait]
    impl PendingFlush for Counting {
        fn label(&self) -> &str {
            "counting"
        }

        async fn flush_pending(&self) {
            time::sleep(self.delay).await;
            self.flushes.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_ticker_flushes_registered_buffers() {
        let executor = Arc::new(FlushExecutor::on_current_runtime(Duration::from_millis(20), 2));
        let buffer = Counting::new(Duration::ZERO);
        let dyn_buffer: Arc<dyn PendingFlush> = buffer.clone();
        executor.register(&dyn_buffer);

        let (tx, rx) = broadcast::channel(1);
        let ticker = executor.spawn_ticker(rx);
        time::sleep(Duration::from_millis(120)).await;
        let _ = tx.send(());
        ticker.await.unwrap();

        assert!(buffer.flushes.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn test_dropped_buffers_are_forgotten() {
        let executor = FlushExecutor::on_current_runtime(Duration::from_secs(60), 1);
        {
            let dyn_buffer: Arc<dyn PendingFlush> = Counting::new(Duration::ZERO);
            executor.register(&dyn_buffer);
        }
        assert_eq!(executor.flush_all(), 0);
        assert_eq!(executor.registered(), 0);
    }

    #[tokio::test]
    async fn test_drain_waits_for_flushes() {
        let executor = FlushExecutor::on_current_runtime(Duration::from_secs(60), 4);
        let buffer = Counting::new(Duration::from_millis(30));
        let dyn_buffer: Arc<dyn PendingFlush> = buffer.clone();
        executor.register(&dyn_buffer);

        let report = executor.drain(Duration::from_secs(5)).await;
        assert!(report.completed);
        assert_eq!(buffer.flushes.load(Ordering::SeqCst), 1);
        assert!(!executor.submit(dyn_buffer));
    }

    #[tokio::test]
    async fn test_drain_gives_up_after_grace() {
        let executor = FlushExecutor::on_current_runtime(Duration::from_secs(60), 4);
        let slow: Arc<dyn PendingFlush> = Counting::new(Duration::from_secs(30));
        executor.submit(slow);

        let report = executor.drain(Duration::from_millis(50)).await;
        assert!(!report.completed);
        assert_eq!(report.abandoned, 1);
    }
}
