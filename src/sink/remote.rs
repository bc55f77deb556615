//! Remote buffered sink.
//!
//! # Data Flow
//! ```text
//! write(event) → encode → pending queue (in memory, ordered)
//!
//! FlushExecutor (tick / flush() / stop()):
//!     → take snapshot of the first N pending entries
//!     → ObjectStore::put(<key>/<instance>_<seq>, document_type, bytes) with retries
//!     → drop exactly those N entries (success, or retries exhausted)
//! ```
//!
//! # Design Decisions
//! - Producers never wait on the network
//! - Events appended during a flush stay queued for the next one
//! - A batch keeps its storage id across retries, so a retried put overwrites
//!   rather than duplicates

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::encoder::Encoder;
use crate::event::{now_millis, Event};
use crate::lifecycle::executor::{FlushExecutor, PendingFlush};
use crate::resilience::RetryPolicy;
use crate::sink::{Sink, SinkError};
use crate::storage::{DocumentType, ObjectStore};

/// Dependencies shared by every remote sink in the process.
#[derive(Debug, Clone)]
pub struct RemoteShared {
    pub store: Arc<dyn ObjectStore>,
    pub executor: Arc<FlushExecutor>,
    pub retry: RetryPolicy,
}

/// What one flush did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing was pending.
    Empty,
    /// The batch was stored under `storage_id`.
    Persisted { storage_id: String, events: usize },
    /// Every attempt failed; the batch was discarded.
    Dropped { storage_id: String, events: usize },
}

/// The pending queue and upload state of one remote sink.
pub struct RemoteBuffer {
    name: String,
    base_storage_id: String,
    document_type: DocumentType,
    store: Arc<dyn ObjectStore>,
    retry: RetryPolicy,
    instance: String,
    sequence: AtomicU64,
    pending: Mutex<VecDeque<Vec<u8>>>,
    flush_lock: tokio::sync::Mutex<()>,
}

impl RemoteBuffer {
    fn next_storage_id(&self) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{}/{}_{:06}", self.base_storage_id, self.instance, seq)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Persist the current pending prefix as one batch.
    pub async fn flush_now(&self) -> FlushOutcome {
        let _exclusive = self.flush_lock.lock().await;

        let (events, payload) = {
            let pending = self.pending.lock();
            if pending.is_empty() {
                return FlushOutcome::Empty;
            }
            let payload: Vec<u8> = pending.iter().flatten().copied().collect();
            (pending.len(), payload)
        };
        let storage_id = self.next_storage_id();

        let result = self
            .retry
            .run("remote log flush", || {
                self.store.put(&storage_id, self.document_type, payload.clone())
            })
            .await;

        // Only this task removes entries and it holds the flush lock, so the
        // first `events` entries are still the ones that were sent.
        self.pending.lock().drain(..events);

        match result {
            Ok(()) => {
                tracing::debug!(sink = %self.name, storage_id = %storage_id, events, "Flushed log batch");
                FlushOutcome::Persisted { storage_id, events }
            }
            Err(e) => {
                tracing::error!(
                    sink = %self.name,
                    storage_id = %storage_id,
                    events,
                    error = %e,
                    "Dropping log batch after exhausting retries"
                );
                FlushOutcome::Dropped { storage_id, events }
            }
        }
    }
}

#[async_trait]
impl PendingFlush for RemoteBuffer {
    fn label(&self) -> &str {
        &self.name
    }

    async fn flush_pending(&self) {
        self.flush_now().await;
    }
}

/// Buffers events for one (routing key, document type) pair and uploads them
/// through the shared [`FlushExecutor`].
pub struct RemoteBufferedSink {
    buffer: Arc<RemoteBuffer>,
    encoder: Arc<dyn Encoder>,
    executor: Arc<FlushExecutor>,
    registration: u64,
    stopped: AtomicBool,
}

impl RemoteBufferedSink {
    /// Create the sink and register it for periodic flushing.
    pub fn new(
        name: impl Into<String>,
        base_storage_id: impl Into<String>,
        document_type: DocumentType,
        encoder: Arc<dyn Encoder>,
        shared: &RemoteShared,
    ) -> Self {
        let buffer = Arc::new(RemoteBuffer {
            name: name.into(),
            base_storage_id: base_storage_id.into(),
            document_type,
            store: shared.store.clone(),
            retry: shared.retry,
            instance: format!("{}_{}", now_millis(), uuid::Uuid::new_v4().simple()),
            sequence: AtomicU64::new(0),
            pending: Mutex::new(VecDeque::new()),
            flush_lock: tokio::sync::Mutex::new(()),
        });
        let as_flush: Arc<dyn PendingFlush> = buffer.clone();
        let registration = shared.executor.register(&as_flush);

        Self {
            buffer,
            encoder,
            executor: shared.executor.clone(),
            registration,
            stopped: AtomicBool::new(false),
        }
    }

    pub fn base_storage_id(&self) -> &str {
        &self.buffer.base_storage_id
    }

    pub fn document_type(&self) -> DocumentType {
        self.buffer.document_type
    }

    pub fn pending_len(&self) -> usize {
        self.buffer.pending_len()
    }

    /// Flush inline instead of through the executor.
    pub async fn flush_now(&self) -> FlushOutcome {
        self.buffer.flush_now().await
    }
}

impl std::fmt::Debug for RemoteBufferedSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteBufferedSink")
            .field("name", &self.buffer.name)
            .field("base_storage_id", &self.buffer.base_storage_id)
            .field("document_type", &self.buffer.document_type)
            .field("pending", &self.pending_len())
            .finish()
    }
}

impl Sink for RemoteBufferedSink {
    fn name(&self) -> &str {
        &self.buffer.name
    }

    fn write(&self, event: &Event) -> Result<(), SinkError> {
        let bytes = self.encoder.encode(event);
        let mut pending = self.buffer.pending.lock();
        if self.is_stopped() {
            return Err(SinkError::Stopped(self.buffer.name.clone()));
        }
        pending.push_back(bytes);
        Ok(())
    }

    fn flush(&self) -> Result<(), SinkError> {
        self.executor.submit(self.buffer.clone());
        Ok(())
    }

    fn stop(&self) {
        {
            // Taking the queue lock orders the flag against in-flight writes.
            let _pending = self.buffer.pending.lock();
            if self.stopped.swap(true, Ordering::SeqCst) {
                return;
            }
        }
        self.executor.deregister(self.registration);

        let pending = self.pending_len();
        if pending == 0 {
            return;
        }
        if !self.executor.submit(self.buffer.clone()) {
            tracing::warn!(sink = %self.buffer.name, events = pending, "Remote sink stopped after executor shutdown, buffered events lost");
        }
    }

    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}
