//! Keyed sink cache with idle expiry.
//!
//! # Responsibilities
//! - Hold at most one live sink per routing key
//! - Create missing sinks exactly once under concurrent first use
//! - Track last use and expire idle, unreferenced sinks
//!
//! # Design Decisions
//! - Creation runs inside the key's map entry, so racing callers for a new
//!   key block on the same shard lock and then observe the one sink created
//! - Expiry takes the same entry lock and stops the sink before removing it,
//!   so a resolve for that key waits until the old sink is fully closed
//! - A sink with outstanding handles (a write in flight) is never expired;
//!   the registry's own `Arc` is the only reference when it is idle
//! - Closing is checked again inside the vacant entry, so a creation racing
//!   `stop_all` either lands before the key snapshot or is refused

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;

use crate::sink::Sink;

/// Default time after which an unused sink is expired (15 minutes).
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(15 * 60);

struct Registration {
    sink: Arc<dyn Sink>,
    last_used: Mutex<Instant>,
}

impl Registration {
    fn touch(&self, now: Instant) {
        let mut last_used = self.last_used.lock();
        if now > *last_used {
            *last_used = now;
        }
    }

    fn is_expired(&self, now: Instant, idle_timeout: Duration) -> bool {
        let idle = now.saturating_duration_since(*self.last_used.lock());
        idle >= idle_timeout && Arc::strong_count(&self.sink) == 1
    }
}

/// Result of a lookup-or-create.
pub struct Resolved {
    pub sink: Arc<dyn Sink>,
    /// True when this call constructed the sink.
    pub created: bool,
}

/// Map from routing key to live sink.
#[derive(Default)]
pub struct SinkRegistry {
    entries: DashMap<String, Registration>,
    closed: AtomicBool,
}

impl SinkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// True once [`stop_all`](Self::stop_all) has run.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.key().clone()).collect()
    }

    /// Return the live sink for `key`, building it with `create` if absent.
    ///
    /// `create` runs at most once per absent key no matter how many callers
    /// race; on error nothing is registered and the next call tries again.
    /// Returns `Ok(None)` once the registry is closed.
    pub fn get_or_try_create<E>(
        &self,
        key: &str,
        now: Instant,
        create: impl FnOnce() -> Result<Arc<dyn Sink>, E>,
    ) -> Result<Option<Resolved>, E> {
        if self.is_closed() {
            return Ok(None);
        }
        if let Some(registration) = self.entries.get(key) {
            registration.touch(now);
            return Ok(Some(Resolved {
                sink: registration.sink.clone(),
                created: false,
            }));
        }

        match self.entries.entry(key.to_string()) {
            Entry::Occupied(occupied) => {
                let registration = occupied.get();
                registration.touch(now);
                Ok(Some(Resolved {
                    sink: registration.sink.clone(),
                    created: false,
                }))
            }
            Entry::Vacant(vacant) => {
                // `stop_all` closes before it snapshots keys; under the shard
                // lock this insert is either visible to it or refused here.
                if self.is_closed() {
                    return Ok(None);
                }
                let sink = create()?;
                vacant.insert(Registration {
                    sink: sink.clone(),
                    last_used: Mutex::new(now),
                });
                Ok(Some(Resolved { sink, created: true }))
            }
        }
    }

    /// Stop and remove every sink idle for at least `idle_timeout` at `now`.
    /// Returns the expired keys.
    pub fn expire_idle(&self, now: Instant, idle_timeout: Duration) -> Vec<String> {
        let candidates: Vec<String> = self
            .entries
            .iter()
            .filter(|e| e.value().is_expired(now, idle_timeout))
            .map(|e| e.key().clone())
            .collect();

        let mut expired = Vec::with_capacity(candidates.len());
        for key in candidates {
            if let Entry::Occupied(occupied) = self.entries.entry(key) {
                // Re-check under the entry lock: the key may have been used
                // since the scan.
                if occupied.get().is_expired(now, idle_timeout) {
                    occupied.get().sink.stop();
                    let (key, _) = occupied.remove_entry();
                    expired.push(key);
                }
            }
        }
        expired
    }

    /// Close the registry, then stop and remove every sink regardless of
    /// idleness. No sink can be registered afterwards.
    pub fn stop_all(&self) -> usize {
        self.closed.store(true, Ordering::SeqCst);
        let mut stopped = 0;
        for key in self.keys() {
            if let Entry::Occupied(occupied) = self.entries.entry(key) {
                occupied.get().sink.stop();
                occupied.remove();
                stopped += 1;
            }
        }
        stopped
    }
}

impl std::fmt::Debug for SinkRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SinkRegistry")
            .field("keys", &self.keys())
            .field("closed", &self.is_closed())
            .finish()
    }
}
