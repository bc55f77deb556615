//! Context-keyed sifting router.
//!
//! # Responsibilities
//! - Filter out events without a routing key
//! - Look up (or lazily create) the sink for an event's key
//! - Forward the write to that sink
//! - Expire idle sinks and stop everything at shutdown
//!
//! # Design Decisions
//! - One router per destination class (local/cloud × application/job)
//! - The router owns sink existence; callers own the act of writing
//! - A failure for one key never affects other keys

use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::event::Event;
use crate::routing::discriminator::Discriminator;
use crate::routing::filter::KeyPresenceFilter;
use crate::routing::registry::{SinkRegistry, DEFAULT_IDLE_TIMEOUT};
use crate::sink::{RouterContext, Sink, SinkError, SinkFactory};

/// Errors surfaced for a single routed event.
#[derive(Debug, Error)]
pub enum RouteError {
    /// The factory could not build a sink; the event is lost and the next
    /// event for the key retries creation.
    #[error("router {router}: cannot create sink for key {key:?}: {source}")]
    Creation {
        router: String,
        key: String,
        #[source]
        source: SinkError,
    },

    /// The resolved sink rejected the write.
    #[error("router {router}: write to sink for key {key:?} failed: {source}")]
    Write {
        router: String,
        key: String,
        #[source]
        source: SinkError,
    },

    /// The router has been stopped.
    #[error("router {0} is stopped")]
    Stopped(String),
}

/// What happened to a routed event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// No routing key; dropped by the filter.
    Suppressed,
    /// Written to the key's sink.
    Delivered,
}

/// Routes events to one sink per distinct routing key.
pub struct SiftingRouter {
    context: RouterContext,
    discriminator: Discriminator,
    filter: KeyPresenceFilter,
    factory: Box<dyn SinkFactory>,
    registry: SinkRegistry,
    idle_timeout: Duration,
}

impl SiftingRouter {
    /// Create a router named `name` keyed by the context entry `key_name`.
    pub fn new(
        name: impl Into<String>,
        key_name: impl Into<String>,
        factory: impl SinkFactory + 'static,
    ) -> Self {
        let discriminator = Discriminator::new(key_name);
        Self {
            context: RouterContext::new(name),
            filter: KeyPresenceFilter::new(discriminator.clone()),
            discriminator,
            factory: Box::new(factory),
            registry: SinkRegistry::new(),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn name(&self) -> &str {
        &self.context.router_name
    }

    pub fn key_name(&self) -> &str {
        self.discriminator.key_name()
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// Number of live sinks.
    pub fn live_sinks(&self) -> usize {
        self.registry.len()
    }

    pub fn has_sink(&self, key: &str) -> bool {
        self.registry.contains(key)
    }

    pub fn is_stopped(&self) -> bool {
        self.registry.is_closed()
    }

    /// Route one event to the sink for its key.
    pub fn route(&self, event: &Event) -> Result<RouteOutcome, RouteError> {
        if !self.filter.should_process(event) {
            return Ok(RouteOutcome::Suppressed);
        }
        let key = self.discriminator.extract(event);
        let sink = self.resolve(key)?;
        sink.write(event).map_err(|source| RouteError::Write {
            router: self.name().to_string(),
            key: key.to_string(),
            source,
        })?;
        Ok(RouteOutcome::Delivered)
    }

    /// Return the live sink for `key`, creating and registering it on first use.
    pub fn resolve(&self, key: &str) -> Result<Arc<dyn Sink>, RouteError> {
        let resolved = self
            .registry
            .get_or_try_create(key, Instant::now(), || self.factory.create(key, &self.context))
            .map_err(|source| {
                tracing::warn!(router = %self.name(), key = %key, error = %source, "Sink creation failed");
                RouteError::Creation {
                    router: self.name().to_string(),
                    key: key.to_string(),
                    source,
                }
            })?
            .ok_or_else(|| RouteError::Stopped(self.name().to_string()))?;

        if resolved.created {
            tracing::info!(
                router = %self.name(),
                key = %key,
                sink = %resolved.sink.name(),
                live = self.registry.len(),
                "Created sink"
            );
        }
        Ok(resolved.sink)
    }

    /// Stop and remove sinks idle for at least the idle timeout.
    pub fn reap(&self) -> Vec<String> {
        self.reap_at(Instant::now())
    }

    /// [`reap`](Self::reap) evaluated at an explicit instant.
    pub fn reap_at(&self, now: Instant) -> Vec<String> {
        let reaped = self.registry.expire_idle(now, self.idle_timeout);
        for key in &reaped {
            tracing::info!(router = %self.name(), key = %key, "Reaped idle sink");
        }
        reaped
    }

    /// Refuse new events and stop every live sink. Returns how many were stopped.
    pub fn stop_all(&self) -> usize {
        let stopped = self.registry.stop_all();
        tracing::info!(router = %self.name(), stopped, "Router stopped");
        stopped
    }
}

impl std::fmt::Debug for SiftingRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SiftingRouter")
            .field("name", &self.name())
            .field("key_name", &self.key_name())
            .field("idle_timeout", &self.idle_timeout)
            .field("registry", &self.registry)
            .finish()
    }
}
