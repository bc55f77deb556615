//! Process-level start and ordered shutdown.
//!
//! # Data Flow
//! ```text
//! start(config, store):
//!     FlushExecutor (if remote) → Destinations → Dispatcher
//!     → spawn flush ticker + idle reaper (both subscribed to Shutdown)
//!
//! shutdown():
//!     1. dispatcher.close()        stop accepting events
//!     2. Shutdown::trigger()       ticker and reaper leave their loops
//!     3. router.stop_all()         every sink flushed + closed once
//!     4. executor.drain(grace)     pending remote batches, bounded wait
//!     5. platform.stop()           console flushed last
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use thiserror::Error;
use tokio::runtime::{Handle, TryCurrentError};
use tokio::task::JoinHandle;

use crate::config::{validate_config, LogRoutingConfig, ValidationError};
use crate::event::Event;
use crate::lifecycle::executor::{DrainReport, FlushExecutor};
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::startup::{encoder_for, retry_policy, Destinations};
use crate::routing::{DispatchError, Dispatcher, IdleReaper};
use crate::sink::remote::RemoteShared;
use crate::storage::ObjectStore;

/// Errors that prevent the log router from starting.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("log router must be started inside a Tokio runtime: {0}")]
    NoRuntime(#[from] TryCurrentError),

    #[error("remote destinations are enabled but no object store was provided")]
    MissingStore,

    #[error("invalid configuration: {0:?}")]
    InvalidConfig(Vec<ValidationError>),
}

/// Summary of one completed shutdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Sinks stopped across all routers.
    pub sinks_stopped: usize,
    /// Remote drain result; `None` without remote destinations.
    pub drain: Option<DrainReport>,
    pub elapsed: Duration,
}

/// Owns every destination, the shared flush executor and the background
/// tasks for the lifetime of the process.
pub struct LifecycleManager {
    config: LogRoutingConfig,
    dispatcher: Arc<Dispatcher>,
    executor: Option<Arc<FlushExecutor>>,
    shutdown: Shutdown,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    report: tokio::sync::Mutex<Option<ShutdownReport>>,
}

impl LifecycleManager {
    /// Build and start all destinations. Must run inside a Tokio runtime.
    pub fn start(config: LogRoutingConfig, store: Option<Arc<dyn ObjectStore>>) -> Result<Self, StartupError> {
        validate_config(&config).map_err(StartupError::InvalidConfig)?;
        let handle = Handle::try_current()?;
        let shutdown = Shutdown::new();
        let mut tasks = Vec::new();

        let encoder = encoder_for(config.lifecycle.encoder);

        let remote = if config.remote.enabled {
            let store = store.ok_or(StartupError::MissingStore)?;
            let executor = Arc::new(FlushExecutor::new(
                handle.clone(),
                config.remote.flush_interval(),
                config.remote.max_concurrent_flushes,
            ));
            tasks.push(executor.spawn_ticker(shutdown.subscribe()));
            Some(RemoteShared {
                store,
                executor,
                retry: retry_policy(&config.remote.retry),
            })
        } else {
            if store.is_some() {
                tracing::info!("Object store provided but remote destinations are disabled");
            }
            None
        };

        let destinations = Destinations::build(&config, encoder, remote.as_ref());

        let reap_interval = config
            .router
            .reap_interval_secs
            .map(Duration::from_secs)
            .unwrap_or_else(|| IdleReaper::interval_for(&destinations.routers));
        let reaper = IdleReaper::new(destinations.routers.clone(), reap_interval);
        tasks.push(handle.spawn(reaper.run(shutdown.subscribe())));

        let dispatcher = Arc::new(
            Dispatcher::new(destinations.platform, destinations.routers).with_min_level(config.root_level),
        );

        tracing::info!(
            root_level = %config.root_level,
            remote = config.remote.enabled,
            reap_interval_secs = reap_interval.as_secs(),
            "Log router started"
        );

        Ok(Self {
            config,
            dispatcher,
            executor: remote.map(|r| r.executor),
            shutdown,
            tasks: Mutex::new(tasks),
            report: tokio::sync::Mutex::new(None),
        })
    }

    pub fn config(&self) -> &LogRoutingConfig {
        &self.config
    }

    /// Shared handle for producers (e.g. the tracing layer).
    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        self.dispatcher.clone()
    }

    pub fn executor(&self) -> Option<&Arc<FlushExecutor>> {
        self.executor.as_ref()
    }

    pub fn dispatch(&self, event: &Event) -> Vec<DispatchError> {
        self.dispatcher.dispatch(event)
    }

    /// Run the ordered shutdown. Later calls return the first report.
    pub async fn shutdown(&self) -> ShutdownReport {
        let mut report = self.report.lock().await;
        if let Some(done) = report.as_ref() {
            return done.clone();
        }

        let started = Instant::now();
        let grace = self.config.lifecycle.shutdown_grace();
        tracing::info!(grace_secs = grace.as_secs(), "Log router shutting down");

        self.dispatcher.close();
        self.shutdown.trigger();

        let sinks_stopped = self
            .dispatcher
            .routers()
            .iter()
            .map(|router| router.stop_all())
            .sum();

        let drain = match &self.executor {
            Some(executor) => Some(executor.drain(grace).await),
            None => None,
        };

        if let Some(platform) = self.dispatcher.platform() {
            platform.stop();
        }

        let tasks: Vec<JoinHandle<()>> = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Background task ended abnormally");
            }
        }

        let done = ShutdownReport {
            sinks_stopped,
            drain,
            elapsed: started.elapsed(),
        };
        tracing::info!(
            sinks_stopped,
            drained = drain.map_or(true, |d| d.completed),
            elapsed_ms = done.elapsed.as_millis() as u64,
            "Log router stopped"
        );
        *report = Some(done.clone());
        done
    }
}

impl std::fmt::Debug for LifecycleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleManager")
            .field("dispatcher", &self.dispatcher)
            .field("executor", &self.executor)
            .field("shutdown", &self.shutdown)
            .finish()
    }
}
