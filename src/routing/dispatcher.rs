//! Fan-out of every event to all destinations.
//!
//! # Responsibilities
//! - Drop events below the root level
//! - Deliver each event to the platform console and to every router
//! - Isolate failures per destination
//! - Refuse events once closed (first step of shutdown)

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::event::{Event, Level};
use crate::routing::router::{RouteError, SiftingRouter};
use crate::sink::{Sink, SinkError};

/// Failure for one destination while dispatching one event.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("platform sink: {0}")]
    Platform(#[source] SinkError),

    #[error(transparent)]
    Route(#[from] RouteError),

    #[error("dispatcher is closed")]
    Closed,
}

/// Entry point for producers.
#[derive(Debug)]
pub struct Dispatcher {
    platform: Option<Arc<dyn Sink>>,
    routers: Vec<Arc<SiftingRouter>>,
    min_level: Level,
    accepting: AtomicBool,
}

impl Dispatcher {
    pub fn new(platform: Option<Arc<dyn Sink>>, routers: Vec<Arc<SiftingRouter>>) -> Self {
        Self {
            platform,
            routers,
            min_level: Level::default(),
            accepting: AtomicBool::new(true),
        }
    }

    /// Root level: events below it reach no destination.
    pub fn with_min_level(mut self, min_level: Level) -> Self {
        self.min_level = min_level;
        self
    }

    pub fn min_level(&self) -> Level {
        self.min_level
    }

    pub fn routers(&self) -> &[Arc<SiftingRouter>] {
        &self.routers
    }

    /// Router by name.
    pub fn router(&self, name: &str) -> Option<&Arc<SiftingRouter>> {
        self.routers.iter().find(|r| r.name() == name)
    }

    pub fn platform(&self) -> Option<&Arc<dyn Sink>> {
        self.platform.as_ref()
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::SeqCst)
    }

    /// Stop accepting events. Returns false if already closed.
    pub fn close(&self) -> bool {
        self.accepting.swap(false, Ordering::SeqCst)
    }

    /// Deliver `event` everywhere it belongs. Returns one error per failed
    /// destination; an empty vector means full delivery.
    pub fn dispatch(&self, event: &Event) -> Vec<DispatchError> {
        if !self.is_accepting() {
            return vec![DispatchError::Closed];
        }
        if event.level() < self.min_level {
            return Vec::new();
        }

        let mut errors = Vec::new();
        if let Some(platform) = &self.platform {
            if let Err(e) = platform.write(event) {
                errors.push(DispatchError::Platform(e));
            }
        }
        for router in &self.routers {
            if let Err(e) = router.route(event) {
                tracing::debug!(router = %router.name(), error = %e, "Routing failed");
                errors.push(e.into());
            }
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::LineEncoder;
    use crate::sink::{FileSink, RouterContext};
    use tempfile::tempdir;

    #[test]
    fn test_failing_router_does_not_block_others() {
        let dir = tempdir().unwrap();
        let root = dir.path().to_path_buf();

        let broken = Arc::new(SiftingRouter::new("local-job", "job_log_path", |key: &str, _: &RouterContext| {
            Err::<Arc<dyn Sink>, _>(SinkError::InvalidKey {
                key: key.to_string(),
                reason: "read-only".into(),
            })
        }));
        let working = Arc::new(SiftingRouter::new(
            "local-application",
            "workspace_app_root",
            move |key: &str, _: &RouterContext| -> Result<Arc<dyn Sink>, SinkError> {
                Ok(Arc::new(FileSink::open(format!("{key}-local"), root.join(key), Arc::new(LineEncoder))?))
            },
        ));
        let dispatcher = Dispatcher::new(None, vec![broken, working.clone()]);

        let event = Event::new(Level::Info, "both")
            .with_context("job_log_path", "/job")
            .with_context("workspace_app_root", "ws-1");
        let errors = dispatcher.dispatch(&event);

        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], DispatchError::Route(RouteError::Creation { .. })));
        assert!(working.has_sink("ws-1"));
        assert!(dir.path().join("ws-1").exists());
    }

    #[test]
    fn test_events_below_root_level_are_dropped() {
        let dir = tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let router = Arc::new(SiftingRouter::new(
            "local-application",
            "workspace_app_root",
            move |key: &str, _: &RouterContext| -> Result<Arc<dyn Sink>, SinkError> {
                Ok(Arc::new(FileSink::open(key, root.join(key), Arc::new(LineEncoder))?))
            },
        ));
        let dispatcher = Dispatcher::new(None, vec![router.clone()]).with_min_level(Level::Warn);

        let debug = Event::new(Level::Debug, "noise").with_context("workspace_app_root", "ws-1");
        assert!(dispatcher.dispatch(&debug).is_empty());
        assert!(!router.has_sink("ws-1"));

        let error = Event::new(Level::Error, "boom").with_context("workspace_app_root", "ws-1");
        assert!(dispatcher.dispatch(&error).is_empty());
        assert!(router.has_sink("ws-1"));
    }

    #[test]
    fn test_closed_dispatcher_refuses_events() {
        let dispatcher = Dispatcher::new(None, Vec::new());
        assert!(dispatcher.dispatch(&Event::new(Level::Info, "m")).is_empty());
        assert!(dispatcher.close());
        assert!(!dispatcher.close());
        assert!(matches!(
            dispatcher.dispatch(&Event::new(Level::Info, "m")).as_slice(),
            [DispatchError::Closed]
        ));
    }
}
