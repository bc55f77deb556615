//! Sink subsystem.
//!
//! # Data Flow
//! ```text
//! Resolved sink (from routing::router):
//!     → console.rs (stdout, un-sifted platform output)
//!     → file.rs    (plain append-only file per job)
//!     → rolling.rs (size-rotated file per workspace, gzip archives)
//!     → remote.rs  (in-memory buffer → FlushExecutor → ObjectStore)
//! ```
//!
//! # Design Decisions
//! - Every sink guards its mutable state with exactly one mutex
//! - Sinks own their resource; routers own the sink's existence
//! - `stop()` is idempotent and flushes exactly once
//! - Local write failures propagate; they are never retried here

pub mod console;
pub mod file;
pub mod remote;
pub mod rolling;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::event::Event;

pub use console::ConsoleSink;
pub use file::FileSink;
pub use remote::RemoteBufferedSink;
pub use rolling::{RollingPolicy, RotatingFileSink};

/// Errors raised by sinks.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Filesystem failure while creating, writing or rotating a file.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The sink has been stopped and no longer accepts events.
    #[error("sink {0} is stopped")]
    Stopped(String),

    /// The sink could not be built for a routing key.
    #[error("cannot create sink for key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },
}

impl SinkError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SinkError::Io {
            path: path.into(),
            source,
        }
    }
}

/// A live destination for events sharing one routing key.
pub trait Sink: Send + Sync + fmt::Debug {
    /// Name used in diagnostics (e.g. `ws-1-local`).
    fn name(&self) -> &str;

    /// Append one event.
    fn write(&self, event: &Event) -> Result<(), SinkError>;

    /// Push buffered data towards its destination.
    fn flush(&self) -> Result<(), SinkError>;

    /// Flush and release the underlying resource. Safe to call repeatedly;
    /// only the first call does any work.
    fn stop(&self);

    fn is_stopped(&self) -> bool;
}

/// Shared context handed to factories by the router that owns them.
#[derive(Debug, Clone)]
pub struct RouterContext {
    /// Name of the owning router (e.g. `cloud-application`).
    pub router_name: String,
}

impl RouterContext {
    pub fn new(router_name: impl Into<String>) -> Self {
        Self {
            router_name: router_name.into(),
        }
    }
}

/// Builds a sink for a routing key seen for the first time.
///
/// Called while the router holds the key's registration slot, so a factory
/// must never route events through its own router.
pub trait SinkFactory: Send + Sync {
    fn create(&self, key: &str, context: &RouterContext) -> Result<Arc<dyn Sink>, SinkError>;
}

impl<F> SinkFactory for F
where
    F: Fn(&str, &RouterContext) -> Result<Arc<dyn Sink>, SinkError> + Send + Sync,
{
    fn create(&self, key: &str, context: &RouterContext) -> Result<Arc<dyn Sink>, SinkError> {
        self(key, context)
    }
}
