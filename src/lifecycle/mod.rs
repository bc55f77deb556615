//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (manager.rs → startup.rs):
//!     Validate config → FlushExecutor → Destinations → Dispatcher
//!     → spawn flush ticker and idle reaper
//!
//! Shutdown (manager.rs → shutdown.rs):
//!     Stop accepting → broadcast shutdown → stop all sinks
//!     → drain remote flushes (grace period) → flush console
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → caller runs the ordered shutdown
//! ```
//!
//! # Design Decisions
//! - The manager is an explicit object, decoupled from routers, so routers
//!   are testable without process-exit semantics
//! - One flush executor per process, injected into every remote sink
//! - Shutdown has a timeout: remaining remote batches are dropped with a
//!   warning after the grace period

pub mod executor;
pub mod manager;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use executor::{DrainReport, FlushExecutor, PendingFlush};
pub use manager::{LifecycleManager, ShutdownReport, StartupError};
pub use shutdown::Shutdown;
pub use signals::shutdown_signal;
pub use startup::Destinations;
