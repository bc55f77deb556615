//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Internal diagnostics (target "logsift::*"):
//!     → logging.rs (EnvFilter → fmt layer → stderr)
//!
//! Application events (any other target):
//!     → layer.rs (span context + event fields → Event)
//!     → routing::Dispatcher
//! ```
//!
//! # Design Decisions
//! - Structured fields everywhere (`key = %key`, `router = %name`)
//! - The router never routes its own diagnostics

pub mod layer;
pub mod logging;

pub use layer::RoutingLayer;
pub use logging::{init_logging, DEFAULT_FILTER};
