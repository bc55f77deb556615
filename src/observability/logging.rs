//! Process logging setup.
//!
//! # Responsibilities
//! - Install the global `tracing` subscriber
//! - Send internal diagnostics to stderr through an `EnvFilter`
//! - Optionally attach the [`RoutingLayer`] so application events are routed
//!
//! # Design Decisions
//! - `RUST_LOG` wins; otherwise `logsift=info`
//! - The filter applies to the diagnostic output only; the routing layer
//!   applies the configured root level itself

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{fmt, EnvFilter, Layer};

use crate::observability::layer::RoutingLayer;

/// Diagnostic filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "logsift=info";

pub fn diagnostic_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(routing: Option<RoutingLayer>) -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(routing)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_filter(diagnostic_filter()),
        )
        .try_init()
}
