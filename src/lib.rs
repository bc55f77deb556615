//! Context-keyed log routing.
//!
//! # Architecture Overview
//!
//! ```text
//!   producers (threads, tracing spans)
//!          │  Event { timestamp, level, message, context }
//!          ▼
//!   ┌──────────────┐
//!   │  Dispatcher  │──────────────▶ platform ConsoleSink (every event)
//!   └──────┬───────┘
//!          │ per router: filter → discriminator → registry
//!          ▼
//!   ┌───────────────────┐  ┌──────────────┐  ┌───────────────────┐  ┌─────────────┐
//!   │ local-application │  │  local-job   │  │ cloud-application │  │  cloud-job  │
//!   │ RotatingFileSink  │  │  FileSink    │  │ RemoteBufferedSink│  │ RemoteBuf.. │
//!   └───────────────────┘  └──────────────┘  └─────────┬─────────┘  └──────┬──────┘
//!                                                      └──── FlushExecutor ─┘
//!                                                               │
//!                                                               ▼
//!                                                          ObjectStore
//! ```
//!
//! Idle sinks are reaped by a background task; [`lifecycle::LifecycleManager`]
//! owns start-up and the ordered shutdown.

pub mod config;
pub mod encoder;
pub mod event;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod routing;
pub mod sink;
pub mod storage;

pub use config::LogRoutingConfig;
pub use event::{ContextMap, Event, Level};
pub use lifecycle::{LifecycleManager, Shutdown};
pub use routing::{Dispatcher, SiftingRouter};
