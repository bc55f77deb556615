//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Event (from producer thread or RoutingLayer)
//!     → dispatcher.rs (fan out: platform console + every router)
//!     → filter.rs (drop events with no routing key, silently)
//!     → discriminator.rs (read the key from the context map)
//!     → router.rs (resolve key → sink, write)
//!     → registry.rs (lookup-or-create, last-used bookkeeping)
//!
//! Background:
//!     reaper.rs (timer) → router.reap() → registry.expire_idle()
//! ```
//!
//! # Design Decisions
//! - One router per destination class, each with its own registry
//! - Sink creation is serialized per key; lookups of live keys never block
//!   on other keys
//! - Reaping stops a sink before removing it, under the key's entry lock
//! - Routing is synchronous; only remote flushing touches the runtime

pub mod discriminator;
pub mod dispatcher;
pub mod filter;
pub mod reaper;
pub mod registry;
pub mod router;

pub use discriminator::Discriminator;
pub use dispatcher::{DispatchError, Dispatcher};
pub use filter::KeyPresenceFilter;
pub use reaper::IdleReaper;
pub use registry::{SinkRegistry, DEFAULT_IDLE_TIMEOUT};
pub use router::{RouteError, RouteOutcome, SiftingRouter};
