//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Remote flush of one batch:
//!     → retries.rs (bounded attempts)
//!     → backoff.rs (exponential delay + jitter between attempts)
//!     → exhausted: batch dropped, error logged, buffer advances
//! ```
//!
//! # Design Decisions
//! - Only remote flushes retry; local file writes fail fast to the caller
//! - Jittered backoff keeps many sinks from retrying in lockstep

pub mod backoff;
pub mod retries;

pub use backoff::Backoff;
pub use retries::{RetryError, RetryPolicy};
