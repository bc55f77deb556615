//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → loader.rs (LOG_* environment overrides)
//!     → validation.rs (semantic checks)
//!     → LogRoutingConfig (validated, immutable)
//!     → lifecycle::startup builds the destinations from it
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Environment overrides win over the file
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{apply_env_overrides, load_config, load_config_with, load_from_env, ConfigError};
pub use schema::{
    ByteSize, EncoderKind, LifecycleConfig, LocalConfig, LogRoutingConfig, RemoteConfig, RetryConfig,
    RouteKeysConfig, RouterConfig, StorageConfig,
};
pub use validation::{validate_config, ValidationError};
