//! Configuration loading from disk and environment.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::schema::LogRoutingConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Root level override.
pub const ENV_LOG_LEVEL: &str = "LOG_LEVEL";
/// Idle sink timeout override, in minutes.
pub const ENV_IDLE_ROUTE_TTL: &str = "LOG_IDLE_ROUTE_TTL";
/// Rotation threshold override, bytes or `100MB`-style.
pub const ENV_MAX_FILE_SIZE: &str = "LOG_MAX_FILE_SIZE";
pub const ENV_MAX_ARCHIVE_WINDOWS: &str = "LOG_MAX_ARCHIVE_WINDOWS";
pub const ENV_SHUTDOWN_GRACE_SECS: &str = "LOG_SHUTDOWN_GRACE_SECS";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value {value:?} for {var}: {reason}")]
    Env {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file, applying process
/// environment overrides.
pub fn load_config(path: &Path) -> Result<LogRoutingConfig, ConfigError> {
    load_config_with(path, |var| std::env::var(var).ok())
}

/// [`load_config`] with an explicit environment lookup.
pub fn load_config_with(
    path: &Path,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<LogRoutingConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config: LogRoutingConfig = toml::from_str(&content)?;
    finish(config, lookup)
}

/// Defaults plus process environment overrides, validated.
pub fn load_from_env() -> Result<LogRoutingConfig, ConfigError> {
    finish(LogRoutingConfig::default(), |var| std::env::var(var).ok())
}

fn finish(
    mut config: LogRoutingConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<LogRoutingConfig, ConfigError> {
    apply_env_overrides(&mut config, lookup)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Overlay the `LOG_*` variables found through `lookup` onto `config`.
/// Blank values are ignored.
pub fn apply_env_overrides(
    config: &mut LogRoutingConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(), ConfigError> {
    let get = |var: &'static str| {
        lookup(var)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(|v| (var, v))
    };
    let invalid = |var: &'static str, value: String, reason: String| ConfigError::Env { var, value, reason };

    if let Some((var, value)) = get(ENV_LOG_LEVEL) {
        config.root_level = value.parse().map_err(|e| invalid(var, value.clone(), format!("{e}")))?;
    }
    if let Some((var, value)) = get(ENV_IDLE_ROUTE_TTL) {
        config.router.idle_timeout_minutes = value.parse().map_err(|e| invalid(var, value.clone(), format!("{e}")))?;
    }
    if let Some((var, value)) = get(ENV_MAX_FILE_SIZE) {
        config.local.max_file_size = value.parse().map_err(|e| invalid(var, value.clone(), e))?;
    }
    if let Some((var, value)) = get(ENV_MAX_ARCHIVE_WINDOWS) {
        config.local.max_archive_windows = value.parse().map_err(|e| invalid(var, value.clone(), format!("{e}")))?;
    }
    if let Some((var, value)) = get(ENV_SHUTDOWN_GRACE_SECS) {
        config.lifecycle.shutdown_grace_secs = value.parse().map_err(|e| invalid(var, value.clone(), format!("{e}")))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Level;
    use std::collections::HashMap;
    use std::time::Duration;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |var: &str| map.get(var).cloned()
    }

    #[test]
    fn test_env_overrides() {
        let mut config = LogRoutingConfig::default();
        apply_env_overrides(
            &mut config,
            env(&[
                ("LOG_LEVEL", "warn"),
                ("LOG_IDLE_ROUTE_TTL", "5"),
                ("LOG_MAX_FILE_SIZE", "10MB"),
                ("LOG_MAX_ARCHIVE_WINDOWS", "2"),
                ("LOG_SHUTDOWN_GRACE_SECS", " "),
            ]),
        )
        .unwrap();

        assert_eq!(config.root_level, Level::Warn);
        assert_eq!(config.router.idle_timeout(), Duration::from_secs(300));
        assert_eq!(config.local.max_file_size.bytes(), 10 * 1024 * 1024);
        assert_eq!(config.local.max_archive_windows, 2);
        assert_eq!(config.lifecycle.shutdown_grace_secs, 30);
    }

    #[test]
    fn test_bad_env_value_names_the_variable() {
        let mut config = LogRoutingConfig::default();
        let err = apply_env_overrides(&mut config, env(&[("LOG_IDLE_ROUTE_TTL", "soon")])).unwrap_err();
        assert!(matches!(err, ConfigError::Env { var: "LOG_IDLE_ROUTE_TTL", .. }));
    }

    #[test]
    fn test_load_file_then_validate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logsift.toml");

        fs::write(&path, "[local]\nmax_archive_windows = 5\n").unwrap();
        let config = load_config_with(&path, env(&[("LOG_LEVEL", "ERROR")])).unwrap();
        assert_eq!(config.local.max_archive_windows, 5);
        assert_eq!(config.root_level, Level::Error);

        fs::write(&path, "[router]\nidle_timeout_minutes = 0\n").unwrap();
        assert!(matches!(load_config_with(&path, env(&[])), Err(ConfigError::Validation(_))));

        fs::write(&path, "[router\n").unwrap();
        assert!(matches!(load_config_with(&path, env(&[])), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_missing_file() {
        let err = load_config(Path::new("/nonexistent/logsift.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
