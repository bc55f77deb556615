//! Startup wiring of the five log destinations.
//!
//! # Responsibilities
//! - Build the shared encoder and retry policy from configuration
//! - Build one router per destination class with its sink factory
//! - Name sinks consistently (`<key>-local`, `<router>-<key>`)
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Cloud routers exist only when remote storage is enabled
//! - Factories capture only shared, immutable state

use std::path::{Component, Path};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{EncoderKind, LogRoutingConfig, RetryConfig};
use crate::encoder::{Encoder, JsonEncoder, LineEncoder};
use crate::resilience::{Backoff, RetryPolicy};
use crate::routing::SiftingRouter;
use crate::sink::file::job_log_path;
use crate::sink::remote::RemoteShared;
use crate::sink::{
    ConsoleSink, FileSink, RemoteBufferedSink, RollingPolicy, RotatingFileSink, RouterContext, Sink,
    SinkError,
};
use crate::storage::DocumentType;

pub const PLATFORM: &str = "platform";
pub const LOCAL_APPLICATION: &str = "local-application";
pub const LOCAL_JOB: &str = "local-job";
pub const CLOUD_APPLICATION: &str = "cloud-application";
pub const CLOUD_JOB: &str = "cloud-job";

pub fn encoder_for(kind: EncoderKind) -> Arc<dyn Encoder> {
    match kind {
        EncoderKind::Line => Arc::new(LineEncoder),
        EncoderKind::Json => Arc::new(JsonEncoder),
    }
}

pub fn retry_policy(config: &RetryConfig) -> RetryPolicy {
    RetryPolicy::new(
        config.max_attempts,
        Backoff::new(
            Duration::from_millis(config.base_delay_ms),
            Duration::from_millis(config.max_delay_ms),
        ),
    )
}

/// Storage id prefix for a cloud routing key: the key without leading
/// slashes, rejected when empty or when it climbs out with `..`.
pub fn storage_base_id(key: &str) -> Result<String, SinkError> {
    let base = key.trim().trim_start_matches('/');
    let invalid = |reason: &str| SinkError::InvalidKey {
        key: key.to_string(),
        reason: reason.to_string(),
    };
    if base.is_empty() {
        return Err(invalid("empty storage id"));
    }
    if Path::new(base)
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return Err(invalid("storage id must not contain relative components"));
    }
    Ok(base.to_string())
}

/// Rotating application log per workspace key: `<key>/<file_name>`.
pub fn local_application_router(
    key_name: &str,
    file_name: &str,
    policy: RollingPolicy,
    encoder: Arc<dyn Encoder>,
) -> SiftingRouter {
    let file_name = file_name.to_string();
    SiftingRouter::new(
        LOCAL_APPLICATION,
        key_name,
        move |key: &str, _: &RouterContext| -> Result<Arc<dyn Sink>, SinkError> {
            let sink = RotatingFileSink::open(
                format!("{key}-local"),
                Path::new(key).join(&file_name),
                policy,
                encoder.clone(),
            )?;
            Ok(Arc::new(sink))
        },
    )
}

/// Plain job log: `<key>/<file_name>` for a directory key, else the key.
pub fn local_job_router(key_name: &str, file_name: &str, encoder: Arc<dyn Encoder>) -> SiftingRouter {
    let file_name = file_name.to_string();
    SiftingRouter::new(
        LOCAL_JOB,
        key_name,
        move |key: &str, _: &RouterContext| -> Result<Arc<dyn Sink>, SinkError> {
            let sink = FileSink::open(format!("{key}-local"), job_log_path(key, &file_name), encoder.clone())?;
            Ok(Arc::new(sink))
        },
    )
}

/// Remote router storing batches under the routing key.
pub fn cloud_router(
    name: &'static str,
    key_name: &str,
    document_type: DocumentType,
    encoder: Arc<dyn Encoder>,
    shared: RemoteShared,
) -> SiftingRouter {
    SiftingRouter::new(
        name,
        key_name,
        move |key: &str, context: &RouterContext| -> Result<Arc<dyn Sink>, SinkError> {
            let sink = RemoteBufferedSink::new(
                format!("{}-{key}", context.router_name),
                storage_base_id(key)?,
                document_type,
                encoder.clone(),
                &shared,
            );
            Ok(Arc::new(sink))
        },
    )
}

/// Every destination of the process.
#[derive(Debug)]
pub struct Destinations {
    pub platform: Option<Arc<dyn Sink>>,
    pub routers: Vec<Arc<SiftingRouter>>,
}

impl Destinations {
    /// Build all destinations. Cloud routers are built only when `remote`
    /// is given.
    pub fn build(config: &LogRoutingConfig, encoder: Arc<dyn Encoder>, remote: Option<&RemoteShared>) -> Self {
        let platform: Option<Arc<dyn Sink>> = config
            .lifecycle
            .platform_console
            .then(|| Arc::new(ConsoleSink::stdout(PLATFORM, encoder.clone())) as Arc<dyn Sink>);

        let idle = config.router.idle_timeout();
        let policy = RollingPolicy {
            max_file_size: config.local.max_file_size.bytes(),
            max_archives: config.local.max_archive_windows,
        };
        let keys = &config.routes;

        let mut routers = vec![
            local_application_router(&keys.local_application, &config.local.file_name, policy, encoder.clone()),
            local_job_router(&keys.local_job, &config.local.file_name, encoder.clone()),
        ];
        if let Some(shared) = remote {
            routers.push(cloud_router(
                CLOUD_APPLICATION,
                &keys.cloud_application,
                DocumentType::ApplicationLogs,
                encoder.clone(),
                shared.clone(),
            ));
            routers.push(cloud_router(
                CLOUD_JOB,
                &keys.cloud_job,
                DocumentType::Logs,
                encoder.clone(),
                shared.clone(),
            ));
        }

        let routers: Vec<Arc<SiftingRouter>> = routers
            .into_iter()
            .map(|router| Arc::new(router.with_idle_timeout(idle)))
            .collect();

        tracing::info!(
            platform = platform.is_some(),
            routers = ?routers.iter().map(|r| r.name()).collect::<Vec<_>>(),
            idle_timeout_secs = idle.as_secs(),
            "Destinations built"
        );

        Self { platform, routers }
    }
}
