//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use logsift::config::LogRoutingConfig;
use logsift::event::{Event, Level};
use logsift::storage::{DocumentType, ObjectStore, StorageError};

/// Bytes `LineEncoder` produces for an event at timestamp 0 with an
/// `n`-byte message: `"0 INFO  "` + message + newline.
pub const LINE_OVERHEAD: usize = 9;

/// Configuration with the stdout console disabled and fast retries.
pub fn quiet_config() -> LogRoutingConfig {
    let mut config = LogRoutingConfig::default();
    config.lifecycle.platform_console = false;
    config.remote.retry.base_delay_ms = 1;
    config.remote.retry.max_delay_ms = 5;
    config
}

/// An INFO event at timestamp 0 whose encoded line is exactly `line_len` bytes.
pub fn sized_event(key_name: &str, key: &str, line_len: usize) -> Event {
    let message = "x".repeat(line_len - LINE_OVERHEAD);
    Event::new(Level::Info, message).at(0).with_context(key_name, key)
}

pub fn keyed(key_name: &str, key: &str, message: &str) -> Event {
    Event::new(Level::Info, message).at(0).with_context(key_name, key)
}

pub fn key_for(dir: &Path, name: &str) -> String {
    dir.join(name).to_string_lossy().into_owned()
}

/// Store whose puts never finish in a reasonable time.
#[derive(Debug)]
pub struct StalledStore {
    pub delay: Duration,
}

#[async_trait]
impl ObjectStore for StalledStore {
    async fn put(&self, _: &str, _: DocumentType, _: Vec<u8>) -> Result<(), StorageError> {
        tokio::time::sleep(self.delay).await;
        Ok(())
    }
}

pub fn stalled(delay: Duration) -> Arc<dyn ObjectStore> {
    Arc::new(StalledStore { delay })
}
