//! Remote object storage.
//!
//! # Data Flow
//! ```text
//! RemoteBufferedSink batch
//!     → ObjectStore::put(storage_id, document_type, bytes)
//!     → local.rs  (directory tree, used by the CLI and for development)
//!     → memory.rs (ordered in-memory documents, failure injection)
//! ```
//!
//! # Design Decisions
//! - The router depends only on `put`; authentication and transport belong
//!   to the implementation
//! - `DocumentType` namespaces objects so application and job logs never collide
//! - A `put` of the same storage id overwrites, so retried batches are idempotent

pub mod local;
pub mod memory;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use local::LocalDirectoryStore;
pub use memory::{InMemoryStore, StoredDocument};

/// Classification used to namespace remote storage keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    /// Per-workspace application logs.
    ApplicationLogs,
    /// Operational job logs.
    Logs,
}

impl DocumentType {
    /// Top-level namespace for objects of this type.
    pub fn prefix(&self) -> &'static str {
        match self {
            DocumentType::ApplicationLogs => "app-logging",
            DocumentType::Logs => "job-logging",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Errors returned by object stores.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O error for {storage_id}: {source}")]
    Io {
        storage_id: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid storage id {0:?}")]
    InvalidId(String),

    /// Transient failure reported by the store.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Minimal remote object store contract.
#[async_trait]
pub trait ObjectStore: Send + Sync + fmt::Debug {
    async fn put(
        &self,
        storage_id: &str,
        document_type: DocumentType,
        bytes: Vec<u8>,
    ) -> Result<(), StorageError>;
}
