//! Object store backed by a local directory tree.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

use crate::storage::{DocumentType, ObjectStore, StorageError};

/// Stores each object at `<root>/<document-type prefix>/<storage_id>`.
#[derive(Debug, Clone)]
pub struct LocalDirectoryStore {
    root: PathBuf,
}

impl LocalDirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where an object lives on disk. Rejects ids that would escape the root.
    pub fn object_path(
        &self,
        storage_id: &str,
        document_type: DocumentType,
    ) -> Result<PathBuf, StorageError> {
        let id = Path::new(storage_id);
        let escapes = storage_id.is_empty()
            || id
                .components()
                .any(|c| !matches!(c, Component::Normal(_)));
        if escapes {
            return Err(StorageError::InvalidId(storage_id.to_string()));
        }
        Ok(self.root.join(document_type.prefix()).join(id))
    }
}

#[async_trait]
impl ObjectStore for LocalDirectoryStore {
    async fn put(
        &self,
        storage_id: &str,
        document_type: DocumentType,
        bytes: Vec<u8>,
    ) -> Result<(), StorageError> {
        let path = self.object_path(storage_id, document_type)?;
        let io_err = |source| StorageError::Io {
            storage_id: storage_id.to_string(),
            source,
        };
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        tokio::fs::write(&path, bytes).await.map_err(io_err)?;
        tracing::trace!(path = ?path, "Stored object");
        Ok(())
    }
}
