//! In-memory object store.

use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::storage::{DocumentType, ObjectStore, StorageError};

/// One object as persisted by [`InMemoryStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredDocument {
    pub storage_id: String,
    pub document_type: DocumentType,
    pub bytes: Vec<u8>,
}

/// Keeps every successful `put` in arrival order.
///
/// `fail_next(n)` makes the next `n` puts fail with
/// [`StorageError::Unavailable`], which is how transient outages are
/// simulated.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    documents: Mutex<Vec<StoredDocument>>,
    failures_left: AtomicU32,
    attempts: AtomicU32,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self, count: u32) {
        self.failures_left.store(count, Ordering::SeqCst);
    }

    /// Snapshot of the stored documents.
    pub fn documents(&self) -> Vec<StoredDocument> {
        self.documents.lock().clone()
    }

    /// Concatenated payloads of all documents of `document_type`.
    pub fn contents(&self, document_type: DocumentType) -> Vec<u8> {
        self.documents
            .lock()
            .iter()
            .filter(|d| d.document_type == document_type)
            .flat_map(|d| d.bytes.iter().copied())
            .collect()
    }

    /// Total `put` calls, failed ones included.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for InMemoryStore {
    async fn put(
        &self,
        storage_id: &str,
        document_type: DocumentType,
        bytes: Vec<u8>,
    ) -> Result<(), StorageError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(StorageError::Unavailable(format!("injected failure for {storage_id}")));
        }

        let mut documents = self.documents.lock();
        let document = StoredDocument {
            storage_id: storage_id.to_string(),
            document_type,
            bytes,
        };
        match documents.iter_mut().find(|d| d.storage_id == storage_id && d.document_type == document_type) {
            Some(existing) => *existing = document,
            None => documents.push(document),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_injected_failures_then_success() {
        let store = InMemoryStore::new();
        store.fail_next(2);

        assert!(store.put("a", DocumentType::Logs, b"1".to_vec()).await.is_err());
        assert!(store.put("a", DocumentType::Logs, b"1".to_vec()).await.is_err());
        store.put("a", DocumentType::Logs, b"1".to_vec()).await.unwrap();

        assert_eq!(store.attempts(), 3);
        assert_eq!(store.documents().len(), 1);
    }

    #[tokio::test]
    async fn test_same_id_overwrites() {
        let store = InMemoryStore::new();
        store.put("a", DocumentType::Logs, b"old".to_vec()).await.unwrap();
        store.put("a", DocumentType::Logs, b"new".to_vec()).await.unwrap();
        store.put("b", DocumentType::ApplicationLogs, b"app".to_vec()).await.unwrap();

        assert_eq!(store.contents(DocumentType::Logs), b"new");
        assert_eq!(store.documents().len(), 2);
    }
}
