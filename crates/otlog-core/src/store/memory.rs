use std::collections::HashMap;
use std::sync::RwLock;

use super::{Storage, content_reference};
use crate::error::{LogError, Result};

/// In-memory blob store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blobs.read().map_or(0, |blobs| blobs.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Overwrite the bytes under `reference` without rehashing.
    ///
    /// Only useful for exercising tamper detection.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::Storage`] if the lock is poisoned.
    pub fn corrupt(&self, reference: &str, bytes: Vec<u8>) -> Result<()> {
        self.blobs
            .write()
            .map_err(|_| poisoned())?
            .insert(reference.to_string(), bytes);
        Ok(())
    }
}

fn poisoned() -> LogError {
    LogError::Storage("memory store lock poisoned".to_string())
}

impl Storage for MemoryStore {
    fn put_blob(&self, bytes: &[u8]) -> Result<String> {
        let reference = content_reference(bytes);
        self.blobs
            .write()
            .map_err(|_| poisoned())?
            .entry(reference.clone())
            .or_insert_with(|| bytes.to_vec());
        Ok(reference)
    }

    fn get_blob(&self, reference: &str) -> Result<Vec<u8>> {
        self.blobs
            .read()
            .map_err(|_| poisoned())?
            .get(reference)
            .cloned()
            .ok_or_else(|| LogError::NotFound(reference.to_string()))
    }
}
