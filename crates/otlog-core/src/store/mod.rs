//! Content-addressed blob storage.
//!
//! A store maps `blake3:<lowercase hex>` references to the exact bytes that
//! hash to them. Entries and snapshots are serialized to JSON and stored as
//! blobs; the reference is always recomputed from the bytes, never stored on
//! the object itself.
//!
//! # Sub-modules
//!
//! - [`memory`]: [`MemoryStore`], a `RwLock<HashMap>` used by tests and
//!   short-lived tooling.
//! - [`file`]: [`FileStore`], a sharded directory guarded by an advisory
//!   write lock.

pub mod file;
mod lock;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use tracing::debug;

use crate::entry::Entry;
use crate::error::{LogError, Result};
use crate::snapshot::Snapshot;

/// Prefix of every content reference.
pub const REFERENCE_PREFIX: &str = "blake3:";

/// Compute the content reference of `bytes`.
#[must_use]
pub fn content_reference(bytes: &[u8]) -> String {
    format!("{REFERENCE_PREFIX}{}", blake3::hash(bytes).to_hex())
}

/// Check that `bytes` hash to `reference`.
///
/// # Errors
///
/// Returns [`LogError::Integrity`] on mismatch.
pub fn verify_blob(reference: &str, bytes: &[u8]) -> Result<()> {
    let actual = content_reference(bytes);
    if actual == reference {
        Ok(())
    } else {
        Err(LogError::integrity(
            reference,
            format!("content hashes to {actual}"),
        ))
    }
}

/// Whether `reference` has the `blake3:<64 hex>` shape.
#[must_use]
pub fn is_reference(reference: &str) -> bool {
    reference
        .strip_prefix(REFERENCE_PREFIX)
        .is_some_and(|hex| hex.len() == 64 && hex.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')))
}

/// Storage collaborator consumed by entries, snapshots and the merge engine.
///
/// Implementors only move raw bytes; the provided methods handle
/// serialization and verify that every fetched blob matches its reference.
pub trait Storage: Send + Sync {
    /// Persist `bytes`, returning their content reference.
    ///
    /// Storing the same bytes twice returns the same reference.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::Storage`] or [`LogError::LockContention`] when the
    /// backend cannot write.
    fn put_blob(&self, bytes: &[u8]) -> Result<String>;

    /// Fetch the bytes stored under `reference`.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::NotFound`] when nothing is stored there.
    fn get_blob(&self, reference: &str) -> Result<Vec<u8>>;

    /// Serialize and persist an entry.
    ///
    /// # Errors
    ///
    /// Serialization or backend failures.
    fn save(&self, entry: &Entry) -> Result<String> {
        let bytes = entry.to_bytes()?;
        let reference = self.put_blob(&bytes)?;
        debug!(%reference, id = %entry.id, op = %entry.operation, "entry stored");
        Ok(reference)
    }

    /// Fetch and decode an entry. The result is still encrypted.
    ///
    /// # Errors
    ///
    /// [`LogError::NotFound`] for unknown references, [`LogError::Integrity`]
    /// when the blob does not hash to `reference` or is not an entry.
    fn get(&self, reference: &str) -> Result<Entry> {
        let bytes = self.get_blob(reference)?;
        verify_blob(reference, &bytes)?;
        Entry::from_bytes(&bytes).map_err(|e| LogError::integrity(reference, e))
    }

    /// Serialize and persist a snapshot.
    ///
    /// # Errors
    ///
    /// Serialization or backend failures.
    fn save_snapshot(&self, snapshot: &Snapshot) -> Result<String> {
        let bytes = snapshot.to_bytes()?;
        let reference = self.put_blob(&bytes)?;
        debug!(%reference, "snapshot stored");
        Ok(reference)
    }

    /// Fetch and decode a snapshot. The records are still sealed.
    ///
    /// # Errors
    ///
    /// Same as [`Storage::get`].
    fn get_snapshot(&self, reference: &str) -> Result<Snapshot> {
        let bytes = self.get_blob(reference)?;
        verify_blob(reference, &bytes)?;
        Snapshot::from_bytes(&bytes).map_err(|e| LogError::integrity(reference, e))
    }
}
