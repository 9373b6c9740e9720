use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

use super::lock::WriteLock;
use super::{REFERENCE_PREFIX, Storage, content_reference, is_reference};
use crate::error::{LogError, Result};

const LOCK_FILE: &str = "store.lock";
const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Directory-backed blob store.
///
/// Layout: `<root>/<first two hex digits>/<remaining 62 hex digits>`.
/// Writes go through a temp file and a rename while holding an exclusive
/// advisory lock on `<root>/store.lock`; reads take no lock.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
    lock_timeout: Duration,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::Storage`] if the directory cannot be created.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        })
    }

    #[must_use]
    pub const fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn blob_path(&self, reference: &str) -> Option<PathBuf> {
        if !is_reference(reference) {
            return None;
        }
        let hex = &reference[REFERENCE_PREFIX.len()..];
        let (shard, rest) = hex.split_at(2);
        Some(self.root.join(shard).join(rest))
    }
}

impl Storage for FileStore {
    fn put_blob(&self, bytes: &[u8]) -> Result<String> {
        let reference = content_reference(bytes);
        let path = self
            .blob_path(&reference)
            .ok_or_else(|| LogError::Storage(format!("bad reference {reference}")))?;

        if path.exists() {
            return Ok(reference);
        }

        let _lock = WriteLock::acquire(&self.root.join(LOCK_FILE), self.lock_timeout)?;
        if path.exists() {
            return Ok(reference);
        }

        let shard = path
            .parent()
            .ok_or_else(|| LogError::Storage("blob path has no parent".to_string()))?;
        fs::create_dir_all(shard)?;

        let tmp = path.with_extension("tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(bytes)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &path)?;

        debug!(%reference, bytes = bytes.len(), "blob written");
        Ok(reference)
    }

    fn get_blob(&self, reference: &str) -> Result<Vec<u8>> {
        let path = self
            .blob_path(reference)
            .ok_or_else(|| LogError::NotFound(reference.to_string()))?;

        match fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(LogError::NotFound(reference.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}
