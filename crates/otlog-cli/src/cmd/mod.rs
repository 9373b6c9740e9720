//! Subcommand handlers and the state they share.
//!
//! Commands that touch the log open a [`Session`]: the directory store and
//! the credentials built from config. The current head lives in
//! `.otlog/HEAD` as a single reference line.

pub mod delete;
pub mod init;
pub mod keygen;
pub mod lca;
pub mod log;
pub mod merge;
pub mod put;
pub mod records;
pub mod show;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result, bail};
use otlog_core::config::{EffectiveConfig, PROJECT_DIR};
use otlog_core::store::is_reference;
use otlog_core::{Context, FileStore, StaticCredentials};
use tracing::debug;

use crate::output::OutputMode;

/// Flags and config shared by every handler.
#[derive(Debug)]
pub struct Globals {
    pub config: EffectiveConfig,
    pub store_override: Option<PathBuf>,
    pub output: OutputMode,
}

impl Globals {
    pub fn store_path(&self) -> PathBuf {
        self.store_override
            .clone()
            .unwrap_or_else(|| self.config.store_path())
    }

    pub fn head_path(&self) -> PathBuf {
        self.config.root.join(PROJECT_DIR).join("HEAD")
    }

    /// Open the store and load credentials.
    pub fn session(&self) -> Result<Session> {
        let store_path = self.store_path();
        let store = FileStore::open(&store_path)
            .with_context(|| format!("Failed to open store at {}", store_path.display()))?;
        let credentials = self.config.load_credentials()?;
        debug!(store = %store_path.display(), "session opened");
        Ok(Session {
            store,
            credentials,
            head_path: self.head_path(),
        })
    }
}

/// An open store plus the credentials to read and write it.
pub struct Session {
    pub store: FileStore,
    pub credentials: StaticCredentials,
    head_path: PathBuf,
}

impl Session {
    pub fn ctx(&self) -> Context<'_> {
        Context::new(&self.store, &self.credentials)
    }

    pub fn head(&self) -> Result<String> {
        read_head(&self.head_path)
    }

    pub fn set_head(&self, reference: &str) -> Result<()> {
        write_head(&self.head_path, reference)
    }

    /// `reference` if given, otherwise the current head.
    pub fn resolve(&self, reference: Option<&str>) -> Result<String> {
        match reference {
            Some(reference) => parse_ref(reference),
            None => self.head(),
        }
    }
}

pub fn read_head(path: &Path) -> Result<String> {
    let raw = fs::read_to_string(path).with_context(|| {
        format!(
            "No head at {} (run `otlog init` first)",
            path.display()
        )
    })?;
    parse_ref(raw.trim()).with_context(|| format!("Corrupt head file {}", path.display()))
}

pub fn write_head(path: &Path, reference: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, format!("{reference}\n"))
        .with_context(|| format!("Failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("Failed to update {}", path.display()))?;
    debug!(head = reference, "head moved");
    Ok(())
}

/// Validate a user-supplied reference.
pub fn parse_ref(raw: &str) -> Result<String> {
    if !is_reference(raw) {
        bail!("'{raw}' is not a content reference (expected blake3:<64 hex>)");
    }
    Ok(raw.to_string())
}
