use anyhow::{Context as _, Result, bail};
use clap::Args;
use otlog_core::{Records, chain};
use otlog_core::config::{ProjectConfig, project_config_path, write_project_config};
use serde::Serialize;
use tracing::info;

use super::Globals;
use crate::output::{pretty_kv, render};

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Start a new log even if a head already exists.
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Serialize)]
struct InitOutput {
    config: String,
    store: String,
    head: String,
}

/// Execute `otlog init`. Creates:
///
/// ```text
/// .otlog/
///   config.toml   (defaults, unless one exists)
///   blobs/        (store, unless overridden)
///   HEAD          (reference of the new root)
/// ```
///
/// # Errors
///
/// Fails if a head exists and `--force` is not set, if the identity
/// cannot be loaded, or on any filesystem error.
pub fn run_init(args: &InitArgs, globals: &Globals) -> Result<()> {
    let head_path = globals.head_path();
    if head_path.exists() && !args.force {
        bail!("{} already exists. Use `otlog init --force` to start over.", head_path.display());
    }

    let config_path = project_config_path(&globals.config.root);
    if !config_path.exists() {
        write_project_config(&globals.config.root, &ProjectConfig::default())?;
    }

    let session = globals.session()?;
    let ctx = session.ctx();
    // Seal the empty state so `show` on the root reports a snapshot.
    let (_, root) = chain::init_root(&ctx, Some(&Records::default()))
        .context("Failed to create root entry")?;
    session.set_head(&root)?;
    info!(head = %root, "log initialized");

    let out = InitOutput {
        config: config_path.display().to_string(),
        store: globals.store_path().display().to_string(),
        head: root,
    };
    render(globals.output, &out, |o, w| {
        pretty_kv(w, "config", &o.config)?;
        pretty_kv(w, "store", &o.store)?;
        pretty_kv(w, "head", &o.head)
    })
}
