use anyhow::{Context as _, Result, bail};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use clap::Args;
use otlog_core::Identity;
use serde::Serialize;
use tracing::info;

use super::Globals;
use crate::output::{pretty_kv, render};

#[derive(Args, Debug)]
pub struct KeygenArgs {
    /// Common name written into the self-signed certificate.
    #[arg(long, default_value = "otlog")]
    pub name: String,

    /// Overwrite an existing identity.
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Serialize)]
struct KeygenOutput {
    key: String,
    certificate: String,
    /// Base64 public key, suitable for `[trust] pinned`.
    public_key: String,
}

/// Execute `otlog keygen`.
///
/// # Errors
///
/// Fails if an identity exists and `--force` is not set, or if the key
/// files cannot be written.
pub fn run_keygen(args: &KeygenArgs, globals: &Globals) -> Result<()> {
    let key_path = globals.config.key_path();
    let cert_path = globals.config.certificate_path();

    if key_path.exists() && !args.force {
        bail!(
            "{} already exists. Use `otlog keygen --force` to replace it.",
            key_path.display()
        );
    }

    let identity = Identity::generate(&args.name).context("Failed to generate identity")?;
    identity
        .save(&key_path, &cert_path)
        .with_context(|| format!("Failed to write identity to {}", key_path.display()))?;
    let public_key = STANDARD.encode(identity.signing_key()?.verifying_key().as_bytes());
    info!(name = %args.name, key = %key_path.display(), "identity generated");

    let out = KeygenOutput {
        key: key_path.display().to_string(),
        certificate: cert_path.display().to_string(),
        public_key,
    };
    render(globals.output, &out, |o, w| {
        pretty_kv(w, "key", &o.key)?;
        pretty_kv(w, "certificate", &o.certificate)?;
        pretty_kv(w, "public key", &o.public_key)
    })
}
