use anyhow::{Context as _, Result};
use clap::Args;
use otlog_core::Entry;
use otlog_core::dag::lca::find_common_ancestor;
use serde::Serialize;

use super::{Globals, parse_ref};
use crate::output::{pretty_kv, render};

#[derive(Args, Debug)]
pub struct LcaArgs {
    /// First entry.
    pub a: String,

    /// Second entry. Defaults to the head.
    pub b: Option<String>,
}

#[derive(Debug, Serialize)]
struct LcaOutput {
    a: String,
    b: String,
    ancestor: Option<String>,
    /// Distinct entries walked while searching; absent on the shared-parent fast path.
    #[serde(skip_serializing_if = "Option::is_none")]
    walked: Option<usize>,
}

/// Execute `otlog lca A [B]`.
///
/// # Errors
///
/// Fetch and integrity failures along either history.
pub fn run_lca(args: &LcaArgs, globals: &Globals) -> Result<()> {
    let session = globals.session()?;
    let ctx = session.ctx();
    let a = parse_ref(&args.a)?;
    let b = session.resolve(args.b.as_deref())?;

    let mut left = Entry::fetch(&ctx, &a).with_context(|| format!("Failed to load {a}"))?;
    let mut right = Entry::fetch(&ctx, &b).with_context(|| format!("Failed to load {b}"))?;
    let found = find_common_ancestor(&ctx, &mut left, &mut right)?;

    let out = LcaOutput {
        a,
        b,
        ancestor: found.reference,
        walked: found.mapping.map(|m| m.depths.len()),
    };
    render(globals.output, &out, |o, w| match &o.ancestor {
        Some(ancestor) => pretty_kv(w, "ancestor", ancestor),
        None => pretty_kv(w, "ancestor", "none"),
    })
}
