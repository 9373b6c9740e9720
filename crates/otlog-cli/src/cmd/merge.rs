use anyhow::{Context as _, Result};
use clap::Args;
use otlog_core::Entry;
use otlog_core::dag::merge::merge;
use serde::Serialize;
use tracing::info;

use super::{Globals, parse_ref};
use crate::output::{pretty_kv, render};

#[derive(Args, Debug)]
pub struct MergeArgs {
    /// Head to merge into the current one.
    pub sibling: String,

    /// Merge into this entry instead of the head; the head is not moved.
    #[arg(long, value_name = "REF")]
    pub into: Option<String>,

    /// Compute the merge without persisting the merge entry.
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Serialize)]
struct MergeOutput {
    head: String,
    sibling: String,
    strategy: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    ancestor: Option<String>,
    applied: usize,
    skipped: usize,
    records: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    merge: Option<String>,
}

/// Execute `otlog merge SIBLING`.
///
/// # Errors
///
/// Fails when the target has no snapshot or either history cannot be read.
pub fn run_merge(args: &MergeArgs, globals: &Globals) -> Result<()> {
    let session = globals.session()?;
    let ctx = session.ctx();
    let head = session.resolve(args.into.as_deref())?;
    let sibling_ref = parse_ref(&args.sibling)?;

    let mut e = Entry::fetch(&ctx, &head).with_context(|| format!("Failed to load {head}"))?;
    let mut sibling = Entry::fetch(&ctx, &sibling_ref)
        .with_context(|| format!("Failed to load {sibling_ref}"))?;

    let mut outcome = merge(&ctx, &mut e, &mut sibling)
        .with_context(|| format!("Failed to merge {sibling_ref} into {head}"))?;

    let merge_ref = if args.dry_run {
        None
    } else {
        let reference = outcome.entry.persist(&ctx, None)?;
        if args.into.is_none() {
            session.set_head(&reference)?;
        }
        info!(%reference, strategy = %outcome.strategy, "merge recorded");
        Some(reference)
    };

    let out = MergeOutput {
        head,
        sibling: sibling_ref,
        strategy: outcome.strategy.to_string(),
        ancestor: outcome.ancestor.reference.clone(),
        applied: outcome.stats.applied,
        skipped: outcome.stats.skipped,
        records: outcome.records.len(),
        merge: merge_ref,
    };
    render(globals.output, &out, |o, w| {
        pretty_kv(w, "strategy", &o.strategy)?;
        pretty_kv(w, "applied", o.applied.to_string())?;
        pretty_kv(w, "skipped", o.skipped.to_string())?;
        pretty_kv(w, "records", o.records.to_string())?;
        match &o.merge {
            Some(reference) => pretty_kv(w, "merge", reference),
            None => pretty_kv(w, "merge", "not recorded (dry run)"),
        }
    })
}
