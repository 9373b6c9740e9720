use anyhow::{Context as _, Result};
use clap::Args;
use otlog_core::{EntryDiff, Record, chain};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use super::Globals;
use crate::output::{pretty_kv, render};

#[derive(Args, Debug)]
pub struct PutArgs {
    /// Record value as JSON. Bare words are stored as strings.
    pub value: String,

    /// Record id to insert or replace. A new v4 id when omitted.
    #[arg(long)]
    pub id: Option<Uuid>,

    /// Append on top of this entry instead of the head; the head is not moved.
    #[arg(long, value_name = "REF")]
    pub parent: Option<String>,
}

/// Result of a write command.
#[derive(Debug, Serialize)]
pub struct AppendOutput {
    pub reference: String,
    pub parent: String,
    pub op: String,
    pub id: Uuid,
    pub head_moved: bool,
}

pub(crate) fn render_append(globals: &Globals, out: &AppendOutput) -> Result<()> {
    render(globals.output, out, |o, w| {
        pretty_kv(w, "entry", &o.reference)?;
        pretty_kv(w, "op", &o.op)?;
        pretty_kv(w, "record", o.id.to_string())?;
        if !o.head_moved {
            pretty_kv(w, "note", "head unchanged")?;
        }
        Ok(())
    })
}

/// Parse `raw` as JSON, falling back to a plain string.
fn parse_value(raw: &str) -> serde_json::Value {
    serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.to_string()))
}

/// Append `diff` on `parent` (or the head) and move the head if it was used.
pub(crate) fn append_diff(
    globals: &Globals,
    parent: Option<&str>,
    diff: &EntryDiff,
) -> Result<AppendOutput> {
    let session = globals.session()?;
    let ctx = session.ctx();
    let base = session.resolve(parent)?;

    let (_, reference) =
        chain::append(&ctx, &base, diff).with_context(|| format!("Failed to append to {base}"))?;

    let head_moved = parent.is_none();
    if head_moved {
        session.set_head(&reference)?;
    }
    info!(%reference, op = %diff.op, id = %diff.record.id, "entry appended");

    Ok(AppendOutput {
        reference,
        parent: base,
        op: diff.op.to_string(),
        id: diff.record.id,
        head_moved,
    })
}

/// Execute `otlog put`.
///
/// # Errors
///
/// Store, credential and append failures.
pub fn run_put(args: &PutArgs, globals: &Globals) -> Result<()> {
    let id = args.id.unwrap_or_else(Uuid::new_v4);
    let diff = EntryDiff::upsert(Record::new(id, parse_value(&args.value)));
    let out = append_diff(globals, args.parent.as_deref(), &diff)?;
    render_append(globals, &out)
}
