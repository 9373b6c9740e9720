//! `otlog show` - display one verified, decrypted entry.

use anyhow::{Context as _, Result};
use chrono::{DateTime, Local, Utc};
use clap::Args;
use otlog_core::{Entry, EntryDiff};
use serde::Serialize;
use std::io::Write;
use uuid::Uuid;

use super::Globals;
use crate::output::{pretty_kv, pretty_section, render_mode};

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Entry reference. Defaults to the head.
    pub reference: Option<String>,
}

/// Full entry detail as returned in JSON output.
#[derive(Debug, Serialize)]
pub struct ShowEntry {
    pub reference: String,
    pub id: Uuid,
    pub time: DateTime<Utc>,
    pub op: String,
    pub crypto_alg: String,
    pub parents: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<EntryDiff>,
}

impl ShowEntry {
    pub fn from_entry(
        reference: String,
        entry: &mut Entry,
        credentials: &dyn otlog_core::Credentials,
    ) -> Result<Self> {
        let diff = if entry.operation.carries_diff() {
            Some(entry.diff(credentials)?)
        } else {
            None
        };
        Ok(Self {
            reference,
            id: entry.id,
            time: entry.time,
            op: entry.operation.to_string(),
            crypto_alg: entry.crypto_alg.clone(),
            parents: entry.parent_refs().map(str::to_string).collect(),
            snapshot: entry.snapshot.as_ref().map(|link| link.as_str().to_string()),
            diff,
        })
    }
}

pub fn local_time(time: &DateTime<Utc>) -> String {
    time.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Execute `otlog show [REF]`.
///
/// # Errors
///
/// Fetch, integrity and decryption failures.
pub fn run_show(args: &ShowArgs, globals: &Globals) -> Result<()> {
    let session = globals.session()?;
    let ctx = session.ctx();
    let reference = session.resolve(args.reference.as_deref())?;

    let mut entry =
        Entry::fetch(&ctx, &reference).with_context(|| format!("Failed to load {reference}"))?;
    let shown = ShowEntry::from_entry(reference, &mut entry, ctx.credentials)?;

    render_mode(
        globals.output,
        &shown,
        |s, w| {
            writeln!(w, "{}\t{}\t{}\t{}", s.reference, s.op, s.time.to_rfc3339(), s.id)?;
            for parent in &s.parents {
                writeln!(w, "parent\t{parent}")?;
            }
            if let Some(diff) = &s.diff {
                writeln!(w, "record\t{}\t{}", diff.record.id, diff.record.value)?;
            }
            Ok(())
        },
        |s, w| {
            pretty_section(w, &format!("Entry {}", s.reference))?;
            pretty_kv(w, "id", s.id.to_string())?;
            pretty_kv(w, "time", local_time(&s.time))?;
            pretty_kv(w, "op", &s.op)?;
            pretty_kv(w, "cipher", &s.crypto_alg)?;
            for parent in &s.parents {
                pretty_kv(w, "parent", parent)?;
            }
            if let Some(snapshot) = &s.snapshot {
                pretty_kv(w, "snapshot", snapshot)?;
            }
            if let Some(diff) = &s.diff {
                pretty_kv(w, "record", diff.record.id.to_string())?;
                pretty_kv(w, "value", diff.record.value.to_string())?;
            }
            Ok(())
        },
    )
}
