use anyhow::{Context as _, Result};
use clap::Args;
use otlog_core::{Record, chain};
use serde::Serialize;
use std::io::Write;

use super::Globals;
use crate::output::{pretty_rule, render_mode, short_ref};

#[derive(Args, Debug)]
pub struct RecordsArgs {
    /// Entry reference. Defaults to the head.
    pub reference: Option<String>,
}

#[derive(Debug, Serialize)]
struct RecordsOutput {
    reference: String,
    count: usize,
    records: Vec<Record>,
}

/// Execute `otlog records [REF]`.
///
/// # Errors
///
/// Fails when the entry has no snapshot or cannot be opened.
pub fn run_records(args: &RecordsArgs, globals: &Globals) -> Result<()> {
    let session = globals.session()?;
    let ctx = session.ctx();
    let reference = session.resolve(args.reference.as_deref())?;

    let records = chain::materialize(&ctx, &reference)
        .with_context(|| format!("Failed to materialize {reference}"))?
        .into_vec();

    let out = RecordsOutput {
        reference,
        count: records.len(),
        records,
    };
    render_mode(
        globals.output,
        &out,
        |o, w| {
            for record in &o.records {
                writeln!(w, "{}\t{}", record.id, record.value)?;
            }
            Ok(())
        },
        |o, w| {
            writeln!(w, "{} record(s) at {}", o.count, short_ref(&o.reference))?;
            pretty_rule(w)?;
            for record in &o.records {
                writeln!(w, "{}  {}", record.id, record.value)?;
            }
            Ok(())
        },
    )
}
