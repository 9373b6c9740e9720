use anyhow::{Context as _, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use otlog_core::chain;
use serde::Serialize;
use std::io::Write;
use uuid::Uuid;

use super::Globals;
use super::show::local_time;
use crate::output::{render_mode, short_ref};

#[derive(Args, Debug)]
pub struct LogArgs {
    /// Start from this entry instead of the head.
    pub reference: Option<String>,

    /// Show at most this many entries.
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct LogLine {
    reference: String,
    id: Uuid,
    time: DateTime<Utc>,
    op: String,
    parents: Vec<String>,
}

/// Execute `otlog log`.
///
/// # Errors
///
/// The first entry that fails to load.
pub fn run_log(args: &LogArgs, globals: &Globals) -> Result<()> {
    let session = globals.session()?;
    let ctx = session.ctx();
    let head = session.resolve(args.reference.as_deref())?;

    let lines: Vec<LogLine> = chain::history(&ctx, &head, args.limit)
        .with_context(|| format!("Failed to walk history from {head}"))?
        .into_iter()
        .map(|(reference, entry)| LogLine {
            reference,
            id: entry.id,
            time: entry.time,
            op: entry.operation.to_string(),
            parents: entry.parent_refs().map(str::to_string).collect(),
        })
        .collect();

    render_mode(
        globals.output,
        &lines,
        |lines, w| {
            for line in lines {
                writeln!(w, "{}\t{}\t{}", line.reference, line.op, line.time.to_rfc3339())?;
            }
            Ok(())
        },
        |lines, w| {
            for line in lines {
                let marker = if line.parents.len() > 1 { "◆" } else { "●" };
                writeln!(
                    w,
                    "{marker} {}  {:<4}  {}",
                    short_ref(&line.reference),
                    line.op,
                    local_time(&line.time)
                )?;
            }
            Ok(())
        },
    )
}
