use anyhow::Result;
use clap::Args;
use otlog_core::EntryDiff;
use uuid::Uuid;

use super::Globals;
use super::put::{append_diff, render_append};

#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Record id to delete.
    pub id: Uuid,

    /// Append on top of this entry instead of the head; the head is not moved.
    #[arg(long, value_name = "REF")]
    pub parent: Option<String>,
}

/// Execute `otlog delete`.
///
/// Deleting an id that is not present still records the entry; replay
/// treats it as a no-op.
///
/// # Errors
///
/// Store, credential and append failures.
pub fn run_delete(args: &DeleteArgs, globals: &Globals) -> Result<()> {
    let out = append_diff(globals, args.parent.as_deref(), &EntryDiff::delete(args.id))?;
    render_append(globals, &out)
}
