//! Chain helpers: the common ways to grow and read a log.
//!
//! Each appended entry carries a snapshot of the full record set at that
//! point, so reading state never needs a replay and every entry is a valid
//! merge base.

use std::collections::{HashSet, VecDeque};

use tracing::{debug, warn};

use crate::context::Context;
use crate::entry::Entry;
use crate::error::{LogError, Result};
use crate::model::{EntryDiff, Link, Operation, Records};
use crate::snapshot::Snapshot;

/// Most entries [`history`] collects before truncating.
pub const MAX_HISTORY: usize = 100_000;

/// Create and persist a `Base` root, optionally with an initial snapshot.
///
/// # Errors
///
/// Sealing or storage failures.
pub fn init_root(ctx: &Context<'_>, records: Option<&Records>) -> Result<(Entry, String)> {
    let mut root = Entry::new(None, ctx.credentials)?;
    root.operation = Operation::Base;
    if let Some(records) = records {
        root.snapshot = Some(Snapshot::create(ctx, records)?);
    }

    let reference = root.persist(ctx, None)?;
    debug!(%reference, "root created");
    Ok((root, reference))
}

/// Records at the entry stored under `reference`.
///
/// A root without a snapshot is empty.
///
/// # Errors
///
/// [`LogError::NoSnapshot`] for a non-root entry without a snapshot;
/// fetch and decryption failures.
pub fn materialize(ctx: &Context<'_>, reference: &str) -> Result<Records> {
    let entry = Entry::fetch(ctx, reference)?;
    match &entry.snapshot {
        Some(link) => Snapshot::load_records(ctx, link.as_str()),
        None if entry.is_root() => Ok(Records::default()),
        None => Err(LogError::NoSnapshot),
    }
}

/// Append `diff` on top of `parent`.
///
/// The parent's records are materialized, the diff applied, the result
/// stored as the child's snapshot, and the child sealed and persisted.
///
/// # Errors
///
/// [`LogError::InvalidOperation`] if `diff` is not an upsert or delete;
/// see [`materialize`].
pub fn append(ctx: &Context<'_>, parent: &str, diff: &EntryDiff) -> Result<(Entry, String)> {
    if !diff.op.carries_diff() {
        return Err(LogError::InvalidOperation(format!(
            "cannot append a {} diff",
            diff.op
        )));
    }

    let mut records = materialize(ctx, parent)?;
    let applied = records.apply(diff);

    let mut entry = Entry::new(Some(Link::new(parent)), ctx.credentials)?;
    entry.operation = diff.op;
    entry.snapshot = Some(Snapshot::create(ctx, &records)?);
    entry.encrypt_from_json(diff, ctx.credentials)?;

    let reference = entry.persist(ctx, None)?;
    debug!(%reference, parent, id = %diff.record.id, ?applied, "entry appended");
    Ok((entry, reference))
}

/// Walk every ancestor of `head`, newest first.
///
/// Ordered by `(time, entry id, reference)` descending, then truncated to
/// `limit`. Entries are returned decrypted.
///
/// # Errors
///
/// The first failing fetch.
pub fn history(
    ctx: &Context<'_>,
    head: &str,
    limit: Option<usize>,
) -> Result<Vec<(String, Entry)>> {
    let mut out = collect_history(ctx, head, MAX_HISTORY)?;
    out.sort_by(|(ra, a), (rb, b)| {
        b.time
            .cmp(&a.time)
            .then_with(|| b.id.cmp(&a.id))
            .then_with(|| rb.cmp(ra))
    });
    if let Some(limit) = limit {
        out.truncate(limit);
    }
    Ok(out)
}

/// Breadth-first fetch of `head` and its ancestors, at most `cap` entries.
fn collect_history(ctx: &Context<'_>, head: &str, cap: usize) -> Result<Vec<(String, Entry)>> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut queue: VecDeque<String> = VecDeque::new();
    let mut out: Vec<(String, Entry)> = Vec::new();

    seen.insert(head.to_string());
    queue.push_back(head.to_string());

    while let Some(reference) = queue.pop_front() {
        if out.len() >= cap {
            warn!(head, max = cap, "history walk truncated");
            break;
        }

        let entry = Entry::fetch(ctx, &reference)?;
        for parent in entry.parent_refs() {
            if seen.insert(parent.to_string()) {
                queue.push_back(parent.to_string());
            }
        }
        out.push((reference, entry));
    }

    Ok(out)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
