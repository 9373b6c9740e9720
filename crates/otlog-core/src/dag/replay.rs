//! Divergent-branch diff replay.
//!
//! After an ancestor search, the entries reachable from either head but not
//! from the merge base are the ones to replay. Replay decodes each one's
//! [`EntryDiff`](crate::model::EntryDiff) and applies it to a record set in
//! a total, side-independent order: `(time, entry id, reference)`.
//!
//! `Merge` and `Base` entries are skipped: a merge's effect is already the
//! replay of its own ancestors, and a base carries no diff.

use std::collections::BTreeSet;

use tracing::debug;

use super::lca::{AncestorFinder, LcaMapping};
use crate::error::Result;
use crate::model::{Applied, Records};

/// References unique to each side of a divergence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DivergentSets {
    /// Reachable from the first head only, the head included.
    pub unique_a: BTreeSet<String>,
    /// Reachable from the second head only, the head included.
    pub unique_b: BTreeSet<String>,
}

impl DivergentSets {
    /// Union of both sides.
    #[must_use]
    pub fn all(&self) -> BTreeSet<String> {
        self.unique_a.union(&self.unique_b).cloned().collect()
    }
}

/// Split the ancestry of two heads into the parts unique to each.
#[must_use]
pub fn divergent_sets(mapping: &LcaMapping, a_ref: &str, b_ref: &str) -> DivergentSets {
    let ancestry_a = mapping.ancestry_a(a_ref);
    let ancestry_b = mapping.ancestry_b(b_ref);

    DivergentSets {
        unique_a: ancestry_a.difference(&ancestry_b).cloned().collect(),
        unique_b: ancestry_b.difference(&ancestry_a).cloned().collect(),
    }
}

/// Everything reachable from either head that `base` has not already
/// folded in.
///
/// `base_ancestry` is the base and all of its ancestors. Common ancestors
/// outside it (the other side of a criss-cross) stay in the set.
#[must_use]
pub fn replay_set(
    mapping: &LcaMapping,
    a_ref: &str,
    b_ref: &str,
    base_ancestry: &BTreeSet<String>,
) -> BTreeSet<String> {
    let mut pending = mapping.ancestry_a(a_ref);
    pending.extend(mapping.ancestry_b(b_ref));
    pending.retain(|reference| !base_ancestry.contains(reference));
    pending
}

/// Order references by `(time, entry id, reference)`.
///
/// # Errors
///
/// Propagates fetch failures for entries not yet in the finder's arena.
pub fn replay_order<'r, I>(finder: &mut AncestorFinder<'_>, references: I) -> Result<Vec<String>>
where
    I: IntoIterator<Item = &'r String>,
{
    let mut keyed = Vec::new();
    for reference in references {
        let entry = finder.entry_mut(reference)?;
        keyed.push((entry.time, entry.id, reference.clone()));
    }
    keyed.sort();
    Ok(keyed.into_iter().map(|(_, _, reference)| reference).collect())
}

/// Counters from one replay pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    pub applied: usize,
    pub skipped: usize,
}

/// Apply the diffs of `references` to `records` in replay order.
///
/// # Errors
///
/// Propagates fetch, decryption and decoding failures unchanged.
pub fn replay<'r, I>(
    finder: &mut AncestorFinder<'_>,
    references: I,
    records: &mut Records,
) -> Result<ReplayStats>
where
    I: IntoIterator<Item = &'r String>,
{
    let credentials = finder.context().credentials;
    let mut stats = ReplayStats::default();

    for reference in replay_order(finder, references)? {
        let entry = finder.entry_mut(&reference)?;
        if !entry.operation.carries_diff() {
            debug!(%reference, op = %entry.operation, "replay skipped entry without diff");
            stats.skipped += 1;
            continue;
        }

        let diff = entry.diff(credentials)?;
        let applied = records.apply(&diff);
        debug!(%reference, id = %diff.record.id, op = %diff.op, ?applied, "diff replayed");
        if applied == Applied::Ignored {
            stats.skipped += 1;
        } else {
            stats.applied += 1;
        }
    }

    Ok(stats)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
