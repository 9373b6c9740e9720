//! Merge two divergent heads into one record set and a `Merge` entry.
//!
//! # Base selection
//!
//! Both heads' full ancestries are walked, root inputs included.
//!
//! - **Fast-forward**: the sibling is already in `e`'s history. Nothing is
//!   replayed; the result is `e`'s own snapshot.
//! - **Rebase**: the base is the lowest entry that every minimal common
//!   ancestor descends from and whose state is known: it carries a snapshot,
//!   or it is a root, which starts empty. With a single LCA that is the LCA
//!   itself. In a criss-cross history it sits below all of them. Everything
//!   reachable from either head and not already folded into the base is
//!   replayed in the total order, so `merge(a, b)` and `merge(b, a)` agree.
//!   A head behind its sibling rebases on itself and catches up.
//! - **Sibling replay**: no usable base exists, which means disjoint
//!   histories. `e`'s snapshot is the base and only the sibling's ancestry
//!   is replayed. This is the one asymmetric case: `merge(a, b)` keeps `a`'s
//!   state and `merge(b, a)` keeps `b`'s.
//!
//! The merge entry is returned unpersisted; the caller decides when to
//! persist it.

use std::collections::BTreeSet;
use std::fmt;

use tracing::{debug, info};

use super::lca::{AncestorFinder, CommonAncestor, LcaMapping, minimal_common};
use super::replay::{ReplayStats, divergent_sets, replay, replay_set};
use crate::context::Context;
use crate::entry::Entry;
use crate::error::{LogError, Result};
use crate::model::{Link, Operation, Records};
use crate::snapshot::Snapshot;

/// How the merged records were derived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeStrategy {
    FastForward,
    Rebase { ancestor: String },
    SiblingReplay,
}

impl fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FastForward => f.write_str("fast-forward"),
            Self::Rebase { ancestor } => write!(f, "rebase on {ancestor}"),
            Self::SiblingReplay => f.write_str("sibling replay"),
        }
    }
}

/// Everything a merge produced.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    /// The unpersisted `Merge` entry, parents `[e, sibling]`.
    pub entry: Entry,
    /// The reconciled records, also sealed in `snapshot`.
    pub records: Records,
    /// Result of the ancestor search.
    pub ancestor: CommonAncestor,
    /// Link to the persisted snapshot of `records`.
    pub snapshot: Link,
    /// Which base the records were rebuilt from.
    pub strategy: MergeStrategy,
    /// Diffs applied and entries skipped while replaying onto the base.
    pub stats: ReplayStats,
}

/// State a rebase starts from.
struct MergeBase {
    reference: String,
    records: Records,
    /// The base and all of its ancestors.
    ancestry: BTreeSet<String>,
}

/// Merge `sibling` into `e`.
///
/// Both heads are persisted first so they have stable references.
///
/// # Errors
///
/// [`LogError::NoSnapshot`] if `e` has no snapshot link. Fetch, decryption
/// and storage failures propagate unchanged.
pub fn merge(ctx: &Context<'_>, e: &mut Entry, sibling: &mut Entry) -> Result<MergeOutcome> {
    let e_ref = e.persist(ctx, None)?;
    let s_ref = sibling.persist(ctx, None)?;

    let mut finder = AncestorFinder::new(*ctx);
    finder.insert(&e_ref, e.clone());
    finder.insert(&s_ref, sibling.clone());

    let ancestor = finder.find(e, sibling)?;
    let head_snapshot = e.snapshot.clone().ok_or(LogError::NoSnapshot)?;

    let mut stats = ReplayStats::default();
    let (records, strategy) = if ancestor.reference.as_deref() == Some(s_ref.as_str()) {
        (
            Snapshot::load_records(ctx, head_snapshot.as_str())?,
            MergeStrategy::FastForward,
        )
    } else {
        let mapping = match &ancestor.mapping {
            Some(mapping) => mapping.clone(),
            None => finder.mapping(&e_ref, &s_ref)?,
        };

        if mapping.ancestry_a(&e_ref).contains(&s_ref) {
            (
                Snapshot::load_records(ctx, head_snapshot.as_str())?,
                MergeStrategy::FastForward,
            )
        } else if let Some(base) = merge_base(&mut finder, &mapping, &e_ref, &s_ref)? {
            let pending = replay_set(&mapping, &e_ref, &s_ref, &base.ancestry);
            let mut records = base.records;
            stats = replay(&mut finder, &pending, &mut records)?;
            (
                records,
                MergeStrategy::Rebase {
                    ancestor: base.reference,
                },
            )
        } else {
            debug!(%e_ref, %s_ref, "no merge base, replaying sibling onto head");
            let divergent = divergent_sets(&mapping, &e_ref, &s_ref);
            let mut records = Snapshot::load_records(ctx, head_snapshot.as_str())?;
            stats = replay(&mut finder, &divergent.unique_b, &mut records)?;
            (records, MergeStrategy::SiblingReplay)
        }
    };

    let snapshot = Snapshot::create(ctx, &records)?;

    let mut entry = Entry::new(None, ctx.credentials)?;
    entry.operation = Operation::Merge;
    entry.snapshot = Some(snapshot.clone());
    entry.parents = vec![Link::new(e_ref), Link::new(s_ref)];

    info!(
        %strategy,
        applied = stats.applied,
        skipped = stats.skipped,
        records = records.len(),
        "merged heads"
    );

    Ok(MergeOutcome {
        entry,
        records,
        ancestor,
        snapshot,
        strategy,
        stats,
    })
}

/// Pick the rebase base for two heads that share history.
///
/// Candidates are the ancestors shared by every minimal common ancestor,
/// tried lowest first by `(depth, reference)`. The first with a snapshot,
/// or a root, wins. `None` when the heads share nothing, or nothing shared
/// has a known state.
fn merge_base(
    finder: &mut AncestorFinder<'_>,
    mapping: &LcaMapping,
    e_ref: &str,
    s_ref: &str,
) -> Result<Option<MergeBase>> {
    let ctx = *finder.context();
    let minimal = minimal_common(mapping, e_ref, s_ref);
    if minimal.len() > 1 {
        debug!(count = minimal.len(), "criss-cross history");
    }

    let mut shared: Option<BTreeSet<String>> = None;
    for reference in &minimal {
        let below = finder.ancestry(reference)?;
        shared = Some(match shared {
            Some(acc) => acc.intersection(&below).cloned().collect(),
            None => below,
        });
    }
    let Some(shared) = shared else {
        return Ok(None);
    };

    let mut candidates: Vec<(usize, &String)> = shared
        .iter()
        .map(|reference| {
            let depth = mapping.depths.get(reference).copied().unwrap_or(usize::MAX);
            (depth, reference)
        })
        .collect();
    candidates.sort();

    for (_, reference) in candidates {
        let (snapshot, is_root) = {
            let entry = finder.entry_mut(reference)?;
            (entry.snapshot.clone(), entry.is_root())
        };
        let records = match snapshot {
            Some(link) => Snapshot::load_records(&ctx, link.as_str())?,
            None if is_root => Records::default(),
            None => {
                debug!(%reference, "common ancestor has no snapshot");
                continue;
            }
        };

        return Ok(Some(MergeBase {
            reference: reference.clone(),
            records,
            ancestry: finder.ancestry(reference)?,
        }));
    }

    Ok(None)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
