//! Lowest Common Ancestor (LCA) search between two log heads.
//!
//! Given two entries, the LCA is the ancestor both descend from that lies
//! closest to them. It is the divergence point a merge rebases on.
//!
//! # Algorithm
//!
//! 1. **Fast path.** If the two entries share a direct parent, that parent
//!    is the LCA (lowest reference wins if they share both).
//! 2. **General path.** Both entries are persisted so they have stable
//!    references. An upward walk from each start records, for every
//!    ancestor reached, the set of its children seen on the walk
//!    ([`RefTree`]), and the longest distance at which it was reached from
//!    either start. A reference is *common* when both walks reach it, or
//!    when one walk reaches the other walk's start. The common reference
//!    with the smallest recorded depth is the LCA; ties go to the
//!    lexicographically lowest reference.
//! 3. **Fast-forward.** If the LCA is the second entry itself, it is
//!    returned without a mapping.
//!
//! Walks use an explicit stack and stop expanding past [`MAX_DEPTH`], so
//! deep histories cannot overflow the call stack and a corrupt cyclic
//! history still terminates.
//!
//! # Edge Cases
//!
//! - Either entry being a root yields no ancestor. Callers that need to know
//!   whether a root is in the other entry's history use
//!   [`AncestorFinder::mapping`] directly, as the merge engine does.
//! - Disjoint histories yield no ancestor but still return the mapping.
//! - Criss-cross histories have several common ancestors with no common
//!   child; [`minimal_common`] lists them all.

use std::collections::hash_map::Entry as Slot;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::{debug, warn};

use crate::context::Context;
use crate::entry::Entry;
use crate::error::Result;

/// Longest ancestor distance a walk will expand.
pub const MAX_DEPTH: usize = 100_000;

/// Parent reference → children reached through it during one walk.
pub type RefTree = BTreeMap<String, BTreeSet<String>>;

/// Traversal state the merge engine needs to find entries unique to a side.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LcaMapping {
    /// Reverse adjacency from the first entry's walk.
    pub children_a: RefTree,
    /// Reverse adjacency from the second entry's walk.
    pub children_b: RefTree,
    /// Longest distance each reference was reached at, from either start.
    pub depths: BTreeMap<String, usize>,
}

impl LcaMapping {
    /// References reachable from the first start, the start included.
    #[must_use]
    pub fn ancestry_a(&self, start: &str) -> BTreeSet<String> {
        ancestry(&self.children_a, start)
    }

    /// References reachable from the second start, the start included.
    #[must_use]
    pub fn ancestry_b(&self, start: &str) -> BTreeSet<String> {
        ancestry(&self.children_b, start)
    }
}

fn ancestry(tree: &RefTree, start: &str) -> BTreeSet<String> {
    let mut set: BTreeSet<String> = tree.keys().cloned().collect();
    set.insert(start.to_string());
    set
}

/// Result of an ancestor search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommonAncestor {
    /// The LCA reference, if any.
    pub reference: Option<String>,
    /// Present only when the general path ran and did not fast-forward.
    pub mapping: Option<LcaMapping>,
}

impl CommonAncestor {
    const fn none() -> Self {
        Self {
            reference: None,
            mapping: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Finder
// ---------------------------------------------------------------------------

/// Ancestor search over a cache of validated entries.
///
/// Every entry the finder fetches is kept in its arena, so one merge never
/// fetches or decrypts the same reference twice.
pub struct AncestorFinder<'a> {
    ctx: Context<'a>,
    arena: HashMap<String, Entry>,
}

impl<'a> AncestorFinder<'a> {
    #[must_use]
    pub fn new(ctx: Context<'a>) -> Self {
        Self {
            ctx,
            arena: HashMap::new(),
        }
    }

    #[must_use]
    pub const fn context(&self) -> &Context<'a> {
        &self.ctx
    }

    /// Seed the arena with an entry already known under `reference`.
    pub fn insert(&mut self, reference: &str, entry: Entry) {
        self.arena.insert(reference.to_string(), entry);
    }

    /// The validated entry stored under `reference`, fetched on first use.
    ///
    /// # Errors
    ///
    /// Any [`Entry::fetch`] failure.
    pub fn entry_mut(&mut self, reference: &str) -> Result<&mut Entry> {
        match self.arena.entry(reference.to_string()) {
            Slot::Occupied(slot) => Ok(slot.into_mut()),
            Slot::Vacant(slot) => Ok(slot.insert(Entry::fetch(&self.ctx, reference)?)),
        }
    }

    fn parent_refs(&mut self, reference: &str) -> Result<Vec<String>> {
        Ok(self
            .entry_mut(reference)?
            .parent_refs()
            .map(str::to_string)
            .collect())
    }

    /// Find the LCA of `e` and `s`.
    ///
    /// Both entries may be persisted as a side effect.
    ///
    /// # Errors
    ///
    /// Propagates persist and fetch failures unchanged.
    pub fn find(&mut self, e: &mut Entry, s: &mut Entry) -> Result<CommonAncestor> {
        if e.is_root() || s.is_root() {
            debug!("root entry has no common ancestor");
            return Ok(CommonAncestor::none());
        }

        if let Some(shared) = self.shared_parent(e, s)? {
            debug!(lca = %shared, "common ancestor is a shared parent");
            return Ok(CommonAncestor {
                reference: Some(shared),
                mapping: None,
            });
        }

        let e_ref = e.persist(&self.ctx, None)?;
        let s_ref = s.persist(&self.ctx, None)?;
        self.insert(&e_ref, e.clone());
        self.insert(&s_ref, s.clone());

        let mapping = self.mapping(&e_ref, &s_ref)?;
        let Some(lca) = lowest_common(&mapping, &e_ref, &s_ref) else {
            debug!(%e_ref, %s_ref, "histories are disjoint");
            return Ok(CommonAncestor {
                reference: None,
                mapping: Some(mapping),
            });
        };

        if lca == s_ref {
            debug!(lca = %s_ref, "fast-forward");
            return Ok(CommonAncestor {
                reference: Some(s_ref),
                mapping: None,
            });
        }

        debug!(%lca, depth = mapping.depths.get(&lca).copied().unwrap_or_default(), "common ancestor found");
        Ok(CommonAncestor {
            reference: Some(lca),
            mapping: Some(mapping),
        })
    }

    /// Fetch both parent sets and return the lowest shared reference.
    fn shared_parent(&mut self, e: &Entry, s: &Entry) -> Result<Option<String>> {
        let e_parents: BTreeSet<String> = e.parent_refs().map(str::to_string).collect();
        let s_parents: BTreeSet<String> = s.parent_refs().map(str::to_string).collect();

        for reference in e_parents.iter().chain(&s_parents) {
            self.entry_mut(reference)?;
        }

        Ok(e_parents.intersection(&s_parents).next().cloned())
    }

    /// Walk upward from two persisted starts and build their mapping.
    ///
    /// # Errors
    ///
    /// Propagates fetch failures unchanged.
    pub fn mapping(&mut self, e_ref: &str, s_ref: &str) -> Result<LcaMapping> {
        let mut depths = BTreeMap::new();
        depths.insert(e_ref.to_string(), 0);
        depths.insert(s_ref.to_string(), 0);

        let children_a = self.walk(e_ref, &mut depths)?;
        let children_b = self.walk(s_ref, &mut depths)?;

        Ok(LcaMapping {
            children_a,
            children_b,
            depths,
        })
    }

    /// References reachable from `reference`, itself included.
    ///
    /// # Errors
    ///
    /// Propagates fetch failures unchanged.
    pub fn ancestry(&mut self, reference: &str) -> Result<BTreeSet<String>> {
        let mut depths = BTreeMap::new();
        let tree = self.walk(reference, &mut depths)?;
        Ok(ancestry(&tree, reference))
    }

    /// Explicit-stack walk recording reverse adjacency and longest depths.
    ///
    /// A node is expanded again only when reached at a strictly greater
    /// depth than before, so depths converge to longest-path distances.
    fn walk(&mut self, start: &str, depths: &mut BTreeMap<String, usize>) -> Result<RefTree> {
        let mut children = RefTree::new();
        let mut best: HashMap<String, usize> = HashMap::new();
        let mut stack = vec![(start.to_string(), 0_usize)];
        let mut capped = false;
        best.insert(start.to_string(), 0);

        while let Some((reference, depth)) = stack.pop() {
            if best.get(&reference) != Some(&depth) {
                continue;
            }

            let next = depth + 1;
            if next > MAX_DEPTH {
                capped = true;
                continue;
            }

            for parent in self.parent_refs(&reference)? {
                children
                    .entry(parent.clone())
                    .or_default()
                    .insert(reference.clone());

                let recorded = depths.entry(parent.clone()).or_insert(next);
                if next > *recorded {
                    *recorded = next;
                }

                if best.get(&parent).is_none_or(|&seen| next > seen) {
                    best.insert(parent.clone(), next);
                    stack.push((parent, next));
                }
            }
        }

        if capped {
            warn!(start, max_depth = MAX_DEPTH, "ancestor walk hit depth cap");
        }
        Ok(children)
    }
}

/// Find the LCA of `e` and `s` with a throwaway finder.
///
/// # Errors
///
/// See [`AncestorFinder::find`].
pub fn find_common_ancestor(
    ctx: &Context<'_>,
    e: &mut Entry,
    s: &mut Entry,
) -> Result<CommonAncestor> {
    AncestorFinder::new(*ctx).find(e, s)
}

/// Common references and their depths.
///
/// Common means reached by both walks, or the other walk's start reached by
/// one walk.
#[must_use]
pub fn common_references(mapping: &LcaMapping, e_ref: &str, s_ref: &str) -> BTreeMap<String, usize> {
    mapping
        .depths
        .iter()
        .filter(|(reference, _)| {
            let in_a = mapping.children_a.contains_key(*reference);
            let in_b = mapping.children_b.contains_key(*reference);
            (in_a && in_b) || (in_b && *reference == e_ref) || (in_a && *reference == s_ref)
        })
        .map(|(reference, depth)| (reference.clone(), *depth))
        .collect()
}

/// Common references with no common child.
///
/// A single result is the unique LCA. Several results mean a criss-cross
/// history, where no one common ancestor covers everything both heads share.
#[must_use]
pub fn minimal_common(mapping: &LcaMapping, e_ref: &str, s_ref: &str) -> BTreeSet<String> {
    let commons = common_references(mapping, e_ref, s_ref);
    commons
        .keys()
        .filter(|reference| {
            !mapping
                .children_a
                .get(*reference)
                .into_iter()
                .chain(mapping.children_b.get(*reference))
                .flatten()
                .any(|child| commons.contains_key(child))
        })
        .cloned()
        .collect()
}

/// Minimum-depth common reference, lowest reference on ties.
#[must_use]
pub fn lowest_common(mapping: &LcaMapping, e_ref: &str, s_ref: &str) -> Option<String> {
    let mut best: Option<(String, usize)> = None;
    for (reference, depth) in common_references(mapping, e_ref, s_ref) {
        if best.as_ref().is_none_or(|(_, d)| depth < *d) {
            best = Some((reference, depth));
        }
    }
    best.map(|(reference, _)| reference)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Link;
    use crate::store::MemoryStore;
    use crate::test_support;

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn ctx(store: &MemoryStore) -> Context<'_> {
        Context::new(store, test_support::credentials())
    }

    fn root(ctx: &Context<'_>) -> (Entry, String) {
        let mut entry = Entry::new(None, ctx.credentials).unwrap();
        let reference = entry.persist(ctx, None).unwrap();
        (entry, reference)
    }

    fn child(ctx: &Context<'_>, parents: &[&str]) -> (Entry, String) {
        let mut entry = Entry::new(None, ctx.credentials).unwrap();
        entry.parents = parents.iter().map(|p| Link::new(*p)).collect();
        let reference = entry.persist(ctx, None).unwrap();
        (entry, reference)
    }

    fn mapping_from(edges: &[(&str, &str)]) -> RefTree {
        let mut tree = RefTree::new();
        for (parent, child) in edges {
            tree.entry((*parent).to_string())
                .or_default()
                .insert((*child).to_string());
        }
        tree
    }

    // -----------------------------------------------------------------------
    // DAG scenarios
    // -----------------------------------------------------------------------

    #[test]
    fn direct_siblings_share_root() {
        let store = MemoryStore::new();
        let ctx = ctx(&store);
        let (_, root_ref) = root(&ctx);
        let (mut e1, _) = child(&ctx, &[&root_ref]);
        let (mut e2, _) = child(&ctx, &[&root_ref]);

        let found = find_common_ancestor(&ctx, &mut e2, &mut e1).unwrap();
        assert_eq!(found.reference.as_deref(), Some(root_ref.as_str()));
        assert!(found.mapping.is_none());
    }

    #[test]
    fn one_hop_finds_root() {
        // root -> {1, 2}, 1 -> 3; LCA(2, 3) = root
        let store = MemoryStore::new();
        let ctx = ctx(&store);
        let (_, root_ref) = root(&ctx);
        let (_, e1_ref) = child(&ctx, &[&root_ref]);
        let (mut e3, _) = child(&ctx, &[&e1_ref]);
        let (mut e2, _) = child(&ctx, &[&root_ref]);

        let found = find_common_ancestor(&ctx, &mut e2, &mut e3).unwrap();
        assert_eq!(found.reference.as_deref(), Some(root_ref.as_str()));
        assert!(found.mapping.is_some());
    }

    #[test]
    fn two_hop_through_merge_finds_branch_point() {
        // root -> {1, 2}, 1 -> 3, {1, 2} -> 4, 4 -> 5; LCA(3, 5) = 1
        let store = MemoryStore::new();
        let ctx = ctx(&store);
        let (_, root_ref) = root(&ctx);
        let (_, e1_ref) = child(&ctx, &[&root_ref]);
        let (_, e2_ref) = child(&ctx, &[&root_ref]);
        let (mut e3, _) = child(&ctx, &[&e1_ref]);
        let (_, e4_ref) = child(&ctx, &[&e1_ref, &e2_ref]);
        let (mut e5, _) = child(&ctx, &[&e4_ref]);

        let found = find_common_ancestor(&ctx, &mut e3, &mut e5).unwrap();
        assert_eq!(found.reference.as_deref(), Some(e1_ref.as_str()));

        let reversed = find_common_ancestor(&ctx, &mut e5, &mut e3).unwrap();
        assert_eq!(reversed.reference.as_deref(), Some(e1_ref.as_str()));
    }

    #[test]
    fn sibling_already_in_history_fast_forwards() {
        // root -> 1 -> 2 -> 3; LCA(3, 1) = 1 with no mapping
        let store = MemoryStore::new();
        let ctx = ctx(&store);
        let (_, root_ref) = root(&ctx);
        let (mut e1, e1_ref) = child(&ctx, &[&root_ref]);
        let (_, e2_ref) = child(&ctx, &[&e1_ref]);
        let (mut e3, _) = child(&ctx, &[&e2_ref]);

        let found = find_common_ancestor(&ctx, &mut e3, &mut e1).unwrap();
        assert_eq!(found.reference.as_deref(), Some(e1_ref.as_str()));
        assert!(found.mapping.is_none());
    }

    #[test]
    fn behind_head_keeps_mapping() {
        // root -> 1 -> 2 -> 3; LCA(1, 3) = 1, the first start
        let store = MemoryStore::new();
        let ctx = ctx(&store);
        let (_, root_ref) = root(&ctx);
        let (mut e1, e1_ref) = child(&ctx, &[&root_ref]);
        let (_, e2_ref) = child(&ctx, &[&e1_ref]);
        let (mut e3, e3_ref) = child(&ctx, &[&e2_ref]);

        let found = find_common_ancestor(&ctx, &mut e1, &mut e3).unwrap();
        assert_eq!(found.reference.as_deref(), Some(e1_ref.as_str()));

        let mapping = found.mapping.unwrap();
        assert!(mapping.ancestry_b(&e3_ref).contains(&e2_ref));
        assert!(!mapping.ancestry_a(&e1_ref).contains(&e2_ref));
    }

    #[test]
    fn root_input_has_no_ancestor() {
        let store = MemoryStore::new();
        let ctx = ctx(&store);
        let (mut r, root_ref) = root(&ctx);
        let (mut e1, _) = child(&ctx, &[&root_ref]);

        assert_eq!(
            find_common_ancestor(&ctx, &mut r, &mut e1).unwrap(),
            CommonAncestor::default()
        );
        assert_eq!(
            find_common_ancestor(&ctx, &mut e1, &mut r).unwrap(),
            CommonAncestor::default()
        );
    }

    #[test]
    fn disjoint_histories_have_no_ancestor() {
        let store = MemoryStore::new();
        let ctx = ctx(&store);
        let (_, a_root) = root(&ctx);
        let (_, b_root) = root(&ctx);
        let (mut a, _) = child(&ctx, &[&a_root]);
        let (mut b, _) = child(&ctx, &[&b_root]);

        let found = find_common_ancestor(&ctx, &mut a, &mut b).unwrap();
        assert!(found.reference.is_none());
        assert!(found.mapping.is_some());
    }

    #[test]
    fn depths_are_longest_paths() {
        // root -> 1 -> 2, root -> 2 (diamond-ish shortcut)
        let store = MemoryStore::new();
        let ctx = ctx(&store);
        let (_, root_ref) = root(&ctx);
        let (_, e1_ref) = child(&ctx, &[&root_ref]);
        let (_, e2_ref) = child(&ctx, &[&e1_ref, &root_ref]);

        let mut finder = AncestorFinder::new(ctx);
        let mapping = finder.mapping(&e2_ref, &e2_ref).unwrap();
        assert_eq!(mapping.depths[&root_ref], 2);
        assert_eq!(mapping.depths[&e1_ref], 1);
    }

    #[test]
    fn missing_parent_propagates() {
        let store = MemoryStore::new();
        let ctx = ctx(&store);
        let (_, root_ref) = root(&ctx);
        let (mut e1, _) = child(&ctx, &[&root_ref]);
        let mut dangling = Entry::new(Some(Link::new("blake3:gone")), ctx.credentials).unwrap();

        assert!(find_common_ancestor(&ctx, &mut e1, &mut dangling).is_err());
    }

    // -----------------------------------------------------------------------
    // Selection
    // -----------------------------------------------------------------------

    #[test]
    fn ties_pick_lowest_reference() {
        let mapping = LcaMapping {
            children_a: mapping_from(&[("x", "e"), ("y", "e")]),
            children_b: mapping_from(&[("x", "s"), ("y", "s")]),
            depths: [("e", 0), ("s", 0), ("x", 1), ("y", 1)]
                .into_iter()
                .map(|(r, d)| (r.to_string(), d))
                .collect(),
        };
        assert_eq!(lowest_common(&mapping, "e", "s").as_deref(), Some("x"));
    }

    #[test]
    fn start_reached_by_other_walk_is_common() {
        let mapping = LcaMapping {
            children_a: mapping_from(&[("s", "e")]),
            children_b: RefTree::new(),
            depths: [("e", 0), ("s", 1)]
                .into_iter()
                .map(|(r, d)| (r.to_string(), d))
                .collect(),
        };
        let commons = common_references(&mapping, "e", "s");
        assert_eq!(commons.keys().collect::<Vec<_>>(), vec!["s"]);
    }

    #[test]
    fn no_commons_means_no_ancestor() {
        let mapping = LcaMapping::default();
        assert!(lowest_common(&mapping, "e", "s").is_none());
    }

    #[test]
    fn criss_cross_has_two_minimal_commons() {
        // root -> {1, 2}, {1, 2} -> 3, {2, 1} -> 4, 3 -> 5, 4 -> 6
        let store = MemoryStore::new();
        let ctx = ctx(&store);
        let (_, root_ref) = root(&ctx);
        let (_, e1_ref) = child(&ctx, &[&root_ref]);
        let (_, e2_ref) = child(&ctx, &[&root_ref]);
        let (_, e3_ref) = child(&ctx, &[&e1_ref, &e2_ref]);
        let (_, e4_ref) = child(&ctx, &[&e2_ref, &e1_ref]);
        let (_, e5_ref) = child(&ctx, &[&e3_ref]);
        let (_, e6_ref) = child(&ctx, &[&e4_ref]);

        let mut finder = AncestorFinder::new(ctx);
        let mapping = finder.mapping(&e5_ref, &e6_ref).unwrap();
        let minimal = minimal_common(&mapping, &e5_ref, &e6_ref);
        let expected: BTreeSet<String> = [e1_ref.clone(), e2_ref.clone()].into_iter().collect();
        assert_eq!(minimal, expected);

        let reversed = finder.mapping(&e6_ref, &e5_ref).unwrap();
        assert_eq!(minimal_common(&reversed, &e6_ref, &e5_ref), expected);

        let below_e1: BTreeSet<String> = [e1_ref.clone(), root_ref.clone()].into_iter().collect();
        assert_eq!(finder.ancestry(&e1_ref).unwrap(), below_e1);
    }

    #[test]
    fn single_lca_is_the_only_minimal_common() {
        let mapping = LcaMapping {
            children_a: mapping_from(&[("x", "e"), ("root", "x")]),
            children_b: mapping_from(&[("x", "s"), ("root", "x")]),
            depths: [("e", 0), ("s", 0), ("x", 1), ("root", 2)]
                .into_iter()
                .map(|(r, d)| (r.to_string(), d))
                .collect(),
        };
        let minimal = minimal_common(&mapping, "e", "s");
        assert_eq!(minimal.into_iter().collect::<Vec<_>>(), vec!["x".to_string()]);
    }
}
