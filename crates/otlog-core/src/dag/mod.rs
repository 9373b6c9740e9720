//! Entry DAG: ancestor search, divergent replay and merging.
//!
//! Entries point at their parents by content reference, so the log is a
//! Merkle DAG over the store. Two heads that share history can be merged
//! by finding their lowest common ancestor and replaying what each side
//! added since.
//!
//! # DAG Properties
//!
//! - **Content-addressed identity**: an entry's reference is the BLAKE3
//!   hash of its sealed bytes, parents included.
//! - **Roots** have no parents. Appended entries have one. Merge entries
//!   have two, the first being the side that initiated the merge.
//! - **Deterministic merges**: for heads that share any history, the
//!   replay order and the resulting records do not depend on which side
//!   merges into which. Disjoint histories are the exception.
//!
//! # Sub-modules
//!
//! - [`lca`]: Lowest common ancestor search and ancestry mapping.
//!   ([`find_common_ancestor`], [`AncestorFinder`])
//! - [`replay`]: Divergent sets and ordered diff replay.
//!   ([`divergent_sets`], [`replay`](replay::replay))
//! - [`merge`]: Strategy selection and merge entry construction.
//!   ([`merge`](merge::merge), [`MergeStrategy`])

pub mod lca;
pub mod merge;
pub mod replay;

pub use lca::{
    AncestorFinder, CommonAncestor, LcaMapping, MAX_DEPTH, find_common_ancestor, minimal_common,
};
pub use merge::{MergeOutcome, MergeStrategy};
pub use replay::{DivergentSets, ReplayStats, divergent_sets, replay_set};
