use otlog_core::chain;
use otlog_core::dag::lca::find_common_ancestor;
use otlog_core::dag::merge::{MergeStrategy, merge};
use otlog_core::{Context, LogError, MemoryStore, Operation, Records};
use serde_json::json;

#[path = "support.rs"]
mod support;
use support::*;

fn seeded(ctx: &Context<'_>) -> String {
    let (_, root) = chain::init_root(ctx, Some(&Records::default())).expect("root");
    extend(ctx, &root, &[upsert(1, json!("shared"))])
}

#[test]
fn divergent_heads_merge_to_the_same_records_either_way() {
    let store = MemoryStore::new();
    let ctx = Context::new(&store, alice());
    let fork = seeded(&ctx);

    let a = extend(&ctx, &fork, &[upsert(2, json!("left")), upsert(1, json!("left edit"))]);
    let b = extend(&ctx, &fork, &[upsert(3, json!("right")), delete(2)]);

    let ab = merge(&ctx, &mut fetch(&ctx, &a), &mut fetch(&ctx, &b)).expect("merge a<-b");
    let ba = merge(&ctx, &mut fetch(&ctx, &b), &mut fetch(&ctx, &a)).expect("merge b<-a");

    assert_eq!(ab.strategy, MergeStrategy::Rebase { ancestor: fork.clone() });
    assert_eq!(ba.strategy, MergeStrategy::Rebase { ancestor: fork });
    assert_eq!(ab.records, ba.records);
    assert_eq!(ab.stats.applied, 4);

    let edited = ab.records.get(&id(1)).expect("record 1");
    assert_eq!(edited.value, json!("left edit"));
    assert!(ab.records.get(&id(3)).is_some());
}

#[test]
fn merge_entry_extends_history() {
    let store = MemoryStore::new();
    let ctx = Context::new(&store, alice());
    let fork = seeded(&ctx);
    let a = extend(&ctx, &fork, &[upsert(2, json!(2))]);
    let b = extend(&ctx, &fork, &[upsert(3, json!(3))]);

    let mut outcome = merge(&ctx, &mut fetch(&ctx, &a), &mut fetch(&ctx, &b)).expect("merge");
    assert_eq!(outcome.entry.operation, Operation::Merge);
    let merged = outcome.entry.persist(&ctx, None).expect("persist merge");

    assert_eq!(chain::materialize(&ctx, &merged).expect("materialize"), outcome.records);

    let refs: Vec<String> = chain::history(&ctx, &merged, None)
        .expect("history")
        .into_iter()
        .map(|(reference, _)| reference)
        .collect();
    assert_eq!(refs[0], merged);
    assert!(refs.contains(&a));
    assert!(refs.contains(&b));
    assert!(refs.contains(&fork));

    // Work on top of the merge keeps accumulating.
    let after = extend(&ctx, &merged, &[upsert(4, json!(4))]);
    assert_eq!(chain::materialize(&ctx, &after).expect("materialize").len(), 4);
}

#[test]
fn repeated_merges_converge() {
    let store = MemoryStore::new();
    let ctx = Context::new(&store, alice());
    let fork = seeded(&ctx);
    let a1 = extend(&ctx, &fork, &[upsert(2, json!("a1"))]);
    let b1 = extend(&ctx, &fork, &[upsert(3, json!("b1"))]);

    let mut first = merge(&ctx, &mut fetch(&ctx, &a1), &mut fetch(&ctx, &b1)).expect("merge");
    let m1 = first.entry.persist(&ctx, None).expect("persist");

    let a2 = extend(&ctx, &m1, &[upsert(2, json!("a2"))]);
    let b2 = extend(&ctx, &b1, &[delete(1)]);

    let mut lhs = fetch(&ctx, &a2);
    let mut rhs = fetch(&ctx, &b2);
    let ancestor = find_common_ancestor(&ctx, &mut lhs, &mut rhs).expect("lca");
    assert_eq!(ancestor.reference.as_deref(), Some(b1.as_str()));

    let left = merge(&ctx, &mut lhs, &mut rhs).expect("merge a2<-b2");
    let right = merge(&ctx, &mut fetch(&ctx, &b2), &mut fetch(&ctx, &a2)).expect("merge b2<-a2");
    assert_eq!(left.records, right.records);
    assert!(left.records.get(&id(1)).is_none());
    assert_eq!(left.records.get(&id(2)).expect("record 2").value, json!("a2"));
}

#[test]
fn merging_an_ancestor_fast_forwards() {
    let store = MemoryStore::new();
    let ctx = Context::new(&store, alice());
    let fork = seeded(&ctx);
    let head = extend(&ctx, &fork, &[upsert(2, json!(2)), upsert(3, json!(3))]);

    let outcome = merge(&ctx, &mut fetch(&ctx, &head), &mut fetch(&ctx, &fork)).expect("merge");
    assert_eq!(outcome.strategy, MergeStrategy::FastForward);
    assert_eq!(outcome.records, chain::materialize(&ctx, &head).expect("materialize"));
    assert_eq!(outcome.stats.applied, 0);
}

#[test]
fn unrelated_roots_keep_the_head_state() {
    let store = MemoryStore::new();
    let ctx = Context::new(&store, alice());
    let (_, left_root) = chain::init_root(&ctx, Some(&Records::default())).expect("root");
    let (_, right_root) = chain::init_root(&ctx, Some(&Records::default())).expect("root");
    let left = extend(&ctx, &left_root, &[upsert(1, json!("left"))]);
    let right = extend(&ctx, &right_root, &[upsert(1, json!("right")), upsert(2, json!("right"))]);

    let lr = merge(&ctx, &mut fetch(&ctx, &left), &mut fetch(&ctx, &right)).expect("merge");
    let rl = merge(&ctx, &mut fetch(&ctx, &right), &mut fetch(&ctx, &left)).expect("merge");

    assert!(lr.ancestor.reference.is_none());
    assert_eq!(lr.strategy, MergeStrategy::SiblingReplay);
    assert_eq!(rl.strategy, MergeStrategy::SiblingReplay);

    // The sibling's whole chain lands on the head, so the sides disagree.
    assert_eq!(lr.records.get(&id(1)).expect("record 1").value, json!("right"));
    assert_eq!(rl.records.get(&id(1)).expect("record 1").value, json!("left"));
    assert_eq!(lr.records.len(), 2);
    assert_eq!(rl.records.len(), 2);
}

#[test]
fn siblings_of_a_root_without_snapshot_merge_the_same_either_way() {
    let store = MemoryStore::new();
    let ctx = Context::new(&store, alice());
    let (_, root) = chain::init_root(&ctx, None).expect("root");

    let a = extend(&ctx, &root, &[upsert(1, json!("from-a"))]);
    let b = extend(&ctx, &root, &[upsert(1, json!("from-b"))]);
    let ab = merge(&ctx, &mut fetch(&ctx, &a), &mut fetch(&ctx, &b)).expect("merge a<-b");
    let ba = merge(&ctx, &mut fetch(&ctx, &b), &mut fetch(&ctx, &a)).expect("merge b<-a");
    assert_eq!(ab.strategy, MergeStrategy::Rebase { ancestor: root.clone() });
    assert_eq!(ab.records, ba.records);
    assert_eq!(ab.records.len(), 1);

    let a = extend(&ctx, &root, &[upsert(1, json!("a1")), upsert(2, json!("a2"))]);
    let b = extend(&ctx, &root, &[upsert(1, json!("b1")), delete(2)]);
    let ab = merge(&ctx, &mut fetch(&ctx, &a), &mut fetch(&ctx, &b)).expect("merge a<-b");
    let ba = merge(&ctx, &mut fetch(&ctx, &b), &mut fetch(&ctx, &a)).expect("merge b<-a");
    assert_eq!(ab.records, ba.records);
    assert_eq!(ab.stats.applied + ab.stats.skipped, 4);
}

#[test]
fn criss_cross_merge_keeps_every_record() {
    let store = MemoryStore::new();
    let ctx = Context::new(&store, alice());
    let (_, root) = chain::init_root(&ctx, Some(&Records::default())).expect("root");
    let a1 = extend(&ctx, &root, &[upsert(1, json!("a1"))]);
    let b1 = extend(&ctx, &root, &[upsert(2, json!("b1"))]);

    let mut first = merge(&ctx, &mut fetch(&ctx, &a1), &mut fetch(&ctx, &b1)).expect("merge");
    let m1 = first.entry.persist(&ctx, None).expect("persist");
    let mut second = merge(&ctx, &mut fetch(&ctx, &b1), &mut fetch(&ctx, &a1)).expect("merge");
    let m2 = second.entry.persist(&ctx, None).expect("persist");

    let a2 = extend(&ctx, &m1, &[upsert(3, json!("a2"))]);
    let b2 = extend(&ctx, &m2, &[upsert(4, json!("b2"))]);

    let ab = merge(&ctx, &mut fetch(&ctx, &a2), &mut fetch(&ctx, &b2)).expect("merge a2<-b2");
    let ba = merge(&ctx, &mut fetch(&ctx, &b2), &mut fetch(&ctx, &a2)).expect("merge b2<-a2");

    assert_eq!(ab.strategy, MergeStrategy::Rebase { ancestor: root });
    assert_eq!(ab.records, ba.records);
    let ids: Vec<_> = ab.records.iter().map(|record| record.id).collect();
    for n in 1..=4 {
        assert!(ids.contains(&id(n)), "record {n} missing after criss-cross merge");
    }
    assert_eq!(ab.records.len(), 4);
}

#[test]
fn root_head_takes_every_sibling_diff() {
    let store = MemoryStore::new();
    let ctx = Context::new(&store, alice());
    let (mut root_entry, root) = chain::init_root(&ctx, Some(&Records::default())).expect("root");
    let deep = extend(&ctx, &root, &[upsert(1, json!(1)), upsert(2, json!(2)), upsert(3, json!(3))]);

    let outcome = merge(&ctx, &mut root_entry, &mut fetch(&ctx, &deep)).expect("merge");
    assert_eq!(outcome.stats.applied, 3);
    assert_eq!(outcome.records, chain::materialize(&ctx, &deep).expect("materialize"));
}

#[test]
fn heads_from_two_signers_merge() {
    let store = MemoryStore::new();
    let alice_ctx = Context::new(&store, alice());
    let bob_ctx = Context::new(&store, bob());
    let fork = seeded(&alice_ctx);

    let a = extend(&alice_ctx, &fork, &[upsert(2, json!("alice"))]);
    let b = extend(&bob_ctx, &fork, &[upsert(3, json!("bob"))]);

    let outcome = merge(&alice_ctx, &mut fetch(&alice_ctx, &a), &mut fetch(&alice_ctx, &b))
        .expect("merge");
    assert_eq!(outcome.records.len(), 3);
    assert_eq!(outcome.entry.parents[1].as_str(), b);
}

#[test]
fn merge_requires_a_head_snapshot() {
    let store = MemoryStore::new();
    let ctx = Context::new(&store, alice());
    let fork = seeded(&ctx);
    let b = extend(&ctx, &fork, &[upsert(2, json!(2))]);

    let mut bare = fetch(&ctx, &fork);
    bare.snapshot = None;
    bare.id = uuid::Uuid::new_v4();
    let err = merge(&ctx, &mut bare, &mut fetch(&ctx, &b)).unwrap_err();
    assert!(matches!(err, LogError::NoSnapshot));
}
