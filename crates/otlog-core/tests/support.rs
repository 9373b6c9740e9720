//! Fixtures shared by the integration tests.
#![allow(dead_code)]

use std::sync::OnceLock;

use otlog_core::chain;
use otlog_core::{Context, Entry, EntryDiff, Identity, Record, StaticCredentials};
use serde_json::Value;
use uuid::Uuid;

pub const PASSPHRASE: &str = "correct horse battery staple";

fn build(common_name: &str) -> StaticCredentials {
    let identity = Identity::generate(common_name).expect("generate identity");
    StaticCredentials::from_identity(PASSPHRASE, &identity).expect("credentials")
}

pub fn alice() -> &'static StaticCredentials {
    static CREDS: OnceLock<StaticCredentials> = OnceLock::new();
    CREDS.get_or_init(|| build("alice.otlog.test"))
}

pub fn bob() -> &'static StaticCredentials {
    static CREDS: OnceLock<StaticCredentials> = OnceLock::new();
    CREDS.get_or_init(|| build("bob.otlog.test"))
}

pub fn id(n: u128) -> Uuid {
    Uuid::from_u128(n)
}

pub fn upsert(n: u128, value: Value) -> EntryDiff {
    EntryDiff::upsert(Record::new(id(n), value))
}

pub fn delete(n: u128) -> EntryDiff {
    EntryDiff::delete(id(n))
}

/// Append each diff in turn, returning the new head.
pub fn extend(ctx: &Context<'_>, head: &str, diffs: &[EntryDiff]) -> String {
    let mut head = head.to_string();
    for diff in diffs {
        let (_, reference) = chain::append(ctx, &head, diff).expect("append");
        head = reference;
    }
    head
}

pub fn fetch(ctx: &Context<'_>, reference: &str) -> Entry {
    Entry::fetch(ctx, reference).expect("fetch")
}
