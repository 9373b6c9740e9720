//! otlog-core: an encrypted, branchable operation log.
//!
//! Every change to a record set is an [`Entry`] carrying an encrypted,
//! signed [`EntryDiff`]. Entries are stored in a content-addressed
//! [`Storage`] and name their parents by reference, forming a Merkle DAG.
//! Each entry may point at a [`Snapshot`] of the full record set at that
//! point. Divergent heads are reconciled with [`dag::merge::merge`].
//!
//! # Conventions
//!
//! - **Errors**: library operations return [`error::Result`]; config
//!   loading returns `anyhow::Result`.
//! - **Logging**: `tracing` macros only; the binary owns the subscriber.

pub mod chain;
pub mod config;
pub mod context;
pub mod credentials;
pub mod crypto;
pub mod dag;
pub mod entry;
pub mod error;
pub mod model;
pub mod snapshot;
pub mod store;

#[cfg(test)]
mod test_support;

pub use context::Context;
pub use credentials::{Credentials, Identity, StaticCredentials};
pub use entry::Entry;
pub use error::{ErrorCode, LogError, Result};
pub use model::{EntryDiff, Link, Operation, Record, Records};
pub use snapshot::Snapshot;
pub use store::{FileStore, MemoryStore, Storage};
