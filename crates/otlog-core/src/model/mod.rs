//! Plain data carried through the log: operations, links and records.

pub mod link;
pub mod operation;
pub mod record;

pub use link::Link;
pub use operation::Operation;
pub use record::{Applied, EntryDiff, Record, Records};
