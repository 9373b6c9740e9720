//! The closed set of operations an entry can carry.
//!
//! String forms are the short tags used in the persisted entry `o` field
//! and in the `op` field of an entry diff.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::LogError;

/// The change an entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Operation {
    /// Insert or replace a record.
    #[default]
    UpSert,
    /// Tombstone and remove a record.
    Delete,
    /// Join two chains; state lives in the snapshot.
    Merge,
    /// Root marker.
    Base,
}

impl Operation {
    /// All operations in declaration order.
    pub const ALL: [Self; 4] = [Self::UpSert, Self::Delete, Self::Merge, Self::Base];

    /// Return the persisted tag.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UpSert => "ups",
            Self::Delete => "del",
            Self::Merge => "merg",
            Self::Base => "base",
        }
    }

    /// Whether the entry payload is a replayable [`crate::model::EntryDiff`].
    #[must_use]
    pub const fn carries_diff(self) -> bool {
        matches!(self, Self::UpSert | Self::Delete)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = LogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ups" => Ok(Self::UpSert),
            "del" => Ok(Self::Delete),
            "merg" => Ok(Self::Merge),
            "base" => Ok(Self::Base),
            _ => Err(LogError::InvalidOperation(format!(
                "unknown operation '{s}', expected one of ups, del, merg, base"
            ))),
        }
    }
}

impl Serialize for Operation {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Operation {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_str(&s).map_err(serde::de::Error::custom)
    }
}
