use serde::{Deserialize, Serialize};
use std::fmt;

/// A Merkle link: `{"/": "<content reference>"}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Link {
    /// Content reference returned by the store.
    #[serde(rename = "/")]
    pub target: String,
}

impl Link {
    #[must_use]
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.target
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.target)
    }
}

impl From<String> for Link {
    fn from(target: String) -> Self {
        Self { target }
    }
}

impl From<&str> for Link {
    fn from(target: &str) -> Self {
        Self::new(target)
    }
}
