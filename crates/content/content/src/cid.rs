use std::fmt;

use serde::{Deserialize, Serialize};

/// A content identifier: the hash-derived address naming one immutable
/// object in the content-addressed store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cid(String);

impl Cid {
    pub fn new(cid: impl Into<String>) -> Self {
        Self(cid.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Cid {
    fn from(cid: &str) -> Self {
        Self::new(cid)
    }
}

impl From<String> for Cid {
    fn from(cid: String) -> Self {
        Self::new(cid)
    }
}
