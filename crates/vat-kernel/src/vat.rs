use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VatId(String);

impl VatId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Ids handed out by the keeper's counter: `v1`, `v2`, ...
    pub fn numbered(n: u64) -> Self {
        Self(format!("v{n}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VatId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Dynamic vats are created at runtime on request of the admin vat; static
/// vats are part of the kernel's configuration and restored at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VatKind {
    Dynamic,
    Static,
}

impl VatKind {
    pub fn is_dynamic(self) -> bool {
        matches!(self, VatKind::Dynamic)
    }
}

impl fmt::Display for VatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            VatKind::Dynamic => "dynamic",
            VatKind::Static => "static",
        })
    }
}
