//! Canonical item names.

use serde::{Deserialize, Serialize};

/// Normalized item name used to group rows representing the same logical need.
///
/// "Paper Cups", " paper cups " and "PAPER CUPS" all canonicalize to the same
/// value. Grouping by canonical name — never by walking parent chains — is
/// the authoritative basis for conservation checks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalName(String);

impl CanonicalName {
    /// Canonicalize an authored name: trim, then case-fold.
    pub fn new(raw: &str) -> Self {
        Self(raw.trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the authored name contained no usable characters.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl core::fmt::Display for CanonicalName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CanonicalName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}
