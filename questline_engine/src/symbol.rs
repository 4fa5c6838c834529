//! Quest-scoped symbols.
//!
//! Quest sources wrap symbols in underscores (`_merchant_`); in memory they
//! are stored normalized so `_merchant_`, `merchant` and `Merchant` all
//! reference the same resource within a quest. Symbols are never globally
//! unique -- they are only meaningful relative to their owning quest.

use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Identifier referencing a resource or task within one quest's scope.
///
/// Equality and hashing use the normalized form: surrounding underscores
/// stripped, ASCII-lowercased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    pub fn new(raw: &str) -> Self {
        Self(raw.trim().trim_matches('_').to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Symbol {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}
