//! Franchise records

use serde::{Deserialize, Serialize};

/// Name of the fallback franchise for tracks outside any franchise
pub const DEFAULT_FRANCHISE: &str = "_";

/// Namespace for text-sourced artist identities
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Franchise {
    pub id: i64,
    pub name: String,
}

impl Franchise {
    pub fn is_default(&self) -> bool {
        self.name == DEFAULT_FRANCHISE
    }
}
