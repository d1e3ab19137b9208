//! Cells of the primary build axis.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One cell of the primary build axis: an owning target name paired with a
/// variant label (usually the name of one of the owner's branches).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Combination {
    /// Name of the target that owns this combination.
    pub primary: String,
    /// Variant label, matched against the owner's branch names.
    pub variant: String,
}

impl Combination {
    pub fn new(primary: impl Into<String>, variant: impl Into<String>) -> Self {
        Self {
            primary: primary.into(),
            variant: variant.into(),
        }
    }

    /// Whether the named target owns this combination.
    pub fn is_owned_by(&self, target_name: &str) -> bool {
        self.primary == target_name
    }
}

impl fmt::Display for Combination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.primary, self.variant)
    }
}
