//! Comparison result between two typed documents.

use crate::fieldpath::Set;
use std::fmt;

/// Comparison holds the outcome of comparing two TypedValues. No path
/// appears in more than one of the three sets; all empty means the
/// documents were equal.
#[derive(Debug, Clone, Default)]
pub struct Comparison {
    /// Present on the left-hand side only.
    pub removed: Set,
    /// Present on both sides with different values.
    pub modified: Set,
    /// Present on the right-hand side only.
    pub added: Set,
}

impl Comparison {
    pub fn new() -> Self {
        Comparison::default()
    }

    pub fn is_same(&self) -> bool {
        self.removed.is_empty() && self.modified.is_empty() && self.added.is_empty()
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (label, set) in [
            ("added", &self.added),
            ("modified", &self.modified),
            ("removed", &self.removed),
        ] {
            if !set.is_empty() {
                write!(f, "{}:", label)?;
                set.iterate(|path| {
                    let _ = write!(f, " {}", path);
                });
                writeln!(f)?;
            }
        }
        Ok(())
    }
}
