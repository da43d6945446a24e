//! Conflict types for apply operations.

use crate::fieldpath::{Path, Set};
use std::fmt;

/// A single field owned by another manager that an apply tried to
/// change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    /// The manager that owns the conflicting field.
    pub manager: String,
    /// The path to the conflicting field.
    pub path: Path,
}

impl Conflict {
    pub fn new(manager: impl Into<String>, path: Path) -> Self {
        Conflict {
            manager: manager.into(),
            path,
        }
    }
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conflict with {:?} at {}", self.manager, self.path)
    }
}

impl std::error::Error for Conflict {}

/// The full set of conflicts from one apply attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conflicts {
    conflicts: Vec<Conflict>,
}

impl Conflicts {
    pub fn new() -> Self {
        Conflicts::default()
    }

    pub fn add(&mut self, conflict: Conflict) {
        self.conflicts.push(conflict);
    }

    pub fn is_empty(&self) -> bool {
        self.conflicts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.conflicts.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Conflict> {
        self.conflicts.iter()
    }

    /// All conflicting paths as one set, regardless of owner.
    pub fn to_set(&self) -> Set {
        let mut set = Set::new();
        for conflict in &self.conflicts {
            set.insert(&conflict.path);
        }
        set
    }
}

impl IntoIterator for Conflicts {
    type Item = Conflict;
    type IntoIter = std::vec::IntoIter<Conflict>;

    fn into_iter(self) -> Self::IntoIter {
        self.conflicts.into_iter()
    }
}

impl fmt::Display for Conflicts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, conflict) in self.conflicts.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", conflict)?;
        }
        Ok(())
    }
}

impl std::error::Error for Conflicts {}
