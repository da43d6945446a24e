//! Sets of field paths, stored as a tree.

use super::path::{Path, PathElement};
use std::collections::BTreeMap;

/// Set is a tree of field paths: `members` are leaves at this level,
/// `children` continue deeper. A path can be both a member and have
/// children (an owned map with owned sub-fields).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Set {
    members: Vec<PathElement>,
    children: BTreeMap<PathElement, Set>,
}

impl Set {
    pub fn new() -> Self {
        Set::default()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty() && self.children.is_empty()
    }

    pub fn members(&self) -> &[PathElement] {
        &self.members
    }

    pub fn children(&self) -> &BTreeMap<PathElement, Set> {
        &self.children
    }

    fn contains_member(&self, element: &PathElement) -> bool {
        self.members.binary_search(element).is_ok()
    }

    fn insert_member(&mut self, element: PathElement) {
        if let Err(pos) = self.members.binary_search(&element) {
            self.members.insert(pos, element);
        }
    }

    /// Inserts a leaf path.
    pub fn insert(&mut self, path: &Path) {
        self.insert_elements(path.as_slice());
    }

    fn insert_elements(&mut self, elements: &[PathElement]) {
        match elements {
            [] => {}
            [last] => self.insert_member(last.clone()),
            [first, rest @ ..] => self
                .children
                .entry(first.clone())
                .or_default()
                .insert_elements(rest),
        }
    }

    /// True if the exact leaf path is in the set.
    pub fn has(&self, path: &Path) -> bool {
        self.has_elements(path.as_slice())
    }

    fn has_elements(&self, elements: &[PathElement]) -> bool {
        match elements {
            [] => false,
            [last] => self.contains_member(last),
            [first, rest @ ..] => self
                .children
                .get(first)
                .map(|c| c.has_elements(rest))
                .unwrap_or(false),
        }
    }

    pub fn union(&self, other: &Set) -> Set {
        let mut result = self.clone();
        result.union_into(other);
        result
    }

    fn union_into(&mut self, other: &Set) {
        for m in &other.members {
            self.insert_member(m.clone());
        }
        for (key, other_child) in &other.children {
            match self.children.get_mut(key) {
                Some(child) => child.union_into(other_child),
                None => {
                    self.children.insert(key.clone(), other_child.clone());
                }
            }
        }
    }

    pub fn intersection(&self, other: &Set) -> Set {
        let members = self
            .members
            .iter()
            .filter(|m| other.contains_member(m))
            .cloned()
            .collect();

        let mut children = BTreeMap::new();
        for (key, child) in &self.children {
            if let Some(other_child) = other.children.get(key) {
                let c = child.intersection(other_child);
                if !c.is_empty() {
                    children.insert(key.clone(), c);
                }
            }
        }
        Set { members, children }
    }

    /// self minus other.
    pub fn difference(&self, other: &Set) -> Set {
        let members = self
            .members
            .iter()
            .filter(|m| !other.contains_member(m))
            .cloned()
            .collect();

        let mut children = BTreeMap::new();
        for (key, child) in &self.children {
            match other.children.get(key) {
                Some(other_child) => {
                    let c = child.difference(other_child);
                    if !c.is_empty() {
                        children.insert(key.clone(), c);
                    }
                }
                None => {
                    children.insert(key.clone(), child.clone());
                }
            }
        }
        Set { members, children }
    }

    /// Visits every leaf path, in sorted order.
    pub fn iterate<F>(&self, mut f: F)
    where
        F: FnMut(&Path),
    {
        self.iterate_inner(&mut Path::new(), &mut f);
    }

    fn iterate_inner<F>(&self, prefix: &mut Path, f: &mut F)
    where
        F: FnMut(&Path),
    {
        for m in &self.members {
            prefix.push(m.clone());
            f(prefix);
            prefix.pop();
        }
        for (key, child) in &self.children {
            prefix.push(key.clone());
            child.iterate_inner(prefix, f);
            prefix.pop();
        }
    }

    /// All leaf paths, collected.
    pub fn leaves(&self) -> Vec<Path> {
        let mut out = Vec::new();
        self.iterate(|p| out.push(p.clone()));
        out
    }
}
