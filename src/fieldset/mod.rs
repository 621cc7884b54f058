//! Trie-shaped sets of field paths.
//!
//! A [`FieldSet`] records which paths of a document a manager owns. It is
//! a prefix trie whose edges are [`PathElement`]s: `members` marks paths
//! that end at this level, `children` holds the sub-tries of longer paths.
//! A path and a proper extension of it may both be marked; the typed layer
//! decides when that is meaningful (atomic nodes).

mod managed;
mod wire;

pub use managed::{ApiVersion, ManagedFields, ManagerSet};

use crate::path::{Path, PathElement};
use std::collections::BTreeMap;

/// An immutable-by-convention set of paths, organized as a prefix trie.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSet {
    /// Path elements that terminate a marked path at this level. Sorted.
    members: Vec<PathElement>,
    /// Sub-tries for marked paths that continue past this level.
    children: BTreeMap<PathElement, FieldSet>,
}

impl FieldSet {
    pub fn new() -> Self {
        FieldSet::default()
    }

    /// Builds a set from a list of paths.
    pub fn from_paths(paths: impl IntoIterator<Item = Path>) -> Self {
        let mut set = FieldSet::new();
        for p in paths {
            set.insert(&p);
        }
        set
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty() && self.children.is_empty()
    }

    /// Number of marked paths in the whole trie.
    pub fn size(&self) -> usize {
        self.members.len() + self.children.values().map(FieldSet::size).sum::<usize>()
    }

    /// True if `path` is marked. The empty path is never a member.
    pub fn has(&self, path: &Path) -> bool {
        self.has_slice(path.as_slice())
    }

    fn has_slice(&self, elements: &[PathElement]) -> bool {
        match elements {
            [] => false,
            [last] => self.members.binary_search(last).is_ok(),
            [first, rest @ ..] => self
                .children
                .get(first)
                .map_or(false, |child| child.has_slice(rest)),
        }
    }

    /// Marks `path`. Inserting the empty path is a no-op.
    pub fn insert(&mut self, path: &Path) {
        self.insert_slice(path.as_slice());
    }

    fn insert_slice(&mut self, elements: &[PathElement]) {
        match elements {
            [] => {}
            [last] => self.add_member(last.clone()),
            [first, rest @ ..] => self
                .children
                .entry(first.clone())
                .or_default()
                .insert_slice(rest),
        }
    }

    /// Marks `element` as terminating a path at this level.
    pub fn add_member(&mut self, element: PathElement) {
        if let Err(pos) = self.members.binary_search(&element) {
            self.members.insert(pos, element);
        }
    }

    pub fn has_member(&self, element: &PathElement) -> bool {
        self.members.binary_search(element).is_ok()
    }

    pub fn members(&self) -> impl Iterator<Item = &PathElement> {
        self.members.iter()
    }

    pub fn children(&self) -> impl Iterator<Item = (&PathElement, &FieldSet)> {
        self.children.iter()
    }

    pub fn child(&self, element: &PathElement) -> Option<&FieldSet> {
        self.children.get(element)
    }

    /// Grafts a sub-trie beneath `element`, merging with any existing one.
    pub fn insert_child(&mut self, element: PathElement, child: FieldSet) {
        if child.is_empty() {
            return;
        }
        match self.children.get_mut(&element) {
            Some(existing) => existing.union_in_place(&child),
            None => {
                self.children.insert(element, child);
            }
        }
    }

    /// The sub-trie of paths that continue through `element`, with
    /// `element` itself stripped. Membership of `element` is not part of
    /// the result; check [`FieldSet::has`] for that.
    pub fn with_prefix(&self, element: &PathElement) -> FieldSet {
        self.children.get(element).cloned().unwrap_or_default()
    }

    pub fn union(&self, other: &FieldSet) -> FieldSet {
        let mut out = self.clone();
        out.union_in_place(other);
        out
    }

    fn union_in_place(&mut self, other: &FieldSet) {
        for pe in &other.members {
            self.add_member(pe.clone());
        }
        for (pe, other_child) in &other.children {
            match self.children.get_mut(pe) {
                Some(child) => child.union_in_place(other_child),
                None => {
                    self.children.insert(pe.clone(), other_child.clone());
                }
            }
        }
    }

    pub fn intersection(&self, other: &FieldSet) -> FieldSet {
        let members = self
            .members
            .iter()
            .filter(|pe| other.has_member(pe))
            .cloned()
            .collect();

        let mut children = BTreeMap::new();
        for (pe, child) in &self.children {
            if let Some(other_child) = other.children.get(pe) {
                let shared = child.intersection(other_child);
                if !shared.is_empty() {
                    children.insert(pe.clone(), shared);
                }
            }
        }

        FieldSet { members, children }
    }

    /// Paths in `self` that are not in `other`. Prefix relationships do
    /// not count: a path survives even when `other` marks a prefix of it.
    pub fn difference(&self, other: &FieldSet) -> FieldSet {
        let members = self
            .members
            .iter()
            .filter(|pe| !other.has_member(pe))
            .cloned()
            .collect();

        let mut children = BTreeMap::new();
        for (pe, child) in &self.children {
            match other.children.get(pe) {
                Some(other_child) => {
                    let rest = child.difference(other_child);
                    if !rest.is_empty() {
                        children.insert(pe.clone(), rest);
                    }
                }
                None => {
                    children.insert(pe.clone(), child.clone());
                }
            }
        }

        FieldSet { members, children }
    }

    /// Paths in `self` that are neither in `other` nor descend from a
    /// path in `other`. This is the difference to use when `other` may
    /// mark compound nodes whose ownership covers everything beneath them.
    pub fn recursive_difference(&self, other: &FieldSet) -> FieldSet {
        let members = self
            .members
            .iter()
            .filter(|pe| !other.has_member(pe))
            .cloned()
            .collect();

        let mut children = BTreeMap::new();
        for (pe, child) in &self.children {
            if other.has_member(pe) {
                continue;
            }
            match other.children.get(pe) {
                Some(other_child) => {
                    let rest = child.recursive_difference(other_child);
                    if !rest.is_empty() {
                        children.insert(pe.clone(), rest);
                    }
                }
                None => {
                    children.insert(pe.clone(), child.clone());
                }
            }
        }

        FieldSet { members, children }
    }

    /// The subset of marked paths that have no marked proper extension.
    pub fn leaves(&self) -> FieldSet {
        let members = self
            .members
            .iter()
            .filter(|pe| !self.children.contains_key(*pe))
            .cloned()
            .collect();

        let mut children = BTreeMap::new();
        for (pe, child) in &self.children {
            let sub = child.leaves();
            if !sub.is_empty() {
                children.insert(pe.clone(), sub);
            }
        }

        FieldSet { members, children }
    }

    /// Copies the set, ensuring that beneath every key-addressed element
    /// (member or child edge) the key's own field names are marked. Used
    /// by extraction so a selected list record keeps its identity.
    pub fn with_key_fields(&self) -> FieldSet {
        let mut out = self.clone();
        out.with_key_fields_in_place();
        out
    }

    fn with_key_fields_in_place(&mut self) {
        let keyed: Vec<PathElement> = self
            .members
            .iter()
            .filter(|pe| matches!(pe, PathElement::Key(_)))
            .cloned()
            .collect();
        for pe in keyed {
            self.children.entry(pe).or_default();
        }

        for (pe, child) in self.children.iter_mut() {
            if let PathElement::Key(kf) = pe {
                for name in kf.names() {
                    child.add_member(PathElement::field(name));
                }
            }
            child.with_key_fields_in_place();
        }
    }

    /// Visits every marked path in canonical order.
    pub fn iterate<F>(&self, mut f: F)
    where
        F: FnMut(&Path),
    {
        let mut prefix = Path::new();
        self.iterate_from(&mut prefix, &mut f);
    }

    fn iterate_from<F>(&self, prefix: &mut Path, f: &mut F)
    where
        F: FnMut(&Path),
    {
        // Walk members and children together so paths come out in
        // canonical element order; a member sorts before its extensions.
        let children: Vec<(&PathElement, &FieldSet)> = self.children.iter().collect();
        let mut i = 0;
        let mut j = 0;

        while i < self.members.len() || j < children.len() {
            let take_member = match (self.members.get(i), children.get(j)) {
                (Some(m), Some((c, _))) => m <= *c,
                (Some(_), None) => true,
                _ => false,
            };

            if take_member {
                prefix.push(self.members[i].clone());
                f(prefix);
                prefix.pop();
                i += 1;
            } else {
                let (pe, child) = children[j];
                prefix.push(pe.clone());
                child.iterate_from(prefix, f);
                prefix.pop();
                j += 1;
            }
        }
    }

    /// All marked paths in canonical order.
    pub fn paths(&self) -> Vec<Path> {
        let mut out = Vec::with_capacity(self.size());
        self.iterate(|p| out.push(p.clone()));
        out
    }
}
