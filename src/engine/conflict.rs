//! Conflict reporting.

use crate::fieldset::FieldSet;
use crate::path::Path;
use std::collections::BTreeMap;
use std::fmt;

/// One disputed path: another manager owns it and the incoming write
/// changes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub manager: String,
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

/// All conflicts found by one operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conflicts {
    items: Vec<Conflict>,
}

impl Conflicts {
    pub fn new() -> Self {
        Conflicts { items: Vec::new() }
    }

    pub fn push(&mut self, conflict: Conflict) {
        self.items.push(conflict);
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Conflict> {
        self.items.iter()
    }

    /// All disputed paths as one set.
    pub fn to_set(&self) -> FieldSet {
        let mut set = FieldSet::new();
        for conflict in &self.items {
            set.insert(&conflict.path);
        }
        set
    }
}

impl IntoIterator for Conflicts {
    type Item = Conflict;
    type IntoIter = std::vec::IntoIter<Conflict>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl fmt::Display for Conflicts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Grouped by manager, managers and paths each in sorted order.
        let mut by_manager: BTreeMap<&str, Vec<String>> = BTreeMap::new();
        for conflict in &self.items {
            by_manager
                .entry(&conflict.manager)
                .or_default()
                .push(conflict.path.to_string());
        }

        for (i, (manager, mut paths)) in by_manager.into_iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            paths.sort();
            write!(f, "conflicts with {:?}:", manager)?;
            for path in paths {
                write!(f, "\n- {}", path)?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for Conflicts {}

/// Collapses a set of disputed paths to the shallowest path of each
/// overlap: a path is dropped when a proper prefix of it is also marked,
/// so one conflict stands in for everything beneath it.
pub(crate) fn shallowest(set: &FieldSet) -> FieldSet {
    let mut out = FieldSet::new();
    for pe in set.members() {
        out.add_member(pe.clone());
    }
    for (pe, child) in set.children() {
        if set.has_member(pe) {
            continue;
        }
        out.insert_child(pe.clone(), shallowest(child));
    }
    out
}
