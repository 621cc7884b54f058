//! The per-manager ownership table.

use super::FieldSet;
use std::collections::BTreeMap;
use std::fmt;

/// Opaque version tag recorded when a manager last wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ApiVersion(String);

impl ApiVersion {
    pub fn new(version: impl Into<String>) -> Self {
        ApiVersion(version.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ApiVersion {
    fn from(s: &str) -> Self {
        ApiVersion(s.to_string())
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One manager's ownership record: the paths it owns, the version it
/// wrote them at, and whether the write was an apply (vs an update).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerSet {
    pub fields: FieldSet,
    pub version: ApiVersion,
    pub applied: bool,
}

impl ManagerSet {
    pub fn new(fields: FieldSet, version: ApiVersion, applied: bool) -> Self {
        ManagerSet {
            fields,
            version,
            applied,
        }
    }
}

/// The full ownership table: manager name to [`ManagerSet`].
///
/// Iteration order is the managers' name order, so diagnostics and
/// serialized forms are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManagedFields {
    entries: BTreeMap<String, ManagerSet>,
}

impl ManagedFields {
    pub fn new() -> Self {
        ManagedFields {
            entries: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, manager: &str) -> Option<&ManagerSet> {
        self.entries.get(manager)
    }

    pub fn get_mut(&mut self, manager: &str) -> Option<&mut ManagerSet> {
        self.entries.get_mut(manager)
    }

    pub fn insert(&mut self, manager: impl Into<String>, entry: ManagerSet) {
        self.entries.insert(manager.into(), entry);
    }

    pub fn remove(&mut self, manager: &str) -> Option<ManagerSet> {
        self.entries.remove(manager)
    }

    pub fn contains(&self, manager: &str) -> bool {
        self.entries.contains_key(manager)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ManagerSet)> {
        self.entries.iter()
    }

    pub fn managers(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    /// Drops entries whose field set has become empty.
    pub fn remove_empty(&mut self) {
        self.entries.retain(|_, entry| !entry.fields.is_empty());
    }

    /// The union of every manager's field set.
    pub fn owned_union(&self) -> FieldSet {
        let mut out = FieldSet::new();
        for entry in self.entries.values() {
            out = out.union(&entry.fields);
        }
        out
    }
}

impl fmt::Display for ManagedFields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (manager, entry) in &self.entries {
            writeln!(
                f,
                "{} ({}, {}):",
                manager,
                entry.version,
                if entry.applied { "applied" } else { "updated" }
            )?;
            entry.fields.iterate(|path| {
                let _ = writeln!(f, "- {}", path);
            });
        }
        Ok(())
    }
}
