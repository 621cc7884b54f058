//! The manager-set state machine.
//!
//! [`Engine`] combines the walkers with the per-manager ownership table
//! to implement the four write operations: apply, force-apply, update,
//! and extract-apply. The engine is purely functional on its inputs: it
//! never mutates caller-owned values, and concurrent use on distinct
//! documents needs no synchronization.

mod conflict;

pub use conflict::{Conflict, Conflicts};

use crate::fieldset::{ApiVersion, FieldSet, ManagedFields, ManagerSet};
use crate::typed::{reconcile_managed, Comparison, TypedValue, ValidationErrors};
use conflict::shallowest;
use std::fmt;
use thiserror::Error;
use tracing::{debug, trace};

/// Converts typed objects between API versions. Consumed by the engine
/// whenever set arithmetic crosses manager versions; converting the whole
/// object (and re-deriving paths from it) subsumes per-path rewriting.
pub trait VersionConverter {
    fn convert(&self, obj: &TypedValue, to: &ApiVersion) -> Result<TypedValue, ConversionError>;

    /// True when the error means the target version no longer exists (as
    /// opposed to a conversion failure).
    fn is_missing_version(&self, err: &ConversionError) -> bool;
}

/// Failure to convert an object between versions.
#[derive(Debug, Clone)]
pub struct ConversionError {
    pub message: String,
    pub missing_version: bool,
}

impl ConversionError {
    pub fn new(message: impl Into<String>) -> Self {
        ConversionError {
            message: message.into(),
            missing_version: false,
        }
    }

    pub fn missing_version(version: &ApiVersion) -> Self {
        ConversionError {
            message: format!("no such version: {}", version),
            missing_version: true,
        }
    }
}

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ConversionError {}

#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("{0}")]
    Conflicts(Conflicts),

    #[error("validation error: {0}")]
    Validation(ValidationErrors),

    #[error("conversion error: {0}")]
    Conversion(ConversionError),
}

#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("{0}")]
    Conflicts(Conflicts),

    #[error("validation error: {0}")]
    Validation(ValidationErrors),

    #[error("conversion error: {0}")]
    Conversion(ConversionError),
}

impl From<ApplyError> for UpdateError {
    fn from(e: ApplyError) -> Self {
        match e {
            ApplyError::Conflicts(c) => UpdateError::Conflicts(c),
            ApplyError::Validation(v) => UpdateError::Validation(v),
            ApplyError::Conversion(c) => UpdateError::Conversion(c),
        }
    }
}

/// Builder for [`Engine`].
#[derive(Default)]
pub struct EngineBuilder {
    converter: Option<Box<dyn VersionConverter>>,
}

impl EngineBuilder {
    pub fn new() -> Self {
        EngineBuilder::default()
    }

    pub fn converter(mut self, converter: Box<dyn VersionConverter>) -> Self {
        self.converter = Some(converter);
        self
    }

    pub fn build(self) -> Engine {
        Engine {
            converter: self.converter,
        }
    }
}

/// The merge-apply orchestrator.
pub struct Engine {
    converter: Option<Box<dyn VersionConverter>>,
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    pub fn new() -> Engine {
        EngineBuilder::new().build()
    }

    /// Apply: a declarative write. The manager claims exactly the paths
    /// present in `config`; paths it previously claimed and dropped are
    /// removed from the document (unless another manager still claims
    /// them or they shelter another manager's paths). Changing a path
    /// someone else owns is a conflict unless `force`, in which case
    /// ownership transfers to `manager`.
    pub fn apply(
        &self,
        live: &TypedValue,
        config: &TypedValue,
        managed: &mut ManagedFields,
        manager: &str,
        version: &ApiVersion,
        force: bool,
    ) -> Result<TypedValue, ApplyError> {
        debug!(manager, %version, force, "applying configuration");
        self.reconcile_schema_changes(live, managed)?;

        let new_fields = config.to_field_set().map_err(ApplyError::Validation)?;
        let merged = live.merge(config).map_err(ApplyError::Validation)?;
        let previous = managed.get(manager).cloned();

        let mut pruned = merged;
        if let Some(prev) = &previous {
            // A previous set recorded at a version that no longer exists
            // is uninterpretable; skip pruning rather than guess.
            if !prev.fields.is_empty() && self.version_known(live, prev)? {
                let dropped = prev.fields.difference(&new_fields);
                if !dropped.is_empty() {
                    let mut others = FieldSet::new();
                    for (name, entry) in managed.iter() {
                        if name != manager {
                            others = others.union(&entry.fields);
                        }
                    }
                    // Claimed paths survive the removal, as do the key
                    // fields of any record sheltering a claimed path:
                    // a record another manager reaches into must stay
                    // addressable.
                    let claimed = others.union(&new_fields).with_key_fields();
                    let removable =
                        without_prefixes_of(&dropped.difference(&claimed), &claimed);
                    trace!(paths = removable.size(), "pruning dropped fields");
                    pruned = pruned.remove_items(&removable);
                }
            }
        }

        managed.insert(
            manager,
            ManagerSet::new(new_fields, version.clone(), true),
        );

        match self.analyze(live, &pruned, managed, manager, version, force) {
            Ok(_) => Ok(pruned),
            Err(e) => {
                // Leave the table as it was before the failed write.
                match previous {
                    Some(prev) => managed.insert(manager, prev),
                    None => {
                        managed.remove(manager);
                    }
                }
                Err(e)
            }
        }
    }

    /// Update: an imperative write. The document becomes `new_obj`; the
    /// manager takes ownership of every path it added or changed and
    /// sheds paths it deleted. Updates never conflict.
    pub fn update(
        &self,
        live: &TypedValue,
        new_obj: &TypedValue,
        managed: &mut ManagedFields,
        manager: &str,
        version: &ApiVersion,
    ) -> Result<TypedValue, UpdateError> {
        debug!(manager, %version, "updating object");
        self.reconcile_schema_changes(live, managed)?;

        let compare = self.analyze(live, new_obj, managed, manager, version, true)?;

        let previous = managed
            .get(manager)
            .map(|e| e.fields.clone())
            .unwrap_or_default();
        let next = previous
            .union(&compare.added)
            .union(&compare.modified)
            .difference(&compare.removed);

        if next.is_empty() {
            managed.remove(manager);
        } else {
            managed.insert(manager, ManagerSet::new(next, version.clone(), false));
        }

        Ok(new_obj.clone())
    }

    /// Extract-apply: an apply whose effective config is `config` merged
    /// over the live subtree the manager already owns. A small patch can
    /// therefore be sent without abandoning previously applied fields;
    /// fields a third party deleted are not restored, because extraction
    /// of a deleted path yields nothing.
    pub fn extract_apply(
        &self,
        live: &TypedValue,
        config: &TypedValue,
        managed: &mut ManagedFields,
        manager: &str,
        version: &ApiVersion,
        force: bool,
    ) -> Result<TypedValue, ApplyError> {
        debug!(manager, %version, force, "extract-applying configuration");
        let previous = managed
            .get(manager)
            .map(|e| e.fields.clone())
            .unwrap_or_default();

        let effective = if previous.is_empty() {
            config.clone()
        } else {
            let harvested = live.extract_items(&previous);
            harvested.merge(config).map_err(ApplyError::Validation)?
        };

        self.apply(live, &effective, managed, manager, version, force)
    }

    /// Rewrites each manager's set against the current schema (atomic and
    /// granular flips), converting the live object to the manager's
    /// version when a converter is configured.
    fn reconcile_schema_changes(
        &self,
        live: &TypedValue,
        managed: &mut ManagedFields,
    ) -> Result<(), ApplyError> {
        let mut rewrites: Vec<(String, FieldSet)> = Vec::new();

        for (name, entry) in managed.iter() {
            let viewed = match self.view_at(live, &entry.version)? {
                Some(tv) => tv,
                // Obsolete versions are dropped later, during analysis.
                None => continue,
            };
            let reconciled =
                reconcile_managed(viewed.schema(), viewed.type_ref(), &entry.fields)
                    .map_err(ApplyError::Validation)?;
            if let Some(fields) = reconciled {
                debug!(manager = %name, "reconciled ownership with schema change");
                rewrites.push((name.clone(), fields));
            }
        }

        for (name, fields) in rewrites {
            if let Some(entry) = managed.get_mut(&name) {
                entry.fields = fields;
            }
        }
        Ok(())
    }

    /// Shared conflict and removal bookkeeping for apply and update:
    /// diffs live against the candidate result, reports or transfers
    /// conflicts, and sheds other managers' deleted paths.
    fn analyze(
        &self,
        live: &TypedValue,
        new_obj: &TypedValue,
        managed: &mut ManagedFields,
        actor: &str,
        version: &ApiVersion,
        force: bool,
    ) -> Result<Comparison, ApplyError> {
        let compare = live.compare(new_obj).map_err(ApplyError::Validation)?;

        let mut conflicts = Conflicts::new();
        let mut overlaps: Vec<(String, FieldSet)> = Vec::new();
        let mut removals: Vec<(String, FieldSet)> = Vec::new();
        let mut obsolete: Vec<String> = Vec::new();

        for (name, entry) in managed.iter() {
            if name == actor {
                continue;
            }

            // Diff in the manager's own version coordinates when needed.
            let cmp = if entry.version == *version || self.converter.is_none() {
                compare.clone()
            } else {
                let (lv, nv) = match (
                    self.view_at(live, &entry.version)?,
                    self.view_at(new_obj, &entry.version)?,
                ) {
                    (Some(lv), Some(nv)) => (lv, nv),
                    _ => {
                        obsolete.push(name.clone());
                        continue;
                    }
                };
                lv.compare(&nv).map_err(ApplyError::Validation)?
            };

            let overlap = entry.fields.intersection(&cmp.changed());
            if !overlap.is_empty() {
                for path in shallowest(&overlap).paths() {
                    conflicts.push(Conflict::new(name.clone(), path));
                }
                overlaps.push((name.clone(), overlap));
            }
            if !cmp.removed.is_empty() {
                removals.push((name.clone(), cmp.removed));
            }
        }

        if !conflicts.is_empty() {
            if !force {
                return Err(ApplyError::Conflicts(conflicts));
            }
            debug!(actor, count = conflicts.len(), "transferring conflicting fields");
        }

        for name in obsolete {
            debug!(manager = %name, "dropping manager with unconvertible version");
            managed.remove(&name);
        }
        for (name, overlap) in overlaps {
            if let Some(entry) = managed.get_mut(&name) {
                entry.fields = entry.fields.difference(&overlap);
            }
        }
        for (name, removed) in removals {
            if let Some(entry) = managed.get_mut(&name) {
                entry.fields = entry.fields.difference(&removed);
            }
        }
        managed.remove_empty();

        Ok(compare)
    }

    /// The object as seen at `version`: `Some` when no conversion is
    /// needed or it succeeds, `None` when the version no longer exists.
    fn view_at(
        &self,
        obj: &TypedValue,
        version: &ApiVersion,
    ) -> Result<Option<TypedValue>, ApplyError> {
        match &self.converter {
            None => Ok(Some(obj.clone())),
            Some(conv) => match conv.convert(obj, version) {
                Ok(v) => Ok(Some(v)),
                Err(e) if conv.is_missing_version(&e) => Ok(None),
                Err(e) => Err(ApplyError::Conversion(e)),
            },
        }
    }

    /// False when the entry's recorded version can no longer be realized,
    /// in which case the entry's paths are uninterpretable and pruning is
    /// skipped.
    fn version_known(&self, live: &TypedValue, entry: &ManagerSet) -> Result<bool, ApplyError> {
        Ok(self.view_at(live, &entry.version)?.is_some())
    }
}

impl Default for Engine {
    fn default() -> Self {
        Engine::new()
    }
}

/// Paths of `set` that are not proper prefixes of any path in `claimed`.
/// Keeps the apply-removal step from tearing out a subtree some manager
/// (or the new config itself) still has paths under.
fn without_prefixes_of(set: &FieldSet, claimed: &FieldSet) -> FieldSet {
    let mut out = FieldSet::new();
    for pe in set.members() {
        let shelters = claimed.child(pe).map_or(false, |c| !c.is_empty());
        if !shelters {
            out.add_member(pe.clone());
        }
    }
    for (pe, child) in set.children() {
        let sub = match claimed.child(pe) {
            Some(claimed_child) => without_prefixes_of(child, claimed_child),
            None => child.clone(),
        };
        out.insert_child(pe.clone(), sub);
    }
    out
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::{Path, PathElement};

    #[test]
    fn without_prefixes_protects_sheltering_roots() {
        let list = Path::from_elements(vec![PathElement::field("list")]);
        let item = Path::from_elements(vec![
            PathElement::field("list"),
            PathElement::field("x"),
        ]);

        let set = FieldSet::from_paths([list.clone()]);
        let claimed = FieldSet::from_paths([item]);
        assert!(without_prefixes_of(&set, &claimed).is_empty());

        let unrelated = FieldSet::from_paths([Path::from_elements(vec![PathElement::field(
            "other",
        )])]);
        assert_eq!(without_prefixes_of(&set, &unrelated), set);
    }
}
