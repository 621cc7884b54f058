//! Reconciling ownership records with schema changes.
//!
//! When a node's type flips from granular to atomic between writes, a
//! manager may own paths beneath a node that no longer has visible
//! sub-paths. Those descendants collapse onto the node itself. The other
//! direction is lossy by nature: a manager that owned an atomic node owns
//! only the node path afterwards, because per-field ownership cannot be
//! reconstructed.

use super::errors::ValidationErrors;
use crate::fieldset::FieldSet;
use crate::path::PathElement;
use crate::schema::{Atom, ElementRelationship, Schema, TypeRef};

/// Rewrites `set` to match the current schema. Returns `None` when the
/// set is already consistent.
pub(crate) fn reconcile_managed(
    schema: &Schema,
    tr: &TypeRef,
    set: &FieldSet,
) -> Result<Option<FieldSet>, ValidationErrors> {
    let mut changed = false;
    let out = reconcile_node(schema, tr, set, &mut changed);
    Ok(if changed { Some(out) } else { None })
}

fn reconcile_node(
    schema: &Schema,
    tr: &TypeRef,
    node: &FieldSet,
    changed: &mut bool,
) -> FieldSet {
    let atom = match schema.resolve(tr) {
        Some(atom) => atom,
        None => return node.clone(),
    };

    let mut out = FieldSet::new();
    for pe in node.members() {
        out.add_member(pe.clone());
    }

    for (pe, child) in node.children() {
        match child_type(&atom, pe) {
            Some(child_tr) if is_atomic(schema, &child_tr) => {
                // Sub-paths of an atomic node are no longer addressable;
                // ownership contracts to the node itself.
                out.add_member(pe.clone());
                *changed = true;
            }
            Some(child_tr) => {
                out.insert_child(pe.clone(), reconcile_node(schema, &child_tr, child, changed));
            }
            None => out.insert_child(pe.clone(), child.clone()),
        }
    }

    out
}

fn child_type(atom: &Atom, pe: &PathElement) -> Option<TypeRef> {
    if let Some(map) = &atom.map {
        if map.element_relationship != ElementRelationship::Atomic {
            if let PathElement::Field(name) = pe {
                return Some(map.entry_type(name));
            }
        }
    }
    if let Some(list) = &atom.list {
        if list.element_relationship == ElementRelationship::Associative {
            if matches!(pe, PathElement::Key(_) | PathElement::Value(_)) {
                return Some(list.element_type.clone());
            }
        }
    }
    None
}

fn is_atomic(schema: &Schema, tr: &TypeRef) -> bool {
    let atom = match schema.resolve(tr) {
        Some(atom) => atom,
        None => return false,
    };
    atom.map
        .as_ref()
        .map_or(false, |m| m.element_relationship == ElementRelationship::Atomic)
        || atom
            .list
            .as_ref()
            .map_or(false, |l| l.element_relationship == ElementRelationship::Atomic)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::Path;

    fn schema(atomic_struct: bool) -> Schema {
        let relationship = if atomic_struct {
            "\n    elementRelationship: atomic"
        } else {
            ""
        };
        serde_yaml::from_str(&format!(
            r#"types:
- name: root
  map:
    fields:
    - name: struct
      type:
        namedType: struct
    - name: name
      type:
        scalar: string
- name: struct
  map:
    elementType:
      scalar: untyped{}
"#,
            relationship
        ))
        .unwrap()
    }

    fn field_path(parts: &[&str]) -> Path {
        parts.iter().map(|s| PathElement::field(*s)).collect()
    }

    #[test]
    fn unchanged_schema_reports_no_work() {
        let set = FieldSet::from_paths([field_path(&["struct", "numeric"]), field_path(&["name"])]);
        let result = reconcile_managed(&schema(false), &TypeRef::named("root"), &set).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn granular_to_atomic_collapses_descendants() {
        let set = FieldSet::from_paths([
            field_path(&["struct", "numeric"]),
            field_path(&["struct", "string"]),
            field_path(&["name"]),
        ]);

        let reconciled = reconcile_managed(&schema(true), &TypeRef::named("root"), &set)
            .unwrap()
            .expect("collapse expected");

        assert_eq!(
            reconciled,
            FieldSet::from_paths([field_path(&["struct"]), field_path(&["name"])])
        );
    }

    #[test]
    fn atomic_ownership_stays_node_level_after_granular_change() {
        // The lossy direction: node-level ownership is all that survives.
        let set = FieldSet::from_paths([field_path(&["struct"]), field_path(&["name"])]);
        let result = reconcile_managed(&schema(false), &TypeRef::named("root"), &set).unwrap();
        assert!(result.is_none());
    }
}
