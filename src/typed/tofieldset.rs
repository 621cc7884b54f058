//! Enumeration of the ownable paths of a typed value.
//!
//! The resulting set is what an apply operation claims: scalar leaves,
//! whole atomic containers, empty containers (ownership of the branch
//! itself), associative-list records plus their contents, and scalar-set
//! members.

use super::errors::ValidationErrors;
use super::walk::{dispatch, list_item_element, resolve, Resolved, Scratch};
use crate::fieldset::FieldSet;
use crate::path::{Path, PathElement};
use crate::schema::{ElementRelationship, Schema, TypeRef};
use crate::value::Value;

pub(crate) fn to_field_set(
    schema: &Schema,
    tr: &TypeRef,
    value: &Value,
) -> Result<FieldSet, ValidationErrors> {
    let mut set = FieldSet::new();
    let mut errors = ValidationErrors::new();
    let mut path = Path::new();
    let mut scratch = Scratch::new();
    collect(schema, tr, value, &mut path, &mut set, &mut scratch, &mut errors);
    errors.into_result().map(|_| set)
}

/// Recursive worker, also used by the compare walker to enumerate the
/// ownable paths of a one-sided subtree rooted at `path`.
pub(crate) fn collect(
    schema: &Schema,
    tr: &TypeRef,
    value: &Value,
    path: &mut Path,
    set: &mut FieldSet,
    scratch: &mut Scratch,
    errors: &mut ValidationErrors,
) {
    let atom = match resolve(schema, tr, path) {
        Ok(atom) => atom,
        Err(e) => {
            errors.push(e);
            return;
        }
    };

    // A null is a leaf regardless of the declared type.
    if value.is_null() {
        mark(set, path);
        return;
    }

    let resolved = match dispatch(&atom, value, path) {
        Ok(r) => r,
        Err(e) => {
            errors.push(e);
            return;
        }
    };

    match resolved {
        Resolved::Scalar(_) => mark(set, path),
        Resolved::Map(map) => {
            if map.element_relationship == ElementRelationship::Atomic {
                mark(set, path);
                return;
            }
            let entries = match value.as_map() {
                Some(m) => m,
                None => {
                    errors.push(super::errors::ValidationError::internal(
                        path,
                        "map dispatch on non-map value",
                    ));
                    return;
                }
            };
            if entries.is_empty() {
                // No descendant will be marked; owning the branch itself
                // is the only way to record this node.
                mark(set, path);
                return;
            }
            for (key, entry) in entries.iter() {
                let entry_type = map.entry_type(key);
                path.push(PathElement::field(key.clone()));
                collect(schema, &entry_type, entry, path, set, scratch, errors);
                path.pop();
            }
        }
        Resolved::List(list) => {
            if list.element_relationship != ElementRelationship::Associative {
                mark(set, path);
                return;
            }
            let items = match value.as_list() {
                Some(l) => l,
                None => {
                    errors.push(super::errors::ValidationError::internal(
                        path,
                        "list dispatch on non-list value",
                    ));
                    return;
                }
            };
            if items.is_empty() {
                mark(set, path);
                return;
            }

            let mut elements = scratch.elements.take();
            for (i, item) in items.iter().enumerate() {
                match list_item_element(schema, list, i, item, path) {
                    Ok(pe) => elements.push(pe),
                    Err(e) => {
                        errors.push(e);
                        elements.push(PathElement::index(i as i64));
                    }
                }
            }

            if list.keys.is_empty() {
                // Scalar set: each member is a leaf; duplicates collapse.
                for pe in elements.drain(..) {
                    path.push(pe);
                    mark(set, path);
                    path.pop();
                }
            } else {
                for (item, pe) in items.iter().zip(elements.drain(..)) {
                    path.push(pe);
                    // The record itself is ownable, independent of its fields.
                    mark(set, path);
                    collect(schema, &list.element_type, item, path, set, scratch, errors);
                    path.pop();
                }
            }
            scratch.elements.put(elements);
        }
    }
}

fn mark(set: &mut FieldSet, path: &Path) {
    if !path.is_empty() {
        set.insert(path);
    }
}
