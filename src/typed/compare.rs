//! Three-way structural diff of two typed values.

use super::errors::ValidationErrors;
use super::tofieldset::collect;
use super::walk::{dispatch, index_items, resolve, Resolved, Scratch};
use crate::fieldset::FieldSet;
use crate::path::{Path, PathElement};
use crate::schema::{ElementRelationship, List, Map, Schema, TypeRef};
use crate::value::Value;
use std::fmt;

/// The outcome of comparing two values of the same type.
///
/// `added`, `removed`, and `modified` partition the changed paths (no
/// path appears in more than one); when all three are empty the values
/// were equal. `merged` is the full ownable-path set of both sides
/// together.
#[derive(Debug, Clone, Default)]
pub struct Comparison {
    /// Paths present only on the right-hand side.
    pub added: FieldSet,
    /// Paths present only on the left-hand side.
    pub removed: FieldSet,
    /// Paths present on both sides with different values.
    pub modified: FieldSet,
    /// Every ownable path of either side.
    pub merged: FieldSet,
}

impl Comparison {
    pub fn new() -> Self {
        Comparison::default()
    }

    /// True when the compared values were structurally equal.
    pub fn is_same(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }

    /// Paths the right-hand side touched: added or modified.
    pub fn changed(&self) -> FieldSet {
        self.modified.union(&self.added)
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn section(f: &mut fmt::Formatter<'_>, title: &str, set: &FieldSet) -> fmt::Result {
            if set.is_empty() {
                return Ok(());
            }
            writeln!(f, "- {} Fields:", title)?;
            let mut result = Ok(());
            set.iterate(|path| {
                if result.is_ok() {
                    result = writeln!(f, "  {}", path);
                }
            });
            result
        }
        section(f, "Modified", &self.modified)?;
        section(f, "Added", &self.added)?;
        section(f, "Removed", &self.removed)
    }
}

pub(crate) fn compare(
    schema: &Schema,
    tr: &TypeRef,
    lhs: &Value,
    rhs: &Value,
) -> Result<Comparison, ValidationErrors> {
    let mut cmp = Comparison::new();
    let mut errors = ValidationErrors::new();
    let mut path = Path::new();
    let mut scratch = Scratch::new();

    diff(schema, tr, lhs, rhs, &mut path, &mut cmp, &mut scratch, &mut errors);

    // The merged set is the union of both sides' ownable paths.
    collect(schema, tr, lhs, &mut path, &mut cmp.merged, &mut scratch, &mut errors);
    collect(schema, tr, rhs, &mut path, &mut cmp.merged, &mut scratch, &mut errors);

    errors.into_result().map(|_| cmp)
}

#[allow(clippy::too_many_arguments)]
fn diff(
    schema: &Schema,
    tr: &TypeRef,
    lhs: &Value,
    rhs: &Value,
    path: &mut Path,
    cmp: &mut Comparison,
    scratch: &mut Scratch,
    errors: &mut ValidationErrors,
) {
    if lhs == rhs {
        return;
    }

    let atom = match resolve(schema, tr, path) {
        Ok(atom) => atom,
        Err(e) => {
            errors.push(e);
            return;
        }
    };

    // One side absent: a container descends against an empty twin, so
    // ownership changes surface at the member level; a leaf is modified.
    let present = if lhs.is_null() { rhs } else { lhs };
    if lhs.is_null() || rhs.is_null() {
        match dispatch(&atom, present, path) {
            Ok(Resolved::Map(m)) if m.element_relationship != ElementRelationship::Atomic => {
                let empty = Value::Map(crate::value::Object::new());
                let (l, r) = if lhs.is_null() { (&empty, rhs) } else { (lhs, &empty) };
                diff_map(schema, m, l, r, path, cmp, scratch, errors);
            }
            Ok(Resolved::List(l))
                if l.element_relationship == ElementRelationship::Associative =>
            {
                let empty = Value::List(Vec::new());
                let (lv, rv) = if lhs.is_null() { (&empty, rhs) } else { (lhs, &empty) };
                diff_list(schema, l, lv, rv, path, cmp, scratch, errors);
            }
            Ok(_) => mark_modified(cmp, path),
            Err(e) => errors.push(e),
        }
        return;
    }

    match (lhs, rhs) {
        (Value::Map(_), Value::Map(_)) => match dispatch(&atom, lhs, path) {
            Ok(Resolved::Map(m)) => {
                if m.element_relationship == ElementRelationship::Atomic {
                    mark_modified(cmp, path);
                } else {
                    diff_map(schema, m, lhs, rhs, path, cmp, scratch, errors);
                }
            }
            Ok(_) => mark_modified(cmp, path),
            Err(e) => errors.push(e),
        },
        (Value::List(_), Value::List(_)) => match dispatch(&atom, lhs, path) {
            Ok(Resolved::List(l)) => {
                if l.element_relationship == ElementRelationship::Associative {
                    diff_list(schema, l, lhs, rhs, path, cmp, scratch, errors);
                } else {
                    mark_modified(cmp, path);
                }
            }
            Ok(_) => mark_modified(cmp, path),
            Err(e) => errors.push(e),
        },
        _ => {
            // Scalars, or a change of kind. A container side contributes
            // its ownable paths as wholesale additions or removals.
            mark_modified(cmp, path);
            if lhs.is_map() || lhs.is_list() {
                collect(schema, tr, lhs, path, &mut cmp.removed, scratch, errors);
            }
            if rhs.is_map() || rhs.is_list() {
                collect(schema, tr, rhs, path, &mut cmp.added, scratch, errors);
            }
        }
    }
}

fn mark_modified(cmp: &mut Comparison, path: &Path) {
    if !path.is_empty() {
        cmp.modified.insert(path);
    }
}

#[allow(clippy::too_many_arguments)]
fn diff_map(
    schema: &Schema,
    map: &Map,
    lhs: &Value,
    rhs: &Value,
    path: &mut Path,
    cmp: &mut Comparison,
    scratch: &mut Scratch,
    errors: &mut ValidationErrors,
) {
    let lhs_entries = lhs.as_map().expect("map side");
    let rhs_entries = rhs.as_map().expect("map side");

    for (key, entry) in lhs_entries.iter() {
        let entry_type = map.entry_type(key);
        path.push(PathElement::field(key.clone()));
        match rhs_entries.get(key) {
            Some(rhs_entry) => {
                diff(schema, &entry_type, entry, rhs_entry, path, cmp, scratch, errors)
            }
            None => collect(schema, &entry_type, entry, path, &mut cmp.removed, scratch, errors),
        }
        path.pop();
    }

    for (key, entry) in rhs_entries.iter() {
        if lhs_entries.contains(key) {
            continue;
        }
        let entry_type = map.entry_type(key);
        path.push(PathElement::field(key.clone()));
        collect(schema, &entry_type, entry, path, &mut cmp.added, scratch, errors);
        path.pop();
    }
}

#[allow(clippy::too_many_arguments)]
fn diff_list(
    schema: &Schema,
    list: &List,
    lhs: &Value,
    rhs: &Value,
    path: &mut Path,
    cmp: &mut Comparison,
    scratch: &mut Scratch,
    errors: &mut ValidationErrors,
) {
    let lhs_items = lhs.as_list().expect("list side");
    let rhs_items = rhs.as_list().expect("list side");

    let lhs_index = index_items(schema, list, lhs_items, path, scratch, errors);
    let rhs_index = index_items(schema, list, rhs_items, path, scratch, errors);

    let scalar_set = list.keys.is_empty();

    for (pe, item) in &lhs_index {
        path.push(pe.clone());
        match rhs_index.iter().find(|(rpe, _)| rpe == pe) {
            Some((_, rhs_item)) if !scalar_set => {
                diff(schema, &list.element_type, item, rhs_item, path, cmp, scratch, errors)
            }
            Some(_) => {}
            None => {
                cmp.removed.insert(path);
                if !scalar_set {
                    collect(schema, &list.element_type, item, path, &mut cmp.removed, scratch, errors);
                }
            }
        }
        path.pop();
    }

    for (pe, item) in &rhs_index {
        if lhs_index.iter().any(|(lpe, _)| lpe == pe) {
            continue;
        }
        path.push(pe.clone());
        cmp.added.insert(path);
        if !scalar_set {
            collect(schema, &list.element_type, item, path, &mut cmp.added, scratch, errors);
        }
        path.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::from_yaml;

    fn schema() -> Schema {
        serde_yaml::from_str(
            r#"types:
- name: root
  map:
    fields:
    - name: name
      type:
        scalar: string
    - name: struct
      type:
        namedType: struct
    - name: atomicStruct
      type:
        namedType: struct
        elementRelationship: atomic
    - name: list
      type:
        namedType: recordList
    - name: setStr
      type:
        namedType: stringSet
- name: struct
  map:
    elementType:
      scalar: untyped
- name: recordList
  list:
    elementType:
      map:
        fields:
        - name: name
          type:
            scalar: string
        - name: value
          type:
            scalar: numeric
    elementRelationship: associative
    keys: [name]
- name: stringSet
  list:
    elementType:
      scalar: string
    elementRelationship: associative
"#,
        )
        .unwrap()
    }

    fn run(lhs: &str, rhs: &str) -> Comparison {
        compare(
            &schema(),
            &TypeRef::named("root"),
            &from_yaml(lhs).unwrap(),
            &from_yaml(rhs).unwrap(),
        )
        .unwrap()
    }

    fn paths(set: &FieldSet) -> Vec<String> {
        set.paths().iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn equal_values_compare_same() {
        let cmp = run("name: a\nstruct: {x: 1}\n", "name: a\nstruct: {x: 1}\n");
        assert!(cmp.is_same());
        assert!(!cmp.merged.is_empty());
    }

    #[test]
    fn scalar_change_is_modified() {
        let cmp = run("name: a\n", "name: b\n");
        assert_eq!(paths(&cmp.modified), vec![".name"]);
        assert!(cmp.added.is_empty() && cmp.removed.is_empty());
    }

    #[test]
    fn map_entries_added_and_removed() {
        let cmp = run("struct: {x: 1, y: 2}\n", "struct: {y: 2, z: 3}\n");
        assert_eq!(paths(&cmp.removed), vec![".struct.x"]);
        assert_eq!(paths(&cmp.added), vec![".struct.z"]);
        assert!(cmp.modified.is_empty());
    }

    #[test]
    fn atomic_struct_differs_as_a_whole() {
        let cmp = run("atomicStruct: {x: 1}\n", "atomicStruct: {x: 2}\n");
        assert_eq!(paths(&cmp.modified), vec![".atomicStruct"]);
        assert!(cmp.added.is_empty() && cmp.removed.is_empty());
    }

    #[test]
    fn record_removal_includes_descendants() {
        let cmp = run(
            "list:\n- name: a\n- name: b\n  value: 1\n",
            "list:\n- name: a\n",
        );
        assert_eq!(
            paths(&cmp.removed),
            vec![
                r#".list[name="b"]"#,
                r#".list[name="b"].name"#,
                r#".list[name="b"].value"#,
            ]
        );
    }

    #[test]
    fn set_membership_diff() {
        let cmp = run("setStr: [a, b]\n", "setStr: [b, c]\n");
        assert_eq!(paths(&cmp.removed), vec![r#".setStr[="a"]"#]);
        assert_eq!(paths(&cmp.added), vec![r#".setStr[="c"]"#]);
    }

    #[test]
    fn null_to_container_descends_without_touching_branch() {
        let cmp = run("struct: null\n", "struct: {x: 1}\n");
        // Deepening a null branch only adds members; the branch claim
        // itself is neither modified nor removed, so whoever owned the
        // null keeps owning the node.
        assert_eq!(paths(&cmp.added), vec![".struct.x"]);
        assert!(cmp.modified.is_empty());
        assert!(cmp.removed.is_empty());
    }

    #[test]
    fn merged_is_union_of_both_fieldsets() {
        let lhs = "name: a\nstruct: {x: 1}\n";
        let rhs = "name: b\nlist:\n- name: n\n";
        let cmp = run(lhs, rhs);

        let s = schema();
        let lhs_fs = super::super::tofieldset::to_field_set(
            &s,
            &TypeRef::named("root"),
            &from_yaml(lhs).unwrap(),
        )
        .unwrap();
        let rhs_fs = super::super::tofieldset::to_field_set(
            &s,
            &TypeRef::named("root"),
            &from_yaml(rhs).unwrap(),
        )
        .unwrap();
        assert_eq!(cmp.merged, lhs_fs.union(&rhs_fs));
    }
}
