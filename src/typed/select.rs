//! Projection of a typed value onto a field set, or onto its complement.
//!
//! One walker serves both directions: `Extract` keeps exactly the
//! selected subtrees, `Remove` drops them. Per node:
//!
//! - a selected map entry is copied verbatim on extract and skipped on
//!   remove;
//! - a selected associative-list record is re-projected onto the
//!   selection beneath it (callers ensure the record's key fields are
//!   part of that selection so the record stays identifiable);
//! - entries with selections beneath them recurse;
//! - everything else is kept on remove and dropped on extract;
//! - atomic containers are never descended into;
//! - an empty result subtree collapses to null.

use super::walk::{dispatch, list_item_element, resolve, Resolved};
use crate::fieldset::FieldSet;
use crate::path::{Path, PathElement};
use crate::schema::{ElementRelationship, Schema, TypeRef};
use crate::value::{Object, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mode {
    Extract,
    Remove,
}

pub(crate) fn select(
    schema: &Schema,
    tr: &TypeRef,
    value: &Value,
    set: &FieldSet,
    mode: Mode,
) -> Value {
    if value.is_null() {
        return Value::Null;
    }

    let atom = match resolve(schema, tr, &Path::new()) {
        Ok(atom) => atom,
        Err(_) => return untouched(mode, value),
    };

    match dispatch(&atom, value, &Path::new()) {
        // A leaf only reaches here when the parent chose to keep it.
        Ok(Resolved::Scalar(_)) => value.clone(),
        Ok(Resolved::Map(map)) => {
            if map.element_relationship == ElementRelationship::Atomic {
                return untouched(mode, value);
            }
            select_map(schema, map, value, set, mode)
        }
        Ok(Resolved::List(list)) => {
            if list.element_relationship != ElementRelationship::Associative {
                return untouched(mode, value);
            }
            select_list(schema, list, value, set, mode)
        }
        Err(_) => untouched(mode, value),
    }
}

/// The result for a node the selection does not apply to: extraction
/// takes nothing from it, removal leaves it whole.
fn untouched(mode: Mode, value: &Value) -> Value {
    match mode {
        Mode::Extract => Value::Null,
        Mode::Remove => value.clone(),
    }
}

fn select_map(
    schema: &Schema,
    map: &crate::schema::Map,
    value: &Value,
    set: &FieldSet,
    mode: Mode,
) -> Value {
    let entries = value.as_map().expect("dispatched as map");
    let mut out = Object::new();

    for (key, entry) in entries.iter() {
        let pe = PathElement::field(key.clone());

        if set.has_member(&pe) {
            // Selected wholesale: everything currently present under the
            // entry belongs to the selection.
            if mode == Mode::Extract {
                out.insert(key.clone(), entry.clone());
            }
            continue;
        }

        match set.child(&pe) {
            Some(subset) => {
                // An entry with selections beneath it stays in both
                // modes, as an explicit null when nothing survives.
                let entry_type = map.entry_type(key);
                out.insert(key.clone(), select(schema, &entry_type, entry, subset, mode));
            }
            None => {
                if mode == Mode::Remove {
                    out.insert(key.clone(), entry.clone());
                }
            }
        }
    }

    if out.is_empty() {
        Value::Null
    } else {
        Value::Map(out)
    }
}

fn select_list(
    schema: &Schema,
    list: &crate::schema::List,
    value: &Value,
    set: &FieldSet,
    mode: Mode,
) -> Value {
    let items = value.as_list().expect("dispatched as list");
    let mut out = Vec::new();

    for (i, item) in items.iter().enumerate() {
        let pe = match list_item_element(schema, list, i, item, &Path::new()) {
            Ok(pe) => pe,
            Err(_) => {
                // Unaddressable element: inputs are pre-validated, so be
                // conservative rather than guess.
                if mode == Mode::Remove {
                    out.push(item.clone());
                }
                continue;
            }
        };

        if list.keys.is_empty() {
            // Scalar set: membership decides, no recursion.
            let selected = set.has_member(&pe);
            let keep = match mode {
                Mode::Extract => selected,
                Mode::Remove => !selected,
            };
            if keep {
                out.push(item.clone());
            }
            continue;
        }

        if set.has_member(&pe) {
            match mode {
                Mode::Extract => {
                    // Re-project onto the selection under the record; the
                    // caller has ensured the key fields are in it.
                    let subset = set.child(&pe).cloned().unwrap_or_default();
                    let picked = select(schema, &list.element_type, item, &subset, Mode::Extract);
                    if !picked.is_null() {
                        out.push(picked);
                    }
                }
                Mode::Remove => {}
            }
            continue;
        }

        match set.child(&pe) {
            Some(subset) => {
                let picked = select(schema, &list.element_type, item, subset, mode);
                match mode {
                    Mode::Extract => {
                        if !picked.is_null() {
                            out.push(picked);
                        }
                    }
                    Mode::Remove => out.push(picked),
                }
            }
            None => {
                if mode == Mode::Remove {
                    out.push(item.clone());
                }
            }
        }
    }

    if out.is_empty() {
        Value::Null
    } else {
        Value::List(out)
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
            namedType: stringSet
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

    fn field_path(parts: &[&str]) -> Path {
        parts.iter().map(|s| PathElement::field(*s)).collect()
    }

    fn run(doc: &str, set: &FieldSet, mode: Mode) -> Value {
        let selection = match mode {
            Mode::Extract => set.with_key_fields(),
            Mode::Remove => set.clone(),
        };
        select(
            &schema(),
            &TypeRef::named("root"),
            &from_yaml(doc).unwrap(),
            &selection,
            mode,
        )
    }

    #[test]
    fn scalar_set_member_extract_and_remove() {
        let set = FieldSet::from_paths([Path::from_elements(vec![
            PathElement::field("setStr"),
            PathElement::value(Value::String("a".into())),
        ])]);
        let doc = "setStr: [a, b, c]\n";

        assert_eq!(run(doc, &set, Mode::Extract), from_yaml("setStr: [a]\n").unwrap());
        assert_eq!(
            run(doc, &set, Mode::Remove),
            from_yaml("setStr: [b, c]\n").unwrap()
        );
    }

    #[test]
    fn selected_map_entry_extracts_verbatim() {
        let set = FieldSet::from_paths([field_path(&["struct"])]);
        let doc = "name: n\nstruct:\n  deep:\n    deeper: 1\n";

        assert_eq!(
            run(doc, &set, Mode::Extract),
            from_yaml("struct:\n  deep:\n    deeper: 1\n").unwrap()
        );
        assert_eq!(run(doc, &set, Mode::Remove), from_yaml("name: n\n").unwrap());
    }

    #[test]
    fn selected_record_keeps_keys_but_not_siblings() {
        let item = PathElement::key(vec![("name".into(), Value::String("b".into()))]);
        let set = FieldSet::from_paths([Path::from_elements(vec![
            PathElement::field("list"),
            item,
        ])]);
        let doc = "list:\n- name: a\n- name: b\n  value: [c, d]\n";

        // The record is selected but its value field is not: extraction
        // keeps the key so the record stays addressable, nothing more.
        assert_eq!(
            run(doc, &set, Mode::Extract),
            from_yaml("list:\n- name: b\n").unwrap()
        );
        assert_eq!(
            run(doc, &set, Mode::Remove),
            from_yaml("list:\n- name: a\n").unwrap()
        );
    }

    #[test]
    fn nested_selection_picks_single_set_member() {
        let item = PathElement::key(vec![("name".into(), Value::String("b".into()))]);
        let set = FieldSet::from_paths([Path::from_elements(vec![
            PathElement::field("list"),
            item.clone(),
            PathElement::field("value"),
            PathElement::value(Value::String("c".into())),
        ])]);
        let doc = "list:\n- name: b\n  value: [c, d]\n";

        assert_eq!(
            run(doc, &set, Mode::Extract),
            from_yaml("list:\n- name: b\n  value: [c]\n").unwrap()
        );
        assert_eq!(
            run(doc, &set, Mode::Remove),
            from_yaml("list:\n- name: b\n  value: [d]\n").unwrap()
        );
    }

    #[test]
    fn unselected_atomic_not_descended() {
        let set = FieldSet::from_paths([field_path(&["atomicStruct", "x"])]);
        let doc = "atomicStruct: {x: 1, y: 2}\n";

        // Selections beneath an atomic node select nothing: extraction
        // yields only the null marker for the entry, removal keeps the
        // container whole.
        assert_eq!(
            run(doc, &set, Mode::Extract),
            from_yaml("atomicStruct: null\n").unwrap()
        );
        assert_eq!(run(doc, &set, Mode::Remove), from_yaml(doc).unwrap());
    }

    #[test]
    fn empty_results_collapse_to_null() {
        let set = FieldSet::from_paths([field_path(&["name"])]);
        assert_eq!(run("name: n\n", &set, Mode::Remove), Value::Null);
        assert_eq!(run("struct: {x: 1}\n", &set, Mode::Extract), Value::Null);
    }

    #[test]
    fn extract_of_full_fieldset_restores_value() {
        let doc = "name: n\nstruct: {x: 1}\nlist:\n- name: a\n  value: [s]\nsetStr: [p, q]\n";
        let value = from_yaml(doc).unwrap();
        let s = schema();
        let tr = TypeRef::named("root");
        let fs = super::super::tofieldset::to_field_set(&s, &tr, &value).unwrap();

        let extracted = select(&s, &tr, &value, &fs.with_key_fields(), Mode::Extract);
        assert_eq!(extracted, value);

        // Entries whose contents were all removed stay as explicit
        // nulls; directly selected entries disappear.
        let removed = select(&s, &tr, &value, &fs, Mode::Remove);
        assert_eq!(
            removed,
            from_yaml("struct: null\nlist: null\nsetStr: null\n").unwrap()
        );
    }

    #[test]
    fn extract_remove_complement_recombines() {
        let doc = "name: n\nstruct: {x: 1, y: 2}\nsetStr: [p, q]\n";
        let value = from_yaml(doc).unwrap();
        let s = schema();
        let tr = TypeRef::named("root");

        let subset = FieldSet::from_paths([
            field_path(&["name"]),
            field_path(&["struct", "x"]),
            Path::from_elements(vec![
                PathElement::field("setStr"),
                PathElement::value(Value::String("p".into())),
            ]),
        ]);

        let kept = select(&s, &tr, &value, &subset.with_key_fields(), Mode::Extract);
        let rest = select(&s, &tr, &value, &subset, Mode::Remove);
        let recombined = super::super::merge::merge(&s, &tr, &kept, &rest).unwrap();
        assert_eq!(recombined, value);
    }
}
