//! Schema-directed merge of two typed values.
//!
//! The right-hand side is the incoming write. Scalars and atomic
//! containers take the right value; maps merge entry-wise; associative
//! lists merge by element address.
//!
//! List ordering rule (stable, relied on by callers): elements on both
//! sides keep the left side's positions; elements only on the right are
//! emitted immediately before their next shared right-hand neighbor, in
//! right-hand relative order, or after everything else when no shared
//! neighbor follows; elements only on the left keep their positions. A
//! null right-hand side is treated as absent, so merging with an empty
//! object is the identity.

use super::errors::ValidationErrors;
use super::walk::{dispatch, index_items, resolve, Resolved, Scratch};
use crate::path::Path;
use crate::schema::{ElementRelationship, List, Map, Schema, TypeRef};
use crate::value::{Object, Value};
use std::collections::HashMap;

pub(crate) fn merge(
    schema: &Schema,
    tr: &TypeRef,
    lhs: &Value,
    rhs: &Value,
) -> Result<Value, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let mut path = Path::new();
    let mut scratch = Scratch::new();
    let out = merge_values(schema, tr, lhs, rhs, &mut path, &mut scratch, &mut errors);
    errors.into_result().map(|_| out)
}

fn merge_values(
    schema: &Schema,
    tr: &TypeRef,
    lhs: &Value,
    rhs: &Value,
    path: &mut Path,
    scratch: &mut Scratch,
    errors: &mut ValidationErrors,
) -> Value {
    if rhs.is_null() {
        return lhs.clone();
    }
    if lhs.is_null() {
        return rhs.clone();
    }

    let atom = match resolve(schema, tr, path) {
        Ok(atom) => atom,
        Err(e) => {
            errors.push(e);
            return rhs.clone();
        }
    };

    match (lhs, rhs) {
        (Value::Map(_), Value::Map(_)) => match dispatch(&atom, lhs, path) {
            Ok(Resolved::Map(m)) if m.element_relationship != ElementRelationship::Atomic => {
                merge_maps(schema, m, lhs, rhs, path, scratch, errors)
            }
            _ => rhs.clone(),
        },
        (Value::List(_), Value::List(_)) => match dispatch(&atom, lhs, path) {
            Ok(Resolved::List(l))
                if l.element_relationship == ElementRelationship::Associative =>
            {
                merge_lists(schema, l, lhs, rhs, path, scratch, errors)
            }
            _ => rhs.clone(),
        },
        _ => rhs.clone(),
    }
}

fn merge_maps(
    schema: &Schema,
    map: &Map,
    lhs: &Value,
    rhs: &Value,
    path: &mut Path,
    scratch: &mut Scratch,
    errors: &mut ValidationErrors,
) -> Value {
    let lhs_entries = lhs.as_map().expect("map side");
    let rhs_entries = rhs.as_map().expect("map side");

    let mut out = Object::new();
    for (key, entry) in lhs_entries.iter() {
        out.insert(key.clone(), entry.clone());
    }
    for (key, rhs_entry) in rhs_entries.iter() {
        let merged = match lhs_entries.get(key) {
            Some(lhs_entry) => {
                let entry_type = map.entry_type(key);
                path.push(crate::path::PathElement::field(key.clone()));
                let v = merge_values(schema, &entry_type, lhs_entry, rhs_entry, path, scratch, errors);
                path.pop();
                v
            }
            None => rhs_entry.clone(),
        };
        out.insert(key.clone(), merged);
    }
    Value::Map(out)
}

fn merge_lists(
    schema: &Schema,
    list: &List,
    lhs: &Value,
    rhs: &Value,
    path: &mut Path,
    scratch: &mut Scratch,
    errors: &mut ValidationErrors,
) -> Value {
    let lhs_items = lhs.as_list().expect("list side");
    let rhs_items = rhs.as_list().expect("list side");

    let lhs_index = index_items(schema, list, lhs_items, path, scratch, errors);
    let rhs_index = index_items(schema, list, rhs_items, path, scratch, errors);

    let lhs_present: HashMap<_, _> = lhs_index
        .iter()
        .enumerate()
        .map(|(i, (pe, _))| (pe.clone(), i))
        .collect();
    let rhs_positions: HashMap<_, _> = rhs_index
        .iter()
        .enumerate()
        .map(|(i, (pe, _))| (pe.clone(), i))
        .collect();

    let mut out = Vec::with_capacity(lhs_index.len() + rhs_index.len());
    let mut cursor = 0;

    let flush_rhs_only = |upto: usize, cursor: &mut usize, out: &mut Vec<Value>| {
        while *cursor < upto {
            let (pe, item) = &rhs_index[*cursor];
            if !lhs_present.contains_key(pe) {
                out.push((*item).clone());
            }
            *cursor += 1;
        }
    };

    for (pe, lhs_item) in &lhs_index {
        match rhs_positions.get(pe) {
            Some(&pos) => {
                flush_rhs_only(pos, &mut cursor, &mut out);
                if cursor == pos {
                    cursor = pos + 1;
                }
                let rhs_item = rhs_index[pos].1;
                path.push(pe.clone());
                let merged = merge_values(
                    schema,
                    &list.element_type,
                    lhs_item,
                    rhs_item,
                    path,
                    scratch,
                    errors,
                );
                path.pop();
                out.push(merged);
            }
            None => out.push((*lhs_item).clone()),
        }
    }

    flush_rhs_only(rhs_index.len(), &mut cursor, &mut out);

    Value::List(out)
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
    - name: atomicList
      type:
        list:
          elementType:
            scalar: numeric
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

    fn run(lhs: &str, rhs: &str) -> Value {
        merge(
            &schema(),
            &TypeRef::named("root"),
            &from_yaml(lhs).unwrap(),
            &from_yaml(rhs).unwrap(),
        )
        .unwrap()
    }

    fn expect(yaml: &str) -> Value {
        from_yaml(yaml).unwrap()
    }

    #[test]
    fn right_wins_on_scalars_and_atomics() {
        assert_eq!(run("name: a\n", "name: b\n"), expect("name: b\n"));
        assert_eq!(
            run("atomicList: [1, 2]\n", "atomicList: [3]\n"),
            expect("atomicList: [3]\n")
        );
    }

    #[test]
    fn null_rhs_is_identity() {
        assert_eq!(
            run("struct: {x: 1}\n", "struct: null\n"),
            expect("struct: {x: 1}\n")
        );
        let doc = from_yaml("name: a\nstruct: {x: 1}\n").unwrap();
        let merged = merge(&schema(), &TypeRef::named("root"), &doc, &Value::Null).unwrap();
        assert_eq!(merged, doc);
        let merged = merge(&schema(), &TypeRef::named("root"), &Value::Null, &doc).unwrap();
        assert_eq!(merged, doc);
    }

    #[test]
    fn maps_union_and_recurse() {
        assert_eq!(
            run("struct: {x: 1, y: 2}\n", "struct: {y: 3, z: 4}\n"),
            expect("struct: {x: 1, y: 3, z: 4}\n")
        );
    }

    #[test]
    fn shared_records_keep_left_positions() {
        assert_eq!(
            run(
                "list:\n- name: a\n- name: b\n- name: c\n",
                "list:\n- name: a\n- name: b\n",
            ),
            expect("list:\n- name: a\n- name: b\n- name: c\n")
        );
    }

    #[test]
    fn new_records_enter_before_their_next_shared_neighbor() {
        assert_eq!(
            run(
                "list:\n- name: a\n- name: b\n- name: c\n",
                "list:\n- name: a\n- name: d\n- name: b\n",
            ),
            expect("list:\n- name: a\n- name: d\n- name: b\n- name: c\n")
        );
    }

    #[test]
    fn new_records_without_shared_neighbor_append() {
        assert_eq!(
            run("list:\n- name: x\n", "list:\n- name: a\n- name: b\n"),
            expect("list:\n- name: x\n- name: a\n- name: b\n")
        );
    }

    #[test]
    fn shared_records_merge_their_fields() {
        assert_eq!(
            run(
                "list:\n- name: a\n  value: 1\n",
                "list:\n- name: a\n",
            ),
            expect("list:\n- name: a\n  value: 1\n")
        );
    }

    #[test]
    fn scalar_sets_union_keeping_first_seen_order() {
        assert_eq!(
            run("setStr: [a, b]\n", "setStr: [b, c]\n"),
            expect("setStr: [a, b, c]\n")
        );
    }
}
