//! Shared plumbing for the schema-directed walkers.
//!
//! Every walker resolves a type reference against the schema, then
//! dispatches on the resolved atom and the value's actual kind. That
//! dispatch lives here so each walker only supplies the per-kind
//! behavior.

use super::errors::{ValidationError, ValidationErrors};
use crate::path::{Path, PathElement};
use crate::schema::{Atom, List, Map, Scalar, Schema, TypeRef};
use crate::value::{Freelist, Value};
use std::collections::HashMap;

/// The schema branch a (value, type) pair resolved to.
pub(crate) enum Resolved<'a> {
    Scalar(&'a Scalar),
    List(&'a List),
    Map(&'a Map),
}

/// Resolves `tr`, reporting an error anchored at `path` when the schema
/// does not define the referenced type.
pub(crate) fn resolve(
    schema: &Schema,
    tr: &TypeRef,
    path: &Path,
) -> Result<Atom, ValidationError> {
    schema
        .resolve(tr)
        .ok_or_else(|| ValidationError::unresolved_type(path))
}

/// Picks the atom branch matching the value's kind. Types may define
/// several branches (deduced schemas); the value decides which applies.
pub(crate) fn dispatch<'a>(
    atom: &'a Atom,
    value: &Value,
    path: &Path,
) -> Result<Resolved<'a>, ValidationError> {
    match value {
        Value::Map(_) => atom
            .map
            .as_ref()
            .map(Resolved::Map)
            .ok_or_else(|| ValidationError::type_mismatch(path, expected_of(atom), "map")),
        Value::List(_) => atom
            .list
            .as_ref()
            .map(Resolved::List)
            .ok_or_else(|| ValidationError::type_mismatch(path, expected_of(atom), "list")),
        Value::Null => {
            if let Some(s) = &atom.scalar {
                Ok(Resolved::Scalar(s))
            } else if let Some(m) = &atom.map {
                Ok(Resolved::Map(m))
            } else if let Some(l) = &atom.list {
                Ok(Resolved::List(l))
            } else {
                Err(ValidationError::unresolved_type(path))
            }
        }
        scalar => atom
            .scalar
            .as_ref()
            .map(Resolved::Scalar)
            .ok_or_else(|| ValidationError::type_mismatch(path, expected_of(atom), scalar.kind())),
    }
}

fn expected_of(atom: &Atom) -> &'static str {
    if atom.map.is_some() {
        "map"
    } else if atom.list.is_some() {
        "list"
    } else if atom.scalar.is_some() {
        "scalar"
    } else {
        "nothing (empty type)"
    }
}

/// Derives the path element addressing one list element.
///
/// Associative lists of records address by their declared key fields,
/// consulting schema defaults for fields the element omits; sets address
/// by the element's own value; everything else addresses by position.
pub(crate) fn list_item_element(
    schema: &Schema,
    list: &List,
    index: usize,
    item: &Value,
    path: &Path,
) -> Result<PathElement, ValidationError> {
    use crate::schema::ElementRelationship::Associative;

    if list.element_relationship != Associative {
        return Ok(PathElement::index(index as i64));
    }
    if list.keys.is_empty() {
        return Ok(PathElement::Value(item.clone()));
    }

    let map = match item.as_map() {
        Some(m) => m,
        None => {
            return Err(ValidationError::type_mismatch(
                &path.with(PathElement::index(index as i64)),
                "map",
                item.kind(),
            ))
        }
    };

    let mut pairs = Vec::with_capacity(list.keys.len());
    for key in &list.keys {
        match map.get(key) {
            Some(v) => pairs.push((key.clone(), v.clone())),
            None => match key_field_default(schema, list, key) {
                Some(d) => pairs.push((key.clone(), d)),
                None => return Err(ValidationError::missing_list_key(path, key)),
            },
        }
    }
    Ok(PathElement::key(pairs))
}

fn key_field_default(schema: &Schema, list: &List, name: &str) -> Option<Value> {
    let atom = schema.resolve(&list.element_type)?;
    atom.map.as_ref()?.find_field(name)?.default.clone()
}

/// Pooled scratch buffers shared by one walk. Walkers `take` a buffer per
/// container they index and `put` it back before returning, so deep
/// documents reuse a handful of allocations.
pub(crate) struct Scratch {
    pub elements: Freelist<PathElement>,
}

impl Scratch {
    pub fn new() -> Self {
        Scratch {
            elements: Freelist::new(),
        }
    }
}

/// Addresses every element of a list, pairing each address with its
/// element. Repeated addresses collapse to one entry (the last occurrence
/// wins); address-derivation failures are recorded and fall back to the
/// element's position.
pub(crate) fn index_items<'v>(
    schema: &Schema,
    list: &List,
    items: &'v [Value],
    path: &Path,
    scratch: &mut Scratch,
    errors: &mut ValidationErrors,
) -> Vec<(PathElement, &'v Value)> {
    let mut pes = scratch.elements.take();
    for (i, item) in items.iter().enumerate() {
        match list_item_element(schema, list, i, item, path) {
            Ok(pe) => pes.push(pe),
            Err(e) => {
                errors.push(e);
                pes.push(PathElement::index(i as i64));
            }
        }
    }

    let mut order: Vec<(PathElement, &'v Value)> = Vec::with_capacity(items.len());
    let mut positions: HashMap<PathElement, usize> = HashMap::with_capacity(items.len());
    for (pe, item) in pes.drain(..).zip(items.iter()) {
        match positions.get(&pe) {
            Some(&at) => order[at] = (pe, item),
            None => {
                positions.insert(pe.clone(), order.len());
                order.push((pe, item));
            }
        }
    }
    scratch.elements.put(pes);
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ElementRelationship, StructField, TypeDef};

    fn list_schema(keys: Vec<&str>, default_port: bool) -> (Schema, List) {
        let mut fields = vec![StructField {
            name: "name".into(),
            field_type: TypeRef::inline(Atom {
                scalar: Some(Scalar::String),
                ..Default::default()
            }),
            default: None,
        }];
        if default_port {
            fields.push(StructField {
                name: "port".into(),
                field_type: TypeRef::inline(Atom {
                    scalar: Some(Scalar::Numeric),
                    ..Default::default()
                }),
                default: Some(Value::Int(80)),
            });
        }
        let schema = Schema::with_types(vec![TypeDef {
            name: "element".into(),
            atom: Atom {
                map: Some(Map::with_fields(fields)),
                ..Default::default()
            },
        }]);
        let list = List {
            element_type: TypeRef::named("element"),
            element_relationship: ElementRelationship::Associative,
            keys: keys.into_iter().map(String::from).collect(),
        };
        (schema, list)
    }

    fn record(pairs: &[(&str, Value)]) -> Value {
        Value::Map(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
    }

    #[test]
    fn keyed_element_addressing() {
        let (schema, list) = list_schema(vec!["name"], false);
        let item = record(&[("name", Value::String("a".into()))]);

        let pe = list_item_element(&schema, &list, 0, &item, &Path::new()).unwrap();
        assert_eq!(
            pe,
            PathElement::key(vec![("name".into(), Value::String("a".into()))])
        );
    }

    #[test]
    fn missing_key_falls_back_to_schema_default() {
        let (schema, list) = list_schema(vec!["name", "port"], true);
        let item = record(&[("name", Value::String("a".into()))]);

        let pe = list_item_element(&schema, &list, 0, &item, &Path::new()).unwrap();
        assert_eq!(
            pe,
            PathElement::key(vec![
                ("name".into(), Value::String("a".into())),
                ("port".into(), Value::Int(80)),
            ])
        );
    }

    #[test]
    fn missing_key_without_default_is_an_error() {
        let (schema, list) = list_schema(vec!["name", "port"], false);
        let item = record(&[("name", Value::String("a".into()))]);

        assert!(list_item_element(&schema, &list, 0, &item, &Path::new()).is_err());
    }

    #[test]
    fn set_elements_address_by_value() {
        let (schema, mut list) = list_schema(vec![], false);
        list.keys.clear();

        let pe =
            list_item_element(&schema, &list, 3, &Value::String("a".into()), &Path::new())
                .unwrap();
        assert_eq!(pe, PathElement::Value(Value::String("a".into())));
    }

    #[test]
    fn atomic_elements_address_by_index() {
        let (schema, mut list) = list_schema(vec![], false);
        list.element_relationship = ElementRelationship::Atomic;

        let pe = list_item_element(&schema, &list, 3, &Value::Int(1), &Path::new()).unwrap();
        assert_eq!(pe, PathElement::index(3));
    }
}
