//! The type-catalog language that drives the walkers.
//!
//! A [`Schema`] is a list of named [`TypeDef`]s. A [`TypeRef`] either
//! names one of them or carries an inline definition, optionally
//! overriding the element relationship of the resolved container type.
//! Catalogs are written in YAML and deserialized straight into these
//! types; this module is the consumed "schema parser" interface.

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use crate::value::Value;
use std::collections::HashMap;

/// A set of named types. Indexed on first lookup; treat as immutable.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Schema {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub types: Vec<TypeDef>,

    #[serde(skip)]
    index: OnceCell<HashMap<String, usize>>,
}

impl Clone for Schema {
    fn clone(&self) -> Self {
        Schema {
            types: self.types.clone(),
            index: OnceCell::new(),
        }
    }
}

/// A named type in a schema. Names must be unique.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TypeDef {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    #[serde(flatten)]
    pub atom: Atom,
}

/// A reference to a type: by name, or inline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TypeRef {
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        rename = "namedType"
    )]
    pub named_type: Option<String>,

    #[serde(flatten)]
    pub inlined: Box<Atom>,

    /// When set, overrides the element relationship of the referred
    /// container type after resolution.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        rename = "elementRelationship"
    )]
    pub element_relationship: Option<ElementRelationship>,
}

impl TypeRef {
    pub fn named(name: impl Into<String>) -> Self {
        TypeRef {
            named_type: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn inline(atom: Atom) -> Self {
        TypeRef {
            inlined: Box::new(atom),
            ..Default::default()
        }
    }
}

/// The smallest unit of the type system. Exactly one of the branches is
/// normally set; a type with several set branches accepts any matching
/// value kind (used by deduced/untyped schemas).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Atom {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scalar: Option<Scalar>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list: Option<List>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map: Option<Map>,
}

/// A single-value type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scalar {
    Numeric,
    String,
    Boolean,
    Untyped,
}

/// How the elements of a container relate to each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementRelationship {
    /// List elements form a set of records (or scalars), addressed by
    /// key rather than position.
    Associative,
    /// The container is a leaf: no sub-path of it is independently
    /// ownable or mergeable.
    Atomic,
    /// Map entries have no particular relationship to each other (the
    /// default for maps).
    Separable,
}

/// A list type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct List {
    #[serde(default, rename = "elementType")]
    pub element_type: TypeRef,

    /// Lists are atomic unless declared associative.
    #[serde(default = "atomic", rename = "elementRelationship")]
    pub element_relationship: ElementRelationship,

    /// For associative lists of records: the element fields forming the
    /// key, in declaration order. Empty means the elements are scalars
    /// and the list is a set.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keys: Vec<String>,
}

fn atomic() -> ElementRelationship {
    ElementRelationship::Atomic
}

impl Default for ElementRelationship {
    fn default() -> Self {
        ElementRelationship::Separable
    }
}

/// A map type: declared fields plus a type for the remaining entries.
#[derive(Debug, Serialize, Deserialize)]
pub struct Map {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<StructField>,

    /// Type of entries not named in `fields`.
    #[serde(default, rename = "elementType")]
    pub element_type: TypeRef,

    #[serde(
        default,
        skip_serializing_if = "is_separable",
        rename = "elementRelationship"
    )]
    pub element_relationship: ElementRelationship,

    #[serde(skip)]
    field_index: OnceCell<HashMap<String, usize>>,
}

fn is_separable(er: &ElementRelationship) -> bool {
    *er == ElementRelationship::Separable
}

impl Default for Map {
    fn default() -> Self {
        Map {
            fields: Vec::new(),
            element_type: TypeRef::default(),
            element_relationship: ElementRelationship::Separable,
            field_index: OnceCell::new(),
        }
    }
}

impl Clone for Map {
    fn clone(&self) -> Self {
        Map {
            fields: self.fields.clone(),
            element_type: self.element_type.clone(),
            element_relationship: self.element_relationship,
            field_index: OnceCell::new(),
        }
    }
}

impl PartialEq for Map {
    fn eq(&self, other: &Self) -> bool {
        self.fields == other.fields
            && self.element_type == other.element_type
            && self.element_relationship == other.element_relationship
    }
}

/// One declared map field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructField {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    #[serde(default, rename = "type")]
    pub field_type: TypeRef,

    /// Default value, consulted when deriving associative-list keys from
    /// elements that omit this field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl Schema {
    pub fn new() -> Self {
        Schema::default()
    }

    pub fn with_types(types: Vec<TypeDef>) -> Self {
        Schema {
            types,
            index: OnceCell::new(),
        }
    }

    /// Looks up a named type.
    pub fn find(&self, name: &str) -> Option<&TypeDef> {
        let index = self.index.get_or_init(|| {
            self.types
                .iter()
                .enumerate()
                .map(|(i, t)| (t.name.clone(), i))
                .collect()
        });
        index.get(name).map(|&i| &self.types[i])
    }

    /// Resolves a reference to a concrete atom, applying any element
    /// relationship override. Returns `None` for an unknown named type or
    /// an override applied to a scalar.
    pub fn resolve(&self, tr: &TypeRef) -> Option<Atom> {
        let atom = match &tr.named_type {
            Some(name) => self.find(name)?.atom.clone(),
            None => (*tr.inlined).clone(),
        };

        let rel = match tr.element_relationship {
            None => return Some(atom),
            Some(rel) => rel,
        };

        if let Some(mut map) = atom.map {
            map.element_relationship = rel;
            return Some(Atom {
                map: Some(map),
                ..Default::default()
            });
        }
        if let Some(mut list) = atom.list {
            list.element_relationship = rel;
            return Some(Atom {
                list: Some(list),
                ..Default::default()
            });
        }
        None
    }
}

impl Map {
    pub fn with_fields(fields: Vec<StructField>) -> Self {
        Map {
            fields,
            ..Default::default()
        }
    }

    pub fn with_element_type(element_type: TypeRef) -> Self {
        Map {
            element_type,
            ..Default::default()
        }
    }

    pub fn find_field(&self, name: &str) -> Option<&StructField> {
        let index = self.field_index.get_or_init(|| {
            self.fields
                .iter()
                .enumerate()
                .map(|(i, f)| (f.name.clone(), i))
                .collect()
        });
        index.get(name).map(|&i| &self.fields[i])
    }

    /// The type of a map entry: the declared field type, or the element
    /// type for undeclared entries.
    pub fn entry_type(&self, name: &str) -> TypeRef {
        match self.find_field(name) {
            Some(field) => field.field_type.clone(),
            None => self.element_type.clone(),
        }
    }

    /// True if entries beyond the declared fields are accepted.
    pub fn allows_unknown_entries(&self) -> bool {
        self.element_type.named_type.is_some()
            || *self.element_type.inlined != Atom::default()
    }
}

impl Atom {
    pub fn is_scalar(&self) -> bool {
        self.scalar.is_some()
    }

    pub fn is_list(&self) -> bool {
        self.list.is_some()
    }

    pub fn is_map(&self) -> bool {
        self.map.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_and_relationship_spellings() {
        assert_eq!(serde_json::to_string(&Scalar::Numeric).unwrap(), "\"numeric\"");
        assert_eq!(serde_json::to_string(&Scalar::Untyped).unwrap(), "\"untyped\"");
        assert_eq!(
            serde_json::to_string(&ElementRelationship::Associative).unwrap(),
            "\"associative\""
        );
        assert_eq!(
            serde_json::to_string(&ElementRelationship::Atomic).unwrap(),
            "\"atomic\""
        );
    }

    #[test]
    fn parse_catalog_from_yaml() {
        let schema: Schema = serde_yaml::from_str(
            r#"types:
- name: record
  map:
    fields:
    - name: name
      type:
        scalar: string
    - name: ports
      type:
        namedType: portList
- name: portList
  list:
    elementType:
      scalar: numeric
    elementRelationship: associative
"#,
        )
        .unwrap();

        let record = schema.find("record").unwrap();
        let map = record.atom.map.as_ref().unwrap();
        assert_eq!(map.fields.len(), 2);
        assert!(map.find_field("name").is_some());
        assert!(map.find_field("missing").is_none());

        let ports = schema.find("portList").unwrap();
        let list = ports.atom.list.as_ref().unwrap();
        assert_eq!(list.element_relationship, ElementRelationship::Associative);
        assert!(list.keys.is_empty());
    }

    #[test]
    fn lists_default_to_atomic() {
        let schema: Schema = serde_yaml::from_str(
            r#"types:
- name: plainList
  list:
    elementType:
      scalar: string
"#,
        )
        .unwrap();

        let list = schema.find("plainList").unwrap().atom.list.as_ref().unwrap();
        assert_eq!(list.element_relationship, ElementRelationship::Atomic);
    }

    #[test]
    fn resolve_applies_relationship_override() {
        let schema: Schema = serde_yaml::from_str(
            r#"types:
- name: granular
  map:
    elementType:
      scalar: untyped
"#,
        )
        .unwrap();

        let plain = schema.resolve(&TypeRef::named("granular")).unwrap();
        assert_eq!(
            plain.map.unwrap().element_relationship,
            ElementRelationship::Separable
        );

        let overridden = schema
            .resolve(&TypeRef {
                named_type: Some("granular".into()),
                element_relationship: Some(ElementRelationship::Atomic),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(
            overridden.map.unwrap().element_relationship,
            ElementRelationship::Atomic
        );
    }

    #[test]
    fn resolve_unknown_type_is_none() {
        let schema = Schema::new();
        assert!(schema.resolve(&TypeRef::named("nope")).is_none());
    }
}
