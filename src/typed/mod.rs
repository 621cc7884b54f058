//! Values bound to a schema type, and the operations between them.
//!
//! [`TypedValue`] pairs a document with the schema node it conforms to;
//! every walker (validation, path enumeration, diff, merge, projection)
//! hangs off it. [`Parser`] and [`ParseableType`] are the consumed
//! value-parser interface: text in, validated typed value out.

mod compare;
mod errors;
mod merge;
mod reconcile;
mod select;
mod tofieldset;
mod validate;
mod walk;

pub use compare::Comparison;
pub use errors::{ValidationError, ValidationErrors, ValidationOption};

pub(crate) use reconcile::reconcile_managed;

use crate::fieldset::FieldSet;
use crate::schema::{Schema, TypeRef};
use crate::value::Value;
use select::Mode;
use std::sync::Arc;
use thiserror::Error;

/// A value together with its schema and the type it was checked against.
#[derive(Debug, Clone)]
pub struct TypedValue {
    value: Value,
    type_ref: TypeRef,
    schema: Arc<Schema>,
}

impl TypedValue {
    /// Binds a value without validating it. Use when the value is already
    /// known to conform (walker outputs, test fixtures).
    pub fn unvalidated(value: Value, schema: Arc<Schema>, type_ref: TypeRef) -> Self {
        TypedValue {
            value,
            type_ref,
            schema,
        }
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    pub fn type_ref(&self) -> &TypeRef {
        &self.type_ref
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Checks the value against its type.
    pub fn validate(&self, opts: &[ValidationOption]) -> Result<(), ValidationErrors> {
        let allow_duplicates = opts.contains(&ValidationOption::AllowDuplicates);
        validate::validate(&self.schema, &self.type_ref, &self.value, allow_duplicates)
            .into_result()
    }

    /// Enumerates every ownable path of the value.
    pub fn to_field_set(&self) -> Result<FieldSet, ValidationErrors> {
        tofieldset::to_field_set(&self.schema, &self.type_ref, &self.value)
    }

    /// Diffs this value (left) against `rhs` (right).
    pub fn compare(&self, rhs: &TypedValue) -> Result<Comparison, ValidationErrors> {
        self.check_same_type(rhs)?;
        compare::compare(&self.schema, &self.type_ref, &self.value, &rhs.value)
    }

    /// Merges `rhs` onto this value: right wins on scalars and atomic
    /// containers, maps merge entry-wise, associative lists merge by
    /// element address with a documented, stable ordering.
    pub fn merge(&self, rhs: &TypedValue) -> Result<TypedValue, ValidationErrors> {
        self.check_same_type(rhs)?;
        let merged = merge::merge(&self.schema, &self.type_ref, &self.value, &rhs.value)?;
        Ok(self.with_value(merged))
    }

    /// Projects the value onto `set`. Selected list records keep their
    /// key fields even when the set does not name them.
    pub fn extract_items(&self, set: &FieldSet) -> TypedValue {
        let selection = set.with_key_fields();
        let out = select::select(
            &self.schema,
            &self.type_ref,
            &self.value,
            &selection,
            Mode::Extract,
        );
        self.with_value(out)
    }

    /// Projects the value onto the complement of `set`.
    pub fn remove_items(&self, set: &FieldSet) -> TypedValue {
        let out = select::select(&self.schema, &self.type_ref, &self.value, set, Mode::Remove);
        self.with_value(out)
    }

    /// An absent value of the same type.
    pub fn empty(&self) -> TypedValue {
        self.with_value(Value::Null)
    }

    fn with_value(&self, value: Value) -> TypedValue {
        TypedValue {
            value,
            type_ref: self.type_ref.clone(),
            schema: Arc::clone(&self.schema),
        }
    }

    fn check_same_type(&self, rhs: &TypedValue) -> Result<(), ValidationErrors> {
        if self.type_ref != rhs.type_ref {
            return Err(ValidationErrors::from_error(ValidationError::schema_error(
                "expected objects of the same type",
            )));
        }
        Ok(())
    }
}

/// Errors from parsing schemas or objects.
#[derive(Debug, Clone, Error)]
pub enum ParseError {
    #[error("failed to parse schema: {0}")]
    Schema(String),

    #[error("failed to parse object: {0}")]
    Object(String),

    #[error("validation failed: {0}")]
    Validation(ValidationErrors),
}

/// Parses a YAML type catalog and hands out [`ParseableType`]s.
#[derive(Debug, Clone)]
pub struct Parser {
    schema: Arc<Schema>,
}

impl Parser {
    pub fn new(schema_yaml: &str) -> Result<Parser, ParseError> {
        let schema: Schema =
            serde_yaml::from_str(schema_yaml).map_err(|e| ParseError::Schema(e.to_string()))?;
        Ok(Parser {
            schema: Arc::new(schema),
        })
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn type_names(&self) -> Vec<&str> {
        self.schema.types.iter().map(|t| t.name.as_str()).collect()
    }

    /// A handle for producing typed values of the named type.
    pub fn type_by_name(&self, name: &str) -> ParseableType {
        ParseableType {
            schema: Arc::clone(&self.schema),
            type_ref: TypeRef::named(name),
        }
    }
}

/// A (schema, type) pair that can mint typed values from text or values.
#[derive(Debug, Clone)]
pub struct ParseableType {
    schema: Arc<Schema>,
    type_ref: TypeRef,
}

impl ParseableType {
    /// True if the type resolves in the schema.
    pub fn is_valid(&self) -> bool {
        self.schema.resolve(&self.type_ref).is_some()
    }

    pub fn from_yaml(&self, yaml: &str) -> Result<TypedValue, ParseError> {
        self.from_yaml_with_opts(yaml, &[])
    }

    pub fn from_yaml_with_opts(
        &self,
        yaml: &str,
        opts: &[ValidationOption],
    ) -> Result<TypedValue, ParseError> {
        let value: Value =
            serde_yaml::from_str(yaml).map_err(|e| ParseError::Object(e.to_string()))?;
        self.from_value_with_opts(value, opts)
    }

    pub fn from_value(&self, value: Value) -> Result<TypedValue, ParseError> {
        self.from_value_with_opts(value, &[])
    }

    pub fn from_value_with_opts(
        &self,
        value: Value,
        opts: &[ValidationOption],
    ) -> Result<TypedValue, ParseError> {
        let tv = TypedValue::unvalidated(value, Arc::clone(&self.schema), self.type_ref.clone());
        tv.validate(opts).map_err(ParseError::Validation)?;
        Ok(tv)
    }
}

/// A parseable type for schemaless documents: maps deduce to granular
/// maps of the same type, everything else is atomic.
pub fn deduced_type() -> ParseableType {
    let schema_yaml = r#"types:
- name: __untyped_atomic_
  scalar: untyped
  list:
    elementType:
      namedType: __untyped_atomic_
    elementRelationship: atomic
  map:
    elementType:
      namedType: __untyped_atomic_
    elementRelationship: atomic
- name: __untyped_deduced_
  scalar: untyped
  list:
    elementType:
      namedType: __untyped_atomic_
    elementRelationship: atomic
  map:
    elementType:
      namedType: __untyped_deduced_
    elementRelationship: separable
"#;

    let parser = Parser::new(schema_yaml).expect("deduced schema parses");
    parser.type_by_name("__untyped_deduced_")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMA: &str = r#"types:
- name: pair
  map:
    fields:
    - name: key
      type:
        scalar: string
    - name: value
      type:
        scalar: string
"#;

    #[test]
    fn parser_lists_types() {
        let parser = Parser::new(SCHEMA).unwrap();
        assert_eq!(parser.type_names(), vec!["pair"]);
        assert!(parser.type_by_name("pair").is_valid());
        assert!(!parser.type_by_name("missing").is_valid());
    }

    #[test]
    fn parse_and_validate_object() {
        let parser = Parser::new(SCHEMA).unwrap();
        let pair = parser.type_by_name("pair");

        let tv = pair.from_yaml("key: a\nvalue: b\n").unwrap();
        assert!(tv.value().is_map());

        let err = pair.from_yaml("key: 7\n").unwrap_err();
        assert!(matches!(err, ParseError::Validation(_)));
    }

    #[test]
    fn compare_requires_same_type() {
        let parser = Parser::new(SCHEMA).unwrap();
        let a = parser.type_by_name("pair").from_yaml("key: a\n").unwrap();
        let b = TypedValue::unvalidated(
            Value::Null,
            Arc::clone(parser.schema()),
            TypeRef::named("other"),
        );
        assert!(a.compare(&b).is_err());
    }

    #[test]
    fn deduced_documents_parse() {
        let deduced = deduced_type();
        assert!(deduced.is_valid());
        let tv = deduced.from_yaml("a: 1\nb: {c: x}\n").unwrap();
        assert!(tv.value().is_map());
        let fs = tv.to_field_set().unwrap();
        assert!(fs.size() >= 2);
    }
}
