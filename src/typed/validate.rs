//! Schema conformance checking.

use super::errors::{ValidationError, ValidationErrors};
use super::walk::{dispatch, list_item_element, resolve, Resolved};
use crate::path::Path;
use crate::schema::{ElementRelationship, List, Map, Scalar, Schema, TypeRef};
use crate::value::Value;

/// Checks `value` against `tr`, collecting every failure rather than
/// stopping at the first.
pub(crate) fn validate(
    schema: &Schema,
    tr: &TypeRef,
    value: &Value,
    allow_duplicates: bool,
) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    let mut path = Path::new();
    validate_value(schema, tr, value, allow_duplicates, &mut path, &mut errors);
    errors
}

fn validate_value(
    schema: &Schema,
    tr: &TypeRef,
    value: &Value,
    allow_duplicates: bool,
    path: &mut Path,
    errors: &mut ValidationErrors,
) {
    let atom = match resolve(schema, tr, path) {
        Ok(atom) => atom,
        Err(e) => {
            errors.push(e);
            return;
        }
    };

    if value.is_null() {
        // Null conforms to every type.
        return;
    }

    match dispatch(&atom, value, path) {
        Ok(Resolved::Scalar(s)) => validate_scalar(s, value, path, errors),
        Ok(Resolved::List(l)) => {
            validate_list(schema, l, value, allow_duplicates, path, errors)
        }
        Ok(Resolved::Map(m)) => validate_map(schema, m, value, allow_duplicates, path, errors),
        Err(e) => errors.push(e),
    }
}

fn validate_scalar(scalar: &Scalar, value: &Value, path: &Path, errors: &mut ValidationErrors) {
    let ok = match scalar {
        Scalar::Numeric => matches!(value, Value::Int(_) | Value::Float(_)),
        Scalar::String => matches!(value, Value::String(_)),
        Scalar::Boolean => matches!(value, Value::Bool(_)),
        Scalar::Untyped => value.is_scalar(),
    };

    if !ok {
        let expected = match scalar {
            Scalar::Numeric => "numeric",
            Scalar::String => "string",
            Scalar::Boolean => "boolean",
            Scalar::Untyped => "scalar",
        };
        errors.push(ValidationError::type_mismatch(path, expected, value.kind()));
    }
}

fn validate_list(
    schema: &Schema,
    list: &List,
    value: &Value,
    allow_duplicates: bool,
    path: &mut Path,
    errors: &mut ValidationErrors,
) {
    let items = match value.as_list() {
        Some(items) => items,
        None => return,
    };

    let associative = list.element_relationship == ElementRelationship::Associative;
    let mut seen = Vec::new();

    for (i, item) in items.iter().enumerate() {
        let pe = match list_item_element(schema, list, i, item, path) {
            Ok(pe) => pe,
            Err(e) => {
                errors.push(e);
                continue;
            }
        };

        if associative && !allow_duplicates {
            if seen.contains(&pe) {
                errors.push(ValidationError::duplicate_element(path, &pe));
            }
            seen.push(pe.clone());
        }

        path.push(pe);
        validate_value(schema, &list.element_type, item, allow_duplicates, path, errors);
        path.pop();
    }
}

fn validate_map(
    schema: &Schema,
    map: &Map,
    value: &Value,
    allow_duplicates: bool,
    path: &mut Path,
    errors: &mut ValidationErrors,
) {
    let entries = match value.as_map() {
        Some(m) => m,
        None => return,
    };

    for (key, entry) in entries.iter() {
        if map.find_field(key).is_none() && !map.allows_unknown_entries() {
            errors.push(ValidationError::unknown_field(path, key));
            continue;
        }
        let entry_type = map.entry_type(key);
        path.push(crate::path::PathElement::field(key.clone()));
        validate_value(schema, &entry_type, entry, allow_duplicates, path, errors);
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
    - name: replicas
      type:
        scalar: numeric
    - name: ports
      type:
        namedType: portList
- name: portList
  list:
    elementType:
      namedType: port
    elementRelationship: associative
    keys: [port, protocol]
- name: port
  map:
    fields:
    - name: port
      type:
        scalar: numeric
    - name: protocol
      type:
        scalar: string
"#,
        )
        .unwrap()
    }

    fn check(yaml: &str) -> ValidationErrors {
        validate(
            &schema(),
            &TypeRef::named("root"),
            &from_yaml(yaml).unwrap(),
            false,
        )
    }

    #[test]
    fn conforming_value_passes() {
        let errs = check(
            "name: web\nreplicas: 3\nports:\n- port: 80\n  protocol: tcp\n- port: 443\n  protocol: tcp\n",
        );
        assert!(errs.is_empty(), "unexpected errors: {}", errs);
    }

    #[test]
    fn null_fields_pass() {
        let errs = check("name: null\nports: null\n");
        assert!(errs.is_empty(), "unexpected errors: {}", errs);
    }

    #[test]
    fn scalar_kind_mismatch_is_reported_with_path() {
        let errs = check("replicas: three\n");
        assert_eq!(errs.len(), 1);
        assert!(errs.to_string().contains(".replicas"));
    }

    #[test]
    fn unknown_field_rejected_without_element_type() {
        let errs = check("surprise: 1\n");
        assert_eq!(errs.len(), 1);
        assert!(errs.to_string().contains("unknown field"));
    }

    #[test]
    fn missing_key_field_is_an_error() {
        let errs = check("ports:\n- port: 80\n");
        assert_eq!(errs.len(), 1);
        assert!(errs.to_string().contains("protocol"));
    }

    #[test]
    fn duplicate_keys_rejected_unless_allowed() {
        let doc = "ports:\n- port: 80\n  protocol: tcp\n- port: 80\n  protocol: tcp\n";
        let errs = check(doc);
        assert_eq!(errs.len(), 1);
        assert!(errs.to_string().contains("duplicate"));

        let errs = validate(
            &schema(),
            &TypeRef::named("root"),
            &from_yaml(doc).unwrap(),
            true,
        );
        assert!(errs.is_empty());
    }
}
