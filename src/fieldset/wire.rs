//! JSON wire format for field sets.
//!
//! A set serializes to an array of paths in canonical order. Each path is
//! an array of element encodings:
//!
//! - field name:  `"f:<name>"`
//! - record key:  `{"k":{<field>:<scalar>, ...}}`
//! - set member:  `{"v":<scalar>}`
//! - list index:  `{"i":<int>}`
//!
//! The round trip is lossless.

use super::FieldSet;
use crate::path::{Path, PathElement};
use crate::value::Value;
use serde_json::{json, Map as JsonMap, Value as Json};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum WireError {
    #[error("expected {expected}, got: {got}")]
    UnexpectedShape { expected: &'static str, got: String },

    #[error("unknown path element encoding: {0}")]
    UnknownElement(String),

    #[error("JSON error: {0}")]
    Json(String),
}

fn shape(expected: &'static str, got: &Json) -> WireError {
    WireError::UnexpectedShape {
        expected,
        got: got.to_string(),
    }
}

fn scalar_to_json(v: &Value) -> Result<Json, WireError> {
    serde_json::to_value(v).map_err(|e| WireError::Json(e.to_string()))
}

fn scalar_from_json(j: &Json) -> Result<Value, WireError> {
    serde_json::from_value(j.clone()).map_err(|e| WireError::Json(e.to_string()))
}

fn encode_element(pe: &PathElement) -> Result<Json, WireError> {
    match pe {
        PathElement::Field(name) => Ok(Json::String(format!("f:{}", name))),
        PathElement::Value(v) => Ok(json!({ "v": scalar_to_json(v)? })),
        PathElement::Key(kf) => {
            let mut fields = JsonMap::new();
            for (name, v) in kf.iter() {
                fields.insert(name.clone(), scalar_to_json(v)?);
            }
            Ok(json!({ "k": fields }))
        }
        PathElement::Index(i) => Ok(json!({ "i": i })),
    }
}

fn decode_element(j: &Json) -> Result<PathElement, WireError> {
    match j {
        Json::String(s) => match s.strip_prefix("f:") {
            Some(name) => Ok(PathElement::field(name)),
            None => Err(WireError::UnknownElement(s.clone())),
        },
        Json::Object(obj) => {
            let (tag, body) = match obj.iter().next() {
                Some(entry) if obj.len() == 1 => entry,
                _ => return Err(shape("single-key object", j)),
            };
            match tag.as_str() {
                "v" => Ok(PathElement::Value(scalar_from_json(body)?)),
                "i" => body
                    .as_i64()
                    .map(PathElement::index)
                    .ok_or_else(|| shape("integer index", body)),
                "k" => {
                    let fields = body.as_object().ok_or_else(|| shape("key object", body))?;
                    let mut pairs = Vec::with_capacity(fields.len());
                    for (name, v) in fields {
                        pairs.push((name.clone(), scalar_from_json(v)?));
                    }
                    Ok(PathElement::key(pairs))
                }
                other => Err(WireError::UnknownElement(other.to_string())),
            }
        }
        _ => Err(shape("string or object element", j)),
    }
}

impl FieldSet {
    /// Serializes the set to its JSON wire form.
    pub fn to_wire_json(&self) -> Result<String, WireError> {
        let mut paths = Vec::with_capacity(self.size());
        let mut first_err = None;
        self.iterate(|path| {
            if first_err.is_some() {
                return;
            }
            let encoded: Result<Vec<Json>, WireError> =
                path.iter().map(encode_element).collect();
            match encoded {
                Ok(elements) => paths.push(Json::Array(elements)),
                Err(e) => first_err = Some(e),
            }
        });
        if let Some(e) = first_err {
            return Err(e);
        }
        serde_json::to_string(&Json::Array(paths)).map_err(|e| WireError::Json(e.to_string()))
    }

    /// Parses a set from its JSON wire form.
    pub fn from_wire_json(text: &str) -> Result<FieldSet, WireError> {
        let top: Json = serde_json::from_str(text).map_err(|e| WireError::Json(e.to_string()))?;
        let paths = top
            .as_array()
            .ok_or_else(|| shape("array of paths", &top))?;

        let mut set = FieldSet::new();
        for path_json in paths {
            let elements = path_json
                .as_array()
                .ok_or_else(|| shape("array of path elements", path_json))?;
            let path: Path = elements
                .iter()
                .map(decode_element)
                .collect::<Result<_, _>>()?;
            set.insert(&path);
        }
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_set() -> FieldSet {
        FieldSet::from_paths([
            Path::from_elements(vec![PathElement::field("metadata")]),
            Path::from_elements(vec![
                PathElement::field("list"),
                PathElement::key(vec![
                    ("port".into(), Value::Int(443)),
                    ("protocol".into(), Value::String("tcp".into())),
                ]),
                PathElement::field("port"),
            ]),
            Path::from_elements(vec![
                PathElement::field("setStr"),
                PathElement::value(Value::String("a".into())),
            ]),
            Path::from_elements(vec![
                PathElement::field("atomicList"),
                PathElement::index(2),
            ]),
        ])
    }

    #[test]
    fn wire_roundtrip() {
        let set = sample_set();
        let text = set.to_wire_json().unwrap();
        let parsed = FieldSet::from_wire_json(&text).unwrap();
        assert_eq!(set, parsed);
    }

    #[test]
    fn wire_encodings() {
        let text = sample_set().to_wire_json().unwrap();
        let json: Json = serde_json::from_str(&text).unwrap();

        assert_eq!(
            json,
            json!([
                ["f:atomicList", {"i": 2}],
                ["f:list", {"k": {"port": 443, "protocol": "tcp"}}, "f:port"],
                ["f:metadata"],
                ["f:setStr", {"v": "a"}],
            ])
        );
    }

    #[test]
    fn wire_parses_golden_text() {
        let text = r#"[["f:spec","f:replicas"],["f:spec","f:list",{"k":{"name":"a"}},"f:name"],["f:set",{"v":1}]]"#;
        let set = FieldSet::from_wire_json(text).unwrap();

        assert!(set.has(&Path::from_elements(vec![
            PathElement::field("spec"),
            PathElement::field("replicas"),
        ])));
        assert!(set.has(&Path::from_elements(vec![
            PathElement::field("spec"),
            PathElement::field("list"),
            PathElement::key(vec![("name".into(), Value::String("a".into()))]),
            PathElement::field("name"),
        ])));
        assert!(set.has(&Path::from_elements(vec![
            PathElement::field("set"),
            PathElement::value(Value::Int(1)),
        ])));
        assert_eq!(set.size(), 3);
    }

    #[test]
    fn wire_rejects_unknown_encoding() {
        let text = r#"[["x:whoops"]]"#;
        assert!(FieldSet::from_wire_json(text).is_err());

        let text = r#"[[{"z": 1}]]"#;
        assert!(FieldSet::from_wire_json(text).is_err());
    }
}
