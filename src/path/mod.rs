//! Paths address nodes inside a structured document.
//!
//! A [`Path`] is a sequence of [`PathElement`]s. Map entries are addressed
//! by field name, associative-list records by the tuple of their declared
//! key fields, scalar-set members by their own value, and atomic-list
//! elements by position (positions are never ownership-visible; they only
//! appear in diagnostics).

use crate::value::Value;
use std::cmp::Ordering;
use std::fmt;

/// The ordered key-field tuple identifying one associative-list record.
///
/// Fields are kept sorted by name so that two tuples naming the same
/// fields compare equal regardless of declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct KeyFields {
    pairs: Vec<(String, Value)>,
}

impl KeyFields {
    pub fn new(mut pairs: Vec<(String, Value)>) -> Self {
        pairs.sort_by(|a, b| a.0.cmp(&b.0));
        KeyFields { pairs }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.pairs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, Value)> {
        self.pairs.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.pairs.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl PartialOrd for KeyFields {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for KeyFields {
    fn cmp(&self, other: &Self) -> Ordering {
        for (a, b) in self.pairs.iter().zip(other.pairs.iter()) {
            match a.0.cmp(&b.0) {
                Ordering::Equal => {}
                unequal => return unequal,
            }
            match a.1.cmp(&b.1) {
                Ordering::Equal => {}
                unequal => return unequal,
            }
        }
        self.pairs.len().cmp(&other.pairs.len())
    }
}

/// One step of path navigation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathElement {
    /// A named map entry.
    Field(String),
    /// A scalar-set list member, addressed by its own value.
    Value(Value),
    /// An associative-list record, addressed by its key fields.
    Key(KeyFields),
    /// An atomic-list element, addressed by position.
    Index(i64),
}

impl PathElement {
    pub fn field(name: impl Into<String>) -> Self {
        PathElement::Field(name.into())
    }

    pub fn value(v: Value) -> Self {
        PathElement::Value(v)
    }

    pub fn key(pairs: Vec<(String, Value)>) -> Self {
        PathElement::Key(KeyFields::new(pairs))
    }

    pub fn index(i: i64) -> Self {
        PathElement::Index(i)
    }

    pub fn as_field(&self) -> Option<&str> {
        match self {
            PathElement::Field(name) => Some(name),
            _ => None,
        }
    }

    pub fn as_key(&self) -> Option<&KeyFields> {
        match self {
            PathElement::Key(kf) => Some(kf),
            _ => None,
        }
    }
}

impl PartialOrd for PathElement {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PathElement {
    fn cmp(&self, other: &Self) -> Ordering {
        // Canonical kind order: Field < Value < Key < Index.
        fn rank(pe: &PathElement) -> u8 {
            match pe {
                PathElement::Field(_) => 0,
                PathElement::Value(_) => 1,
                PathElement::Key(_) => 2,
                PathElement::Index(_) => 3,
            }
        }

        match rank(self).cmp(&rank(other)) {
            Ordering::Equal => {}
            unequal => return unequal,
        }

        match (self, other) {
            (PathElement::Field(a), PathElement::Field(b)) => a.cmp(b),
            (PathElement::Value(a), PathElement::Value(b)) => a.cmp(b),
            (PathElement::Key(a), PathElement::Key(b)) => a.cmp(b),
            (PathElement::Index(a), PathElement::Index(b)) => a.cmp(b),
            _ => Ordering::Equal,
        }
    }
}

fn write_scalar(f: &mut fmt::Formatter<'_>, v: &Value) -> fmt::Result {
    match v {
        Value::Null => write!(f, "null"),
        Value::Bool(b) => write!(f, "{}", b),
        Value::Int(i) => write!(f, "{}", i),
        Value::Float(x) => write!(f, "{}", x),
        Value::String(s) => write!(f, "{:?}", s),
        other => write!(f, "{:?}", other),
    }
}

impl fmt::Display for PathElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathElement::Field(name) => write!(f, ".{}", name),
            PathElement::Value(v) => {
                write!(f, "[=")?;
                write_scalar(f, v)?;
                write!(f, "]")
            }
            PathElement::Key(kf) => {
                write!(f, "[")?;
                for (i, (name, v)) in kf.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}=", name)?;
                    write_scalar(f, v)?;
                }
                write!(f, "]")
            }
            PathElement::Index(i) => write!(f, "[{}]", i),
        }
    }
}

/// A complete path from the document root to one node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Path {
    elements: Vec<PathElement>,
}

impl Path {
    pub fn new() -> Self {
        Path {
            elements: Vec::new(),
        }
    }

    pub fn from_elements(elements: Vec<PathElement>) -> Self {
        Path { elements }
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PathElement> {
        self.elements.iter()
    }

    pub fn push(&mut self, element: PathElement) {
        self.elements.push(element);
    }

    pub fn pop(&mut self) -> Option<PathElement> {
        self.elements.pop()
    }

    pub fn last(&self) -> Option<&PathElement> {
        self.elements.last()
    }

    /// A copy of this path with one more element appended.
    pub fn with(&self, element: PathElement) -> Self {
        let mut next = self.clone();
        next.push(element);
        next
    }

    pub fn as_slice(&self) -> &[PathElement] {
        &self.elements
    }

    /// True if `self` is a proper prefix of `other`.
    pub fn is_prefix_of(&self, other: &Path) -> bool {
        self.len() < other.len() && other.elements[..self.len()] == self.elements[..]
    }
}

impl FromIterator<PathElement> for Path {
    fn from_iter<T: IntoIterator<Item = PathElement>>(iter: T) -> Self {
        Path {
            elements: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Path {
    type Item = PathElement;
    type IntoIter = std::vec::IntoIter<PathElement>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.into_iter()
    }
}

impl<'a> IntoIterator for &'a Path {
    type Item = &'a PathElement;
    type IntoIter = std::slice::Iter<'a, PathElement>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.iter()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for element in &self.elements {
            write!(f, "{}", element)?;
        }
        Ok(())
    }
}
