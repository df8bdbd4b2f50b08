//! Property trees
//!
//! Descriptor and release properties are arbitrarily nested maps addressed by
//! dotted paths (`a.b.c`). [`PropertyValue`] is the single tagged representation
//! used wherever a property tree is read, overlaid or merged, so callers never
//! have to switch on dynamic types at each access site.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Object node of a property tree
pub type PropertyMap = BTreeMap<String, PropertyValue>;

/// A node in a property tree
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    #[default]
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(Vec<PropertyValue>),
    Object(PropertyMap),
}

impl PropertyValue {
    /// Create an empty object node
    pub fn object() -> Self {
        PropertyValue::Object(PropertyMap::new())
    }

    /// Build an object from dotted-path entries, expanding each path into nested objects
    pub fn from_dotted<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, PropertyValue)>,
        K: AsRef<str>,
    {
        let mut root = PropertyValue::object();
        for (path, value) in entries {
            root.set_path(path.as_ref(), value);
        }
        root
    }

    pub fn is_null(&self) -> bool {
        matches!(self, PropertyValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            PropertyValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&PropertyMap> {
        match self {
            PropertyValue::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Look up a direct child of an object node
    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.as_object().and_then(|map| map.get(key))
    }

    /// Look up the node reached by a dotted path
    pub fn get_path(&self, path: &str) -> Option<&PropertyValue> {
        path.split('.').try_fold(self, |node, segment| node.get(segment))
    }

    /// Set the leaf reached by a dotted path.
    ///
    /// Missing intermediate nodes are created as objects; intermediate nodes
    /// that are not objects are replaced. Siblings of the leaf are untouched.
    pub fn set_path(&mut self, path: &str, value: PropertyValue) {
        let mut node = self;
        let mut segments = path.split('.').peekable();

        while let Some(segment) = segments.next() {
            if !matches!(node, PropertyValue::Object(_)) {
                *node = PropertyValue::object();
            }
            let map = match node {
                PropertyValue::Object(map) => map,
                _ => unreachable!("node was replaced by an object above"),
            };

            if segments.peek().is_none() {
                map.insert(segment.to_owned(), value);
                return;
            }
            node = map.entry(segment.to_owned()).or_default();
        }
    }

    /// Deep-merge `other` into this tree.
    ///
    /// Objects merge key by key; any other overlay value replaces the base.
    /// A null overlay leaves the base untouched.
    pub fn merge(&mut self, other: &PropertyValue) {
        match (self, other) {
            (_, PropertyValue::Null) => {}
            (PropertyValue::Object(base), PropertyValue::Object(overlay)) => {
                for (key, value) in overlay {
                    match base.get_mut(key) {
                        Some(existing) => existing.merge(value),
                        None => {
                            base.insert(key.clone(), value.clone());
                        }
                    }
                }
            }
            (base, overlay) => *base = overlay.clone(),
        }
    }

    /// Convert this tree into a typed value
    pub fn deserialize_into<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(serde_json::to_value(self)?)
    }

    /// Convert a typed value into a property tree
    pub fn from_serializable<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        serde_json::from_value(serde_json::to_value(value)?)
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Null => Ok(()),
            PropertyValue::Bool(b) => write!(f, "{}", b),
            PropertyValue::Integer(i) => write!(f, "{}", i),
            PropertyValue::Float(x) => write!(f, "{}", x),
            PropertyValue::String(s) => f.write_str(s),
            other => {
                let encoded = serde_json::to_string(other).map_err(|_| fmt::Error)?;
                f.write_str(&encoded)
            }
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Bool(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Integer(value)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::Float(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::String(value.to_owned())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::String(value)
    }
}

impl<T: Into<PropertyValue>> From<Vec<T>> for PropertyValue {
    fn from(values: Vec<T>) -> Self {
        PropertyValue::List(values.into_iter().map(Into::into).collect())
    }
}

impl From<PropertyMap> for PropertyValue {
    fn from(map: PropertyMap) -> Self {
        PropertyValue::Object(map)
    }
}
