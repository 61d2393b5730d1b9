//! Typed application values.
//!
//! [`Values`] is what application code sees on both sides of a call: the
//! decoded arguments handed to a responder, the response a responder returns,
//! and the response a caller receives. Keys are local (normalized) names.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use bytes::Bytes;

/// A single decoded argument value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Signed integer.
    Integer(i64),
    /// Double-precision float.
    Float(f64),
    /// Boolean.
    Boolean(bool),
    /// UTF-8 text.
    Unicode(String),
    /// Raw bytes.
    Bytes(Bytes),
    /// Filesystem path.
    Path(PathBuf),
    /// Sequence of nested records.
    List(Vec<Values>),
}

impl Value {
    /// Short name of the variant, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::Boolean(_) => "boolean",
            Value::Unicode(_) => "unicode",
            Value::Bytes(_) => "bytes",
            Value::Path(_) => "path",
            Value::List(_) => "list",
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v.into())
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Integer(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Unicode(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Unicode(v.to_owned())
    }
}

impl From<Bytes> for Value {
    fn from(v: Bytes) -> Self {
        Value::Bytes(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v.into())
    }
}

impl From<PathBuf> for Value {
    fn from(v: PathBuf) -> Self {
        Value::Path(v)
    }
}

impl From<&Path> for Value {
    fn from(v: &Path) -> Self {
        Value::Path(v.to_path_buf())
    }
}

impl From<Vec<Values>> for Value {
    fn from(v: Vec<Values>) -> Self {
        Value::List(v)
    }
}

/// Named values keyed by local argument name.
///
/// # Example
///
/// ```
/// use ampwire::codec::Values;
///
/// let values = Values::new().with("a", 3).with("b", 4);
/// assert_eq!(values.get_int("a"), Some(3));
/// assert_eq!(values.get_int("missing"), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Values {
    inner: BTreeMap<String, Value>,
}

impl Values {
    /// Create an empty set of values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Insert a value, returning the previous one.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.inner.insert(name.into(), value.into())
    }

    /// Get a value by local name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.inner.get(name)
    }

    /// Remove a value by local name.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.inner.remove(name)
    }

    /// Number of values.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Check if there are no values.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Iterate values in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.inner.iter()
    }

    /// Get an integer value.
    pub fn get_int(&self, name: &str) -> Option<i64> {
        match self.get(name)? {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Get a float value. Integers are widened.
    pub fn get_float(&self, name: &str) -> Option<f64> {
        match self.get(name)? {
            Value::Float(v) => Some(*v),
            Value::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Get a boolean value.
    pub fn get_bool(&self, name: &str) -> Option<bool> {
        match self.get(name)? {
            Value::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    /// Get a text value.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        match self.get(name)? {
            Value::Unicode(v) => Some(v),
            _ => None,
        }
    }

    /// Get a byte-string value.
    pub fn get_bytes(&self, name: &str) -> Option<&Bytes> {
        match self.get(name)? {
            Value::Bytes(v) => Some(v),
            _ => None,
        }
    }

    /// Get a path value.
    pub fn get_path(&self, name: &str) -> Option<&Path> {
        match self.get(name)? {
            Value::Path(v) => Some(v),
            _ => None,
        }
    }

    /// Get a list value.
    pub fn get_list(&self, name: &str) -> Option<&[Values]> {
        match self.get(name)? {
            Value::List(v) => Some(v),
            _ => None,
        }
    }
}

impl<K, V> FromIterator<(K, V)> for Values
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            inner: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl IntoIterator for Values {
    type Item = (String, Value);
    type IntoIter = std::collections::btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_getters() {
        let values = Values::new()
            .with("n", 7)
            .with("f", 1.5)
            .with("ok", true)
            .with("name", "bob")
            .with("data", b"raw".to_vec())
            .with("where", PathBuf::from("/tmp/x"));

        assert_eq!(values.get_int("n"), Some(7));
        assert_eq!(values.get_float("f"), Some(1.5));
        assert_eq!(values.get_float("n"), Some(7.0));
        assert_eq!(values.get_bool("ok"), Some(true));
        assert_eq!(values.get_str("name"), Some("bob"));
        assert_eq!(values.get_bytes("data").map(|b| &b[..]), Some(&b"raw"[..]));
        assert_eq!(values.get_path("where"), Some(Path::new("/tmp/x")));
        assert_eq!(values.len(), 6);
    }

    #[test]
    fn test_getter_type_mismatch() {
        let values = Values::new().with("n", "not a number");
        assert_eq!(values.get_int("n"), None);
        assert_eq!(values.get_str("n"), Some("not a number"));
    }

    #[test]
    fn test_nested_list() {
        let values = Values::new().with(
            "items",
            vec![Values::new().with("x", 1), Values::new().with("x", 2)],
        );
        let items = values.get_list("items").unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].get_int("x"), Some(2));
    }
}
