/// Value Model
///
/// Values flowing in and out of a session: bind parameters, the values a
/// native cursor hands back (including large-object handles), and the
/// `ResultRow` mappings the query helper produces from them.

use crate::core::DriverResult;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;

/// A materialized scalar value.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Real(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Real(r) => write!(f, "{}", r),
            Value::Text(s) => write!(f, "{}", s),
            Value::Bytes(b) => write!(f, "<{} bytes>", b.len()),
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
        Value::Integer(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Full content of a large object once read to completion.
#[derive(Debug, Clone, PartialEq)]
pub enum LobContent {
    Text(String),
    Binary(Vec<u8>),
}

impl From<LobContent> for Value {
    fn from(content: LobContent) -> Self {
        match content {
            LobContent::Text(s) => Value::Text(s),
            LobContent::Binary(b) => Value::Bytes(b),
        }
    }
}

/// A driver handle to out-of-line data that must be read explicitly.
pub trait LargeObject: fmt::Debug + Send {
    /// Size in bytes or characters, when the driver knows it up front.
    fn size(&self) -> Option<u64> {
        None
    }

    /// Reads the whole object.
    fn read_to_end(&mut self) -> DriverResult<LobContent>;
}

/// A value as returned by a native cursor, before materialization.
#[derive(Debug)]
pub enum NativeValue {
    Scalar(Value),
    Lob(Box<dyn LargeObject>),
}

impl NativeValue {
    /// Whether this value is a large-object handle that still needs reading.
    pub fn is_lob(&self) -> bool {
        matches!(self, NativeValue::Lob(_))
    }

    /// Turns the value into a plain `Value`, reading large objects to completion.
    pub fn materialize(self) -> DriverResult<Value> {
        match self {
            NativeValue::Scalar(v) => Ok(v),
            NativeValue::Lob(mut lob) => lob.read_to_end().map(Value::from),
        }
    }
}

impl From<Value> for NativeValue {
    fn from(v: Value) -> Self {
        NativeValue::Scalar(v)
    }
}

/// Bind parameters for a statement.
///
/// Positional values bind to `:1`, `:2`, ... (or `?`) in order; named
/// values bind to `:name` placeholders.
#[derive(Debug, Clone, PartialEq)]
pub enum Params {
    Positional(Vec<Value>),
    Named(Vec<(String, Value)>),
}

impl Default for Params {
    fn default() -> Self {
        Params::Positional(Vec::new())
    }
}

impl Params {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn positional<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Params::Positional(values.into_iter().map(Into::into).collect())
    }

    /// Starts an empty named parameter list, filled with `with`.
    pub fn named() -> Self {
        Params::Named(Vec::new())
    }

    /// Adds a named value. Positional values already present are kept
    /// under their 1-based position (`:1`, `:2`, ...).
    pub fn with(self, name: &str, value: impl Into<Value>) -> Self {
        let mut named = match self {
            Params::Named(named) => named,
            Params::Positional(values) => values
                .into_iter()
                .enumerate()
                .map(|(i, v)| ((i + 1).to_string(), v))
                .collect(),
        };
        named.push((name.trim_start_matches(':').to_string(), value.into()));
        Params::Named(named)
    }

    pub fn len(&self) -> usize {
        match self {
            Params::Positional(values) => values.len(),
            Params::Named(named) => named.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Vec<Value>> for Params {
    fn from(values: Vec<Value>) -> Self {
        Params::Positional(values)
    }
}

/// Name of one result column, as reported by the driver.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDescription {
    pub name: String,
}

impl ColumnDescription {
    pub fn new(name: impl Into<String>) -> Self {
        ColumnDescription { name: name.into() }
    }
}

/// One query result record: column name to value, in column order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResultRow {
    fields: Vec<(String, Value)>,
}

impl ResultRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a field, replacing an earlier value under the same name.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        let pos = self.fields.iter().position(|(n, _)| n == name)?;
        Some(self.fields.remove(pos).1)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for ResultRow {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = ResultRow::new();
        for (k, v) in iter {
            row.insert(k, v);
        }
        row
    }
}

impl Serialize for ResultRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DriverError;

    #[derive(Debug)]
    struct FailingLob;

    impl LargeObject for FailingLob {
        fn read_to_end(&mut self) -> DriverResult<LobContent> {
            Err(DriverError::Native("lob gone".to_string()))
        }
    }

    #[derive(Debug)]
    struct TextLob(String);

    impl LargeObject for TextLob {
        fn read_to_end(&mut self) -> DriverResult<LobContent> {
            Ok(LobContent::Text(std::mem::take(&mut self.0)))
        }
    }

    #[test]
    fn test_materialize_scalar_and_lob() {
        let scalar = NativeValue::from(Value::Integer(7));
        assert!(!scalar.is_lob());
        assert_eq!(scalar.materialize().unwrap(), Value::Integer(7));

        let lob = NativeValue::Lob(Box::new(TextLob("long text".to_string())));
        assert!(lob.is_lob());
        assert_eq!(lob.materialize().unwrap(), Value::Text("long text".to_string()));

        let broken = NativeValue::Lob(Box::new(FailingLob));
        assert!(broken.materialize().is_err());
    }

    #[test]
    fn test_result_row_keeps_column_order_and_replaces() {
        let mut row = ResultRow::new();
        row.insert("b", 2);
        row.insert("a", 1);
        row.insert("b", 3);

        assert_eq!(row.columns().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(row.get("b"), Some(&Value::Integer(3)));
        assert_eq!(row.remove("a"), Some(Value::Integer(1)));
        assert_eq!(row.len(), 1);
    }

    #[test]
    fn test_result_row_serializes_as_map() {
        let row: ResultRow = vec![("x", Value::Integer(1)), ("name", Value::from("a")), ("gone", Value::Null)]
            .into_iter()
            .collect();
        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(json, r#"{"x":1,"name":"a","gone":null}"#);
    }

    #[test]
    fn test_params_builders() {
        let p = Params::positional([5, 6]);
        assert_eq!(p, Params::Positional(vec![Value::Integer(5), Value::Integer(6)]));
        assert_eq!(p.len(), 2);

        let named = Params::named().with(":id", 5).with("name", "x");
        assert_eq!(
            named,
            Params::Named(vec![
                ("id".to_string(), Value::Integer(5)),
                ("name".to_string(), Value::Text("x".to_string())),
            ])
        );

        let mixed = Params::positional([1]).with("flag", true);
        assert_eq!(
            mixed,
            Params::Named(vec![
                ("1".to_string(), Value::Integer(1)),
                ("flag".to_string(), Value::Bool(true)),
            ])
        );

        assert!(Params::none().is_empty());
        assert_eq!(Value::from(None::<i64>), Value::Null);
    }
}
