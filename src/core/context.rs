//! Context mappings consumed by the template formatter
//!
//! A `Context` is one key/value mapping. The pipeline hands the formatter an
//! ordered list of them (global static, call site, dynamic, session); when two
//! layers define the same key, the later one wins.

use chrono::{DateTime, FixedOffset, Local, Utc};
use std::collections::HashMap;
use std::fmt;

/// Value type for context fields
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    String(String),
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
    Timestamp(DateTime<FixedOffset>),
    Null,
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::String(s) => f.write_str(s),
            FieldValue::Int(i) => write!(f, "{}", i),
            FieldValue::UInt(u) => write!(f, "{}", u),
            FieldValue::Float(fl) => write!(f, "{}", fl),
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Timestamp(ts) => f.write_str(&ts.to_rfc3339()),
            FieldValue::Null => f.write_str("null"),
        }
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::String(s)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::String(s.to_string())
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        FieldValue::Int(i)
    }
}

impl From<i32> for FieldValue {
    fn from(i: i32) -> Self {
        FieldValue::Int(i64::from(i))
    }
}

impl From<u64> for FieldValue {
    fn from(u: u64) -> Self {
        FieldValue::UInt(u)
    }
}

impl From<u32> for FieldValue {
    fn from(u: u32) -> Self {
        FieldValue::UInt(u64::from(u))
    }
}

impl From<usize> for FieldValue {
    fn from(u: usize) -> Self {
        FieldValue::UInt(u as u64)
    }
}

impl From<f64> for FieldValue {
    fn from(f: f64) -> Self {
        FieldValue::Float(f)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(ts: DateTime<Utc>) -> Self {
        FieldValue::Timestamp(ts.fixed_offset())
    }
}

impl From<DateTime<Local>> for FieldValue {
    fn from(ts: DateTime<Local>) -> Self {
        FieldValue::Timestamp(ts.fixed_offset())
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(FieldValue::Null, Into::into)
    }
}

/// One layer of key/value facts
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context {
    fields: HashMap<String, FieldValue>,
}

impl Context {
    /// Create a new empty context
    pub fn new() -> Self {
        Self {
            fields: HashMap::new(),
        }
    }

    /// Add a field to the context
    #[must_use]
    pub fn with_field<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<FieldValue>,
    {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Add a field to the context (mutable version)
    pub fn insert<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<FieldValue>,
    {
        self.fields.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<FieldValue> {
        self.fields.remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    /// Get all fields
    pub fn fields(&self) -> &HashMap<String, FieldValue> {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Copy every field of `other` over this context
    pub fn extend_from(&mut self, other: &Context) {
        for (key, value) in &other.fields {
            self.fields.insert(key.clone(), value.clone());
        }
    }

    /// Flatten an ordered list of layers into one mapping, later layers winning
    pub fn flatten(layers: &[&Context]) -> Context {
        let mut merged = Context::new();
        for layer in layers {
            merged.extend_from(layer);
        }
        merged
    }

    /// Format fields as sorted key=value pairs
    pub fn format_fields(&self) -> String {
        let mut pairs: Vec<_> = self.fields.iter().collect();
        pairs.sort_by(|a, b| a.0.cmp(b.0));
        pairs
            .into_iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format_fields())
    }
}

/// Look a key up across layers, last match wins
pub fn lookup<'a>(layers: &[&'a Context], key: &str) -> Option<&'a FieldValue> {
    layers.iter().rev().find_map(|layer| layer.get(key))
}
