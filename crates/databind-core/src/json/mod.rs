//! JSON value tree
//!
//! The transformers produce and consume fully materialized [`JsonValue`]
//! trees; [`parser`] and [`writer`] convert between trees and text. Objects
//! are insertion-ordered so that property ordering rules survive rendering.

use indexmap::IndexMap;
use std::fmt;

pub mod parser;
pub mod writer;

/// Materialized JSON value
#[derive(Debug, Clone)]
pub enum JsonValue {
    /// JSON null
    Null,
    /// JSON boolean
    Bool(bool),
    /// JSON number (always f64, following the JSON spec)
    Number(f64),
    /// JSON string
    String(String),
    /// JSON array
    Array(Vec<JsonValue>),
    /// JSON object, insertion-ordered
    Object(IndexMap<String, JsonValue>),
    /// Pre-encoded JSON text, spliced verbatim by the writer. Produced only
    /// for raw-value members; the parser never yields this variant, and the
    /// caller is responsible for the payload being valid JSON.
    Raw(String),
}

impl JsonValue {
    /// String value helper
    pub fn string(s: impl Into<String>) -> Self {
        JsonValue::String(s.into())
    }

    /// Get a property from a JSON object, if present
    pub fn get_property(&self, key: &str) -> Option<&JsonValue> {
        match self {
            JsonValue::Object(entries) => entries.get(key),
            _ => None,
        }
    }

    /// Get an element from a JSON array by index, if present
    pub fn get_index(&self, index: usize) -> Option<&JsonValue> {
        match self {
            JsonValue::Array(items) => items.get(index),
            _ => None,
        }
    }

    /// Get the type name as a string (for error messages)
    pub fn type_name(&self) -> &'static str {
        match self {
            JsonValue::Null => "null",
            JsonValue::Bool(_) => "boolean",
            JsonValue::Number(_) => "number",
            JsonValue::String(_) => "string",
            JsonValue::Array(_) => "array",
            JsonValue::Object(_) => "object",
            JsonValue::Raw(_) => "raw",
        }
    }

    /// Check if this is a null value
    pub fn is_null(&self) -> bool {
        matches!(self, JsonValue::Null)
    }

    /// Check if this is an object
    pub fn is_object(&self) -> bool {
        matches!(self, JsonValue::Object(_))
    }

    /// Check if this is an array
    pub fn is_array(&self) -> bool {
        matches!(self, JsonValue::Array(_))
    }

    /// Check if this is a scalar (null, boolean, number or string)
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            JsonValue::Null | JsonValue::Bool(_) | JsonValue::Number(_) | JsonValue::String(_)
        )
    }

    /// Get the boolean value if this is a Bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            JsonValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get the number value if this is a Number
    pub fn as_number(&self) -> Option<f64> {
        match self {
            JsonValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Get the string value if this is a String
    pub fn as_str(&self) -> Option<&str> {
        match self {
            JsonValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get the object entries if this is an Object
    pub fn as_object(&self) -> Option<&IndexMap<String, JsonValue>> {
        match self {
            JsonValue::Object(entries) => Some(entries),
            _ => None,
        }
    }

    /// Get the array elements if this is an Array
    pub fn as_array(&self) -> Option<&Vec<JsonValue>> {
        match self {
            JsonValue::Array(items) => Some(items),
            _ => None,
        }
    }
}

impl fmt::Display for JsonValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", writer::write(self))
    }
}

impl PartialEq for JsonValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (JsonValue::Null, JsonValue::Null) => true,
            (JsonValue::Bool(a), JsonValue::Bool(b)) => a == b,
            (JsonValue::Number(a), JsonValue::Number(b)) => {
                // NaN compares equal to NaN (IEEE equality would diverge)
                if a.is_nan() && b.is_nan() {
                    true
                } else {
                    a == b
                }
            }
            (JsonValue::String(a), JsonValue::String(b)) => a == b,
            (JsonValue::Array(a), JsonValue::Array(b)) => a == b,
            (JsonValue::Object(a), JsonValue::Object(b)) => a == b,
            (JsonValue::Raw(a), JsonValue::Raw(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for JsonValue {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_name() {
        assert_eq!(JsonValue::Null.type_name(), "null");
        assert_eq!(JsonValue::Bool(true).type_name(), "boolean");
        assert_eq!(JsonValue::Number(42.0).type_name(), "number");
        assert_eq!(JsonValue::string("x").type_name(), "string");
    }

    #[test]
    fn test_property_access() {
        let mut entries = IndexMap::new();
        entries.insert("name".to_string(), JsonValue::string("Alice"));
        let obj = JsonValue::Object(entries);

        assert_eq!(obj.get_property("name").and_then(|v| v.as_str()), Some("Alice"));
        assert!(obj.get_property("missing").is_none());
        assert!(JsonValue::Null.get_property("name").is_none());
    }

    #[test]
    fn test_index_access() {
        let arr = JsonValue::Array(vec![JsonValue::Number(1.0), JsonValue::Number(2.0)]);
        assert_eq!(arr.get_index(1).and_then(|v| v.as_number()), Some(2.0));
        assert!(arr.get_index(5).is_none());
    }

    #[test]
    fn test_equality() {
        assert_eq!(JsonValue::Null, JsonValue::Null);
        assert_eq!(JsonValue::Number(f64::NAN), JsonValue::Number(f64::NAN));
        assert_ne!(JsonValue::Null, JsonValue::Bool(false));
    }
}
