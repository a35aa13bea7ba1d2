//! Dynamic object model
//!
//! The engine operates on a dynamic value tree rather than static Rust
//! types: class instances are shared, interior-mutable cells so that object
//! identity, circular graphs, back-reference patching and forward-reference
//! resolution all work during a traversal.

use indexmap::IndexMap;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Shared handle to a class instance
///
/// Identity comparisons (`Rc::ptr_eq`) are what the identity resolver keys
/// its scope tables on.
pub type ObjRef = Rc<RefCell<Instance>>;

/// A class instance: class name plus named fields in declaration order
#[derive(Debug, Clone)]
pub struct Instance {
    /// Name of the class registered in the metadata store
    pub class: String,
    /// Field values, keyed by canonical member name
    pub fields: IndexMap<String, Value>,
}

impl Instance {
    /// Create an instance with no fields set
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            fields: IndexMap::new(),
        }
    }

    /// Get a field value, or `Value::Null` if unset
    pub fn get(&self, name: &str) -> Value {
        self.fields.get(name).cloned().unwrap_or(Value::Null)
    }

    /// Set a field value
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.fields.insert(name.into(), value);
    }

    /// Wrap this instance in a shared handle
    pub fn into_ref(self) -> ObjRef {
        Rc::new(RefCell::new(self))
    }
}

/// Runtime value in an object graph
#[derive(Clone)]
pub enum Value {
    /// Absent / null value
    Null,
    /// Boolean
    Bool(bool),
    /// Number (always f64, mirroring JSON)
    Number(f64),
    /// String
    String(String),
    /// Ordered list of values
    Array(Vec<Value>),
    /// String-keyed associative collection, insertion-ordered
    Map(IndexMap<String, Value>),
    /// Shared class instance
    Object(ObjRef),
}

impl Value {
    /// Build an object value from a class name and field list
    pub fn object(class: impl Into<String>, fields: Vec<(&str, Value)>) -> Self {
        let mut inst = Instance::new(class);
        for (name, value) in fields {
            inst.set(name, value);
        }
        Value::Object(inst.into_ref())
    }

    /// String value helper
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    /// Get the value kind name (for error messages)
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Map(_) => "map",
            Value::Object(_) => "object",
        }
    }

    /// Check if this is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get the boolean value if this is a Bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get the number value if this is a Number
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Get the string value if this is a String
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get the instance handle if this is an Object
    pub fn as_object(&self) -> Option<&ObjRef> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Check whether this value is "empty" (null, empty string, empty
    /// array, empty map)
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Null => true,
            Value::String(s) => s.is_empty(),
            Value::Array(items) => items.is_empty(),
            Value::Map(entries) => entries.is_empty(),
            _ => false,
        }
    }

    fn eq_impl(&self, other: &Value, visited: &mut Vec<(usize, usize)>) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => {
                // NaN compares equal to NaN (IEEE equality would diverge)
                if a.is_nan() && b.is_nan() {
                    true
                } else {
                    a == b
                }
            }
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b.iter())
                        .all(|(x, y)| x.eq_impl(y, visited))
            }
            (Value::Map(a), Value::Map(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(k, v)| {
                        b.get(k).map(|w| v.eq_impl(w, visited)).unwrap_or(false)
                    })
            }
            (Value::Object(a), Value::Object(b)) => {
                let pair = (Rc::as_ptr(a) as usize, Rc::as_ptr(b) as usize);
                if pair.0 == pair.1 {
                    return true;
                }
                // Already comparing this pair further up the graph: assume
                // equal, the outer comparison settles it.
                if visited.contains(&pair) {
                    return true;
                }
                visited.push(pair);
                let ia = a.borrow();
                let ib = b.borrow();
                let result = ia.class == ib.class
                    && ia.fields.len() == ib.fields.len()
                    && ia.fields.iter().all(|(k, v)| {
                        ib.fields
                            .get(k)
                            .map(|w| v.eq_impl(w, visited))
                            .unwrap_or(false)
                    });
                visited.pop();
                result
            }
            _ => false,
        }
    }
}

/// Structural equality, tolerant of circular graphs
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.eq_impl(other, &mut Vec::new())
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Bool(b) => write!(f, "Bool({})", b),
            Value::Number(n) => write!(f, "Number({})", n),
            Value::String(s) => write!(f, "String({:?})", s),
            Value::Array(items) => f.debug_list().entries(items.iter()).finish(),
            Value::Map(entries) => f.debug_map().entries(entries.iter()).finish(),
            // Class name only: printing fields would recurse through cycles
            Value::Object(obj) => write!(f, "Object(<{}>)", obj.borrow().class),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_get_set() {
        let mut inst = Instance::new("User");
        assert!(inst.get("name").is_null());
        inst.set("name", Value::string("Alice"));
        assert_eq!(inst.get("name").as_str(), Some("Alice"));
    }

    #[test]
    fn test_structural_equality() {
        let a = Value::object("User", vec![("id", Value::Number(1.0))]);
        let b = Value::object("User", vec![("id", Value::Number(1.0))]);
        let c = Value::object("User", vec![("id", Value::Number(2.0))]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_cyclic_equality_terminates() {
        let a = Instance::new("Node").into_ref();
        a.borrow_mut().set("next", Value::Object(a.clone()));
        let b = Instance::new("Node").into_ref();
        b.borrow_mut().set("next", Value::Object(b.clone()));
        assert_eq!(Value::Object(a), Value::Object(b));
    }

    #[test]
    fn test_is_empty() {
        assert!(Value::Null.is_empty());
        assert!(Value::string("").is_empty());
        assert!(Value::Array(vec![]).is_empty());
        assert!(!Value::Number(0.0).is_empty());
        assert!(!Value::string("x").is_empty());
    }
}
