//! Dynamic values
//!
//! Everything that flows through a dispatched call (receivers, arguments,
//! return values, install options) is a [`Value`]. Heap values are
//! reference-counted, so cloning a value never copies an object.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::object::{ClassId, ObjectRef};

/// A dynamically typed value
#[derive(Clone, Debug, Default)]
pub enum Value {
    /// Absent value
    #[default]
    Null,
    /// Boolean
    Bool(bool),
    /// 64-bit signed integer
    Int(i64),
    /// 64-bit float
    Float(f64),
    /// Immutable string
    Str(Arc<str>),
    /// Interned-style identifier (`:chunky_bacon`)
    Symbol(Arc<str>),
    /// Ordered sequence
    Array(Arc<Vec<Value>>),
    /// String-keyed map
    Map(Arc<BTreeMap<String, Value>>),
    /// Object instance
    Object(ObjectRef),
    /// A class, used as the receiver for static dispatch
    Class(ClassId),
    /// An exception object
    Exception(Exception),
}

impl Value {
    /// Create a string value
    pub fn str(s: impl AsRef<str>) -> Self {
        Value::Str(Arc::from(s.as_ref()))
    }

    /// Create a symbol value
    pub fn symbol(s: impl AsRef<str>) -> Self {
        Value::Symbol(Arc::from(s.as_ref()))
    }

    /// Create an array value
    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Arc::new(items))
    }

    /// Check if this is `Null`
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get as bool if this is a `Bool`
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get as i64 if this is an `Int`
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Get as f64; integers are widened
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Get the text of a `Str` or `Symbol`
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) | Value::Symbol(s) => Some(s),
            _ => None,
        }
    }

    /// Get the object if this is an `Object`
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Get the exception if this is an `Exception`
    pub fn as_exception(&self) -> Option<&Exception> {
        match self {
            Value::Exception(e) => Some(e),
            _ => None,
        }
    }

    /// Short name of the value's type, used in diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Symbol(_) => "symbol",
            Value::Array(_) => "array",
            Value::Map(_) => "map",
            Value::Object(_) => "object",
            Value::Class(_) => "class",
            Value::Exception(_) => "exception",
        }
    }

    /// Debug rendering: strings are quoted, symbols get a leading colon
    pub fn inspect(&self) -> String {
        match self {
            Value::Str(s) => format!("{:?}", s),
            Value::Symbol(s) => format!(":{}", s),
            Value::Array(items) => {
                let parts: Vec<String> = items.iter().map(Value::inspect).collect();
                format!("[{}]", parts.join(", "))
            }
            Value::Map(entries) => {
                let parts: Vec<String> = entries
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k, v.inspect()))
                    .collect();
                format!("{{{}}}", parts.join(", "))
            }
            Value::Exception(e) => format!("#<{}: {}>", e.kind(), e.message()),
            other => other.to_string(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            (Value::Class(a), Value::Class(b)) => a == b,
            (Value::Exception(a), Value::Exception(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) | Value::Symbol(s) => f.write_str(s),
            Value::Array(_) | Value::Map(_) => f.write_str(&self.inspect()),
            Value::Object(obj) => write!(f, "#<object of class {}>", obj.class_id().index()),
            Value::Class(id) => write!(f, "#<class {}>", id.index()),
            Value::Exception(e) => f.write_str(e.message()),
        }
    }
}

// ============================================================================
// Conversions
// ============================================================================

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::str(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Arc::from(s))
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Null
    }
}

impl From<Exception> for Value {
    fn from(e: Exception) -> Self {
        Value::Exception(e)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::from(s),
            serde_json::Value::Array(items) => {
                Value::array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(entries) => Value::Map(Arc::new(
                entries.into_iter().map(|(k, v)| (k, Value::from(v))).collect(),
            )),
        }
    }
}

// ============================================================================
// Exceptions
// ============================================================================

#[derive(Debug)]
struct ExceptionData {
    kind: String,
    message: String,
}

/// A raised exception.
///
/// Clones share identity, so an exception re-raised through any number of
/// interception layers is still [`ptr_eq`](Exception::ptr_eq) to the original.
#[derive(Clone)]
pub struct Exception(Arc<ExceptionData>);

impl Exception {
    /// Create an exception of the given kind
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Exception(Arc::new(ExceptionData {
            kind: kind.into(),
            message: message.into(),
        }))
    }

    /// Create a `RuntimeError`
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::new("RuntimeError", message)
    }

    /// Exception kind (class name)
    pub fn kind(&self) -> &str {
        &self.0.kind
    }

    /// Exception message
    pub fn message(&self) -> &str {
        &self.0.message
    }

    /// Identity comparison
    pub fn ptr_eq(&self, other: &Exception) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Exception")
            .field("kind", &self.0.kind)
            .field("message", &self.0.message)
            .finish()
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.message)
    }
}

impl std::error::Error for Exception {}
