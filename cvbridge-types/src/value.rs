//! The host runtime's value model.
//!
//! Values live on the runtime thread. [`HostBuffer`] and [`Function`] are
//! `Rc`-backed, which makes [`Value`] `!Send`: native code cannot hold one.

use std::cell::{Ref, RefCell};
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::marshal::ToDynamic;

/// Field map of a host object. Iterates in insertion order.
pub type Object = IndexMap<String, Value>;

/// A value owned by the host runtime.
#[derive(Clone, Default)]
pub enum Value {
    /// The host's "no value".
    #[default]
    Undefined,
    /// Explicit null.
    Null,
    /// Boolean.
    Bool(bool),
    /// The host's only numeric type.
    Number(f64),
    /// UTF-8 string.
    String(String),
    /// Ordered list.
    Array(Vec<Value>),
    /// Named fields.
    Object(Object),
    /// Runtime-owned mutable bytes.
    Buffer(HostBuffer),
    /// Runtime-owned callable.
    Function(Function),
    /// An error object carrying a message.
    Error(String),
}

impl Value {
    /// Start building an object value.
    pub fn object() -> ObjectBuilder {
        ObjectBuilder::default()
    }

    /// Host type name, as used in binding and marshal errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Object(_) => "object",
            Self::Buffer(_) => "buffer",
            Self::Function(_) => "function",
            Self::Error(_) => "error",
        }
    }

    /// Whether this is an array.
    pub fn is_array(&self) -> bool {
        matches!(self, Self::Array(_))
    }

    /// Whether this is a number.
    pub fn is_number(&self) -> bool {
        matches!(self, Self::Number(_))
    }

    /// The boolean, if this is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The number, if this is one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// The string, if this is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// The elements, if this is an array.
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    /// The fields, if this is an object.
    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Self::Object(fields) => Some(fields),
            _ => None,
        }
    }

    /// Field lookup on an object. `None` for missing fields and non-objects.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.as_object().and_then(|fields| fields.get(field))
    }

    /// A JSON rendering for logs and assertions.
    ///
    /// `undefined` and non-finite numbers become `null`, buffers become
    /// byte arrays, functions become the string `"[function]"` and errors
    /// become `{"error": message}`.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Self::Undefined | Self::Null => Json::Null,
            Self::Bool(b) => Json::Bool(*b),
            Self::Number(n) => serde_json::Number::from_f64(*n)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Self::String(s) => Json::String(s.clone()),
            Self::Array(items) => Json::Array(items.iter().map(Value::to_json).collect()),
            Self::Object(fields) => Json::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Self::Buffer(buf) => Json::Array(buf.borrow().iter().map(|b| Json::from(*b)).collect()),
            Self::Function(_) => Json::String("[function]".into()),
            Self::Error(message) => serde_json::json!({ "error": message }),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("Undefined"),
            Self::Null => f.write_str("Null"),
            Self::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Self::Number(n) => f.debug_tuple("Number").field(n).finish(),
            Self::String(s) => f.debug_tuple("String").field(s).finish(),
            Self::Array(items) => f.debug_tuple("Array").field(items).finish(),
            Self::Object(fields) => f.debug_tuple("Object").field(fields).finish(),
            Self::Buffer(buf) => write!(f, "Buffer(<{} bytes>)", buf.len()),
            Self::Function(_) => f.write_str("Function"),
            Self::Error(message) => f.debug_tuple("Error").field(message).finish(),
        }
    }
}

impl PartialEq for Value {
    /// Structural equality. Buffers compare by contents, functions by identity.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => a == b,
            (Self::Buffer(a), Self::Buffer(b)) => *a.borrow() == *b.borrow(),
            (Self::Function(a), Self::Function(b)) => a.ptr_eq(b),
            (Self::Error(a), Self::Error(b)) => a == b,
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::Array(items)
    }
}

impl From<HostBuffer> for Value {
    fn from(buf: HostBuffer) -> Self {
        Self::Buffer(buf)
    }
}

impl From<Function> for Value {
    fn from(f: Function) -> Self {
        Self::Function(f)
    }
}

/// Bytes owned by the host runtime.
///
/// The host may mutate a buffer after passing it to a call, so binding
/// never keeps a view into it: it copies.
#[derive(Clone, Default)]
pub struct HostBuffer(Rc<RefCell<Vec<u8>>>);

impl HostBuffer {
    /// Wrap bytes as a host buffer.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(Rc::new(RefCell::new(bytes.into())))
    }

    /// Number of bytes.
    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    /// Whether the buffer holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    /// Borrow the contents.
    pub fn borrow(&self) -> Ref<'_, Vec<u8>> {
        self.0.borrow()
    }

    /// Mutate the contents in place, as host code would.
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut Vec<u8>) -> R) -> R {
        f(&mut self.0.borrow_mut())
    }
}

/// A callable owned by the host runtime.
///
/// Return values are ignored; callbacks communicate through their arguments.
#[derive(Clone)]
pub struct Function(Rc<dyn Fn(Vec<Value>)>);

impl Function {
    /// Wrap a closure as a host function.
    pub fn new(f: impl Fn(Vec<Value>) + 'static) -> Self {
        Self(Rc::new(f))
    }

    /// Invoke with the given arguments.
    pub fn call(&self, args: Vec<Value>) {
        (self.0)(args)
    }

    /// Whether both handles refer to the same function.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Function")
    }
}

/// Assigns named fields on a new host object.
#[derive(Debug, Default)]
pub struct ObjectBuilder {
    fields: Object,
}

impl ObjectBuilder {
    /// Set a field, marshaling the native value.
    #[must_use]
    pub fn set(mut self, field: impl Into<String>, value: impl ToDynamic) -> Self {
        self.fields.insert(field.into(), value.to_dynamic());
        self
    }

    /// Finish the object.
    pub fn build(self) -> Value {
        Value::Object(self.fields)
    }
}
