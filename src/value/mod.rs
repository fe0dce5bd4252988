//! Dynamic values under test
//!
//! `expect` accepts anything convertible into a [`Value`]. The model is
//! JavaScript-shaped: undefined and null, truthiness, object keys. Matchers
//! such as `to_be_undefined` and `to_contain` on object keys are defined
//! against it.

use crate::spy::{Spy, SpyLike};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// Type alias for native function implementations
pub type NativeFn = Rc<dyn Fn(&[Value]) -> std::result::Result<Value, Thrown>>;

/// A callable value: a native closure plus an optional name
#[derive(Clone)]
pub struct Callable {
    name: Option<String>,
    func: NativeFn,
}

impl Callable {
    /// Create an anonymous callable
    pub fn new(func: impl Fn(&[Value]) -> std::result::Result<Value, Thrown> + 'static) -> Self {
        Self {
            name: None,
            func: Rc::new(func),
        }
    }

    /// Create a named callable
    pub fn named(
        name: impl Into<String>,
        func: impl Fn(&[Value]) -> std::result::Result<Value, Thrown> + 'static,
    ) -> Self {
        Self {
            name: Some(name.into()),
            func: Rc::new(func),
        }
    }

    /// The function name, if any
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Invoke the function
    pub fn call(&self, args: &[Value]) -> std::result::Result<Value, Thrown> {
        (self.func)(args)
    }

    /// Whether both handles refer to the same closure
    pub fn same_function(&self, other: &Callable) -> bool {
        std::ptr::addr_eq(Rc::as_ptr(&self.func), Rc::as_ptr(&other.func))
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[Function: {}]", self.name.as_deref().unwrap_or("anonymous"))
    }
}

/// A thrown error value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Thrown {
    /// Error name (`TypeError`, `RangeError`, ...)
    pub name: String,
    /// Error message
    pub message: String,
}

impl Thrown {
    /// Create a thrown error with an explicit name
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create a generic `Error`
    pub fn error(message: impl Into<String>) -> Self {
        Self::new("Error", message)
    }

    /// Create a `TypeError`
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new("TypeError", message)
    }

    /// Create a `RangeError`
    pub fn range_error(message: impl Into<String>) -> Self {
        Self::new("RangeError", message)
    }
}

impl fmt::Display for Thrown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.message)
    }
}

impl std::error::Error for Thrown {}

/// A minimal element: a tag name and a class list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Element {
    tag: String,
    classes: Vec<String>,
}

impl Element {
    /// Create an element without classes
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            classes: Vec::new(),
        }
    }

    /// Add every whitespace-separated class token in `class_list`
    pub fn with_class(mut self, class_list: &str) -> Self {
        for token in class_list.split_whitespace() {
            if !self.has_class(token) {
                self.classes.push(token.to_string());
            }
        }
        self
    }

    /// Tag name
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Class tokens in insertion order
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Class list membership
    pub fn has_class(&self, token: &str) -> bool {
        self.classes.iter().any(|c| c == token)
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.classes.is_empty() {
            write!(f, "<{}>", self.tag)
        } else {
            write!(f, "<{} class=\"{}\">", self.tag, self.classes.join(" "))
        }
    }
}

/// Coarse type of a value, used by `to_be_instance_of`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ValueKind {
    Undefined,
    Null,
    Boolean,
    Number,
    String,
    Array,
    Object,
    Function,
    Spy,
    Element,
    Error,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Undefined => "undefined",
            ValueKind::Null => "null",
            ValueKind::Boolean => "boolean",
            ValueKind::Number => "number",
            ValueKind::String => "string",
            ValueKind::Array => "array",
            ValueKind::Object => "object",
            ValueKind::Function => "function",
            ValueKind::Spy => "spy",
            ValueKind::Element => "element",
            ValueKind::Error => "error",
        };
        write!(f, "{}", name)
    }
}

/// A value under test
#[derive(Clone, Debug, Default)]
pub enum Value {
    /// undefined
    #[default]
    Undefined,
    /// null
    Null,
    /// Boolean value
    Boolean(bool),
    /// Number (IEEE 754 double)
    Number(f64),
    /// String
    String(String),
    /// Ordered list
    Array(Vec<Value>),
    /// Keyed record; keys are kept sorted so equality ignores insertion order
    Object(BTreeMap<String, Value>),
    /// Native function
    Function(Callable),
    /// Call-recording spy
    Spy(Spy),
    /// Element with a class list
    Element(Element),
    /// Thrown error value
    Error(Thrown),
}

impl Value {
    /// Build a named function value
    pub fn function(
        name: impl Into<String>,
        func: impl Fn(&[Value]) -> std::result::Result<Value, Thrown> + 'static,
    ) -> Value {
        Value::Function(Callable::named(name, func))
    }

    /// Coarse type of this value
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Undefined => ValueKind::Undefined,
            Value::Null => ValueKind::Null,
            Value::Boolean(_) => ValueKind::Boolean,
            Value::Number(_) => ValueKind::Number,
            Value::String(_) => ValueKind::String,
            Value::Array(_) => ValueKind::Array,
            Value::Object(_) => ValueKind::Object,
            Value::Function(_) => ValueKind::Function,
            Value::Spy(_) => ValueKind::Spy,
            Value::Element(_) => ValueKind::Element,
            Value::Error(_) => ValueKind::Error,
        }
    }

    /// Check if value is undefined
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Check if value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Convert to boolean (truthiness)
    pub fn to_boolean(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Boolean(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// Convert to number
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Boolean(true) => 1.0,
            Value::Boolean(false) => 0.0,
            Value::Number(n) => *n,
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse().unwrap_or(f64::NAN)
                }
            }
            Value::Array(items) => match items.as_slice() {
                [] => 0.0,
                [single] => single.to_number(),
                _ => f64::NAN,
            },
            _ => f64::NAN,
        }
    }

    /// The spy capability of this value, if it has one
    pub fn as_spy(&self) -> Option<&dyn SpyLike> {
        match self {
            Value::Spy(spy) => Some(spy),
            _ => None,
        }
    }

    /// A callable view of this value (functions and spies)
    pub fn as_callable(&self) -> Option<Callable> {
        match self {
            Value::Function(func) => Some(func.clone()),
            Value::Spy(spy) => Some(spy.as_callable()),
            _ => None,
        }
    }

    /// Object keys in the `Object.keys` sense
    ///
    /// Arrays and strings yield their indices; objects yield their keys;
    /// everything else has none.
    pub fn keys(&self) -> Vec<String> {
        match self {
            Value::Array(items) => (0..items.len()).map(|i| i.to_string()).collect(),
            Value::String(s) => (0..s.chars().count()).map(|i| i.to_string()).collect(),
            Value::Object(map) => map.keys().cloned().collect(),
            _ => Vec::new(),
        }
    }

    /// Strict equality (===)
    ///
    /// Arrays and objects are owned values without identity, so they
    /// compare structurally; functions and spies compare by handle.
    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Array(_), Value::Array(_)) | (Value::Object(_), Value::Object(_)) => {
                self.deep_equals(other)
            }
            _ => self.shallow_equals(other),
        }
    }

    /// Deep structural equality
    ///
    /// Object key order never matters; NaN equals NaN.
    pub fn deep_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.deep_equals(y))
            }
            (Value::Object(a), Value::Object(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(key, x)| b.get(key).is_some_and(|y| x.deep_equals(y)))
            }
            _ => self.shallow_equals(other),
        }
    }

    fn shallow_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => a.same_function(b),
            (Value::Spy(a), Value::Spy(b)) => a.same_spy(b),
            (Value::Element(a), Value::Element(b)) => a == b,
            (Value::Error(a), Value::Error(b)) => a == b,
            _ => false,
        }
    }

    /// Canonical serialized form
    ///
    /// Non-finite numbers and undefined become `null`, functions and spies
    /// become their bracketed names, the same way `JSON.stringify` flattens
    /// what it cannot represent.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Value::Undefined | Value::Null => Json::Null,
            Value::Boolean(b) => Json::Bool(*b),
            Value::Number(n) => number_to_json(*n),
            Value::String(s) => Json::String(s.clone()),
            Value::Array(items) => Json::Array(items.iter().map(Value::to_json).collect()),
            Value::Object(map) => Json::Object(
                map.iter()
                    .map(|(key, value)| (key.clone(), value.to_json()))
                    .collect(),
            ),
            Value::Function(func) => Json::String(format!("{:?}", func)),
            Value::Spy(spy) => Json::String(format!(
                "[Spy: {}]",
                spy.spy_name().unwrap_or_else(|| "anonymous".to_string())
            )),
            Value::Element(el) => Json::String(el.to_string()),
            Value::Error(thrown) => serde_json::json!({
                "name": thrown.name,
                "message": thrown.message,
            }),
        }
    }
}

fn number_to_json(n: f64) -> serde_json::Value {
    if n.fract() == 0.0 && n.abs() < 9.007_199_254_740_992e15 {
        serde_json::Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null)
    }
}

fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 {
            "Infinity".to_string()
        } else {
            "-Infinity".to_string()
        }
    } else if n == 0.0 {
        "0".to_string()
    } else {
        format!("{}", n)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.deep_equals(other)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            Value::String(s) => write!(f, "{}", s),
            Value::Array(_) | Value::Object(_) => write!(f, "{}", self.to_json()),
            Value::Function(func) => write!(f, "{}", func.name().unwrap_or("anonymous")),
            Value::Spy(spy) => write!(
                f,
                "{}",
                spy.spy_name().unwrap_or_else(|| "spy".to_string())
            ),
            Value::Element(el) => write!(f, "{}", el),
            Value::Error(thrown) => write!(f, "{}", thrown),
        }
    }
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

macro_rules! impl_from_number {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(n: $ty) -> Self {
                    Value::Number(n as f64)
                }
            }
        )*
    };
}

impl_from_number!(f64, f32, i8, i16, i32, i64, u8, u16, u32, u64, usize, isize);

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Undefined
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&String> for Value {
    fn from(s: &String) -> Self {
        Value::String(s.clone())
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for Value {
    fn from(items: [T; N]) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map(Into::into).unwrap_or(Value::Undefined)
    }
}

impl<V: Into<Value>> From<BTreeMap<String, V>> for Value {
    fn from(map: BTreeMap<String, V>) -> Self {
        Value::Object(map.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl From<Callable> for Value {
    fn from(func: Callable) -> Self {
        Value::Function(func)
    }
}

impl From<Spy> for Value {
    fn from(spy: Spy) -> Self {
        Value::Spy(spy)
    }
}

impl From<&Spy> for Value {
    fn from(spy: &Spy) -> Self {
        Value::Spy(spy.clone())
    }
}

impl From<Element> for Value {
    fn from(el: Element) -> Self {
        Value::Element(el)
    }
}

impl From<Thrown> for Value {
    fn from(thrown: Thrown) -> Self {
        Value::Error(thrown)
    }
}

impl From<&Value> for Value {
    fn from(value: &Value) -> Self {
        value.clone()
    }
}

/// Build an argument list: `args![1, "a", true]`
#[macro_export]
macro_rules! args {
    () => { ::std::vec::Vec::<$crate::Value>::new() };
    ($($arg:expr),+ $(,)?) => {
        ::std::vec![$($crate::Value::from($arg)),+]
    };
}

/// Build an object value: `obj! { "a" => 1, "b" => "two" }`
#[macro_export]
macro_rules! obj {
    () => { $crate::Value::Object(::std::collections::BTreeMap::new()) };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = ::std::collections::BTreeMap::new();
        $( map.insert(::std::string::String::from($key), $crate::Value::from($value)); )+
        $crate::Value::Object(map)
    }};
}
