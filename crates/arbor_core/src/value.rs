//! Dynamic values carried through props, state and children
//!
//! Values are the representation of component data that flows between
//! descriptors, hook state and host adapters without requiring concrete types.
//! Data variants compare structurally; elements and callbacks compare by
//! identity, so a freshly built closure is never "equal" to last render's.

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::element::Element;

/// A dynamic value that can represent any prop, state or child
#[derive(Clone, Default)]
pub enum Value {
    /// Null/None value
    #[default]
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value
    Int(i64),
    /// Floating point value
    Float(f64),
    /// String value
    String(String),
    /// Array of values
    Array(Vec<Value>),
    /// Object/map of values
    Object(BTreeMap<String, Value>),
    /// Element descriptor
    Element(Rc<Element>),
    /// Opaque callable, typically an event handler prop
    Callback(Callback),
}

impl Value {
    /// Create a null value
    pub fn null() -> Self {
        Self::Null
    }

    /// Check if value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Try to get as bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get as i64. Floats convert only when they hold a whole number.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    /// Try to get as f64
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Try to get as string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as array
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Try to get as object
    pub fn as_object(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Try to get as element descriptor
    pub fn as_element(&self) -> Option<&Rc<Element>> {
        match self {
            Self::Element(e) => Some(e),
            _ => None,
        }
    }

    /// Try to get as callback
    pub fn as_callback(&self) -> Option<&Callback> {
        match self {
            Self::Callback(c) => Some(c),
            _ => None,
        }
    }

    /// Get a field from an object value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_object()?.get(key)
    }

    /// Text content when this value renders as a text node.
    ///
    /// Strings render verbatim and numbers as their decimal form. Everything
    /// else is not text.
    pub fn text_content(&self) -> Option<String> {
        match self {
            Self::String(s) => Some(s.clone()),
            Self::Int(i) => Some(i.to_string()),
            Self::Float(f) => Some(f.to_string()),
            _ => None,
        }
    }

    /// Short type name used in diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Object(_) => "object",
            Self::Element(_) => "element",
            Self::Callback(_) => "callback",
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => a == b,
            (Self::Element(a), Self::Element(b)) => Rc::ptr_eq(a, b),
            (Self::Callback(a), Self::Callback(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "Null"),
            Self::Bool(b) => write!(f, "Bool({b})"),
            Self::Int(i) => write!(f, "Int({i})"),
            Self::Float(x) => write!(f, "Float({x})"),
            Self::String(s) => write!(f, "String({s:?})"),
            Self::Array(items) => f.debug_list().entries(items).finish(),
            Self::Object(map) => f.debug_map().entries(map).finish(),
            Self::Element(e) => write!(f, "Element(<{}>)", e.type_name()),
            Self::Callback(c) => c.fmt(f),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Int(i) => serializer.serialize_i64(*i),
            Self::Float(x) => serializer.serialize_f64(*x),
            Self::String(s) => serializer.serialize_str(s),
            Self::Array(items) => serializer.collect_seq(items),
            Self::Object(map) => serializer.collect_map(map),
            Self::Element(e) => {
                let mut map = serializer.serialize_map(Some(3))?;
                map.serialize_entry("type", e.type_name())?;
                map.serialize_entry("key", &e.key)?;
                map.serialize_entry("props", &e.props)?;
                map.end()
            }
            Self::Callback(_) => serializer.serialize_str("<callback>"),
        }
    }
}

/// Shared callable stored in props (event handlers and the like)
#[derive(Clone)]
pub struct Callback(Rc<dyn Fn(&Value)>);

impl Callback {
    /// Wrap a closure
    pub fn new(f: impl Fn(&Value) + 'static) -> Self {
        Self(Rc::new(f))
    }

    /// Invoke with an argument
    pub fn call(&self, arg: &Value) {
        (self.0)(arg)
    }

    fn addr(&self) -> *const () {
        Rc::as_ptr(&self.0) as *const ()
    }
}

impl PartialEq for Callback {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.addr(), other.addr())
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Callback({:p})", self.addr())
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Self::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Self::Array(v)
    }
}

impl From<Element> for Value {
    fn from(v: Element) -> Self {
        Self::Element(Rc::new(v))
    }
}

impl From<Rc<Element>> for Value {
    fn from(v: Rc<Element>) -> Self {
        Self::Element(v)
    }
}

impl From<Callback> for Value {
    fn from(v: Callback) -> Self {
        Self::Callback(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Self::Null)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Value {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let map: BTreeMap<String, Value> = iter
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::host;

    #[test]
    fn test_value_types() {
        assert!(Value::null().is_null());
        assert_eq!(Value::from(42).as_int(), Some(42));
        assert_eq!(Value::from(3.0).as_int(), Some(3));
        assert_eq!(Value::from(2.7).as_int(), None);
        assert_eq!(Value::Float(f64::INFINITY).as_int(), None);
        assert_eq!(Value::from(2.5).as_float(), Some(2.5));
        assert_eq!(Value::from("hello").as_str(), Some("hello"));
        assert_eq!(Value::from(None::<i64>), Value::Null);
    }

    #[test]
    fn test_text_content() {
        assert_eq!(Value::from("abc").text_content().as_deref(), Some("abc"));
        assert_eq!(Value::from(7).text_content().as_deref(), Some("7"));
        assert_eq!(Value::from(true).text_content(), None);
        assert_eq!(Value::Null.text_content(), None);
    }

    #[test]
    fn test_nan_is_equal_to_itself() {
        assert_eq!(Value::Float(f64::NAN), Value::Float(f64::NAN));
        assert_ne!(Value::Float(1.0), Value::Int(1));
    }

    #[test]
    fn test_callbacks_compare_by_identity() {
        let a = Callback::new(|_| {});
        let b = Callback::new(|_| {});
        assert_eq!(Value::from(a.clone()), Value::from(a));
        assert_ne!(Value::from(b.clone()), Value::from(Callback::new(|_| {})));
    }

    #[test]
    fn test_elements_compare_by_identity() {
        let el = Value::from(host("div"));
        let same = el.clone();
        assert_eq!(el, same);
        assert_ne!(el, Value::from(host("div")));
    }

    #[test]
    fn test_object_value() {
        let obj: Value = [("x", Value::from(1)), ("y", Value::from(2))]
            .into_iter()
            .collect();

        assert_eq!(obj.get("x").and_then(|v| v.as_int()), Some(1));
        assert!(obj.get("z").is_none());
    }

    #[test]
    fn test_serialize_value() {
        let value = Value::Array(vec![
            Value::from(1),
            Value::from("two"),
            Value::from(Callback::new(|_| {})),
        ]);
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, r#"[1,"two","<callback>"]"#);
    }
}
