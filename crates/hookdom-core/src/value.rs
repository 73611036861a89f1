//! Dynamic prop values and the identity-aware equality used across the runtime.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

/// Ordered plain mapping, used for `style` and other nested prop tables.
pub type ValueMap = IndexMap<Rc<str>, Value>;

/// A dynamic prop value.
///
/// Scalars compare by value. Lists, maps, handlers and objects are shared and
/// compare by pointer identity, so rebuilding one every render counts as a change.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Str(Rc<str>),
    List(Rc<[Value]>),
    Map(Rc<ValueMap>),
    Handler(EventHandler),
    Object(Rc<dyn Any>),
}

impl Value {
    pub fn object<T: 'static>(value: T) -> Self {
        Value::Object(Rc::new(value))
    }

    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        Value::List(items.into_iter().collect())
    }

    pub fn map(entries: impl IntoIterator<Item = (Rc<str>, Value)>) -> Self {
        Value::Map(Rc::new(entries.into_iter().collect()))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&ValueMap> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_handler(&self) -> Option<&EventHandler> {
        match self {
            Value::Handler(handler) => Some(handler),
            _ => None,
        }
    }

    pub fn downcast<T: 'static>(&self) -> Option<Rc<T>> {
        match self {
            Value::Object(object) => Rc::clone(object).downcast::<T>().ok(),
            _ => None,
        }
    }

    /// String form written to a host attribute, or `None` when the value has no
    /// attribute representation (null, collections, handlers, objects).
    pub fn to_attribute(&self) -> Option<String> {
        match self {
            Value::Bool(b) => Some(b.to_string()),
            Value::Number(n) => Some(format_number(*n)),
            Value::Str(s) => Some(s.to_string()),
            Value::Null | Value::List(_) | Value::Map(_) | Value::Handler(_) | Value::Object(_) => {
                None
            }
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Handler(_) => "handler",
            Value::Object(_) => "object",
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Number(n) => write!(f, "Number({})", format_number(*n)),
            Value::Str(s) => write!(f, "Str({s:?})"),
            Value::List(items) => f.debug_list().entries(items.iter()).finish(),
            Value::Map(map) => f.debug_map().entries(map.iter()).finish(),
            Value::Handler(handler) => write!(f, "Handler({:p})", handler.as_ptr()),
            Value::Object(object) => write!(f, "Object({:p})", Rc::as_ptr(object) as *const ()),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

macro_rules! number_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::Number(value as f64)
                }
            }
        )*
    };
}

number_from!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64);

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(Rc::from(value))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(Rc::from(value))
    }
}

impl From<Rc<str>> for Value {
    fn from(value: Rc<str>) -> Self {
        Value::Str(value)
    }
}

impl From<EventHandler> for Value {
    fn from(value: EventHandler) -> Self {
        Value::Handler(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::List(value.into())
    }
}

impl From<ValueMap> for Value {
    fn from(value: ValueMap) -> Self {
        Value::Map(Rc::new(value))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Null
    }
}

/// Payload handed to event handlers. Hosts decide what goes into `detail`.
#[derive(Clone, Debug)]
pub struct Event {
    pub name: Rc<str>,
    pub detail: Value,
}

impl Event {
    pub fn new(name: impl Into<Rc<str>>, detail: Value) -> Self {
        Self {
            name: name.into(),
            detail,
        }
    }
}

/// Shared event callback. Two handlers are equal only if they are the same allocation.
#[derive(Clone)]
pub struct EventHandler(Rc<dyn Fn(&Event)>);

impl EventHandler {
    pub fn new(handler: impl Fn(&Event) + 'static) -> Self {
        Self(Rc::new(handler))
    }

    pub fn call(&self, event: &Event) {
        (self.0)(event)
    }

    pub fn ptr_eq(&self, other: &EventHandler) -> bool {
        self.as_ptr() == other.as_ptr()
    }

    fn as_ptr(&self) -> *const () {
        Rc::as_ptr(&self.0) as *const ()
    }
}

impl PartialEq for EventHandler {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventHandler({:p})", self.as_ptr())
    }
}

/// `Object.is`-style equality: values for scalars, identity for shared data.
///
/// Floats treat `NaN` as equal to itself and distinguish `+0.0` from `-0.0`.
pub trait SameValue {
    fn same_value(&self, other: &Self) -> bool;
}

pub fn same_f64(a: f64, b: f64) -> bool {
    if a.is_nan() && b.is_nan() {
        return true;
    }
    a == b && a.is_sign_negative() == b.is_sign_negative()
}

impl SameValue for f64 {
    fn same_value(&self, other: &Self) -> bool {
        same_f64(*self, *other)
    }
}

impl SameValue for f32 {
    fn same_value(&self, other: &Self) -> bool {
        same_f64(f64::from(*self), f64::from(*other))
    }
}

macro_rules! same_value_by_eq {
    ($($ty:ty),*) => {
        $(
            impl SameValue for $ty {
                fn same_value(&self, other: &Self) -> bool {
                    self == other
                }
            }
        )*
    };
}

same_value_by_eq!(
    (),
    bool,
    char,
    i8,
    i16,
    i32,
    i64,
    i128,
    isize,
    u8,
    u16,
    u32,
    u64,
    u128,
    usize,
    String,
    &'static str
);

impl<T: ?Sized> SameValue for Rc<T> {
    fn same_value(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Rc::as_ptr(self), Rc::as_ptr(other))
    }
}

impl<T: SameValue> SameValue for Option<T> {
    fn same_value(&self, other: &Self) -> bool {
        match (self, other) {
            (Some(a), Some(b)) => a.same_value(b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl<T: SameValue> SameValue for Vec<T> {
    fn same_value(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().zip(other).all(|(a, b)| a.same_value(b))
    }
}

impl<A: SameValue, B: SameValue> SameValue for (A, B) {
    fn same_value(&self, other: &Self) -> bool {
        self.0.same_value(&other.0) && self.1.same_value(&other.1)
    }
}

impl SameValue for EventHandler {
    fn same_value(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl SameValue for Value {
    fn same_value(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => same_f64(*a, *b),
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b)),
            (Value::Map(a), Value::Map(b)) => Rc::ptr_eq(a, b),
            (Value::Handler(a), Value::Handler(b)) => a.ptr_eq(b),
            (Value::Object(a), Value::Object(b)) => std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b)),
            _ => false,
        }
    }
}

/// Formats a number the way a script host would print it: integral values
/// have no fractional part and `-0` prints as `0`.
pub fn format_number(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_owned();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_owned();
    }
    if value == 0.0 {
        return "0".to_owned();
    }
    if value.fract() == 0.0 && value.abs() < 1e21 {
        return format!("{value:.0}");
    }
    format!("{value}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_follow_object_is() {
        assert!(Value::Number(f64::NAN).same_value(&Value::Number(f64::NAN)));
        assert!(!Value::Number(0.0).same_value(&Value::Number(-0.0)));
        assert!(Value::Number(1.5).same_value(&Value::Number(1.5)));
        assert!(f64::NAN.same_value(&f64::NAN));
    }

    #[test]
    fn shared_values_compare_by_identity() {
        let list = Value::list([Value::from(1), Value::from(2)]);
        let same = list.clone();
        let rebuilt = Value::list([Value::from(1), Value::from(2)]);
        assert!(list.same_value(&same));
        assert!(!list.same_value(&rebuilt));

        let handler = EventHandler::new(|_| {});
        let other = EventHandler::new(|_| {});
        assert!(Value::from(handler.clone()).same_value(&Value::from(handler.clone())));
        assert!(!Value::from(handler).same_value(&Value::from(other)));
    }

    #[test]
    fn strings_compare_by_content() {
        assert!(Value::from("a").same_value(&Value::from(String::from("a"))));
        assert!(!Value::from("a").same_value(&Value::from("b")));
        assert!(!Value::from("1").same_value(&Value::from(1)));
    }

    #[test]
    fn number_formatting_matches_script_hosts() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(2.5), "2.5");
        assert_eq!(format_number(f64::NAN), "NaN");
        assert_eq!(format_number(f64::NEG_INFINITY), "-Infinity");
    }

    #[test]
    fn objects_downcast_to_their_type() {
        let value = Value::object(vec![1u32, 2, 3]);
        assert_eq!(value.downcast::<Vec<u32>>().map(|v| v.len()), Some(3));
        assert!(value.downcast::<String>().is_none());
        assert_eq!(value.to_attribute(), None);
    }
}
