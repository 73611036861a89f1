//! Shallow and deep equality over [`Value`]s and prop sets.

use std::rc::Rc;

use crate::value::{SameValue, Value};
use crate::vnode::Props;

/// One-level comparison: identical values are equal, and lists or maps are
/// equal when they have the same length (or key set) and same-valued entries.
pub fn shallow_equals(a: &Value, b: &Value) -> bool {
    if a.same_value(b) {
        return true;
    }
    match (a, b) {
        (Value::List(a), Value::List(b)) => shallow_equals_values(a, b),
        (Value::Map(a), Value::Map(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(key, value)| b.get(key).is_some_and(|other| value.same_value(other)))
        }
        _ => false,
    }
}

/// Recursive comparison of lists and maps; anything else falls back to `same_value`.
pub fn deep_equals(a: &Value, b: &Value) -> bool {
    if a.same_value(b) {
        return true;
    }
    match (a, b) {
        (Value::List(a), Value::List(b)) => {
            a.len() == b.len() && a.iter().zip(b.iter()).all(|(a, b)| deep_equals(a, b))
        }
        (Value::Map(a), Value::Map(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(key, value)| b.get(key).is_some_and(|other| deep_equals(value, other)))
        }
        _ => false,
    }
}

/// Element-wise `same_value` over two slices, used for dependency lists.
pub fn shallow_equals_values(a: &[Value], b: &[Value]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(a, b)| a.same_value(b))
}

/// Default memo comparison: same prop names with same-valued entries, and the
/// very same children list.
pub fn shallow_equals_props(prev: &Props, next: &Props) -> bool {
    let children_equal = match (prev.children_rc(), next.children_rc()) {
        (None, None) => true,
        (Some(a), Some(b)) => Rc::ptr_eq(a, b) || (a.is_empty() && b.is_empty()),
        _ => false,
    };
    children_equal
        && prev.len() == next.len()
        && prev
            .iter()
            .all(|(name, value)| next.get(name).is_some_and(|other| value.same_value(other)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::props;

    #[test]
    fn shallow_compares_one_level() {
        let a = Value::list([Value::from(1), Value::from("x")]);
        let b = Value::list([Value::from(1), Value::from("x")]);
        assert!(shallow_equals(&a, &b));

        let nested_a = Value::list([Value::list([Value::from(1)])]);
        let nested_b = Value::list([Value::list([Value::from(1)])]);
        assert!(!shallow_equals(&nested_a, &nested_b));
        assert!(deep_equals(&nested_a, &nested_b));
    }

    #[test]
    fn maps_compare_by_key_set() {
        let a = Value::map([(Rc::from("a"), Value::from(1)), (Rc::from("b"), Value::from(2))]);
        let b = Value::map([(Rc::from("b"), Value::from(2)), (Rc::from("a"), Value::from(1))]);
        let c = Value::map([(Rc::from("a"), Value::from(1))]);
        assert!(shallow_equals(&a, &b));
        assert!(!shallow_equals(&a, &c));
        assert!(!shallow_equals(&a, &Value::list([])));
    }

    #[test]
    fn dependency_lists_use_same_value() {
        assert!(shallow_equals_values(&[Value::from(f64::NAN)], &[Value::from(f64::NAN)]));
        assert!(!shallow_equals_values(&[Value::from(0.0)], &[Value::from(-0.0)]));
        assert!(!shallow_equals_values(&[Value::from(1)], &[]));
    }

    #[test]
    fn props_compare_shallowly() {
        let a = Props::from_map(props! { "label" => "hi", "count" => 2 });
        let b = Props::from_map(props! { "count" => 2, "label" => "hi" });
        let c = Props::from_map(props! { "label" => "hi" });
        assert!(shallow_equals_props(&a, &b));
        assert!(!shallow_equals_props(&a, &c));
    }
}
