//! `begin()`/`end()`: the forward iterator over a value's contained values.

use super::Value;
use std::rc::Rc;
use std::vec::IntoIter as VecIter;

/// Iterates a value's contents in the adapter's natural order: insertion
/// order for mappings (keys), element order for sequences, and a single
/// pass yielding the whole string for atomic strings.
pub struct ValueIter {
    inner: Inner,
}

enum Inner {
    Sequence(VecIter<Value>),
    MappingKeys(VecIter<Value>),
    Once(Option<Value>),
    Empty,
}

impl ValueIter {
    pub(super) fn new(value: &Value) -> Self {
        let inner = match value {
            Value::Sequence(items) => Inner::Sequence((*items).clone().into_iter()),
            Value::Mapping(map) => {
                let keys: Vec<Value> = map.keys().map(|k| Value::from(k.as_str())).collect();
                Inner::MappingKeys(keys.into_iter())
            }
            Value::String(s) => Inner::Once(Some(Value::String(Rc::clone(s)))),
            Value::None => Inner::Empty,
            other => Inner::Once(Some(other.clone())),
        };
        ValueIter { inner }
    }

    /// Iterates mapping entries as `(key, value)` pairs rather than bare keys.
    pub fn pairs(value: &Value) -> Vec<(Value, Value)> {
        match value {
            Value::Mapping(map) => map
                .iter()
                .map(|(k, v)| (Value::from(k.as_str()), v.clone()))
                .collect(),
            Value::Sequence(items) => items
                .iter()
                .enumerate()
                .map(|(i, v)| (Value::from(i), v.clone()))
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl Iterator for ValueIter {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        match &mut self.inner {
            Inner::Sequence(it) => it.next(),
            Inner::MappingKeys(it) => it.next(),
            Inner::Once(slot) => slot.take(),
            Inner::Empty => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    #[test]
    fn string_iteration_yields_single_element() {
        let v = Value::from("hello");
        let items: Vec<_> = v.iter().collect();
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn mapping_iteration_preserves_insertion_order() {
        let mut map = IndexMap::new();
        map.insert("b".to_string(), Value::from(1.0));
        map.insert("a".to_string(), Value::from(2.0));
        let v = Value::from(map);
        let keys: Vec<String> = v.iter().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn sequence_distance_equals_size() {
        let v = Value::from(vec![Value::from(1.0), Value::from(2.0), Value::from(3.0)]);
        assert_eq!(v.iter().count(), v.size().unwrap());
    }
}
