//! Cross-cutting structural invariants from spec.md §8 that apply to the
//! value model independent of any one dialect.

use pretty_assertions::assert_eq;

use weave::value::Value;

fn seq(n: i64) -> Value {
    Value::from((0..n).map(|i| Value::from(i as f64)).collect::<Vec<_>>())
}

#[test]
fn full_slice_iterates_every_element() {
    for n in [0, 1, 5, 8] {
        let v = seq(n);
        let sliced = v.slice(None, None).unwrap();
        assert_eq!(sliced.size().unwrap(), v.size().unwrap());
        assert!(sliced.equal(&v));
    }
}

#[test]
fn negative_index_slice_matches_equivalent_positive_slice() {
    let v = seq(6);
    for k in 0..=6 {
        let a = v.slice(Some(-k), None).unwrap();
        let b = v.slice(Some(6 - k), None).unwrap();
        assert!(a.equal(&b), "k={k}: {a:?} != {b:?}");
    }
}

#[test]
fn slice_out_of_order_range_is_an_error() {
    let v = seq(4);
    assert!(v.slice(Some(3), Some(1)).is_err());
}

#[test]
fn mapping_preserves_insertion_order_through_iteration() {
    let mut map = indexmap::IndexMap::new();
    map.insert("z".to_string(), Value::from(1.0));
    map.insert("a".to_string(), Value::from(2.0));
    map.insert("m".to_string(), Value::from(3.0));
    let v = Value::from(map);
    let keys: Vec<String> = weave::value::ValueIter::pairs(&v)
        .into_iter()
        .map(|(k, _)| k.to_string_lossy().into_owned())
        .collect();
    assert_eq!(keys, vec!["z", "a", "m"]);
}
