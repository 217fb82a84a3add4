use std::sync::Arc;

use proptest::prelude::*;
use serde_json::{Value, json};

use stepgraph::reducers::{
    Accumulate, Append, ChannelError, ChannelRegistry, MergeMap, Reducer, Replace,
};

/********************
 * Strategy basics
 ********************/

#[test]
fn replace_last_write_wins() {
    let merged = Replace.combine(json!("old"), json!("new")).unwrap();
    assert_eq!(merged, json!("new"));
    assert_eq!(Replace.zero(), Value::Null);
}

#[test]
fn append_preserves_invocation_order() {
    let merged = Append.combine(json!(["a", "b"]), json!(["c"])).unwrap();
    assert_eq!(merged, json!(["a", "b", "c"]));
    assert_eq!(Append.zero(), json!([]));
}

#[test]
fn append_rejects_non_arrays() {
    assert!(Append.combine(json!(["a"]), json!("scalar")).is_err());
    assert!(Append.combine(json!({"k": 1}), json!(["a"])).is_err());
}

#[test]
fn merge_map_unions_with_later_write_winning() {
    let merged = MergeMap
        .combine(json!({"a": 1, "b": 2}), json!({"b": 3, "c": 4}))
        .unwrap();
    assert_eq!(merged, json!({"a": 1, "b": 3, "c": 4}));
    assert_eq!(MergeMap.zero(), json!({}));
}

#[test]
fn null_old_value_reads_as_zero() {
    assert_eq!(
        Append.combine(Value::Null, json!(["x"])).unwrap(),
        json!(["x"])
    );
    assert_eq!(
        MergeMap.combine(Value::Null, json!({"k": 1})).unwrap(),
        json!({"k": 1})
    );
    assert_eq!(
        Accumulate.combine(Value::Null, json!([1])).unwrap(),
        json!([1])
    );
}

/********************
 * Registry behavior
 ********************/

#[test]
fn registry_rejects_undeclared_fields() {
    let registry = ChannelRegistry::new().with_channel("known", Arc::new(Replace));
    let err = registry
        .combine("unknown", Value::Null, json!(1))
        .unwrap_err();
    assert!(matches!(err, ChannelError::UnknownField { field } if field == "unknown"));
}

#[test]
fn registry_exposes_zero_values() {
    let registry = ChannelRegistry::new()
        .with_channel("log", Arc::new(Append))
        .with_channel("store", Arc::new(MergeMap));
    assert_eq!(registry.zero("log"), Some(json!([])));
    assert_eq!(registry.zero("store"), Some(json!({})));
    assert_eq!(registry.zero("missing"), None);
}

/*****************************
 * Reducer laws (property)
 *****************************/

fn small_string() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z]{1,6}").unwrap()
}

fn array_value() -> impl Strategy<Value = Value> {
    prop::collection::vec(small_string(), 0..4)
        .prop_map(|items| json!(items))
}

fn map_value() -> impl Strategy<Value = Value> {
    prop::collection::btree_map(small_string(), 0u32..100, 0..4).prop_map(|map| json!(map))
}

fn as_multiset(value: &Value) -> Vec<String> {
    let mut items: Vec<String> = value
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect();
    items.sort();
    items
}

proptest! {
    /// combine is associative for every strategy.
    #[test]
    fn append_is_associative(a in array_value(), b in array_value(), c in array_value()) {
        let left = Append.combine(Append.combine(a.clone(), b.clone()).unwrap(), c.clone()).unwrap();
        let right = Append.combine(a, Append.combine(b, c).unwrap()).unwrap();
        prop_assert_eq!(left, right);
    }

    #[test]
    fn merge_map_is_associative(a in map_value(), b in map_value(), c in map_value()) {
        let left = MergeMap.combine(MergeMap.combine(a.clone(), b.clone()).unwrap(), c.clone()).unwrap();
        let right = MergeMap.combine(a, MergeMap.combine(b, c).unwrap()).unwrap();
        prop_assert_eq!(left, right);
    }

    /// Fan-out channels: the merged result is the same for every permutation
    /// of branch application order.
    #[test]
    fn accumulate_is_permutation_insensitive(
        updates in prop::collection::vec(array_value(), 1..5),
    ) {
        let forward = updates.iter().cloned().try_fold(Accumulate.zero(), |acc, next| {
            Accumulate.combine(acc, next)
        }).unwrap();
        let reverse = updates.iter().rev().cloned().try_fold(Accumulate.zero(), |acc, next| {
            Accumulate.combine(acc, next)
        }).unwrap();
        prop_assert_eq!(as_multiset(&forward), as_multiset(&reverse));
    }

    #[test]
    fn merge_map_disjoint_keys_commute(
        a in prop::collection::btree_map("[a-m]{1,4}", 0u32..100, 0..4),
        b in prop::collection::btree_map("[n-z]{1,4}", 0u32..100, 0..4),
    ) {
        // Disjoint by construction (different key alphabets).
        let ab = MergeMap.combine(json!(a.clone()), json!(b.clone())).unwrap();
        let ba = MergeMap.combine(json!(b), json!(a)).unwrap();
        prop_assert_eq!(ab, ba);
    }
}
