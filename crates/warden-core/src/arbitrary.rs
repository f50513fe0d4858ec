//! Generators for arbitrary JSON documents, used by the property tests.

use proptest::prelude::*;
use serde_json::{Map, Value};

fn scalar() -> impl Strategy<Value = Value> {
  prop_oneof![
    Just(Value::Null),
    any::<bool>().prop_map(Value::Bool),
    any::<i64>().prop_map(Value::from),
    (-1.0e9f64..1.0e9).prop_map(Value::from),
    "[a-z0-9 ]{0,8}".prop_map(Value::String),
  ]
}

/// Any JSON value: scalars, arrays and objects nested a few levels deep.
pub fn json() -> impl Strategy<Value = Value> {
  scalar().prop_recursive(4, 48, 6, |inner| {
    prop_oneof![
      prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
      object_of(inner),
    ]
  })
}

/// A JSON object whose values come from `values`.
pub fn object_of(
  values: impl Strategy<Value = Value>,
) -> impl Strategy<Value = Value> {
  prop::collection::btree_map("[a-z]{1,4}", values, 0..6)
    .prop_map(|fields| Value::Object(fields.into_iter().collect::<Map<_, _>>()))
}
