//! Structural containment ("subset match") between JSON values.

use serde_json::{Number, Value};

/// Whether `needle` is structurally contained in `haystack`.
///
/// - Every key of an object needle must exist in the haystack object with a
///   value that is itself a subset match; extra haystack keys are ignored.
/// - Every element of an array needle must match at least one haystack
///   element, regardless of position.
/// - Scalars compare by value, so `"3"` matches `3`.
/// - An empty object needle matches anything.
///
/// Mismatched shapes are simply "no match".
pub fn is_subset(needle: &Value, haystack: &Value) -> bool {
  match (needle, haystack) {
    (Value::Object(n), _) if n.is_empty() => true,
    (Value::Object(n), Value::Object(h)) => n
      .iter()
      .all(|(key, nv)| h.get(key).is_some_and(|hv| is_subset(nv, hv))),
    (Value::Array(n), Value::Array(h)) => n
      .iter()
      .all(|nv| h.iter().any(|hv| is_subset(nv, hv))),
    (Value::Object(_) | Value::Array(_), _)
    | (_, Value::Object(_) | Value::Array(_)) => false,
    (n, h) => scalar_eq(n, h),
  }
}

fn scalar_eq(a: &Value, b: &Value) -> bool {
  match (a, b) {
    (Value::Number(x), Value::Number(y)) => {
      x == y || matches!((x.as_f64(), y.as_f64()), (Some(p), Some(q)) if p == q)
    }
    (Value::Number(n), Value::String(s)) | (Value::String(s), Value::Number(n)) => {
      number_eq_text(n, s)
    }
    _ => a == b,
  }
}

fn number_eq_text(n: &Number, text: &str) -> bool {
  matches!(
    (text.trim().parse::<f64>(), n.as_f64()),
    (Ok(p), Some(q)) if p == q
  )
}

#[cfg(test)]
mod tests {
  use proptest::prelude::*;
  use serde_json::json;

  use super::*;
  use crate::arbitrary;

  proptest! {
    #![proptest_config(ProptestConfig {
      cases: 512,
      ..ProptestConfig::default()
    })]

    #[test]
    fn every_value_contains_itself(value in arbitrary::json()) {
      prop_assert!(is_subset(&value, &value));
    }

    #[test]
    fn empty_needle_matches_anything(haystack in arbitrary::json()) {
      let needle = json!({});
      prop_assert!(is_subset(&needle, &haystack));
    }

    #[test]
    fn extra_haystack_keys_never_break_a_match(
      needle in arbitrary::object_of(arbitrary::json()),
      extra in arbitrary::object_of(arbitrary::json()),
    ) {
      let mut haystack = needle.clone();
      if let (Value::Object(fields), Value::Object(extra)) = (&mut haystack, extra) {
        for (key, value) in extra {
          fields.entry(key).or_insert(value);
        }
      }
      prop_assert!(is_subset(&needle, &haystack));
    }
  }

  #[test]
  fn extra_haystack_keys_do_not_break_a_match() {
    let needle = json!({ "entity": "gojek" });
    let haystack = json!({ "entity": "gojek", "landscape": "id", "env": "prod" });
    assert!(is_subset(&needle, &haystack));
    assert!(!is_subset(&haystack, &needle));
  }

  #[test]
  fn nested_objects_recurse() {
    let haystack = json!({ "a": { "b": { "c": 1, "d": 2 }, "e": 3 } });
    assert!(is_subset(&json!({ "a": { "b": { "c": 1 } } }), &haystack));
    assert!(!is_subset(&json!({ "a": { "b": { "c": 2 } } }), &haystack));
    assert!(!is_subset(&json!({ "a": { "x": 1 } }), &haystack));
  }

  #[test]
  fn array_needle_elements_match_any_position() {
    let haystack = json!({ "tags": [{ "k": "a", "v": 1 }, { "k": "b", "v": 2 }] });
    assert!(is_subset(&json!({ "tags": [{ "k": "b" }] }), &haystack));
    assert!(is_subset(&json!({ "tags": [{ "k": "b" }, { "v": 1 }] }), &haystack));
    assert!(is_subset(&json!({ "tags": [] }), &haystack));
    assert!(!is_subset(&json!({ "tags": [{ "k": "c" }] }), &haystack));
  }

  #[test]
  fn scalars_normalise_numbers_and_strings() {
    assert!(is_subset(&json!({ "n": "3" }), &json!({ "n": 3 })));
    assert!(is_subset(&json!({ "n": 3 }), &json!({ "n": "3.0" })));
    assert!(is_subset(&json!({ "n": 1 }), &json!({ "n": 1.0 })));
    assert!(!is_subset(&json!({ "n": "three" }), &json!({ "n": 3 })));
    assert!(!is_subset(&json!({ "b": "true" }), &json!({ "b": true })));
  }

  #[test]
  fn type_mismatch_is_no_match() {
    assert!(!is_subset(&json!({ "a": { "b": 1 } }), &json!({ "a": 1 })));
    assert!(!is_subset(&json!({ "a": [1] }), &json!({ "a": 1 })));
    assert!(!is_subset(&json!({ "a": 1 }), &json!({ "a": [1] })));
    assert!(!is_subset(&json!({ "a": 1 }), &json!("a")));
  }
}
