//! Structural diff over arbitrary JSON trees.
//!
//! [`diff`] walks two values in parallel and emits one [`DiffOp`] per changed
//! scalar or array slot. The serialised form of an operation is the one the
//! activity log has always persisted:
//!
//! ```json
//! {"kind":"E","path":["metadata","team"],"lhs":"a","rhs":"b"}
//! {"kind":"A","path":["tags"],"index":2,"item":{"kind":"N","rhs":"x"}}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ─── Path ────────────────────────────────────────────────────────────────────

/// One step into a JSON tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
  Index(usize),
  Key(String),
}

impl From<&str> for PathSegment {
  fn from(key: &str) -> Self { Self::Key(key.to_owned()) }
}

impl From<usize> for PathSegment {
  fn from(index: usize) -> Self { Self::Index(index) }
}

// ─── Operations ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffKind {
  Added,
  Edited,
  Removed,
  ArrayIndexChange,
}

/// The element-level change carried by [`DiffOp::ArrayIndexChange`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ArrayItem {
  #[serde(rename = "N")]
  Added { rhs: Value },
  #[serde(rename = "D")]
  Removed { lhs: Value },
}

/// A single field-level difference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum DiffOp {
  #[serde(rename = "N")]
  Added {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    path: Vec<PathSegment>,
    rhs:  Value,
  },
  #[serde(rename = "E")]
  Edited {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    path: Vec<PathSegment>,
    lhs:  Value,
    rhs:  Value,
  },
  #[serde(rename = "D")]
  Removed {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    path: Vec<PathSegment>,
    lhs:  Value,
  },
  /// An array grew or shrank; `path` locates the array, `index` the element.
  #[serde(rename = "A")]
  ArrayIndexChange {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    path:  Vec<PathSegment>,
    index: usize,
    item:  ArrayItem,
  },
}

impl DiffOp {
  pub fn kind(&self) -> DiffKind {
    match self {
      Self::Added { .. } => DiffKind::Added,
      Self::Edited { .. } => DiffKind::Edited,
      Self::Removed { .. } => DiffKind::Removed,
      Self::ArrayIndexChange { .. } => DiffKind::ArrayIndexChange,
    }
  }

  pub fn path(&self) -> &[PathSegment] {
    match self {
      Self::Added { path, .. }
      | Self::Edited { path, .. }
      | Self::Removed { path, .. }
      | Self::ArrayIndexChange { path, .. } => path,
    }
  }

  /// The value before the change; `None` for additions.
  pub fn before(&self) -> Option<&Value> {
    match self {
      Self::Edited { lhs, .. } | Self::Removed { lhs, .. } => Some(lhs),
      Self::ArrayIndexChange { item: ArrayItem::Removed { lhs }, .. } => {
        Some(lhs)
      }
      _ => None,
    }
  }

  /// The value after the change; `None` for removals.
  pub fn after(&self) -> Option<&Value> {
    match self {
      Self::Added { rhs, .. } | Self::Edited { rhs, .. } => Some(rhs),
      Self::ArrayIndexChange { item: ArrayItem::Added { rhs }, .. } => Some(rhs),
      _ => None,
    }
  }
}

// ─── Diff ────────────────────────────────────────────────────────────────────

/// Compute the differences turning `before` into `after`.
///
/// Object fields named in `exclude` are skipped at every depth. Object keys
/// are visited as `before`'s keys followed by keys only `after` has; array
/// slots are visited by ascending index.
pub fn diff(before: &Value, after: &Value, exclude: &[&str]) -> Vec<DiffOp> {
  let mut ops = Vec::new();
  let mut path = Vec::new();
  walk(Some(before), Some(after), &mut path, exclude, &mut ops);
  ops
}

fn walk(
  lhs: Option<&Value>,
  rhs: Option<&Value>,
  path: &mut Vec<PathSegment>,
  exclude: &[&str],
  ops: &mut Vec<DiffOp>,
) {
  match (lhs, rhs) {
    (None, None) => {}
    (None, Some(rhs)) => ops.push(DiffOp::Added {
      path: path.clone(),
      rhs:  rhs.clone(),
    }),
    (Some(lhs), None) => ops.push(DiffOp::Removed {
      path: path.clone(),
      lhs:  lhs.clone(),
    }),
    (Some(Value::Object(lhs)), Some(Value::Object(rhs))) => {
      let keys = lhs
        .keys()
        .chain(rhs.keys().filter(|key| !lhs.contains_key(*key)));
      for key in keys {
        if exclude.iter().any(|field| *field == key.as_str()) {
          continue;
        }
        path.push(PathSegment::Key(key.clone()));
        walk(lhs.get(key), rhs.get(key), path, exclude, ops);
        path.pop();
      }
    }
    (Some(Value::Array(lhs)), Some(Value::Array(rhs))) => {
      for index in 0..lhs.len().max(rhs.len()) {
        match (lhs.get(index), rhs.get(index)) {
          (Some(a), Some(b)) => {
            path.push(PathSegment::Index(index));
            walk(Some(a), Some(b), path, exclude, ops);
            path.pop();
          }
          (None, Some(b)) => ops.push(DiffOp::ArrayIndexChange {
            path: path.clone(),
            index,
            item: ArrayItem::Added { rhs: b.clone() },
          }),
          (Some(a), None) => ops.push(DiffOp::ArrayIndexChange {
            path: path.clone(),
            index,
            item: ArrayItem::Removed { lhs: a.clone() },
          }),
          (None, None) => {}
        }
      }
    }
    (Some(lhs), Some(rhs)) => {
      if lhs != rhs {
        ops.push(DiffOp::Edited {
          path: path.clone(),
          lhs:  lhs.clone(),
          rhs:  rhs.clone(),
        });
      }
    }
  }
}

// ─── Apply ───────────────────────────────────────────────────────────────────

/// Apply one operation to `target`, creating intermediate containers as
/// needed. Applying every operation of `diff(a, b)` to `a` in order yields `b`.
pub fn apply(target: &mut Value, op: &DiffOp) {
  match op {
    DiffOp::Added { path, rhs } | DiffOp::Edited { path, rhs, .. } => {
      *node_mut(target, path) = rhs.clone();
    }
    DiffOp::Removed { path, .. } => remove_at(target, path),
    DiffOp::ArrayIndexChange { path, index, item } => {
      let node = node_mut(target, path);
      if !node.is_array() {
        *node = Value::Array(Vec::new());
      }
      let Some(items) = node.as_array_mut() else { return };
      match item {
        ArrayItem::Added { rhs } => {
          if items.len() <= *index {
            items.resize(index + 1, Value::Null);
          }
          items[*index] = rhs.clone();
        }
        // Shrinks only ever drop the tail.
        ArrayItem::Removed { .. } => items.truncate(*index),
      }
    }
  }
}

fn node_mut<'a>(target: &'a mut Value, path: &[PathSegment]) -> &'a mut Value {
  path.iter().fold(target, child_mut)
}

fn child_mut<'a>(node: &'a mut Value, segment: &PathSegment) -> &'a mut Value {
  match segment {
    PathSegment::Key(key) => {
      if !node.is_object() {
        *node = Value::Object(Map::new());
      }
      match node {
        Value::Object(map) => map.entry(key.clone()).or_insert(Value::Null),
        other => other,
      }
    }
    PathSegment::Index(index) => {
      if !node.is_array() {
        *node = Value::Array(Vec::new());
      }
      match node {
        Value::Array(items) => {
          if items.len() <= *index {
            items.resize(index + 1, Value::Null);
          }
          &mut items[*index]
        }
        other => other,
      }
    }
  }
}

fn remove_at(target: &mut Value, path: &[PathSegment]) {
  let Some((last, parents)) = path.split_last() else {
    *target = Value::Null;
    return;
  };
  let parent = parents.iter().try_fold(target, |node, segment| match segment {
    PathSegment::Key(key) => node.get_mut(key.as_str()),
    PathSegment::Index(index) => node.get_mut(*index),
  });
  match (parent, last) {
    (Some(Value::Object(map)), PathSegment::Key(key)) => {
      map.remove(key);
    }
    (Some(Value::Array(items)), PathSegment::Index(index))
      if *index < items.len() =>
    {
      items.remove(*index);
    }
    _ => {}
  }
}
