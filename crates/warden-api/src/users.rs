//! Handlers for `/users` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/users` | `?role_tags=a,b` plus any filter keys; dotted keys nest |
//! | `POST` | `/users/query` | Body: `{"filter":{...},"role_tags":[...]}` |
//! | `POST` | `/users` | Body: `{"displayname":"Ada","username":"ada"}` |

use std::{collections::HashMap, sync::Arc};

use axum::{
  Json,
  extract::{Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use serde_json::{Map, Value};
use warden_core::{
  directory::NewUser,
  policy::{UserWithPolicies, list_users_matching},
  store::Directory,
};

use crate::{WardenStore, error::ApiError};

/// Query keys that never become part of the filter object.
const RESERVED_KEYS: &[&str] = &["role_tags", "fields"];

// ─── List ─────────────────────────────────────────────────────────────────────

/// `GET /users[?role_tags=a,b][&key=value…]`
pub async fn list<S: WardenStore>(
  State(store): State<Arc<S>>,
  Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Vec<UserWithPolicies>>, ApiError> {
  let (filter, role_tags) = filter_from_query(params);
  let users = list_users_matching(store.as_ref(), &filter, &role_tags)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(users))
}

#[derive(Debug, Default, Deserialize)]
pub struct QueryBody {
  #[serde(default)]
  pub filter:    Value,
  #[serde(default)]
  pub role_tags: Vec<String>,
}

/// `POST /users/query`
pub async fn query<S: WardenStore>(
  State(store): State<Arc<S>>,
  Json(body): Json<QueryBody>,
) -> Result<Json<Vec<UserWithPolicies>>, ApiError> {
  if !matches!(body.filter, Value::Null | Value::Object(_)) {
    return Err(ApiError::BadRequest("filter must be an object".into()));
  }
  let users = list_users_matching(store.as_ref(), &body.filter, &body.role_tags)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(users))
}

/// Split query parameters into the filter object and the role tags.
pub(crate) fn filter_from_query(
  params: HashMap<String, String>,
) -> (Value, Vec<String>) {
  let mut filter = Map::new();
  let mut role_tags = Vec::new();

  for (key, value) in params {
    if key == "role_tags" {
      role_tags.extend(
        value
          .split(',')
          .map(str::trim)
          .filter(|tag| !tag.is_empty())
          .map(str::to_owned),
      );
    } else if !RESERVED_KEYS.contains(&key.as_str()) {
      insert_path(&mut filter, &key, value);
    }
  }

  (Value::Object(filter), role_tags)
}

fn insert_path(map: &mut Map<String, Value>, key: &str, value: String) {
  let Some((head, rest)) = key.split_once('.') else {
    map.insert(key.to_owned(), Value::String(value));
    return;
  };
  let child = map
    .entry(head.to_owned())
    .or_insert_with(|| Value::Object(Map::new()));
  if !child.is_object() {
    *child = Value::Object(Map::new());
  }
  if let Value::Object(inner) = child {
    insert_path(inner, rest, value);
  }
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// `POST /users`
pub async fn create<S: WardenStore>(
  State(store): State<Arc<S>>,
  Json(body): Json<NewUser>,
) -> Result<impl IntoResponse, ApiError> {
  if body.displayname.trim().is_empty() {
    return Err(ApiError::BadRequest("displayname must not be empty".into()));
  }
  let user = store.add_user(body).await.map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(user)))
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
      .iter()
      .map(|(k, v)| (k.to_string(), v.to_string()))
      .collect()
  }

  #[test]
  fn reserved_keys_are_not_filters() {
    let (filter, tags) = filter_from_query(params(&[
      ("role_tags", "org, read,,"),
      ("fields", "id"),
      ("entity", "gojek"),
    ]));
    assert_eq!(filter, json!({ "entity": "gojek" }));
    assert_eq!(tags, ["org", "read"]);
  }

  #[test]
  fn dotted_keys_nest() {
    let (filter, tags) = filter_from_query(params(&[
      ("entity.region", "id"),
      ("entity.name", "gojek"),
    ]));
    assert_eq!(filter, json!({ "entity": { "region": "id", "name": "gojek" } }));
    assert!(tags.is_empty());
  }

  #[test]
  fn empty_query_is_an_empty_filter() {
    let (filter, tags) = filter_from_query(HashMap::new());
    assert_eq!(filter, json!({}));
    assert!(tags.is_empty());
  }
}
