//! Handlers for `/groups` endpoints. Every mutation is recorded in the
//! activity log under the acting user.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `POST`   | `/groups` | Body: `{"displayname":"Eng","metadata":{...}}` |
//! | `GET`    | `/groups/{id}` | 404 if not found |
//! | `PUT`    | `/groups/{id}` | Partial update; 404 if not found |
//! | `DELETE` | `/groups/{id}` | Returns the deleted group; 404 if not found |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use warden_core::{
  activity::{ActionKind, ModelKind, MutationEvent, record_activity},
  directory::{Group, GroupUpdate, NewGroup},
  store::Directory,
};

use crate::{WardenStore, actor::Actor, error::ApiError};

fn not_found(id: &str) -> ApiError {
  ApiError::NotFound(format!("group {id} not found"))
}

/// `POST /groups`
pub async fn create<S: WardenStore>(
  State(store): State<Arc<S>>,
  Actor(actor): Actor,
  Json(body): Json<NewGroup>,
) -> Result<impl IntoResponse, ApiError> {
  if body.displayname.trim().is_empty() {
    return Err(ApiError::BadRequest("displayname must not be empty".into()));
  }
  let group = store.create_group(body).await.map_err(ApiError::store)?;

  let event =
    MutationEvent::created(ModelKind::Group, actor, serde_json::to_value(&group)?);
  record_activity(store.as_ref(), &event, ActionKind::Create)
    .await
    .map_err(ApiError::store)?;

  Ok((StatusCode::CREATED, Json(group)))
}

/// `GET /groups/{id}`
pub async fn get_one<S: WardenStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<String>,
) -> Result<Json<Group>, ApiError> {
  let group = store
    .get_group(&id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| not_found(&id))?;
  Ok(Json(group))
}

/// `PUT /groups/{id}`
pub async fn update<S: WardenStore>(
  State(store): State<Arc<S>>,
  Actor(actor): Actor,
  Path(id): Path<String>,
  Json(body): Json<GroupUpdate>,
) -> Result<Json<Group>, ApiError> {
  let before = store
    .get_group(&id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| not_found(&id))?;
  let after = store
    .update_group(&id, body)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| not_found(&id))?;

  let event = MutationEvent::edited(
    ModelKind::Group,
    actor,
    serde_json::to_value(&before)?,
    serde_json::to_value(&after)?,
  );
  record_activity(store.as_ref(), &event, ActionKind::Edit)
    .await
    .map_err(ApiError::store)?;

  Ok(Json(after))
}

/// `DELETE /groups/{id}`
pub async fn delete_one<S: WardenStore>(
  State(store): State<Arc<S>>,
  Actor(actor): Actor,
  Path(id): Path<String>,
) -> Result<Json<Group>, ApiError> {
  let group = store
    .delete_group(&id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| not_found(&id))?;

  let event =
    MutationEvent::deleted(ModelKind::Group, actor, serde_json::to_value(&group)?);
  record_activity(store.as_ref(), &event, ActionKind::Delete)
    .await
    .map_err(ApiError::store)?;

  Ok(Json(group))
}
