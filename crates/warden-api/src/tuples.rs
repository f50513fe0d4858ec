//! Handlers for `/tuples` endpoints. Tuples are created and deleted, never
//! edited; both operations are recorded in the activity log.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use uuid::Uuid;
use warden_core::{
  activity::{ActionKind, ModelKind, MutationEvent, record_activity},
  relation::{RawTuple, Relation, RelationTuple},
  store::TupleStore,
};

use crate::{WardenStore, actor::Actor, error::ApiError};

fn not_found(id: Uuid) -> ApiError {
  ApiError::NotFound(format!("relation tuple {id} not found"))
}

/// `POST /tuples`, body: a positional tuple,
/// e.g. `{"ptype":"g","v0":"{\"user\":\"u1\"}","v1":"{\"group\":\"g1\"}"}`
pub async fn create<S: WardenStore>(
  State(store): State<Arc<S>>,
  Actor(actor): Actor,
  Json(body): Json<RawTuple>,
) -> Result<impl IntoResponse, ApiError> {
  let relation = Relation::from_raw(&body)?;
  let tuple = store.insert_tuple(relation).await.map_err(ApiError::store)?;

  let event =
    MutationEvent::created(ModelKind::RelationTuple, actor, tuple.snapshot()?);
  record_activity(store.as_ref(), &event, ActionKind::Create)
    .await
    .map_err(ApiError::store)?;

  Ok((StatusCode::CREATED, Json(tuple)))
}

/// `GET /tuples/{id}`
pub async fn get_one<S: WardenStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<RelationTuple>, ApiError> {
  let tuple = store
    .get_tuple(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| not_found(id))?;
  Ok(Json(tuple))
}

/// `DELETE /tuples/{id}`
pub async fn delete_one<S: WardenStore>(
  State(store): State<Arc<S>>,
  Actor(actor): Actor,
  Path(id): Path<Uuid>,
) -> Result<Json<RelationTuple>, ApiError> {
  let tuple = store
    .delete_tuple(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| not_found(id))?;

  let event =
    MutationEvent::deleted(ModelKind::RelationTuple, actor, tuple.snapshot()?);
  record_activity(store.as_ref(), &event, ActionKind::Delete)
    .await
    .map_err(ApiError::store)?;

  Ok(Json(tuple))
}
