//! Handlers for `/roles` endpoints.

use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use warden_core::{
  directory::{NewRole, Role},
  store::Directory,
};

use crate::{WardenStore, error::ApiError};

/// `GET /roles`
pub async fn list<S: WardenStore>(
  State(store): State<Arc<S>>,
) -> Result<Json<Vec<Role>>, ApiError> {
  let roles = store.list_roles().await.map_err(ApiError::store)?;
  Ok(Json(roles))
}

/// `POST /roles`, body: `{"id":"viewer","displayname":"Viewer","tags":["org"]}`
pub async fn create<S: WardenStore>(
  State(store): State<Arc<S>>,
  Json(body): Json<NewRole>,
) -> Result<impl IntoResponse, ApiError> {
  let role = store.add_role(body).await.map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(role)))
}
