//! Handler for the activity feed.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/activities` | Optional `?group=<id>`; newest first, at most 50 |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Query, State},
};
use serde::Deserialize;
use warden_core::activity::{self, ActivityQuery, DisplayActivity};

use crate::{WardenStore, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub group: Option<String>,
}

/// `GET /activities[?group=<id>]`
pub async fn list<S: WardenStore>(
  State(store): State<Arc<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<DisplayActivity>>, ApiError> {
  let query = ActivityQuery { group: params.group.filter(|g| !g.is_empty()) };
  let activities = activity::list_activities(store.as_ref(), &query)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(activities))
}
