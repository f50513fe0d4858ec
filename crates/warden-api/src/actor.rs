//! The acting user of a mutation.

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::error::ApiError;

/// Header carrying the id of the user performing a mutation.
pub const ACTOR_HEADER: &str = "x-actor-id";

/// Extracts the [`ACTOR_HEADER`] value; requests without one are rejected
/// with 400.
#[derive(Debug, Clone)]
pub struct Actor(pub String);

impl<S: Send + Sync> FromRequestParts<S> for Actor {
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    _state: &S,
  ) -> Result<Self, Self::Rejection> {
    parts
      .headers
      .get(ACTOR_HEADER)
      .and_then(|value| value.to_str().ok())
      .map(str::trim)
      .filter(|value| !value.is_empty())
      .map(|value| Actor(value.to_owned()))
      .ok_or_else(|| ApiError::BadRequest(format!("missing {ACTOR_HEADER} header")))
  }
}
