//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use warden_core::store::BackendError;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("conflict: {0}")]
  Conflict(String),

  /// The request carried a tuple or reference that does not decode.
  #[error("invalid relation: {0}")]
  Core(#[from] warden_core::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T, E = ApiError> = std::result::Result<T, E>;

impl ApiError {
  /// Wrap a backend error. Unique-key violations become
  /// [`ApiError::Conflict`].
  pub fn store<E: BackendError>(error: E) -> Self {
    match error.conflict() {
      Some(message) => ApiError::Conflict(message.to_owned()),
      None => ApiError::Store(Box::new(error)),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
      ApiError::Core(e) => (StatusCode::BAD_REQUEST, e.to_string()),
      ApiError::Json(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
      ApiError::Store(e) => {
        tracing::error!(error = %e, "store failure");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
      }
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[derive(Debug, Error)]
  enum FakeError {
    #[error("taken")]
    Taken,
    #[error("disk on fire")]
    Io,
  }

  impl BackendError for FakeError {
    fn conflict(&self) -> Option<&str> {
      matches!(self, Self::Taken).then_some("name is taken")
    }
  }

  #[test]
  fn backend_conflicts_map_to_409() {
    let response = ApiError::store(FakeError::Taken).into_response();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = ApiError::store(FakeError::Io).into_response();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
  }
}
