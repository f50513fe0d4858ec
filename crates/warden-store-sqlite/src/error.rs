//! Error type for `warden-store-sqlite`.

use thiserror::Error;
use warden_core::store::BackendError;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] warden_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("unknown activity model: {0:?}")]
  UnknownModel(String),

  /// A unique key (username, role id) is already in use.
  #[error("{0}")]
  Conflict(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl BackendError for Error {
  fn conflict(&self) -> Option<&str> {
    match self {
      Self::Conflict(message) => Some(message),
      _ => None,
    }
  }
}
