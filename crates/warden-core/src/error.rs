//! Error types for `warden-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unknown relation type tag: {0:?}")]
  UnknownRelation(String),

  #[error("malformed {slot} in {ptype:?} tuple: {reason}")]
  MalformedTuple {
    ptype:  String,
    slot:   &'static str,
    reason: String,
  },

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
