//! JSON REST API for Warden.
//!
//! Exposes an axum [`Router`] backed by any store implementing the
//! `warden-core` storage traits. Authentication and TLS are the caller's
//! responsibility; the acting user of a mutation is taken from the
//! [`actor::ACTOR_HEADER`] header.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", warden_api::api_router(store.clone()))
//! ```

pub mod activities;
pub mod actor;
pub mod error;
pub mod groups;
pub mod roles;
pub mod tuples;
pub mod users;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  routing::{get, post},
};
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use warden_core::store::{ActivityLog, Directory, TupleStore};

pub use error::{ApiError, Result};

/// Everything the handlers need from a backend.
pub trait WardenStore: TupleStore + Directory + ActivityLog + 'static {}

impl<T> WardenStore for T where T: TupleStore + Directory + ActivityLog + 'static {}

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `WARDEN_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  pub host:       String,
  pub port:       u16,
  pub store_path: PathBuf,
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S: WardenStore>(store: Arc<S>) -> Router<()> {
  Router::new()
    // Activity feed
    .route("/activities", get(activities::list::<S>))
    // Directory
    .route("/users", get(users::list::<S>).post(users::create::<S>))
    .route("/users/query", post(users::query::<S>))
    .route("/roles", get(roles::list::<S>).post(roles::create::<S>))
    // Groups
    .route("/groups", post(groups::create::<S>))
    .route(
      "/groups/{id}",
      get(groups::get_one::<S>)
        .put(groups::update::<S>)
        .delete(groups::delete_one::<S>),
    )
    // Relation tuples
    .route("/tuples", post(tuples::create::<S>))
    .route(
      "/tuples/{id}",
      get(tuples::get_one::<S>).delete(tuples::delete_one::<S>),
    )
    .layer(TraceLayer::new_for_http())
    .with_state(store)
}
