//! Storage traits and the query types they accept.
//!
//! The traits are implemented by storage backends (e.g.
//! `warden-store-sqlite`). The audit and policy pipelines in this crate are
//! generic over them, so they can be exercised against fakes.

use std::{convert::Infallible, future::Future};

use uuid::Uuid;

use crate::{
  activity::{ActivityQuery, ActivityRecord, NewActivity},
  directory::{
    DirectoryKind, DisplayRecord, Group, GroupUpdate, NewGroup, NewRole,
    NewUser, Role, User,
  },
  relation::{Relation, RelationKind, RelationTuple},
};

// ─── Query type ──────────────────────────────────────────────────────────────

/// Parameters for [`TupleStore::scan`]. Empty fields do not filter.
#[derive(Debug, Clone, Default)]
pub struct TupleScan {
  pub kind:   Option<RelationKind>,
  /// Keep tuples whose group reference is one of these ids.
  pub groups: Vec<String>,
  /// Keep tuples whose user reference is this id.
  pub user:   Option<String>,
}

impl TupleScan {
  pub fn of_kind(kind: RelationKind) -> Self {
    Self { kind: Some(kind), ..Self::default() }
  }

  pub fn matches(&self, relation: &Relation) -> bool {
    self.kind.is_none_or(|kind| relation.kind() == kind)
      && (self.groups.is_empty()
        || relation
          .group_id()
          .is_some_and(|group| self.groups.iter().any(|g| g == group)))
      && self
        .user
        .as_deref()
        .is_none_or(|user| relation.user_id() == Some(user))
  }
}

// ─── Traits ──────────────────────────────────────────────────────────────────

/// Shared error type for the storage traits, so one backend can serve all of
/// them through a single `S::Error`.
pub trait Backend: Send + Sync {
  type Error: BackendError;
}

/// Failures a caller can act on, independent of the backend reporting them.
pub trait BackendError: std::error::Error + Send + Sync + 'static {
  /// The message for a unique-key collision (username, role id), if this is
  /// one.
  fn conflict(&self) -> Option<&str> { None }
}

impl BackendError for Infallible {}

/// Relation tuple persistence. Tuples are never updated in place; a change is
/// a delete followed by an insert.
pub trait TupleStore: Backend {
  fn insert_tuple(
    &self,
    relation: Relation,
  ) -> impl Future<Output = Result<RelationTuple, Self::Error>> + Send + '_;

  /// Delete a tuple, returning it if it existed.
  fn delete_tuple(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<RelationTuple>, Self::Error>> + Send + '_;

  fn get_tuple(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<RelationTuple>, Self::Error>> + Send + '_;

  fn scan<'a>(
    &'a self,
    scan: &'a TupleScan,
  ) -> impl Future<Output = Result<Vec<RelationTuple>, Self::Error>> + Send + 'a;
}

/// Users, roles and groups.
pub trait Directory: Backend {
  /// Point lookup used to resolve foreign ids for display. Returns `None`
  /// when nothing has that id.
  fn find_by_id<'a>(
    &'a self,
    kind: DirectoryKind,
    id: &'a str,
  ) -> impl Future<Output = Result<Option<DisplayRecord>, Self::Error>> + Send + 'a;

  fn list_users(
    &self,
  ) -> impl Future<Output = Result<Vec<User>, Self::Error>> + Send + '_;

  fn list_roles(
    &self,
  ) -> impl Future<Output = Result<Vec<Role>, Self::Error>> + Send + '_;

  fn add_user(
    &self,
    input: NewUser,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + '_;

  fn add_role(
    &self,
    input: NewRole,
  ) -> impl Future<Output = Result<Role, Self::Error>> + Send + '_;

  fn create_group(
    &self,
    input: NewGroup,
  ) -> impl Future<Output = Result<Group, Self::Error>> + Send + '_;

  fn get_group<'a>(
    &'a self,
    id: &'a str,
  ) -> impl Future<Output = Result<Option<Group>, Self::Error>> + Send + 'a;

  /// Apply `update`, returning the new state, or `None` if the group does not
  /// exist.
  fn update_group<'a>(
    &'a self,
    id: &'a str,
    update: GroupUpdate,
  ) -> impl Future<Output = Result<Option<Group>, Self::Error>> + Send + 'a;

  /// Delete a group, returning its last state if it existed.
  fn delete_group<'a>(
    &'a self,
    id: &'a str,
  ) -> impl Future<Output = Result<Option<Group>, Self::Error>> + Send + 'a;
}

/// Append-only activity log.
pub trait ActivityLog: Backend {
  /// Persist an activity. `id` and `created_at` are assigned by the store.
  fn append_activity(
    &self,
    activity: NewActivity,
  ) -> impl Future<Output = Result<ActivityRecord, Self::Error>> + Send + '_;

  /// Newest first, keeping only records for which
  /// [`ActivityQuery::matches`] holds, at most
  /// [`ACTIVITY_PAGE_SIZE`](crate::activity::ACTIVITY_PAGE_SIZE) of them.
  fn list_activities<'a>(
    &'a self,
    query: &'a ActivityQuery,
  ) -> impl Future<Output = Result<Vec<ActivityRecord>, Self::Error>> + Send + 'a;
}
