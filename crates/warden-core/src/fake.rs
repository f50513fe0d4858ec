//! In-memory backend for exercising the generic pipelines in unit tests.

use std::{convert::Infallible, sync::Mutex};

use chrono::Utc;
use uuid::Uuid;

use crate::{
  activity::{ACTIVITY_PAGE_SIZE, ActivityQuery, ActivityRecord, NewActivity},
  directory::{
    DirectoryKind, DisplayRecord, Group, GroupUpdate, NewGroup, NewRole,
    NewUser, Role, User,
  },
  relation::{Relation, RelationTuple},
  store::{ActivityLog, Backend, Directory, TupleScan, TupleStore},
};

#[derive(Default)]
struct State {
  users:      Vec<User>,
  roles:      Vec<Role>,
  groups:     Vec<Group>,
  tuples:     Vec<RelationTuple>,
  activities: Vec<ActivityRecord>,
}

#[derive(Default)]
pub struct MemoryBackend {
  state: Mutex<State>,
}

impl MemoryBackend {
  fn with<T>(&self, f: impl FnOnce(&mut State) -> T) -> T {
    let mut state = self.state.lock().unwrap();
    f(&mut state)
  }

  pub fn user_by_username(&self, username: &str) -> Option<User> {
    self.with(|s| s.users.iter().find(|u| u.username == username).cloned())
  }
}

impl Backend for MemoryBackend {
  type Error = Infallible;
}

impl TupleStore for MemoryBackend {
  async fn insert_tuple(&self, relation: Relation) -> Result<RelationTuple, Infallible> {
    let tuple = RelationTuple { id: Uuid::new_v4(), relation };
    self.with(|s| s.tuples.push(tuple.clone()));
    Ok(tuple)
  }

  async fn delete_tuple(&self, id: Uuid) -> Result<Option<RelationTuple>, Infallible> {
    Ok(self.with(|s| {
      let index = s.tuples.iter().position(|t| t.id == id)?;
      Some(s.tuples.remove(index))
    }))
  }

  async fn get_tuple(&self, id: Uuid) -> Result<Option<RelationTuple>, Infallible> {
    Ok(self.with(|s| s.tuples.iter().find(|t| t.id == id).cloned()))
  }

  async fn scan<'a>(&'a self, scan: &'a TupleScan) -> Result<Vec<RelationTuple>, Infallible> {
    Ok(self.with(|s| {
      s.tuples
        .iter()
        .filter(|t| scan.matches(&t.relation))
        .cloned()
        .collect()
    }))
  }
}

impl Directory for MemoryBackend {
  async fn find_by_id<'a>(
    &'a self,
    kind: DirectoryKind,
    id: &'a str,
  ) -> Result<Option<DisplayRecord>, Infallible> {
    Ok(self.with(|s| match kind {
      DirectoryKind::User => s.users.iter().find(|u| u.id == id).map(DisplayRecord::from),
      DirectoryKind::Role => s.roles.iter().find(|r| r.id == id).map(DisplayRecord::from),
    }))
  }

  async fn list_users(&self) -> Result<Vec<User>, Infallible> {
    Ok(self.with(|s| s.users.clone()))
  }

  async fn list_roles(&self) -> Result<Vec<Role>, Infallible> {
    Ok(self.with(|s| s.roles.clone()))
  }

  async fn add_user(&self, input: NewUser) -> Result<User, Infallible> {
    let user = User {
      id:          Uuid::new_v4().to_string(),
      username:    input.resolved_username(),
      displayname: input.displayname,
      metadata:    input.metadata,
      created_at:  Utc::now(),
    };
    self.with(|s| s.users.push(user.clone()));
    Ok(user)
  }

  async fn add_role(&self, input: NewRole) -> Result<Role, Infallible> {
    let role = Role {
      id:          input.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
      displayname: input.displayname,
      tags:        input.tags,
    };
    self.with(|s| s.roles.push(role.clone()));
    Ok(role)
  }

  async fn create_group(&self, input: NewGroup) -> Result<Group, Infallible> {
    let now = Utc::now();
    let group = Group {
      id:          Uuid::new_v4().to_string(),
      displayname: input.displayname,
      metadata:    input.metadata,
      created_at:  now,
      updated_at:  now,
    };
    self.with(|s| s.groups.push(group.clone()));
    Ok(group)
  }

  async fn get_group<'a>(&'a self, id: &'a str) -> Result<Option<Group>, Infallible> {
    Ok(self.with(|s| s.groups.iter().find(|g| g.id == id).cloned()))
  }

  async fn update_group<'a>(
    &'a self,
    id: &'a str,
    update: GroupUpdate,
  ) -> Result<Option<Group>, Infallible> {
    Ok(self.with(|s| {
      let group = s.groups.iter_mut().find(|g| g.id == id)?;
      if let Some(name) = update.displayname {
        group.displayname = name;
      }
      if let Some(metadata) = update.metadata {
        group.metadata = metadata;
      }
      group.updated_at = Utc::now();
      Some(group.clone())
    }))
  }

  async fn delete_group<'a>(&'a self, id: &'a str) -> Result<Option<Group>, Infallible> {
    Ok(self.with(|s| {
      let index = s.groups.iter().position(|g| g.id == id)?;
      Some(s.groups.remove(index))
    }))
  }
}

impl ActivityLog for MemoryBackend {
  async fn append_activity(&self, activity: NewActivity) -> Result<ActivityRecord, Infallible> {
    let record = ActivityRecord::from_new(activity, Uuid::new_v4(), Utc::now());
    self.with(|s| s.activities.push(record.clone()));
    Ok(record)
  }

  async fn list_activities<'a>(
    &'a self,
    query: &'a ActivityQuery,
  ) -> Result<Vec<ActivityRecord>, Infallible> {
    Ok(self.with(|s| {
      s.activities
        .iter()
        .rev()
        .filter(|r| query.matches(r))
        .take(ACTIVITY_PAGE_SIZE)
        .cloned()
        .collect()
    }))
  }
}
