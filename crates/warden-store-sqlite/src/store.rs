//! [`SqliteStore`]: the SQLite implementation of the `warden-core` storage
//! traits.

use std::path::Path;

use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use warden_core::{
  activity::{ACTIVITY_PAGE_SIZE, ActivityQuery, ActivityRecord, NewActivity},
  directory::{
    DirectoryKind, DisplayRecord, Group, GroupUpdate, NewGroup, NewRole,
    NewUser, Role, User, numbered_username,
  },
  relation::{Relation, RelationKind, RelationTuple},
  store::{ActivityLog, Backend, Directory, TupleScan, TupleStore},
};

use crate::{
  Error, Result,
  encode::{
    RawActivity, RawGroup, RawRole, RawUser, TupleRow, encode_dt, encode_json,
    encode_uuid, now,
  },
  schema::SCHEMA,
};

/// Rows fetched per round trip while filtering the activity log.
const ACTIVITY_BATCH: usize = 200;

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Warden store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn tuple_row(&self, id: Uuid) -> Result<Option<TupleRow>> {
    let id_str = encode_uuid(id);
    let row = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {} FROM relation_tuples WHERE tuple_id = ?1",
                TupleRow::COLUMNS
              ),
              rusqlite::params![id_str],
              TupleRow::from_row,
            )
            .optional()?,
        )
      })
      .await?;
    Ok(row)
  }

  /// Up to `limit` activity rows strictly older than `after`, newest first.
  ///
  /// Paging is keyed on `(created_at, rowid)`, so rows appended between two
  /// calls never shift a later batch.
  pub(crate) async fn activity_batch(
    &self,
    after: Option<ActivityCursor>,
    limit: usize,
  ) -> Result<Vec<(ActivityCursor, RawActivity)>> {
    let (at, rowid) = after.map_or((None, None), |c| (Some(c.created_at), Some(c.rowid)));
    let limit = limit as i64;
    let rows = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {}, rowid FROM activities
           WHERE ?1 IS NULL OR (created_at, rowid) < (?1, ?2)
           ORDER BY created_at DESC, rowid DESC
           LIMIT ?3",
          RawActivity::COLUMNS
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![at, rowid, limit], |row| {
            let raw = RawActivity::from_row(row)?;
            let cursor = ActivityCursor {
              created_at: raw.created_at.clone(),
              rowid:      row.get(8)?,
            };
            Ok((cursor, raw))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(rows)
  }
}

/// Position of an activity row in feed order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ActivityCursor {
  created_at: String,
  rowid:      i64,
}

fn username_taken(conn: &rusqlite::Connection, username: &str) -> rusqlite::Result<bool> {
  Ok(
    conn
      .query_row(
        "SELECT 1 FROM users WHERE username = ?1",
        rusqlite::params![username],
        |_| Ok(()),
      )
      .optional()?
      .is_some(),
  )
}

impl Backend for SqliteStore {
  type Error = Error;
}

// ─── Relation tuples ─────────────────────────────────────────────────────────

impl TupleStore for SqliteStore {
  async fn insert_tuple(&self, relation: Relation) -> Result<RelationTuple> {
    let tuple = RelationTuple { id: Uuid::new_v4(), relation };
    let raw = tuple.relation.to_raw();
    let id_str = encode_uuid(tuple.id);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO relation_tuples (tuple_id, ptype, v0, v1, v2, v3, v4, v5)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
          rusqlite::params![
            id_str, raw.ptype, raw.v0, raw.v1, raw.v2, raw.v3, raw.v4, raw.v5,
          ],
        )?;
        Ok(())
      })
      .await?;

    tracing::debug!(id = %tuple.id, kind = ?tuple.relation.kind(), "inserted relation tuple");
    Ok(tuple)
  }

  async fn delete_tuple(&self, id: Uuid) -> Result<Option<RelationTuple>> {
    let Some(row) = self.tuple_row(id).await? else {
      return Ok(None);
    };
    let tuple = row.into_tuple()?;

    // Only the caller whose DELETE removed the row reports it as deleted.
    let id_str = encode_uuid(id);
    let removed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM relation_tuples WHERE tuple_id = ?1",
          rusqlite::params![id_str],
        )?)
      })
      .await?;

    Ok((removed > 0).then_some(tuple))
  }

  async fn get_tuple(&self, id: Uuid) -> Result<Option<RelationTuple>> {
    self.tuple_row(id).await?.map(TupleRow::into_tuple).transpose()
  }

  async fn scan<'a>(&'a self, scan: &'a TupleScan) -> Result<Vec<RelationTuple>> {
    // Filter on the tag in SQL; references need decoding, so the rest of the
    // scan runs over decoded relations.
    let tag = match scan.kind {
      Some(RelationKind::Unknown) => return Ok(Vec::new()),
      Some(kind) => kind.tag(),
      None => None,
    };

    let rows: Vec<TupleRow> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {} FROM relation_tuples
           WHERE ?1 IS NULL OR ptype = ?1
           ORDER BY rowid",
          TupleRow::COLUMNS
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![tag], TupleRow::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(
      rows
        .into_iter()
        .filter_map(|row| {
          let id = row.tuple_id.clone();
          match row.into_tuple() {
            Ok(tuple) => Some(tuple),
            Err(error) => {
              tracing::warn!(%id, %error, "skipping undecodable relation tuple");
              None
            }
          }
        })
        .filter(|tuple| scan.matches(&tuple.relation))
        .collect(),
    )
  }
}

// ─── Directory ───────────────────────────────────────────────────────────────

impl Directory for SqliteStore {
  async fn find_by_id<'a>(
    &'a self,
    kind: DirectoryKind,
    id: &'a str,
  ) -> Result<Option<DisplayRecord>> {
    let sql = match kind {
      DirectoryKind::User => {
        "SELECT user_id, displayname, username FROM users WHERE user_id = ?1"
      }
      DirectoryKind::Role => {
        "SELECT role_id, displayname, NULL FROM roles WHERE role_id = ?1"
      }
    };
    let id = id.to_owned();

    let found = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(sql, rusqlite::params![id], |row| {
              Ok(DisplayRecord {
                id:          row.get(0)?,
                displayname: row.get(1)?,
                username:    row.get(2)?,
              })
            })
            .optional()?,
        )
      })
      .await?;
    Ok(found)
  }

  async fn list_users(&self) -> Result<Vec<User>> {
    let raws: Vec<RawUser> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {} FROM users ORDER BY created_at, rowid",
          RawUser::COLUMNS
        ))?;
        let rows = stmt
          .query_map([], RawUser::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawUser::into_user).collect()
  }

  async fn list_roles(&self) -> Result<Vec<Role>> {
    let raws: Vec<RawRole> = self
      .conn
      .call(|conn| {
        let mut stmt = conn
          .prepare("SELECT role_id, displayname, tags FROM roles ORDER BY rowid")?;
        let rows = stmt
          .query_map([], RawRole::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawRole::into_role).collect()
  }

  async fn add_user(&self, input: NewUser) -> Result<User> {
    let explicit = input.has_explicit_username();
    let base = input.resolved_username();
    let mut user = User {
      id:          encode_uuid(Uuid::new_v4()),
      username:    base.clone(),
      displayname: input.displayname,
      metadata:    input.metadata,
      created_at:  now(),
    };

    let id_str       = user.id.clone();
    let displayname  = user.displayname.clone();
    let metadata_str = encode_json(&user.metadata)?;
    let at_str       = encode_dt(user.created_at);

    // Picking the name and inserting share one call, so no other insert can
    // claim the name in between.
    let username = self
      .conn
      .call(move |conn| {
        let mut attempt = 0;
        let username = loop {
          let candidate = numbered_username(&base, attempt);
          if !username_taken(conn, &candidate)? {
            break candidate;
          }
          if explicit {
            return Ok(None);
          }
          attempt += 1;
        };
        conn.execute(
          "INSERT INTO users (user_id, username, displayname, metadata, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![id_str, username, displayname, metadata_str, at_str],
        )?;
        Ok(Some(username))
      })
      .await?;

    let Some(username) = username else {
      return Err(Error::Conflict(format!(
        "username {:?} is already taken",
        user.username
      )));
    };
    user.username = username;
    Ok(user)
  }

  async fn add_role(&self, input: NewRole) -> Result<Role> {
    let role = Role {
      id:          input.id.unwrap_or_else(|| encode_uuid(Uuid::new_v4())),
      displayname: input.displayname,
      tags:        input.tags,
    };

    let id_str      = role.id.clone();
    let displayname = role.displayname.clone();
    let tags_str    = encode_json(&role.tags)?;

    let inserted = self
      .conn
      .call(move |conn| {
        let changed = conn.execute(
          "INSERT OR IGNORE INTO roles (role_id, displayname, tags)
           VALUES (?1, ?2, ?3)",
          rusqlite::params![id_str, displayname, tags_str],
        )?;
        Ok(changed > 0)
      })
      .await?;

    if !inserted {
      return Err(Error::Conflict(format!("role {:?} already exists", role.id)));
    }
    Ok(role)
  }

  async fn create_group(&self, input: NewGroup) -> Result<Group> {
    let now = now();
    let group = Group {
      id:          encode_uuid(Uuid::new_v4()),
      displayname: input.displayname,
      metadata:    input.metadata,
      created_at:  now,
      updated_at:  now,
    };

    let id_str       = group.id.clone();
    let displayname  = group.displayname.clone();
    let metadata_str = encode_json(&group.metadata)?;
    let at_str       = encode_dt(now);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO user_groups (group_id, displayname, metadata, created_at, updated_at)
           VALUES (?1, ?2, ?3, ?4, ?4)",
          rusqlite::params![id_str, displayname, metadata_str, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(group)
  }

  async fn get_group<'a>(&'a self, id: &'a str) -> Result<Option<Group>> {
    let id = id.to_owned();
    let raw: Option<RawGroup> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {} FROM user_groups WHERE group_id = ?1",
                RawGroup::COLUMNS
              ),
              rusqlite::params![id],
              RawGroup::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawGroup::into_group).transpose()
  }

  async fn update_group<'a>(
    &'a self,
    id: &'a str,
    update: GroupUpdate,
  ) -> Result<Option<Group>> {
    let Some(mut group) = self.get_group(id).await? else {
      return Ok(None);
    };
    if let Some(displayname) = update.displayname {
      group.displayname = displayname;
    }
    if let Some(metadata) = update.metadata {
      group.metadata = metadata;
    }
    group.updated_at = now();

    let id_str       = group.id.clone();
    let displayname  = group.displayname.clone();
    let metadata_str = encode_json(&group.metadata)?;
    let at_str       = encode_dt(group.updated_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE user_groups SET displayname = ?2, metadata = ?3, updated_at = ?4
           WHERE group_id = ?1",
          rusqlite::params![id_str, displayname, metadata_str, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(Some(group))
  }

  async fn delete_group<'a>(&'a self, id: &'a str) -> Result<Option<Group>> {
    let Some(group) = self.get_group(id).await? else {
      return Ok(None);
    };

    let id_str = group.id.clone();
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "DELETE FROM user_groups WHERE group_id = ?1",
          rusqlite::params![id_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(Some(group))
  }
}

// ─── Activity log ────────────────────────────────────────────────────────────

impl ActivityLog for SqliteStore {
  async fn append_activity(&self, activity: NewActivity) -> Result<ActivityRecord> {
    let record = ActivityRecord::from_new(activity, Uuid::new_v4(), now());

    let id_str       = encode_uuid(record.id);
    let at_str       = encode_dt(record.created_at);
    let actor        = record.actor.clone();
    let model        = record.model.as_ref().to_owned();
    let document_id  = record.document_id.clone();
    let document_str = encode_json(&record.document)?;
    let title        = record.title.clone();
    let diffs_str    = encode_json(&record.diffs)?;

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO activities (
             activity_id, created_at, actor, model,
             document_id, document, title, diffs
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
          rusqlite::params![
            id_str,
            at_str,
            actor,
            model,
            document_id,
            document_str,
            title,
            diffs_str,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(record)
  }

  async fn list_activities<'a>(
    &'a self,
    query: &'a ActivityQuery,
  ) -> Result<Vec<ActivityRecord>> {
    // Scope rules look inside the stored diffs, so records are filtered after
    // decoding, a batch at a time, until a page is full.
    let mut page = Vec::new();
    let mut after = None;
    loop {
      let batch = self.activity_batch(after.take(), ACTIVITY_BATCH).await?;
      let fetched = batch.len();

      for (cursor, raw) in batch {
        after = Some(cursor);
        let id = raw.activity_id.clone();
        let record = match raw.into_record() {
          Ok(record) => record,
          Err(error) => {
            tracing::warn!(%id, %error, "skipping undecodable activity");
            continue;
          }
        };
        if query.matches(&record) {
          page.push(record);
          if page.len() == ACTIVITY_PAGE_SIZE {
            return Ok(page);
          }
        }
      }

      if fetched < ACTIVITY_BATCH {
        return Ok(page);
      }
    }
  }
}
