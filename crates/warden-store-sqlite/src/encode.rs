//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 strings in UTC with a fixed microsecond precision,
//! so they order correctly as text. Structured fields (metadata, tags,
//! documents, diffs) are compact JSON. UUIDs are hyphenated lowercase.

use std::str::FromStr as _;

use chrono::{DateTime, SecondsFormat, SubsecRound as _, Utc};
use serde::{Serialize, de::DeserializeOwned};
use uuid::Uuid;
use warden_core::{
  activity::{ActivityRecord, ModelKind},
  directory::{Group, Role, User},
  relation::{RawTuple, Relation, RelationTuple},
};

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

/// The current time at the precision timestamps are stored with, so values
/// handed back to callers compare equal to what is later read.
pub fn now() -> DateTime<Utc> { Utc::now().trunc_subsecs(6) }

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
  Ok(serde_json::to_string(value)?)
}

pub fn decode_json<T: DeserializeOwned>(s: &str) -> Result<T> {
  Ok(serde_json::from_str(s)?)
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `users` row.
pub struct RawUser {
  pub user_id:     String,
  pub username:    String,
  pub displayname: String,
  pub metadata:    String,
  pub created_at:  String,
}

impl RawUser {
  pub const COLUMNS: &str = "user_id, username, displayname, metadata, created_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      user_id:     row.get(0)?,
      username:    row.get(1)?,
      displayname: row.get(2)?,
      metadata:    row.get(3)?,
      created_at:  row.get(4)?,
    })
  }

  pub fn into_user(self) -> Result<User> {
    Ok(User {
      id:          self.user_id,
      username:    self.username,
      displayname: self.displayname,
      metadata:    decode_json(&self.metadata)?,
      created_at:  decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from a `roles` row.
pub struct RawRole {
  pub role_id:     String,
  pub displayname: String,
  pub tags:        String,
}

impl RawRole {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      role_id:     row.get(0)?,
      displayname: row.get(1)?,
      tags:        row.get(2)?,
    })
  }

  pub fn into_role(self) -> Result<Role> {
    Ok(Role {
      id:          self.role_id,
      displayname: self.displayname,
      tags:        decode_json(&self.tags)?,
    })
  }
}

/// Raw strings read directly from a `user_groups` row.
pub struct RawGroup {
  pub group_id:    String,
  pub displayname: String,
  pub metadata:    String,
  pub created_at:  String,
  pub updated_at:  String,
}

impl RawGroup {
  pub const COLUMNS: &str =
    "group_id, displayname, metadata, created_at, updated_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      group_id:    row.get(0)?,
      displayname: row.get(1)?,
      metadata:    row.get(2)?,
      created_at:  row.get(3)?,
      updated_at:  row.get(4)?,
    })
  }

  pub fn into_group(self) -> Result<Group> {
    Ok(Group {
      id:          self.group_id,
      displayname: self.displayname,
      metadata:    decode_json(&self.metadata)?,
      created_at:  decode_dt(&self.created_at)?,
      updated_at:  decode_dt(&self.updated_at)?,
    })
  }
}

/// A `relation_tuples` row: the id plus the positional record.
pub struct TupleRow {
  pub tuple_id: String,
  pub raw:      RawTuple,
}

impl TupleRow {
  pub const COLUMNS: &str = "tuple_id, ptype, v0, v1, v2, v3, v4, v5";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      tuple_id: row.get(0)?,
      raw:      RawTuple {
        ptype: row.get(1)?,
        v0:    row.get(2)?,
        v1:    row.get(3)?,
        v2:    row.get(4)?,
        v3:    row.get(5)?,
        v4:    row.get(6)?,
        v5:    row.get(7)?,
      },
    })
  }

  pub fn into_tuple(self) -> Result<RelationTuple> {
    Ok(RelationTuple {
      id:       decode_uuid(&self.tuple_id)?,
      relation: Relation::from_raw(&self.raw)?,
    })
  }
}

/// Raw strings read directly from an `activities` row.
pub struct RawActivity {
  pub activity_id: String,
  pub created_at:  String,
  pub actor:       String,
  pub model:       String,
  pub document_id: String,
  pub document:    String,
  pub title:       String,
  pub diffs:       String,
}

impl RawActivity {
  pub const COLUMNS: &str =
    "activity_id, created_at, actor, model, document_id, document, title, diffs";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      activity_id: row.get(0)?,
      created_at:  row.get(1)?,
      actor:       row.get(2)?,
      model:       row.get(3)?,
      document_id: row.get(4)?,
      document:    row.get(5)?,
      title:       row.get(6)?,
      diffs:       row.get(7)?,
    })
  }

  pub fn into_record(self) -> Result<ActivityRecord> {
    Ok(ActivityRecord {
      id:          decode_uuid(&self.activity_id)?,
      created_at:  decode_dt(&self.created_at)?,
      actor:       self.actor,
      model:       ModelKind::from_str(&self.model)
        .map_err(|_| Error::UnknownModel(self.model.clone()))?,
      document_id: self.document_id,
      document:    decode_json(&self.document)?,
      title:       self.title,
      diffs:       decode_json(&self.diffs)?,
    })
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone as _;

  use super::*;

  #[test]
  fn timestamps_sort_as_text() {
    let early = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
    let late = early + chrono::Duration::microseconds(1);
    assert!(encode_dt(early) < encode_dt(late));
    assert_eq!(decode_dt(&encode_dt(late)).unwrap(), late);
  }

  #[test]
  fn unknown_model_is_reported() {
    let raw = RawActivity {
      activity_id: Uuid::nil().to_string(),
      created_at:  encode_dt(Utc::now()),
      actor:       "u1".into(),
      model:       "contact".into(),
      document_id: "0".into(),
      document:    "{}".into(),
      title:       String::new(),
      diffs:       "[]".into(),
    };
    assert!(matches!(raw.into_record(), Err(Error::UnknownModel(m)) if m == "contact"));
  }
}
