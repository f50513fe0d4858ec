//! The activity feed: turning committed mutations into audit records, and
//! audit records into display rows.
//!
//! Write path: [`MutationEvent`] → [`reduce_activity`] → [`NewActivity`] →
//! [`ActivityLog::append_activity`]. Read path: [`ActivityLog::list_activities`]
//! → [`project_activity`] → [`DisplayActivity`], resolving role and user ids
//! through a [`Directory`] and degrading to empty strings when they are gone.

use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{AsRefStr, EnumString};
use uuid::Uuid;

use crate::{
  diff::{DiffKind, DiffOp, PathSegment, diff},
  directory::{DirectoryKind, DisplayRecord},
  relation::{
    RawTuple, Relation, RelationKind, Slot, extract_field, parse_ref, value_text,
  },
  store::{ActivityLog, Directory},
};

/// Fields that change on every write and never appear in activity diffs.
pub const VOLATILE_FIELDS: &[&str] =
  &["createdAt", "updatedAt", "created_at", "updated_at"];

/// Maximum number of records returned by one listing.
pub const ACTIVITY_PAGE_SIZE: usize = 50;

/// `document_id` of a record describing the creation of a new entity.
pub const NEW_DOCUMENT_ID: &str = "0";

// ─── Event types ─────────────────────────────────────────────────────────────

/// The kind of entity an activity is about.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ModelKind {
  Group,
  RelationTuple,
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ActionKind {
  Create,
  Edit,
  Delete,
}

/// A committed write, as reported by whoever performed it.
#[derive(Debug, Clone)]
pub struct MutationEvent {
  pub model:  ModelKind,
  /// Id of the user who made the change.
  pub actor:  String,
  pub before: Option<Value>,
  pub after:  Option<Value>,
}

impl MutationEvent {
  pub fn created(model: ModelKind, actor: impl Into<String>, after: Value) -> Self {
    Self { model, actor: actor.into(), before: None, after: Some(after) }
  }

  pub fn edited(
    model: ModelKind,
    actor: impl Into<String>,
    before: Value,
    after: Value,
  ) -> Self {
    Self {
      model,
      actor: actor.into(),
      before: Some(before),
      after: Some(after),
    }
  }

  pub fn deleted(model: ModelKind, actor: impl Into<String>, before: Value) -> Self {
    Self { model, actor: actor.into(), before: Some(before), after: None }
  }
}

// ─── Records ─────────────────────────────────────────────────────────────────

/// Input to [`ActivityLog::append_activity`].
#[derive(Debug, Clone, PartialEq)]
pub struct NewActivity {
  pub actor:       String,
  pub model:       ModelKind,
  pub document_id: String,
  /// The entity's state before the change; an empty object on creation.
  pub document:    Value,
  pub title:       String,
  pub diffs:       Vec<DiffOp>,
}

/// An immutable audit log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRecord {
  pub id:          Uuid,
  pub created_at:  DateTime<Utc>,
  pub actor:       String,
  pub model:       ModelKind,
  pub document_id: String,
  #[serde(default)]
  pub document:    Value,
  pub title:       String,
  pub diffs:       Vec<DiffOp>,
}

impl ActivityRecord {
  pub fn from_new(
    activity: NewActivity,
    id: Uuid,
    created_at: DateTime<Utc>,
  ) -> Self {
    Self {
      id,
      created_at,
      actor: activity.actor,
      model: activity.model,
      document_id: activity.document_id,
      document: activity.document,
      title: activity.title,
      diffs: activity.diffs,
    }
  }

  pub fn is_creation(&self) -> bool { self.document_id == NEW_DOCUMENT_ID }

  /// For tuple records, the relation kind the record is about.
  pub fn relation_kind(&self) -> RelationKind {
    if self.model != ModelKind::RelationTuple {
      return RelationKind::Unknown;
    }
    match RelationKind::from_diffs(&self.diffs) {
      RelationKind::Unknown => self
        .document
        .get("ptype")
        .and_then(Value::as_str)
        .map_or(RelationKind::Unknown, RelationKind::from_tag),
      kind => kind,
    }
  }
}

// ─── Reducer ─────────────────────────────────────────────────────────────────

/// Build the audit record for one mutation. Pure; ids and timestamps are
/// assigned on append.
pub fn reduce_activity(event: &MutationEvent, action: ActionKind) -> NewActivity {
  let empty = Value::Object(Map::new());
  let before = event.before.as_ref().unwrap_or(&empty);
  let after = event.after.as_ref().unwrap_or(&empty);

  let (lhs, rhs) = match action {
    ActionKind::Create => (&empty, after),
    ActionKind::Edit => (before, after),
    ActionKind::Delete => (before, &empty),
  };
  let (document_id, document) = match action {
    ActionKind::Create => (NEW_DOCUMENT_ID.to_owned(), empty.clone()),
    ActionKind::Edit | ActionKind::Delete => (
      before.get("id").and_then(value_text).unwrap_or_default(),
      before.clone(),
    ),
  };
  let subject = match action {
    ActionKind::Delete => event.before.as_ref().or(event.after.as_ref()),
    ActionKind::Create | ActionKind::Edit => {
      event.after.as_ref().or(event.before.as_ref())
    }
  };

  NewActivity {
    actor: event.actor.clone(),
    model: event.model,
    document_id,
    document,
    title: title_for(event.model, action, subject.unwrap_or(&empty)),
    diffs: diff(lhs, rhs, VOLATILE_FIELDS),
  }
}

fn title_for(model: ModelKind, action: ActionKind, subject: &Value) -> String {
  let field = |name: &str| {
    subject
      .get(name)
      .and_then(Value::as_str)
      .unwrap_or_default()
      .to_owned()
  };

  match model {
    ModelKind::Group => {
      let name = field("displayname");
      match action {
        ActionKind::Create => format!("Created {name} team "),
        ActionKind::Edit => format!("Edited {name}"),
        ActionKind::Delete => format!("Deleted {name} team"),
      }
    }
    ModelKind::RelationTuple => {
      let tag = field("ptype");
      let title = match (action, RelationKind::from_tag(&tag)) {
        (ActionKind::Edit, _) => return format!("Edited {tag} Casbin Rule "),
        (ActionKind::Create, RelationKind::RoleAssignment) => "Assigned a role",
        (ActionKind::Create, RelationKind::UserMembership) => "Assigned a user",
        (ActionKind::Create, RelationKind::AttributeAssignment) => {
          "Added attribute to a team"
        }
        (ActionKind::Delete, RelationKind::RoleAssignment) => "Removed a role",
        (ActionKind::Delete, RelationKind::UserMembership) => "Removed a user",
        (ActionKind::Delete, RelationKind::AttributeAssignment) => {
          "Removed attribute from a team"
        }
        (_, RelationKind::Unknown) => "",
      };
      title.to_owned()
    }
  }
}

/// Reduce `event` and append the result to `log`.
pub async fn record_activity<L: ActivityLog>(
  log: &L,
  event: &MutationEvent,
  action: ActionKind,
) -> Result<ActivityRecord, L::Error> {
  let record = log.append_activity(reduce_activity(event, action)).await?;
  tracing::debug!(
    id = %record.id,
    model = record.model.as_ref(),
    title = %record.title,
    "recorded activity"
  );
  Ok(record)
}

// ─── Listing ─────────────────────────────────────────────────────────────────

/// Which records a listing returns.
///
/// Unscoped listings leave out attribute assignments. A group-scoped listing
/// returns only records about that group: the group's own record history plus
/// tuple records whose diffs add or remove a reference to it, written either
/// as a bare id or as `{"group": id}`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivityQuery {
  pub group: Option<String>,
}

impl ActivityQuery {
  pub fn for_group(group: impl Into<String>) -> Self {
    Self { group: Some(group.into()) }
  }

  pub fn matches(&self, record: &ActivityRecord) -> bool {
    match &self.group {
      None => record.relation_kind() != RelationKind::AttributeAssignment,
      Some(group) => in_group_scope(record, group),
    }
  }
}

fn in_group_scope(record: &ActivityRecord, group: &str) -> bool {
  if record.model == ModelKind::Group && record.document_id == group {
    return true;
  }
  record.diffs.iter().any(|op| {
    let [PathSegment::Key(field)] = op.path() else {
      return false;
    };
    let value = match op.kind() {
      DiffKind::Added => op.after(),
      DiffKind::Removed => op.before(),
      DiffKind::Edited | DiffKind::ArrayIndexChange => None,
    };
    let Some(text) = value.and_then(value_text) else {
      return false;
    };
    match (record.model, field.as_str()) {
      (ModelKind::Group, "id") => text == group,
      (ModelKind::RelationTuple, "v0" | "v1") => {
        parse_ref(&text, "group").as_deref() == Some(group)
      }
      _ => false,
    }
  })
}

/// Fetch one page of records and project each for display.
pub async fn list_activities<S>(
  store: &S,
  query: &ActivityQuery,
) -> Result<Vec<DisplayActivity>, S::Error>
where
  S: ActivityLog + Directory,
{
  let records = store.list_activities(query).await?;
  tracing::debug!(count = records.len(), group = ?query.group, "listing activities");
  try_join_all(records.iter().map(|record| project_activity(record, store)))
    .await
}

// ─── Projection ──────────────────────────────────────────────────────────────

/// Names involved in an activity, by what happened to them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayDiff {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub created: Option<Vec<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub edited:  Option<Vec<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub removed: Option<Vec<String>>,
}

/// One row of the activity feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayActivity {
  pub id:         Uuid,
  pub reason:     String,
  pub created_at: DateTime<Utc>,
  pub diff:       DisplayDiff,
  /// Username of the actor; empty when the user no longer exists.
  pub user:       String,
}

/// Project a record for display.
///
/// Foreign ids that no longer resolve become empty strings; only failures of
/// the directory itself are returned as errors.
pub async fn project_activity<D: Directory>(
  record: &ActivityRecord,
  directory: &D,
) -> Result<DisplayActivity, D::Error> {
  let user = lookup(directory, DirectoryKind::User, &record.actor)
    .await?
    .and_then(|found| found.username)
    .unwrap_or_default();

  let diff = match record.model {
    ModelKind::Group => group_diff(record),
    ModelKind::RelationTuple => tuple_diff(record, directory).await?,
  };

  Ok(DisplayActivity {
    id: record.id,
    reason: record.title.clone(),
    created_at: record.created_at,
    diff,
    user,
  })
}

fn group_diff(record: &ActivityRecord) -> DisplayDiff {
  let mut out = DisplayDiff::default();
  let Some(op) = extract_field(&record.diffs, "displayname").into_iter().next()
  else {
    return out;
  };

  if record.is_creation() {
    out.created = Some(vec![display_text(op.after())]);
  } else {
    match (op.before(), op.after()) {
      (Some(old), Some(new)) => {
        out.edited = Some(vec![display_text(Some(old)), display_text(Some(new))]);
      }
      (Some(old), None) => out.removed = Some(vec![display_text(Some(old))]),
      _ => {}
    }
  }
  out
}

async fn tuple_diff<D: Directory>(
  record: &ActivityRecord,
  directory: &D,
) -> Result<DisplayDiff, D::Error> {
  let created = record.is_creation();
  let relation = tuple_state(record, created)
    .and_then(|raw| Relation::from_raw(&raw).ok());

  let name = match relation {
    Some(Relation::RoleAssignment(grant)) => {
      display_name(directory, DirectoryKind::Role, &grant.role_id).await?
    }
    Some(Relation::UserMembership(membership)) => {
      display_name(directory, DirectoryKind::User, &membership.user_id).await?
    }
    Some(Relation::AttributeAssignment(attribute)) => {
      attribute.attributes.to_string()
    }
    None if record.relation_kind() == RelationKind::Unknown => {
      return Ok(DisplayDiff::default());
    }
    None => String::new(),
  };

  Ok(if created {
    DisplayDiff { created: Some(vec![name]), ..DisplayDiff::default() }
  } else {
    DisplayDiff {
      removed: Some(vec![name, String::new()]),
      ..DisplayDiff::default()
    }
  })
}

/// The tuple a record is about: the stored pre-state when there is one,
/// otherwise rebuilt from the slot diffs.
fn tuple_state(record: &ActivityRecord, created: bool) -> Option<RawTuple> {
  if !created
    && let Ok(raw) = serde_json::from_value::<RawTuple>(record.document.clone())
  {
    return Some(raw);
  }

  let side = |field: &str| {
    extract_field(&record.diffs, field).first().and_then(|op| {
      let value = if created { op.after() } else { op.before() };
      value.and_then(Value::as_str).map(str::to_owned)
    })
  };

  let mut raw = RawTuple::new(side("ptype")?);
  for slot in Slot::ALL {
    raw.set_slot(slot, side(slot.name()));
  }
  Some(raw)
}

async fn lookup<D: Directory>(
  directory: &D,
  kind: DirectoryKind,
  id: &str,
) -> Result<Option<DisplayRecord>, D::Error> {
  let found = directory.find_by_id(kind, id).await?;
  if found.is_none() {
    tracing::warn!(?kind, id, "activity references a missing directory entry");
  }
  Ok(found)
}

async fn display_name<D: Directory>(
  directory: &D,
  kind: DirectoryKind,
  id: &str,
) -> Result<String, D::Error> {
  Ok(
    lookup(directory, kind, id)
      .await?
      .map(|found| found.displayname)
      .unwrap_or_default(),
  )
}

fn display_text(value: Option<&Value>) -> String {
  match value {
    Some(Value::String(text)) => text.clone(),
    Some(Value::Null) | None => String::new(),
    Some(other) => other.to_string(),
  }
}
