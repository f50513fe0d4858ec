//! Relation tuples: the storage shape of the authorization graph.
//!
//! On disk a tuple is a type tag plus up to six positional string slots
//! ([`RawTuple`]). Everything past the store boundary works with the closed
//! [`Relation`] enum instead, so slot positions are only interpreted here.
//!
//! | Tag  | Kind                  | v0                  | v1                   | v2             |
//! |------|-----------------------|---------------------|----------------------|----------------|
//! | `p`  | role assignment       | `{"user"\|"group": id}` | resource JSON    | `{"role": id}` |
//! | `g`  | user membership       | `{"user": id}`      | group reference      |                |
//! | `g2` | attribute assignment  | group reference     | attribute JSON       |                |
//!
//! A group reference is either a bare id or a JSON-encoded `{"group": id}`;
//! both are accepted on read and the wrapped form is written.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::{
  Error, Result,
  diff::{DiffOp, PathSegment},
};

// ─── Raw positional form ─────────────────────────────────────────────────────

/// One of the six positional slots of a [`RawTuple`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
  V0,
  V1,
  V2,
  V3,
  V4,
  V5,
}

impl Slot {
  pub const ALL: [Slot; 6] =
    [Slot::V0, Slot::V1, Slot::V2, Slot::V3, Slot::V4, Slot::V5];

  /// The field name used in snapshots, diffs and the database.
  pub fn name(self) -> &'static str {
    match self {
      Self::V0 => "v0",
      Self::V1 => "v1",
      Self::V2 => "v2",
      Self::V3 => "v3",
      Self::V4 => "v4",
      Self::V5 => "v5",
    }
  }
}

/// The positional record exactly as it is stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTuple {
  pub ptype: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub v0:    Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub v1:    Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub v2:    Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub v3:    Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub v4:    Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub v5:    Option<String>,
}

impl RawTuple {
  pub fn new(ptype: impl Into<String>) -> Self {
    Self { ptype: ptype.into(), ..Self::default() }
  }

  pub fn slot(&self, slot: Slot) -> Option<&str> {
    match slot {
      Slot::V0 => self.v0.as_deref(),
      Slot::V1 => self.v1.as_deref(),
      Slot::V2 => self.v2.as_deref(),
      Slot::V3 => self.v3.as_deref(),
      Slot::V4 => self.v4.as_deref(),
      Slot::V5 => self.v5.as_deref(),
    }
  }

  pub fn set_slot(&mut self, slot: Slot, value: Option<String>) {
    let target = match slot {
      Slot::V0 => &mut self.v0,
      Slot::V1 => &mut self.v1,
      Slot::V2 => &mut self.v2,
      Slot::V3 => &mut self.v3,
      Slot::V4 => &mut self.v4,
      Slot::V5 => &mut self.v5,
    };
    *target = value;
  }

  /// Builder-style variant of [`RawTuple::set_slot`].
  pub fn with(mut self, slot: Slot, value: impl Into<String>) -> Self {
    self.set_slot(slot, Some(value.into()));
    self
  }

  fn require(&self, slot: Slot) -> Result<&str> {
    self
      .slot(slot)
      .ok_or_else(|| self.malformed(slot, "slot is empty"))
  }

  fn malformed(&self, slot: Slot, reason: impl Into<String>) -> Error {
    Error::MalformedTuple {
      ptype:  self.ptype.clone(),
      slot:   slot.name(),
      reason: reason.into(),
    }
  }
}

// ─── Classification ──────────────────────────────────────────────────────────

/// What a tuple means, decided solely by its type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
  RoleAssignment,
  UserMembership,
  AttributeAssignment,
  Unknown,
}

impl RelationKind {
  pub fn from_tag(tag: &str) -> Self {
    match tag {
      "p" => Self::RoleAssignment,
      "g" => Self::UserMembership,
      "g2" => Self::AttributeAssignment,
      _ => Self::Unknown,
    }
  }

  /// The stored type tag; `None` for [`RelationKind::Unknown`].
  pub fn tag(self) -> Option<&'static str> {
    match self {
      Self::RoleAssignment => Some("p"),
      Self::UserMembership => Some("g"),
      Self::AttributeAssignment => Some("g2"),
      Self::Unknown => None,
    }
  }

  /// Classify the tuple a list of diffs was computed over, using the
  /// `ptype` change (post-state value when there is one, else pre-state).
  pub fn from_diffs(diffs: &[DiffOp]) -> Self {
    extract_field(diffs, "ptype")
      .first()
      .and_then(|op| op.after().or(op.before()))
      .and_then(Value::as_str)
      .map_or(Self::Unknown, Self::from_tag)
  }
}

pub fn classify(tuple: &RawTuple) -> RelationKind {
  RelationKind::from_tag(&tuple.ptype)
}

/// The diff operations whose first path segment is `field`, e.g. a slot name
/// (`"v2"`) or a model field (`"displayname"`).
pub fn extract_field<'a>(diffs: &'a [DiffOp], field: &str) -> Vec<&'a DiffOp> {
  diffs
    .iter()
    .filter(|op| {
      matches!(op.path().first(), Some(PathSegment::Key(key)) if key == field)
    })
    .collect()
}

// ─── Typed form ──────────────────────────────────────────────────────────────

/// Who a role is granted to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Principal {
  User(String),
  Group(String),
}

/// `p`: a role granted to a principal over a resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleAssignment {
  pub subject:  Principal,
  /// Resource attributes the grant applies to, e.g. `{"entity": "gojek"}`.
  pub resource: Value,
  pub role_id:  String,
}

/// `g`: a user is a member of a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
  pub user_id:  String,
  pub group_id: String,
}

/// `g2`: a group carries an attribute object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupAttribute {
  pub group_id:   String,
  pub attributes: Value,
}

/// A decoded relation tuple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Relation {
  RoleAssignment(RoleAssignment),
  UserMembership(Membership),
  AttributeAssignment(GroupAttribute),
}

impl Relation {
  pub fn kind(&self) -> RelationKind {
    match self {
      Self::RoleAssignment(_) => RelationKind::RoleAssignment,
      Self::UserMembership(_) => RelationKind::UserMembership,
      Self::AttributeAssignment(_) => RelationKind::AttributeAssignment,
    }
  }

  /// The group this relation points at, if any.
  pub fn group_id(&self) -> Option<&str> {
    match self {
      Self::RoleAssignment(RoleAssignment {
        subject: Principal::Group(id),
        ..
      }) => Some(id),
      Self::RoleAssignment(_) => None,
      Self::UserMembership(m) => Some(&m.group_id),
      Self::AttributeAssignment(a) => Some(&a.group_id),
    }
  }

  /// The user this relation points at, if any.
  pub fn user_id(&self) -> Option<&str> {
    match self {
      Self::RoleAssignment(RoleAssignment {
        subject: Principal::User(id),
        ..
      }) => Some(id),
      Self::UserMembership(m) => Some(&m.user_id),
      _ => None,
    }
  }

  pub fn from_raw(raw: &RawTuple) -> Result<Self> {
    match classify(raw) {
      RelationKind::RoleAssignment => {
        let subject_raw = raw.require(Slot::V0)?;
        let subject: Principal = serde_json::from_str(subject_raw)
          .map_err(|e| raw.malformed(Slot::V0, e.to_string()))?;
        let resource = match raw.slot(Slot::V1) {
          Some(text) => serde_json::from_str(text)
            .map_err(|e| raw.malformed(Slot::V1, e.to_string()))?,
          None => json!({}),
        };
        let role_id = parse_ref(raw.require(Slot::V2)?, "role")
          .ok_or_else(|| raw.malformed(Slot::V2, "expected a role reference"))?;
        Ok(Self::RoleAssignment(RoleAssignment { subject, resource, role_id }))
      }
      RelationKind::UserMembership => {
        let user_id = parse_ref(raw.require(Slot::V0)?, "user")
          .ok_or_else(|| raw.malformed(Slot::V0, "expected a user reference"))?;
        let group_id = parse_ref(raw.require(Slot::V1)?, "group")
          .ok_or_else(|| raw.malformed(Slot::V1, "expected a group reference"))?;
        Ok(Self::UserMembership(Membership { user_id, group_id }))
      }
      RelationKind::AttributeAssignment => {
        let (v0, v1) = (raw.require(Slot::V0)?, raw.require(Slot::V1)?);
        let canonical =
          parse_ref(v0, "group").zip(parse_attributes(v1));
        let (group_id, attributes) = canonical
          .or_else(|| parse_ref(v1, "group").zip(parse_attributes(v0)))
          .ok_or_else(|| {
            raw.malformed(Slot::V1, "expected a group and an attribute object")
          })?;
        Ok(Self::AttributeAssignment(GroupAttribute { group_id, attributes }))
      }
      RelationKind::Unknown => Err(Error::UnknownRelation(raw.ptype.clone())),
    }
  }

  /// Encode into the canonical positional layout.
  pub fn to_raw(&self) -> RawTuple {
    match self {
      Self::RoleAssignment(a) => {
        let subject = match &a.subject {
          Principal::User(id) => json!({ "user": id }),
          Principal::Group(id) => json!({ "group": id }),
        };
        RawTuple::new("p")
          .with(Slot::V0, subject.to_string())
          .with(Slot::V1, a.resource.to_string())
          .with(Slot::V2, json!({ "role": a.role_id }).to_string())
      }
      Self::UserMembership(m) => RawTuple::new("g")
        .with(Slot::V0, json!({ "user": m.user_id }).to_string())
        .with(Slot::V1, json!({ "group": m.group_id }).to_string()),
      Self::AttributeAssignment(a) => RawTuple::new("g2")
        .with(Slot::V0, json!({ "group": a.group_id }).to_string())
        .with(Slot::V1, a.attributes.to_string()),
    }
  }
}

/// A stored relation with its identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationTuple {
  pub id:       Uuid,
  pub relation: Relation,
}

impl RelationTuple {
  /// The flat `{id, ptype, v0..v5}` object that tuple activity diffs are
  /// computed over.
  pub fn snapshot(&self) -> Result<Value> {
    let mut value = serde_json::to_value(self.relation.to_raw())?;
    if let Value::Object(map) = &mut value {
      map.insert("id".to_owned(), Value::String(self.id.to_string()));
    }
    Ok(value)
  }
}

// ─── Slot value helpers ──────────────────────────────────────────────────────

/// Read an id out of a slot that holds either `{"<key>": id}` or a bare id.
///
/// Returns `None` for JSON objects lacking `key` and for arrays.
pub fn parse_ref(raw: &str, key: &str) -> Option<String> {
  match serde_json::from_str::<Value>(raw) {
    Ok(Value::Object(map)) => map.get(key).and_then(value_text),
    Ok(Value::Array(_)) => None,
    Ok(Value::String(id)) => Some(id),
    _ => Some(raw.to_owned()),
  }
}

fn parse_attributes(raw: &str) -> Option<Value> {
  match serde_json::from_str::<Value>(raw) {
    Ok(value @ Value::Object(_)) => Some(value),
    _ => None,
  }
}

/// Render an id-like JSON scalar as text.
pub(crate) fn value_text(value: &Value) -> Option<String> {
  match value {
    Value::String(s) => Some(s.clone()),
    Value::Number(n) => Some(n.to_string()),
    _ => None,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::diff::diff;

  #[test]
  fn classifies_by_tag_only() {
    assert_eq!(classify(&RawTuple::new("p")), RelationKind::RoleAssignment);
    assert_eq!(classify(&RawTuple::new("g")), RelationKind::UserMembership);
    assert_eq!(
      classify(&RawTuple::new("g2")),
      RelationKind::AttributeAssignment
    );
    assert_eq!(classify(&RawTuple::new("g3")), RelationKind::Unknown);
    assert_eq!(classify(&RawTuple::new("")), RelationKind::Unknown);
  }

  #[test]
  fn membership_accepts_plain_and_wrapped_group() {
    let wrapped = RawTuple::new("g")
      .with(Slot::V0, r#"{"user":"u1"}"#)
      .with(Slot::V1, r#"{"group":"groupX"}"#);
    let plain = RawTuple::new("g")
      .with(Slot::V0, r#"{"user":"u1"}"#)
      .with(Slot::V1, "groupX");

    let expected = Relation::UserMembership(Membership {
      user_id:  "u1".into(),
      group_id: "groupX".into(),
    });
    assert_eq!(Relation::from_raw(&wrapped).unwrap(), expected);
    assert_eq!(Relation::from_raw(&plain).unwrap(), expected);
  }

  #[test]
  fn attribute_assignment_accepts_swapped_layout() {
    let swapped = RawTuple::new("g2")
      .with(Slot::V0, r#"{"attr":"dept"}"#)
      .with(Slot::V1, "groupX");
    let canonical = RawTuple::new("g2")
      .with(Slot::V0, r#"{"group":"groupX"}"#)
      .with(Slot::V1, r#"{"attr":"dept"}"#);

    for raw in [swapped, canonical] {
      let Relation::AttributeAssignment(a) = Relation::from_raw(&raw).unwrap()
      else {
        panic!("expected an attribute assignment");
      };
      assert_eq!(a.group_id, "groupX");
      assert_eq!(a.attributes, json!({ "attr": "dept" }));
    }
  }

  #[test]
  fn role_assignment_encodes_canonically() {
    let relation = Relation::RoleAssignment(RoleAssignment {
      subject:  Principal::Group("g1".into()),
      resource: json!({ "entity": "gojek" }),
      role_id:  "r1".into(),
    });
    let raw = relation.to_raw();
    assert_eq!(raw.ptype, "p");
    assert_eq!(raw.v0.as_deref(), Some(r#"{"group":"g1"}"#));
    assert_eq!(raw.v2.as_deref(), Some(r#"{"role":"r1"}"#));
    assert_eq!(Relation::from_raw(&raw).unwrap(), relation);
    assert_eq!(relation.group_id(), Some("g1"));
    assert_eq!(relation.user_id(), None);
  }

  #[test]
  fn decoding_reports_the_bad_slot() {
    let raw = RawTuple::new("p").with(Slot::V0, "not json");
    let err = Relation::from_raw(&raw).unwrap_err();
    assert!(matches!(err, Error::MalformedTuple { slot: "v0", .. }), "{err}");

    let raw = RawTuple::new("x");
    assert!(matches!(
      Relation::from_raw(&raw),
      Err(Error::UnknownRelation(tag)) if tag == "x"
    ));
  }

  #[test]
  fn parse_ref_shapes() {
    assert_eq!(parse_ref(r#"{"role":"r1"}"#, "role").as_deref(), Some("r1"));
    assert_eq!(parse_ref(r#"{"user":"u1"}"#, "role"), None);
    assert_eq!(parse_ref("plain-id", "group").as_deref(), Some("plain-id"));
    assert_eq!(parse_ref(r#""quoted""#, "group").as_deref(), Some("quoted"));
    assert_eq!(parse_ref("42", "group").as_deref(), Some("42"));
    assert_eq!(parse_ref("[1]", "group"), None);
  }

  #[test]
  fn snapshot_is_flat_and_carries_id() {
    let tuple = RelationTuple {
      id:       Uuid::nil(),
      relation: Relation::UserMembership(Membership {
        user_id:  "u1".into(),
        group_id: "g1".into(),
      }),
    };
    let snapshot = tuple.snapshot().unwrap();
    assert_eq!(
      snapshot,
      json!({
        "id": Uuid::nil().to_string(),
        "ptype": "g",
        "v0": r#"{"user":"u1"}"#,
        "v1": r#"{"group":"g1"}"#,
      })
    );
  }

  #[test]
  fn extract_field_and_kind_from_diffs() {
    let after = json!({ "ptype": "g2", "v0": "a", "v1": "b" });
    let diffs = diff(&json!({}), &after, &[]);

    let v1 = extract_field(&diffs, Slot::V1.name());
    assert_eq!(v1.len(), 1);
    assert_eq!(v1[0].after(), Some(&json!("b")));
    assert!(extract_field(&diffs, "v5").is_empty());

    assert_eq!(
      RelationKind::from_diffs(&diffs),
      RelationKind::AttributeAssignment
    );
    let removed = diff(&after, &json!({}), &[]);
    assert_eq!(
      RelationKind::from_diffs(&removed),
      RelationKind::AttributeAssignment
    );
    assert_eq!(RelationKind::from_diffs(&[]), RelationKind::Unknown);
  }
}
