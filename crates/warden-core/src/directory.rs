//! Directory entities (users, roles and groups) and the display records
//! used to resolve foreign ids for the activity feed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Which directory a point lookup goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DirectoryKind {
  Role,
  User,
}

/// The minimum needed to show a directory entry to a person.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayRecord {
  pub id:          String,
  pub displayname: String,
  /// Set for users only.
  pub username:    Option<String>,
}

// ─── Users ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
  pub id:          String,
  pub username:    String,
  pub displayname: String,
  #[serde(default)]
  pub metadata:    Value,
  pub created_at:  DateTime<Utc>,
}

impl From<&User> for DisplayRecord {
  fn from(user: &User) -> Self {
    Self {
      id:          user.id.clone(),
      displayname: user.displayname.clone(),
      username:    Some(user.username.clone()),
    }
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewUser {
  pub username:    Option<String>,
  pub displayname: String,
  #[serde(default)]
  pub metadata:    Value,
}

impl NewUser {
  /// The username to store: the one supplied, or one derived from the
  /// display name.
  pub fn resolved_username(&self) -> String {
    match self.username.as_deref().map(str::trim) {
      Some(name) if !name.is_empty() => name.to_owned(),
      _ => slugify(&self.displayname),
    }
  }

  /// Whether the caller chose the username. A chosen name is stored as is or
  /// rejected; a derived one is numbered until it is free.
  pub fn has_explicit_username(&self) -> bool {
    self.username.as_deref().is_some_and(|name| !name.trim().is_empty())
  }
}

/// The username to try on the `attempt`-th go for a derived `base`: the base
/// itself first, then `base-2`, `base-3` and so on.
pub fn numbered_username(base: &str, attempt: usize) -> String {
  match attempt {
    0 => base.to_owned(),
    n => format!("{base}-{}", n + 1),
  }
}

/// Lowercase ASCII alphanumerics joined by single dashes.
pub fn slugify(text: &str) -> String {
  text
    .split(|c: char| !c.is_ascii_alphanumeric())
    .filter(|part| !part.is_empty())
    .map(str::to_ascii_lowercase)
    .collect::<Vec<_>>()
    .join("-")
}

// ─── Roles ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
  pub id:          String,
  pub displayname: String,
  /// Free-form labels used to scope policy listings.
  #[serde(default)]
  pub tags:        Vec<String>,
}

impl Role {
  /// Whether the role carries any of `tags`. An empty filter admits every role.
  pub fn has_any_tag(&self, tags: &[String]) -> bool {
    tags.is_empty() || self.tags.iter().any(|t| tags.contains(t))
  }
}

impl From<&Role> for DisplayRecord {
  fn from(role: &Role) -> Self {
    Self {
      id:          role.id.clone(),
      displayname: role.displayname.clone(),
      username:    None,
    }
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewRole {
  pub id:          Option<String>,
  pub displayname: String,
  #[serde(default)]
  pub tags:        Vec<String>,
}

// ─── Groups ──────────────────────────────────────────────────────────────────

/// A team. Its JSON form is the snapshot group activity is diffed over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
  pub id:          String,
  pub displayname: String,
  #[serde(default)]
  pub metadata:    Value,
  pub created_at:  DateTime<Utc>,
  pub updated_at:  DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewGroup {
  pub displayname: String,
  #[serde(default)]
  pub metadata:    Value,
}

/// Partial update; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GroupUpdate {
  pub displayname: Option<String>,
  pub metadata:    Option<Value>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn username_falls_back_to_slug() {
    let new = NewUser {
      username:    None,
      displayname: "  Ada  Lovelace (Eng) ".into(),
      metadata:    Value::Null,
    };
    assert_eq!(new.resolved_username(), "ada-lovelace-eng");

    assert!(!new.has_explicit_username());

    let blank = NewUser { username: Some("  ".into()), ..new.clone() };
    assert!(!blank.has_explicit_username());

    let explicit = NewUser { username: Some("ada".into()), ..new };
    assert_eq!(explicit.resolved_username(), "ada");
    assert!(explicit.has_explicit_username());
  }

  #[test]
  fn derived_usernames_are_numbered_from_two() {
    assert_eq!(numbered_username("ada-lovelace", 0), "ada-lovelace");
    assert_eq!(numbered_username("ada-lovelace", 1), "ada-lovelace-2");
    assert_eq!(numbered_username("ada-lovelace", 2), "ada-lovelace-3");
  }

  #[test]
  fn role_tag_filter() {
    let role = Role {
      id:          "r".into(),
      displayname: "Viewer".into(),
      tags:        vec!["org".into(), "read".into()],
    };
    assert!(role.has_any_tag(&[]));
    assert!(role.has_any_tag(&["read".into()]));
    assert!(!role.has_any_tag(&["write".into()]));
  }
}
