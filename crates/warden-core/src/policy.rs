//! Resolving which users a resource filter applies to, and with which
//! policies.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
  directory::{Role, User},
  relation::{Principal, Relation, RelationKind, RoleAssignment},
  store::{Directory, TupleScan, TupleStore},
  subset::is_subset,
};

/// A role assignment as seen from the user it applies to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
  /// The user themselves, or a group they belong to.
  pub subject:  Principal,
  pub resource: Value,
  pub role_id:  String,
  /// `None` when the role no longer exists.
  pub role:     Option<Role>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserWithPolicies {
  #[serde(flatten)]
  pub user:     User,
  pub policies: Vec<Policy>,
}

/// `null` and `{}` place no constraint on resources.
pub fn is_empty_filter(filter: &Value) -> bool {
  match filter {
    Value::Null => true,
    Value::Object(map) => map.is_empty(),
    _ => false,
  }
}

/// Users relevant to `filter`, each with the policies that match it.
///
/// A user is returned when they belong to a group whose attributes contain
/// `filter`, or when at least one of their policies has a resource containing
/// `filter`. Non-empty `role_tags` restrict policies to roles carrying one of
/// those tags. With neither a filter nor tags nothing is returned.
pub async fn list_users_matching<S>(
  store: &S,
  filter: &Value,
  role_tags: &[String],
) -> Result<Vec<UserWithPolicies>, S::Error>
where
  S: TupleStore + Directory,
{
  if is_empty_filter(filter) && role_tags.is_empty() {
    return Ok(Vec::new());
  }

  let mut users = users_with_policies(store, role_tags).await?;
  if is_empty_filter(filter) {
    return Ok(users);
  }

  let members = members_of_matching_groups(store, filter).await?;
  for entry in &mut users {
    entry.policies.retain(|policy| is_subset(filter, &policy.resource));
  }
  users.retain(|entry| {
    members.contains(&entry.user.id) || !entry.policies.is_empty()
  });

  tracing::debug!(
    matched = users.len(),
    via_groups = members.len(),
    "resolved users for resource filter"
  );
  Ok(users)
}

async fn users_with_policies<S>(
  store: &S,
  role_tags: &[String],
) -> Result<Vec<UserWithPolicies>, S::Error>
where
  S: TupleStore + Directory,
{
  let roles: HashMap<String, Role> = store
    .list_roles()
    .await?
    .into_iter()
    .filter(|role| role.has_any_tag(role_tags))
    .map(|role| (role.id.clone(), role))
    .collect();

  let mut groups_of: HashMap<String, Vec<String>> = HashMap::new();
  for tuple in store.scan(&TupleScan::of_kind(RelationKind::UserMembership)).await? {
    if let Relation::UserMembership(m) = tuple.relation {
      groups_of.entry(m.user_id).or_default().push(m.group_id);
    }
  }

  let grants: Vec<RoleAssignment> = store
    .scan(&TupleScan::of_kind(RelationKind::RoleAssignment))
    .await?
    .into_iter()
    .filter_map(|tuple| match tuple.relation {
      Relation::RoleAssignment(grant) => Some(grant),
      _ => None,
    })
    .collect();

  let users = store.list_users().await?;
  Ok(
    users
      .into_iter()
      .map(|user| {
        let groups = groups_of.get(&user.id).map(Vec::as_slice).unwrap_or_default();
        let applies = |subject: &Principal| match subject {
          Principal::User(id) => *id == user.id,
          Principal::Group(id) => groups.contains(id),
        };
        let policies = grants
          .iter()
          .filter(|grant| applies(&grant.subject))
          .filter_map(|grant| {
            let role = roles.get(&grant.role_id).cloned();
            if role.is_none() && !role_tags.is_empty() {
              return None;
            }
            Some(Policy {
              subject: grant.subject.clone(),
              resource: grant.resource.clone(),
              role_id: grant.role_id.clone(),
              role,
            })
          })
          .collect();
        UserWithPolicies { user, policies }
      })
      .collect(),
  )
}

async fn members_of_matching_groups<S>(
  store: &S,
  filter: &Value,
) -> Result<HashSet<String>, S::Error>
where
  S: TupleStore,
{
  let groups: Vec<String> = store
    .scan(&TupleScan::of_kind(RelationKind::AttributeAssignment))
    .await?
    .into_iter()
    .filter_map(|tuple| match tuple.relation {
      Relation::AttributeAssignment(a) if is_subset(filter, &a.attributes) => {
        Some(a.group_id)
      }
      _ => None,
    })
    .collect();

  if groups.is_empty() {
    return Ok(HashSet::new());
  }

  let scan = TupleScan {
    kind: Some(RelationKind::UserMembership),
    groups,
    user: None,
  };
  Ok(
    store
      .scan(&scan)
      .await?
      .into_iter()
      .filter_map(|tuple| tuple.relation.user_id().map(str::to_owned))
      .collect(),
  )
}
