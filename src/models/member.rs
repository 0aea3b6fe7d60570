use serde::{Deserialize, Serialize};

/// Role within the household group. Admins own the weekly badge upsert;
/// everyone else is read-mostly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberRole {
  Admin,
  Member,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FamilyMember {
  pub member_id: String,
  pub name: String,
  pub role: MemberRole,
  /// Invited but not yet joined. Pending members have no score data and
  /// are skipped by every engine.
  pub pending: bool,
}

impl FamilyMember {
  pub fn is_admin(&self) -> bool {
    self.role == MemberRole::Admin
  }

  /// Eligible for evaluation: has an identity and has actually joined.
  pub fn is_eligible(&self) -> bool {
    !self.pending && !self.name.trim().is_empty()
  }
}

/// Initials for the avatar chip: first letter of the first two words.
pub fn member_initials(name: &str) -> String {
  name
    .split_whitespace()
    .take(2)
    .filter_map(|word| word.chars().next())
    .flat_map(|c| c.to_uppercase())
    .collect()
}
