use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Comparative achievement markers. Daily badges are recomputed on every
/// refresh and never persisted; weekly badges are reconciled against the
/// shared store so every member sees the same winners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BadgeType {
  // Daily
  MostImproved,
  TopScorer,
  // Weekly
  WeeklyChampion,
  WeeklyMostImproved,
  MostConsistent,
}

impl BadgeType {
  pub const DAILY: [BadgeType; 2] = [BadgeType::MostImproved, BadgeType::TopScorer];

  pub const WEEKLY: [BadgeType; 3] = [
    BadgeType::WeeklyChampion,
    BadgeType::WeeklyMostImproved,
    BadgeType::MostConsistent,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      BadgeType::MostImproved => "most_improved",
      BadgeType::TopScorer => "top_scorer",
      BadgeType::WeeklyChampion => "weekly_champion",
      BadgeType::WeeklyMostImproved => "weekly_most_improved",
      BadgeType::MostConsistent => "most_consistent",
    }
  }
}

/// A badge award. `metadata` is display-only (e.g. the winning delta);
/// core logic never reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BadgeWinner {
  pub badge_type: BadgeType,
  pub winner_member_id: String,
  #[serde(default)]
  pub metadata: BTreeMap<String, serde_json::Value>,
}

impl BadgeWinner {
  pub fn new(badge_type: BadgeType, winner_member_id: impl Into<String>) -> Self {
    Self {
      badge_type,
      winner_member_id: winner_member_id.into(),
      metadata: BTreeMap::new(),
    }
  }

  pub fn with_metric(mut self, key: &str, value: f64) -> Self {
    self.metadata.insert(key.to_string(), serde_json::json!(value));
    self
  }
}

/// True when `winners` already names a winner for every weekly badge type,
/// meaning the persisted set is complete and must be returned as-is.
pub fn covers_all_weekly_types(winners: &[BadgeWinner]) -> bool {
  BadgeType::WEEKLY
    .iter()
    .all(|bt| winners.iter().any(|w| w.badge_type == *bt))
}
