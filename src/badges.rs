//! Comparative badges
//!
//! Daily badges (most improved, top scorer) compare today against
//! yesterday and are recomputed on every refresh, never persisted.
//! Weekly badges are shared state: the persisted set wins whenever it is
//! complete, so every member sees the same winners no matter who refreshed
//! first. Only an admin writes the computed set back, and the write is an
//! idempotent upsert keyed by (group, week start).

use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::config::BackendConfig;
use crate::models::{covers_all_weekly_types, BadgeType, BadgeWinner, FamilyMember, ScoreRow};

/// ---------------------------------------------------------------------------
/// Error Types
/// ---------------------------------------------------------------------------

#[derive(Debug, Error, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum BadgeError {
  #[error("HTTP request failed: {0}")]
  Request(String),

  #[error("Badge store error: {0}")]
  Api(String),

  #[error("Parse error: {0}")]
  Parse(String),
}

impl From<reqwest::Error> for BadgeError {
  fn from(e: reqwest::Error) -> Self {
    BadgeError::Request(e.to_string())
  }
}

/// ---------------------------------------------------------------------------
/// Store Trait
/// ---------------------------------------------------------------------------

#[async_trait]
pub trait BadgeStore: Send + Sync {
  async fn read_weekly(
    &self,
    group_id: &str,
    week_start: NaiveDate,
  ) -> Result<Vec<BadgeWinner>, BadgeError>;

  /// Upsert keyed by (group, week start). Safe to call repeatedly with
  /// the same winners.
  async fn upsert_weekly(
    &self,
    group_id: &str,
    week_start: NaiveDate,
    week_end: NaiveDate,
    winners: &[BadgeWinner],
  ) -> Result<(), BadgeError>;
}

/// ---------------------------------------------------------------------------
/// HTTP Implementation
/// ---------------------------------------------------------------------------

pub struct BackendBadgeStore {
  client: Client,
  config: BackendConfig,
}

impl BackendBadgeStore {
  pub fn new(config: BackendConfig) -> Self {
    Self {
      client: Client::new(),
      config,
    }
  }
}

#[async_trait]
impl BadgeStore for BackendBadgeStore {
  async fn read_weekly(
    &self,
    group_id: &str,
    week_start: NaiveDate,
  ) -> Result<Vec<BadgeWinner>, BadgeError> {
    let url = format!(
      "{}/badges/weekly?group_id={}&week_start={}",
      self.config.base_url, group_id, week_start
    );
    let response = self
      .client
      .get(&url)
      .bearer_auth(&self.config.api_key)
      .send()
      .await?;

    if !response.status().is_success() {
      let status = response.status();
      let error_text = response.text().await.unwrap_or_default();
      return Err(BadgeError::Api(format!(
        "Badge API error {}: {}",
        status, error_text
      )));
    }

    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| BadgeError::Parse(e.to_string()))
  }

  async fn upsert_weekly(
    &self,
    group_id: &str,
    week_start: NaiveDate,
    week_end: NaiveDate,
    winners: &[BadgeWinner],
  ) -> Result<(), BadgeError> {
    let url = format!("{}/badges/weekly", self.config.base_url);
    let response = self
      .client
      .post(&url)
      .bearer_auth(&self.config.api_key)
      .json(&serde_json::json!({
        "group_id": group_id,
        "week_start": week_start,
        "week_end": week_end,
        "winners": winners,
      }))
      .send()
      .await?;

    if !response.status().is_success() {
      let status = response.status();
      let error_text = response.text().await.unwrap_or_default();
      return Err(BadgeError::Api(format!(
        "Badge API error {}: {}",
        status, error_text
      )));
    }
    Ok(())
  }
}

/// ---------------------------------------------------------------------------
/// Daily Totals
/// ---------------------------------------------------------------------------

/// One total per (member, day). Pillar rows for the same day carry the
/// same total; the max tolerates a straggler from a partial rescore.
fn daily_totals(rows: &[ScoreRow]) -> HashMap<(String, NaiveDate), i64> {
  let mut totals: HashMap<(String, NaiveDate), i64> = HashMap::new();
  for row in rows {
    let entry = totals
      .entry((row.member_id.clone(), row.day))
      .or_insert(row.total_score);
    if row.total_score > *entry {
      *entry = row.total_score;
    }
  }
  totals
}

fn total_for(
  totals: &HashMap<(String, NaiveDate), i64>,
  member_id: &str,
  day: NaiveDate,
) -> Option<i64> {
  totals.get(&(member_id.to_string(), day)).copied()
}

/// ---------------------------------------------------------------------------
/// Daily Badges
/// ---------------------------------------------------------------------------

/// Compute today's badges. Needs at least two members with a total for
/// today, otherwise none are awarded. Ties go to the lexically smaller
/// member id so every device computes the same winner.
pub fn compute_daily_badges(
  rows: &[ScoreRow],
  members: &[FamilyMember],
  today: NaiveDate,
) -> Vec<BadgeWinner> {
  let totals = daily_totals(rows);
  let yesterday = today.pred_opt().unwrap_or(today);

  let mut eligible: Vec<&FamilyMember> = members.iter().filter(|m| m.is_eligible()).collect();
  eligible.sort_by(|a, b| a.member_id.cmp(&b.member_id));

  let scored_today: Vec<(&FamilyMember, i64)> = eligible
    .iter()
    .filter_map(|m| total_for(&totals, &m.member_id, today).map(|t| (*m, t)))
    .collect();

  if scored_today.len() < 2 {
    return Vec::new();
  }

  let mut badges = Vec::new();

  if let Some((top, score)) = scored_today
    .iter()
    .max_by(|a, b| a.1.cmp(&b.1).then(b.0.member_id.cmp(&a.0.member_id)))
  {
    badges.push(
      BadgeWinner::new(BadgeType::TopScorer, &top.member_id).with_metric("total", *score as f64),
    );
  }

  // Most improved needs both days; a positive change only.
  let improvement = scored_today
    .iter()
    .filter_map(|(m, today_total)| {
      let yesterday_total = total_for(&totals, &m.member_id, yesterday)?;
      if yesterday_total <= 0 {
        return None;
      }
      let delta_pct =
        (*today_total - yesterday_total) as f64 / yesterday_total as f64 * 100.0;
      (delta_pct > 0.0).then_some((*m, delta_pct))
    })
    .max_by(|a, b| {
      a.1
        .partial_cmp(&b.1)
        .unwrap_or(std::cmp::Ordering::Equal)
        .then(b.0.member_id.cmp(&a.0.member_id))
    });

  if let Some((winner, delta_pct)) = improvement {
    badges.push(
      BadgeWinner::new(BadgeType::MostImproved, &winner.member_id)
        .with_metric("delta_pct", delta_pct),
    );
  }

  badges
}

/// ---------------------------------------------------------------------------
/// Weekly Badges
/// ---------------------------------------------------------------------------

struct WeeklySeries {
  member_id: String,
  this_week_mean: f64,
  prior_week_mean: Option<f64>,
  /// Longest run of consecutive days with a recorded total across the
  /// trailing 14 days.
  tracking_streak: u32,
}

fn weekly_series(
  rows: &[ScoreRow],
  members: &[FamilyMember],
  week_start: NaiveDate,
) -> Vec<WeeklySeries> {
  let totals = daily_totals(rows);
  let prior_start = week_start.checked_sub_days(Days::new(7)).unwrap_or(week_start);

  let mut eligible: Vec<&FamilyMember> = members.iter().filter(|m| m.is_eligible()).collect();
  eligible.sort_by(|a, b| a.member_id.cmp(&b.member_id));

  eligible
    .iter()
    .filter_map(|m| {
      let week_totals: Vec<f64> = (0..7)
        .filter_map(|offset| {
          let day = week_start.checked_add_days(Days::new(offset))?;
          total_for(&totals, &m.member_id, day).map(|t| t as f64)
        })
        .collect();
      if week_totals.is_empty() {
        return None;
      }

      let this_week_mean = week_totals.iter().sum::<f64>() / week_totals.len() as f64;

      let prior_totals: Vec<f64> = (0..7)
        .filter_map(|offset| {
          let day = prior_start.checked_add_days(Days::new(offset))?;
          total_for(&totals, &m.member_id, day).map(|t| t as f64)
        })
        .collect();
      let prior_week_mean = (!prior_totals.is_empty())
        .then(|| prior_totals.iter().sum::<f64>() / prior_totals.len() as f64);

      // Trailing 14 days ending with this week.
      let mut tracking_streak = 0u32;
      let mut run = 0u32;
      for offset in 0..14 {
        let has_total = prior_start
          .checked_add_days(Days::new(offset))
          .and_then(|day| total_for(&totals, &m.member_id, day))
          .is_some();
        run = if has_total { run + 1 } else { 0 };
        tracking_streak = tracking_streak.max(run);
      }

      Some(WeeklySeries {
        member_id: m.member_id.clone(),
        this_week_mean,
        prior_week_mean,
        tracking_streak,
      })
    })
    .collect()
}

/// Compute the weekly winners for the rolling week starting `week_start`.
/// `rows` must span this week and the prior one. As with daily badges,
/// fewer than two members with data this week yields nothing.
pub fn compute_weekly_badges(
  rows: &[ScoreRow],
  members: &[FamilyMember],
  week_start: NaiveDate,
) -> Vec<BadgeWinner> {
  let series = weekly_series(rows, members, week_start);
  if series.len() < 2 {
    return Vec::new();
  }

  let mut badges = Vec::new();

  if let Some(champion) = series.iter().max_by(|a, b| {
    a.this_week_mean
      .partial_cmp(&b.this_week_mean)
      .unwrap_or(std::cmp::Ordering::Equal)
      .then(b.member_id.cmp(&a.member_id))
  }) {
    badges.push(
      BadgeWinner::new(BadgeType::WeeklyChampion, &champion.member_id)
        .with_metric("weekly_mean", champion.this_week_mean),
    );
  }

  let most_improved = series
    .iter()
    .filter_map(|s| {
      let prior = s.prior_week_mean?;
      if prior <= 0.0 {
        return None;
      }
      let delta_pct = (s.this_week_mean - prior) / prior * 100.0;
      (delta_pct > 0.0).then_some((s, delta_pct))
    })
    .max_by(|a, b| {
      a.1
        .partial_cmp(&b.1)
        .unwrap_or(std::cmp::Ordering::Equal)
        .then(b.0.member_id.cmp(&a.0.member_id))
    });
  if let Some((winner, delta_pct)) = most_improved {
    badges.push(
      BadgeWinner::new(BadgeType::WeeklyMostImproved, &winner.member_id)
        .with_metric("delta_pct", delta_pct),
    );
  }

  let most_consistent = series
    .iter()
    .filter(|s| s.tracking_streak >= 2)
    .max_by(|a, b| {
      a.tracking_streak
        .cmp(&b.tracking_streak)
        .then(b.member_id.cmp(&a.member_id))
    });
  if let Some(winner) = most_consistent {
    badges.push(
      BadgeWinner::new(BadgeType::MostConsistent, &winner.member_id)
        .with_metric("streak_days", winner.tracking_streak as f64),
    );
  }

  badges
}

/// ---------------------------------------------------------------------------
/// Reconciliation
/// ---------------------------------------------------------------------------

pub struct BadgeEngine {
  store: Arc<dyn BadgeStore>,
}

impl BadgeEngine {
  pub fn new(store: Arc<dyn BadgeStore>) -> Self {
    Self { store }
  }

  /// Weekly badges for the rolling week ending `today`. A complete
  /// persisted set is returned exactly as stored, computation skipped
  /// entirely. An incomplete or empty set is recomputed from `rows`;
  /// types the store already named keep their stored winner. Only an
  /// admin writes the result back.
  pub async fn reconcile_weekly(
    &self,
    group_id: &str,
    today: NaiveDate,
    rows: &[ScoreRow],
    members: &[FamilyMember],
    actor_is_admin: bool,
  ) -> Result<Vec<BadgeWinner>, BadgeError> {
    let week_start = today.checked_sub_days(Days::new(6)).unwrap_or(today);
    let persisted = self.store.read_weekly(group_id, week_start).await?;

    if covers_all_weekly_types(&persisted) {
      return Ok(persisted);
    }

    let computed = compute_weekly_badges(rows, members, week_start);
    let mut winners = persisted;
    for badge in computed {
      if !winners.iter().any(|w| w.badge_type == badge.badge_type) {
        winners.push(badge);
      }
    }

    if actor_is_admin && !winners.is_empty() {
      self
        .store
        .upsert_weekly(group_id, week_start, today, &winners)
        .await?;
      log::info!(
        "Upserted {} weekly badges for {} week of {}",
        winners.len(),
        group_id,
        week_start
      );
    }

    Ok(winners)
  }
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
