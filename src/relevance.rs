//! Relevance filtering for candidate insights
//!
//! Removes alerts that are no longer actionable (the member already
//! recovered) and builds the fallback feed when no usable trend insights
//! exist. The fallback gate is deliberately stricter than the primary
//! path: without multi-day evidence, only a real current shortfall is
//! worth a notification.

use std::collections::HashMap;

use chrono::{Duration, NaiveDate};

use crate::config::Policy;
use crate::models::member::member_initials;
use crate::models::{FamilyMember, NotificationItem, Pillar, ScoreRow, TrendInsight};

/// ---------------------------------------------------------------------------
/// Current-State Scores
/// ---------------------------------------------------------------------------

/// Each member's most recent fresh score per pillar.
#[derive(Debug, Clone, Default)]
pub struct CurrentScores {
  by_member_pillar: HashMap<(String, Pillar), (NaiveDate, i64)>,
}

impl CurrentScores {
  /// Stale rows are excluded entirely: a recovered-looking score that is
  /// days old must not suppress a live alert.
  pub fn from_rows(rows: &[ScoreRow], today: NaiveDate, policy: &Policy) -> Self {
    let oldest_fresh = today - Duration::days(policy.freshness_days);
    let mut by_member_pillar: HashMap<(String, Pillar), (NaiveDate, i64)> = HashMap::new();

    for row in rows.iter().filter(|r| r.is_valid() && r.day >= oldest_fresh) {
      let key = (row.member_id.clone(), row.pillar);
      match by_member_pillar.get(&key) {
        Some((day, _)) if *day >= row.day => {}
        _ => {
          by_member_pillar.insert(key, (row.day, row.value));
        }
      }
    }

    Self { by_member_pillar }
  }

  pub fn get(&self, member_id: &str, pillar: Pillar) -> Option<i64> {
    self
      .by_member_pillar
      .get(&(member_id.to_string(), pillar))
      .map(|(_, value)| *value)
  }

  /// The member's single lowest-scoring pillar, if any pillar data exists.
  pub fn lowest_pillar(&self, member_id: &str) -> Option<(Pillar, i64)> {
    Pillar::ALL
      .iter()
      .filter_map(|p| self.get(member_id, *p).map(|v| (*p, v)))
      .min_by_key(|(_, v)| *v)
  }
}

/// ---------------------------------------------------------------------------
/// Primary Path
/// ---------------------------------------------------------------------------

/// Filter trend insights against current state. Engine order is preserved;
/// suppression never un-suppresses.
pub fn filter_primary(
  insights: &[TrendInsight],
  current: &CurrentScores,
  policy: &Policy,
) -> Vec<NotificationItem> {
  insights
    .iter()
    .filter(|insight| !insight.member_name.trim().is_empty())
    .filter(|insight| {
      if !insight.severity.is_concern() {
        return true;
      }
      match current.get(&insight.member_id, insight.pillar) {
        Some(score) if score >= policy.recovery_threshold => {
          log::debug!(
            "Suppressing {} insight for {}: current {} score {} >= {}",
            insight.severity.as_str(),
            insight.member_id,
            insight.pillar,
            score,
            policy.recovery_threshold
          );
          false
        }
        _ => true,
      }
    })
    .take(policy.primary_cap)
    .map(notification_from_insight)
    .collect()
}

fn notification_from_insight(insight: &TrendInsight) -> NotificationItem {
  NotificationItem {
    id: format!("trend-{}-{}", insight.member_id, insight.pillar),
    member_id: insight.member_id.clone(),
    pillar: insight.pillar,
    title: insight.title.clone(),
    body: insight.body.clone(),
    member_initials: member_initials(&insight.member_name),
    member_name: insight.member_name.clone(),
    source_alert_id: None,
  }
}

/// ---------------------------------------------------------------------------
/// Fallback Path
/// ---------------------------------------------------------------------------

/// One entry per member whose lowest pillar shows a real, current
/// shortfall. Used only when the primary path yields nothing.
pub fn fallback_notifications(
  members: &[FamilyMember],
  current: &CurrentScores,
  optimal_targets: &HashMap<Pillar, f64>,
  policy: &Policy,
) -> Vec<NotificationItem> {
  members
    .iter()
    .filter(|m| m.is_eligible())
    .filter_map(|member| {
      let (pillar, score) = current.lowest_pillar(&member.member_id)?;

      let on_track = match optimal_targets.get(&pillar) {
        Some(target) if *target > 0.0 => score as f64 / target >= policy.fallback_target_ratio,
        _ => score >= policy.fallback_no_target_score,
      };
      // Suppress only when the member is on track AND the lowest pillar
      // clears the floor; anything else is a real shortfall.
      if on_track && score >= policy.fallback_floor {
        return None;
      }

      let first_name = member.name.split_whitespace().next().unwrap_or(&member.name);
      Some(NotificationItem {
        id: format!("focus-{}-{}", member.member_id, pillar),
        member_id: member.member_id.clone(),
        pillar,
        title: format!("{} could use a focus on {}", first_name, pillar),
        body: format!(
          "{}'s {} score is at {} today, their lowest pillar this week.",
          first_name, pillar, score
        ),
        member_initials: member_initials(&member.name),
        member_name: member.name.clone(),
        source_alert_id: None,
      })
    })
    .take(policy.fallback_cap)
    .collect()
}

/// ---------------------------------------------------------------------------
/// Feed Assembly
/// ---------------------------------------------------------------------------

/// Primary when it has survivors, otherwise fallback. Fallback entries
/// never mix with surviving trend insights.
pub fn build_feed(
  insights: &[TrendInsight],
  members: &[FamilyMember],
  current: &CurrentScores,
  optimal_targets: &HashMap<Pillar, f64>,
  policy: &Policy,
) -> Vec<NotificationItem> {
  let primary = filter_primary(insights, current, policy);
  if !primary.is_empty() {
    return primary;
  }
  fallback_notifications(members, current, optimal_targets, policy)
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
