//! Coverage and trend engine
//!
//! Computes, per member and pillar, whether enough history exists to
//! evaluate a trend, and if so classifies the deviation of a recent
//! window against a longer baseline. Thresholds come from `Policy`;
//! the math here is deliberately simple and deterministic.

use chrono::{Duration, NaiveDate};

use crate::config::Policy;
use crate::models::member::member_initials;
use crate::models::{CoverageStatus, FamilyMember, Pillar, ScoreRow, Severity, TrendInsight};

/// ---------------------------------------------------------------------------
/// Evaluation Results
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct MemberEvaluation {
  pub member_id: String,
  pub member_name: String,
  pub coverage: CoverageStatus,
  /// Most severe first. Empty whenever coverage is not met.
  pub insights: Vec<TrendInsight>,
}

#[derive(Debug, Clone)]
pub struct GroupEvaluation {
  /// Best coverage across eligible members; empty coverage when the group
  /// has nobody with fresh data.
  pub coverage: CoverageStatus,
  pub members: Vec<MemberEvaluation>,
}

impl GroupEvaluation {
  /// All insights across members, most severe first.
  pub fn insights(&self) -> Vec<&TrendInsight> {
    let mut all: Vec<&TrendInsight> = self
      .members
      .iter()
      .flat_map(|m| m.insights.iter())
      .collect();
    all.sort_by(|a, b| b.severity.cmp(&a.severity));
    all
  }
}

/// ---------------------------------------------------------------------------
/// Freshness
/// ---------------------------------------------------------------------------

/// A member's data is usable only when their most recent valid score is
/// within the freshness window. Stale members are shown for continuity
/// but excluded from trend, relevance, and badge computation.
pub fn has_fresh_scores(rows: &[ScoreRow], today: NaiveDate, policy: &Policy) -> bool {
  rows
    .iter()
    .filter(|r| r.is_valid())
    .map(|r| r.day)
    .max()
    .map(|latest| (today - latest).num_days() <= policy.freshness_days)
    .unwrap_or(false)
}

/// ---------------------------------------------------------------------------
/// Coverage
/// ---------------------------------------------------------------------------

/// Coverage over distinct in-window days carrying at least one valid score.
pub fn coverage(rows: &[ScoreRow], today: NaiveDate, policy: &Policy) -> CoverageStatus {
  let window_start = today - Duration::days(policy.window_days as i64 - 1);

  let mut days: Vec<NaiveDate> = rows
    .iter()
    .filter(|r| r.is_valid() && r.day >= window_start && r.day <= today)
    .map(|r| r.day)
    .collect();
  days.sort();
  days.dedup();

  let days_available = days.len() as u32;
  let missing_days = policy.window_days.saturating_sub(days_available);
  let has_minimum_coverage = days_available >= policy.required_days;

  CoverageStatus {
    window_days: policy.window_days,
    days_available,
    missing_days,
    required_days: policy.required_days,
    need_more_data_days: policy.required_days.saturating_sub(days_available),
    has_minimum_coverage,
  }
}

/// ---------------------------------------------------------------------------
/// Trend Classification
/// ---------------------------------------------------------------------------

struct PillarTrend {
  pillar: Pillar,
  severity: Severity,
  deviation_pct: f64,
  streak_days: u32,
  baseline_mean: f64,
  recent_mean: f64,
}

/// Recent-window mean vs full-window baseline mean for one pillar.
/// Returns None when there is no same-direction deviation worth surfacing.
fn classify_pillar(
  pillar: Pillar,
  rows: &[ScoreRow],
  today: NaiveDate,
  policy: &Policy,
) -> Option<PillarTrend> {
  let window_start = today - Duration::days(policy.window_days as i64 - 1);
  let recent_start = today - Duration::days(policy.required_days as i64 - 1);

  let mut in_window: Vec<&ScoreRow> = rows
    .iter()
    .filter(|r| r.pillar == pillar && r.is_valid() && r.day >= window_start && r.day <= today)
    .collect();
  in_window.sort_by_key(|r| r.day);

  if in_window.is_empty() {
    return None;
  }

  let baseline_mean =
    in_window.iter().map(|r| r.value as f64).sum::<f64>() / in_window.len() as f64;
  if baseline_mean <= 0.0 {
    return None;
  }

  let recent: Vec<&&ScoreRow> = in_window.iter().filter(|r| r.day >= recent_start).collect();
  if recent.is_empty() {
    // No current evidence; nothing to surface for this pillar.
    return None;
  }
  let recent_mean = recent.iter().map(|r| r.value as f64).sum::<f64>() / recent.len() as f64;

  let deviation_pct = (recent_mean - baseline_mean) / baseline_mean * 100.0;

  // Consecutive most-recent days deviating in the same direction as the
  // overall trend, each beyond the daily (watch) threshold.
  let mut streak_days = 0u32;
  for row in in_window.iter().rev() {
    let daily_pct = (row.value as f64 - baseline_mean) / baseline_mean * 100.0;
    let same_direction = daily_pct.signum() == deviation_pct.signum();
    if same_direction && daily_pct.abs() >= policy.watch_deviation_pct {
      streak_days += 1;
    } else {
      break;
    }
  }

  let severity = if deviation_pct >= policy.celebrate_deviation_pct {
    Severity::Celebrate
  } else if deviation_pct <= -policy.attention_deviation_pct
    || (deviation_pct <= -policy.watch_deviation_pct
      && streak_days >= policy.attention_streak_days)
  {
    Severity::Attention
  } else if deviation_pct <= -policy.watch_deviation_pct {
    Severity::Watch
  } else {
    return None;
  };

  Some(PillarTrend {
    pillar,
    severity,
    deviation_pct,
    streak_days,
    baseline_mean,
    recent_mean,
  })
}

fn pillar_label(pillar: Pillar) -> &'static str {
  match pillar {
    Pillar::Sleep => "Sleep",
    Pillar::Movement => "Movement",
    Pillar::Stress => "Stress recovery",
  }
}

fn build_insight(
  member: &FamilyMember,
  trend: &PillarTrend,
  coverage: &CoverageStatus,
) -> TrendInsight {
  let first_name = member.name.split_whitespace().next().unwrap_or(&member.name);
  let label = pillar_label(trend.pillar);

  let (title, body) = match trend.severity {
    Severity::Celebrate => (
      format!("{}'s {} is trending up", first_name, label.to_lowercase()),
      format!(
        "{} averaged {:.0} over the last {} days, {:.0}% above the {}-day baseline of {:.0}.",
        label,
        trend.recent_mean,
        coverage.required_days,
        trend.deviation_pct,
        coverage.window_days,
        trend.baseline_mean
      ),
    ),
    Severity::Watch => (
      format!("{}'s {} has dipped", first_name, label.to_lowercase()),
      format!(
        "{} averaged {:.0} over the last {} days, {:.0}% below the {}-day baseline of {:.0}.",
        label,
        trend.recent_mean,
        coverage.required_days,
        trend.deviation_pct.abs(),
        coverage.window_days,
        trend.baseline_mean
      ),
    ),
    Severity::Attention => (
      format!("{}'s {} needs attention", first_name, label.to_lowercase()),
      format!(
        "{} has been {:.0}% below the {}-day baseline of {:.0} for {} consecutive days.",
        label,
        trend.deviation_pct.abs(),
        coverage.window_days,
        trend.baseline_mean,
        trend.streak_days.max(1)
      ),
    ),
  };

  TrendInsight {
    member_id: member.member_id.clone(),
    member_name: member.name.clone(),
    pillar: trend.pillar,
    severity: trend.severity,
    title,
    body,
    evidence_tag: format!("trend/{}/{}d", trend.pillar, coverage.window_days),
    window_days: coverage.window_days,
    required_days: coverage.required_days,
    missing_days: coverage.missing_days,
    confidence: (coverage.days_available as f64 / coverage.window_days as f64).clamp(0.0, 1.0),
  }
}

/// ---------------------------------------------------------------------------
/// Member / Group Evaluation
/// ---------------------------------------------------------------------------

/// Evaluate one member's rows. Insufficient coverage yields a status only,
/// never an error; a member with zero valid days is zero coverage.
pub fn evaluate_member(
  member: &FamilyMember,
  rows: &[ScoreRow],
  today: NaiveDate,
  policy: &Policy,
) -> MemberEvaluation {
  let coverage = coverage(rows, today, policy);

  let mut insights = Vec::new();
  if coverage.has_minimum_coverage {
    let mut trends: Vec<PillarTrend> = Pillar::ALL
      .iter()
      .filter_map(|p| classify_pillar(*p, rows, today, policy))
      .collect();
    // Most severe first, then deviation magnitude.
    trends.sort_by(|a, b| {
      b.severity
        .cmp(&a.severity)
        .then(b.deviation_pct.abs().partial_cmp(&a.deviation_pct.abs()).unwrap_or(std::cmp::Ordering::Equal))
    });
    insights = trends.iter().map(|t| build_insight(member, t, &coverage)).collect();
  }

  MemberEvaluation {
    member_id: member.member_id.clone(),
    member_name: member.name.clone(),
    coverage,
    insights,
  }
}

/// Evaluate every eligible member with fresh data. Members who are
/// pending, nameless, or stale are skipped entirely.
pub fn evaluate_group(
  members: &[FamilyMember],
  rows: &[ScoreRow],
  today: NaiveDate,
  policy: &Policy,
) -> GroupEvaluation {
  let mut evaluations = Vec::new();

  for member in members.iter().filter(|m| m.is_eligible()) {
    let member_rows: Vec<ScoreRow> = rows
      .iter()
      .filter(|r| r.member_id == member.member_id)
      .cloned()
      .collect();

    if !has_fresh_scores(&member_rows, today, policy) {
      log::debug!("Skipping {}: no fresh scores", member.member_id);
      continue;
    }

    evaluations.push(evaluate_member(member, &member_rows, today, policy));
  }

  let coverage = evaluations
    .iter()
    .map(|e| e.coverage.clone())
    .max_by_key(|c| c.days_available)
    .unwrap_or_else(|| CoverageStatus::empty(policy.window_days, policy.required_days));

  GroupEvaluation {
    coverage,
    members: evaluations,
  }
}

/// Initials used by the notification projection.
pub fn initials_for(member_name: &str) -> String {
  member_initials(member_name)
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
