use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::insight::Severity;

/// Lifecycle state of one alert episode. Dismissed is terminal; a snoozed
/// alert transitions back to Active when `until` elapses, evaluated by the
/// remote authority, never locally.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EpisodeStatus {
  Active,
  Snoozed { until: DateTime<Utc> },
  Dismissed,
}

impl EpisodeStatus {
  pub fn is_active(&self) -> bool {
    matches!(self, EpisodeStatus::Active)
  }
}

/// An alert as held by the remote authority. This crate keeps a
/// read-through cache only; the authority owns every transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRecord {
  pub alert_id: String,
  pub member_id: String,
  pub metric_type: String,
  pub pattern_type: String,
  #[serde(flatten)]
  pub episode_status: EpisodeStatus,
  pub active_since: DateTime<Utc>,
  /// Consecutive-day count of the detected deviation.
  pub current_level: u32,
  pub severity: Severity,
  pub deviation_percent: f64,
  pub baseline_value: f64,
  pub recent_value: f64,
}
