use serde::{Deserialize, Serialize};

use super::score::Pillar;

/// Urgency classification for a trend insight. Ordering puts the most
/// urgent last so `max` picks Attention over Watch over Celebrate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
  Celebrate,
  Watch,
  Attention,
}

impl Severity {
  pub fn as_str(&self) -> &'static str {
    match self {
      Severity::Celebrate => "celebrate",
      Severity::Watch => "watch",
      Severity::Attention => "attention",
    }
  }

  /// Only deteriorations are ever suppressed by recovery; celebrations
  /// always survive filtering.
  pub fn is_concern(&self) -> bool {
    matches!(self, Severity::Watch | Severity::Attention)
  }
}

/// A candidate insight produced by one trend-evaluation pass. Immutable
/// once created; its lifetime is the pass that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendInsight {
  pub member_id: String,
  pub member_name: String,
  pub pillar: Pillar,
  pub severity: Severity,
  pub title: String,
  pub body: String,
  /// Opaque provenance string. Carried through for display and debugging,
  /// never parsed.
  pub evidence_tag: String,
  pub window_days: u32,
  pub required_days: u32,
  pub missing_days: u32,
  pub confidence: f64,
}

/// Presentation-facing projection of an insight or server-detected
/// pattern. Rebuilt on every refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationItem {
  pub id: String,
  pub member_id: String,
  pub pillar: Pillar,
  pub title: String,
  pub body: String,
  pub member_initials: String,
  pub member_name: String,
  /// `Some` only when the item originates from a server-side pattern
  /// alert; trend-only items carry no generated content.
  pub source_alert_id: Option<String>,
}

/// Numeric evidence behind a generated insight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightEvidence {
  pub baseline_value: f64,
  pub recent_value: f64,
  pub deviation_percent: f64,
}

/// AI-authored explanatory content for one alert. Cached keyed by
/// `alert_id`; invalidated only by explicit regeneration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightContent {
  pub alert_id: String,
  pub headline: String,
  pub interpretation: String,
  pub data_connections: String,
  #[serde(default)]
  pub possible_causes: Vec<String>,
  #[serde(default)]
  pub action_steps: Vec<String>,
  pub confidence_label: String,
  pub confidence_reason: String,
  pub evidence: InsightEvidence,
  #[serde(default)]
  pub message_suggestions: Vec<String>,
}
