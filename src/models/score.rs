use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One of the three tracked health dimensions. Scored 0-100, higher is
/// always better (Stress is stored as a recovery-style score).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pillar {
  Sleep,
  Movement,
  Stress,
}

impl Pillar {
  pub const ALL: [Pillar; 3] = [Pillar::Sleep, Pillar::Movement, Pillar::Stress];

  pub fn as_str(&self) -> &'static str {
    match self {
      Pillar::Sleep => "sleep",
      Pillar::Movement => "movement",
      Pillar::Stress => "stress",
    }
  }
}

impl std::fmt::Display for Pillar {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

impl std::str::FromStr for Pillar {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "sleep" => Ok(Pillar::Sleep),
      "movement" => Ok(Pillar::Movement),
      "stress" => Ok(Pillar::Stress),
      _ => Err(format!("Unknown pillar: {}", s)),
    }
  }
}

/// One member's daily score for a single pillar, as produced by the
/// backend's scoring job. Read-only to this crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreRow {
  pub member_id: String,
  pub day: NaiveDate,
  pub pillar: Pillar,
  pub value: i64,
  pub total_score: i64,
}

impl ScoreRow {
  /// Rows outside the 0-100 scale are malformed and skipped, never fatal.
  pub fn is_valid(&self) -> bool {
    (0..=100).contains(&self.value)
  }
}

/// Raw daily metrics behind the scores (sparse; wearables miss days).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawMetricRow {
  pub member_id: String,
  pub day: NaiveDate,
  pub steps: Option<i64>,
  pub sleep_minutes: Option<i64>,
  pub hrv_ms: Option<f64>,
  pub resting_hr: Option<i64>,
}

impl RawMetricRow {
  /// Used to pick the richer of two rows for the same day.
  pub fn populated_fields(&self) -> usize {
    self.steps.is_some() as usize
      + self.sleep_minutes.is_some() as usize
      + self.hrv_ms.is_some() as usize
      + self.resting_hr.is_some() as usize
  }
}

/// Whether a member has enough history to evaluate trends.
/// Derived on every evaluation pass, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageStatus {
  pub window_days: u32,
  pub days_available: u32,
  pub missing_days: u32,
  pub required_days: u32,
  pub need_more_data_days: u32,
  pub has_minimum_coverage: bool,
}

impl CoverageStatus {
  /// Coverage for a member with no usable rows at all. Not an error:
  /// rendered as a "collecting baseline" state.
  pub fn empty(window_days: u32, required_days: u32) -> Self {
    Self {
      window_days,
      days_available: 0,
      missing_days: window_days,
      required_days,
      need_more_data_days: required_days,
      has_minimum_coverage: false,
    }
  }
}
