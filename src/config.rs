//! Policy constants and backend endpoint configuration
//!
//! Every tuned threshold lives here as data, not as a hardcoded invariant.
//! Defaults match the values the product shipped with; `HEARTHSCORE_*`
//! environment variables overlay them.

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Serialize)]
pub enum ConfigError {
  #[error("Missing configuration: {0}")]
  MissingConfig(String),

  #[error("Invalid configuration: {0}")]
  InvalidConfig(String),
}

/// ---------------------------------------------------------------------------
/// Policy
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
  /// Rolling window evaluated for trends.
  pub window_days: u32,
  /// Minimum distinct days before trends are computed at all.
  pub required_days: u32,
  /// Watch/Attention insights are dropped when the member's current
  /// same-pillar score has recovered to at least this value.
  pub recovery_threshold: i64,
  /// Fallback suppression: current / optimal target at or above this
  /// ratio counts as "on track".
  pub fallback_target_ratio: f64,
  /// Fallback suppression when no optimal target is configured.
  pub fallback_no_target_score: i64,
  /// Fallback entries need the lowest pillar below this floor.
  pub fallback_floor: i64,
  /// Surviving primary-path notifications.
  pub primary_cap: usize,
  /// Surviving fallback-path notifications.
  pub fallback_cap: usize,
  /// Items surfaced on the top-level notification list.
  pub top_level_cap: usize,
  /// A score older than this many days is stale: shown for continuity,
  /// excluded from every computation.
  pub freshness_days: i64,
  /// Deviation magnitudes (percent) for severity classification.
  pub watch_deviation_pct: f64,
  pub attention_deviation_pct: f64,
  pub celebrate_deviation_pct: f64,
  /// Consecutive deviating days that escalate Watch to Attention.
  pub attention_streak_days: u32,
  /// Score-fetch retry ceiling and capped exponential schedule.
  pub max_fetch_attempts: u32,
  /// Automatic chat retries per user message after "not yet generated".
  pub chat_retry_budget: u32,
}

impl Default for Policy {
  fn default() -> Self {
    Self {
      window_days: 21,
      required_days: 7,
      recovery_threshold: 85,
      fallback_target_ratio: 0.90,
      fallback_no_target_score: 80,
      fallback_floor: 75,
      primary_cap: 5,
      fallback_cap: 3,
      top_level_cap: 2,
      freshness_days: 3,
      watch_deviation_pct: 10.0,
      attention_deviation_pct: 20.0,
      celebrate_deviation_pct: 10.0,
      attention_streak_days: 5,
      max_fetch_attempts: 4,
      chat_retry_budget: 1,
    }
  }
}

impl Policy {
  /// Defaults overlaid with any `HEARTHSCORE_*` environment overrides.
  /// Unparsable values keep the default and log a warning.
  pub fn from_env() -> Self {
    dotenvy::dotenv().ok();
    let mut policy = Self::default();

    override_from_env("HEARTHSCORE_WINDOW_DAYS", &mut policy.window_days);
    override_from_env("HEARTHSCORE_REQUIRED_DAYS", &mut policy.required_days);
    override_from_env("HEARTHSCORE_RECOVERY_THRESHOLD", &mut policy.recovery_threshold);
    override_from_env("HEARTHSCORE_FALLBACK_TARGET_RATIO", &mut policy.fallback_target_ratio);
    override_from_env("HEARTHSCORE_FALLBACK_NO_TARGET_SCORE", &mut policy.fallback_no_target_score);
    override_from_env("HEARTHSCORE_FALLBACK_FLOOR", &mut policy.fallback_floor);
    override_from_env("HEARTHSCORE_PRIMARY_CAP", &mut policy.primary_cap);
    override_from_env("HEARTHSCORE_FALLBACK_CAP", &mut policy.fallback_cap);
    override_from_env("HEARTHSCORE_TOP_LEVEL_CAP", &mut policy.top_level_cap);
    override_from_env("HEARTHSCORE_FRESHNESS_DAYS", &mut policy.freshness_days);
    override_from_env("HEARTHSCORE_WATCH_DEVIATION_PCT", &mut policy.watch_deviation_pct);
    override_from_env("HEARTHSCORE_ATTENTION_DEVIATION_PCT", &mut policy.attention_deviation_pct);
    override_from_env("HEARTHSCORE_CELEBRATE_DEVIATION_PCT", &mut policy.celebrate_deviation_pct);
    override_from_env("HEARTHSCORE_ATTENTION_STREAK_DAYS", &mut policy.attention_streak_days);
    override_from_env("HEARTHSCORE_MAX_FETCH_ATTEMPTS", &mut policy.max_fetch_attempts);
    override_from_env("HEARTHSCORE_CHAT_RETRY_BUDGET", &mut policy.chat_retry_budget);

    policy
  }

  /// Capped exponential backoff for score/baseline fetches: 5s, then 10s
  /// for every later attempt.
  pub fn retry_delay(&self, attempt: u32) -> Duration {
    if attempt <= 1 {
      Duration::from_secs(5)
    } else {
      Duration::from_secs(10)
    }
  }
}

fn override_from_env<T: std::str::FromStr>(key: &str, slot: &mut T) {
  if let Ok(raw) = env::var(key) {
    match raw.parse::<T>() {
      Ok(value) => *slot = value,
      Err(_) => log::warn!("Ignoring unparsable {}={}", key, raw),
    }
  }
}

/// ---------------------------------------------------------------------------
/// Backend endpoints
/// ---------------------------------------------------------------------------

/// Connection details for the remote backend (scores, alerts, content,
/// badges all live behind one base URL).
#[derive(Debug, Clone)]
pub struct BackendConfig {
  pub base_url: String,
  pub api_key: String,
}

impl BackendConfig {
  pub fn from_env() -> Result<Self, ConfigError> {
    dotenvy::dotenv().ok();
    let base_url = env::var("HEARTHSCORE_BASE_URL")
      .map_err(|_| ConfigError::MissingConfig("HEARTHSCORE_BASE_URL".into()))?;
    url::Url::parse(&base_url)
      .map_err(|e| ConfigError::InvalidConfig(format!("HEARTHSCORE_BASE_URL: {}", e)))?;

    Ok(Self {
      base_url: base_url.trim_end_matches('/').to_string(),
      api_key: env::var("HEARTHSCORE_API_KEY")
        .map_err(|_| ConfigError::MissingConfig("HEARTHSCORE_API_KEY".into()))?,
    })
  }
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
