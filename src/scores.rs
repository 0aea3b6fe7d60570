//! Score repository adapter
//!
//! Fetches per-member daily pillar scores and raw metric rows from the
//! backend. Every fetch returns series that are ordered by day ascending
//! and deduplicated to at most one row per (member, day, pillar).

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::config::BackendConfig;
use crate::models::{Pillar, RawMetricRow, ScoreRow};

/// ---------------------------------------------------------------------------
/// Error Types
/// ---------------------------------------------------------------------------

#[derive(Debug, Error, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum ScoreError {
  #[error("HTTP request failed: {0}")]
  Request(String),

  #[error("API error: {0}")]
  Api(String),

  #[error("Parse error: {0}")]
  Parse(String),

  /// Caller-superseded. Not a failure: the caller keeps prior state.
  #[error("Request cancelled")]
  Cancelled,
}

impl From<reqwest::Error> for ScoreError {
  fn from(e: reqwest::Error) -> Self {
    ScoreError::Request(e.to_string())
  }
}

/// ---------------------------------------------------------------------------
/// Repository Trait
/// ---------------------------------------------------------------------------

#[async_trait]
pub trait ScoreRepository: Send + Sync {
  /// Last `days` of one member's scores for a single pillar.
  async fn fetch_pillar_history(
    &self,
    member_id: &str,
    pillar: Pillar,
    days: u32,
  ) -> Result<Vec<ScoreRow>, ScoreError>;

  /// Raw wearable metrics behind the scores.
  async fn fetch_raw_metrics(
    &self,
    member_id: &str,
    days: u32,
  ) -> Result<Vec<RawMetricRow>, ScoreError>;

  /// Bulk fetch for the whole group, inclusive date range.
  async fn fetch_group_scores(
    &self,
    group_id: &str,
    start_day: NaiveDate,
    end_day: NaiveDate,
  ) -> Result<Vec<ScoreRow>, ScoreError>;
}

/// ---------------------------------------------------------------------------
/// Deduplication
/// ---------------------------------------------------------------------------

/// At most one row per (member, day, pillar): the higher value wins, ties
/// keep the first row seen. Malformed rows (value outside 0-100) are
/// dropped. Output is ordered by day ascending.
pub fn dedupe_scores(rows: Vec<ScoreRow>) -> Vec<ScoreRow> {
  let mut by_key: HashMap<(String, NaiveDate, Pillar), ScoreRow> = HashMap::new();

  for row in rows {
    if !row.is_valid() {
      log::debug!(
        "Skipping malformed score row for {} on {}: value {}",
        row.member_id,
        row.day,
        row.value
      );
      continue;
    }
    let key = (row.member_id.clone(), row.day, row.pillar);
    match by_key.get(&key) {
      Some(existing) if existing.value >= row.value => {}
      _ => {
        by_key.insert(key, row);
      }
    }
  }

  let mut deduped: Vec<ScoreRow> = by_key.into_values().collect();
  deduped.sort_by(|a, b| {
    (a.day, &a.member_id, a.pillar.as_str()).cmp(&(b.day, &b.member_id, b.pillar.as_str()))
  });
  deduped
}

/// At most one raw row per (member, day): the row with more populated
/// fields wins, ties keep the first. Ordered by day ascending.
pub fn dedupe_raw_metrics(rows: Vec<RawMetricRow>) -> Vec<RawMetricRow> {
  let mut by_key: HashMap<(String, NaiveDate), RawMetricRow> = HashMap::new();

  for row in rows {
    let key = (row.member_id.clone(), row.day);
    match by_key.get(&key) {
      Some(existing) if existing.populated_fields() >= row.populated_fields() => {}
      _ => {
        by_key.insert(key, row);
      }
    }
  }

  let mut deduped: Vec<RawMetricRow> = by_key.into_values().collect();
  deduped.sort_by(|a, b| (a.day, &a.member_id).cmp(&(b.day, &b.member_id)));
  deduped
}

/// ---------------------------------------------------------------------------
/// HTTP Implementation
/// ---------------------------------------------------------------------------

pub struct BackendScoreRepository {
  client: Client,
  config: BackendConfig,
}

impl BackendScoreRepository {
  pub fn new(config: BackendConfig) -> Self {
    Self {
      client: Client::new(),
      config,
    }
  }

  async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, ScoreError> {
    let response = self
      .client
      .get(url)
      .bearer_auth(&self.config.api_key)
      .send()
      .await?;

    if !response.status().is_success() {
      let status = response.status();
      let error_text = response.text().await.unwrap_or_default();
      return Err(ScoreError::Api(format!(
        "Score API error {}: {}",
        status, error_text
      )));
    }

    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| {
      log::warn!(
        "Failed to parse score response: {} (first 500 chars: {})",
        e,
        &body[..body.len().min(500)]
      );
      ScoreError::Parse(e.to_string())
    })
  }
}

#[async_trait]
impl ScoreRepository for BackendScoreRepository {
  async fn fetch_pillar_history(
    &self,
    member_id: &str,
    pillar: Pillar,
    days: u32,
  ) -> Result<Vec<ScoreRow>, ScoreError> {
    let url = format!(
      "{}/scores/pillar?member_id={}&pillar={}&days={}",
      self.config.base_url, member_id, pillar, days
    );
    let rows: Vec<ScoreRow> = self.get_json(&url).await?;
    Ok(dedupe_scores(rows))
  }

  async fn fetch_raw_metrics(
    &self,
    member_id: &str,
    days: u32,
  ) -> Result<Vec<RawMetricRow>, ScoreError> {
    let url = format!(
      "{}/scores/raw?member_id={}&days={}",
      self.config.base_url, member_id, days
    );
    let rows: Vec<RawMetricRow> = self.get_json(&url).await?;
    Ok(dedupe_raw_metrics(rows))
  }

  async fn fetch_group_scores(
    &self,
    group_id: &str,
    start_day: NaiveDate,
    end_day: NaiveDate,
  ) -> Result<Vec<ScoreRow>, ScoreError> {
    let url = format!(
      "{}/scores/group?group_id={}&start_day={}&end_day={}",
      self.config.base_url, group_id, start_day, end_day
    );
    let rows: Vec<ScoreRow> = self.get_json(&url).await?;
    Ok(dedupe_scores(rows))
  }
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
