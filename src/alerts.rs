//! Alert lifecycle management
//!
//! The remote authority owns every alert transition; this module keeps a
//! read-through cache of the active set and forwards mutations. The cache
//! is last-known-good: a failed or cancelled refresh never replaces a
//! previously successful result, and a mutation only changes the local
//! view after the authority confirms it.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::config::BackendConfig;
use crate::models::AlertRecord;

/// ---------------------------------------------------------------------------
/// Error Types
/// ---------------------------------------------------------------------------

#[derive(Debug, Error, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum AlertError {
  #[error("HTTP request failed: {0}")]
  Request(String),

  #[error("Alert authority error: {0}")]
  Api(String),

  #[error("Mutation rejected for alert {0}")]
  Rejected(String),

  /// Caller-superseded; cached state stays untouched.
  #[error("Request cancelled")]
  Cancelled,
}

impl From<reqwest::Error> for AlertError {
  fn from(e: reqwest::Error) -> Self {
    AlertError::Request(e.to_string())
  }
}

/// ---------------------------------------------------------------------------
/// Authority Trait
/// ---------------------------------------------------------------------------

#[async_trait]
pub trait AlertAuthority: Send + Sync {
  async fn list_active(&self, group_id: &str) -> Result<Vec<AlertRecord>, AlertError>;

  async fn snooze(&self, alert_id: &str, days: u32) -> Result<(), AlertError>;

  async fn dismiss(&self, alert_id: &str) -> Result<(), AlertError>;
}

/// ---------------------------------------------------------------------------
/// HTTP Implementation
/// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct MutationResponse {
  success: bool,
}

pub struct BackendAlertAuthority {
  client: Client,
  config: BackendConfig,
}

impl BackendAlertAuthority {
  pub fn new(config: BackendConfig) -> Self {
    Self {
      client: Client::new(),
      config,
    }
  }

  async fn post_mutation(&self, url: &str, alert_id: &str, body: serde_json::Value) -> Result<(), AlertError> {
    let response = self
      .client
      .post(url)
      .bearer_auth(&self.config.api_key)
      .json(&body)
      .send()
      .await?;

    if !response.status().is_success() {
      let status = response.status();
      let error_text = response.text().await.unwrap_or_default();
      return Err(AlertError::Api(format!(
        "Alert API error {}: {}",
        status, error_text
      )));
    }

    let result: MutationResponse = response
      .json()
      .await
      .map_err(|e| AlertError::Api(e.to_string()))?;
    if !result.success {
      return Err(AlertError::Rejected(alert_id.to_string()));
    }
    Ok(())
  }
}

#[async_trait]
impl AlertAuthority for BackendAlertAuthority {
  async fn list_active(&self, group_id: &str) -> Result<Vec<AlertRecord>, AlertError> {
    let url = format!("{}/alerts/active?group_id={}", self.config.base_url, group_id);
    let response = self
      .client
      .get(&url)
      .bearer_auth(&self.config.api_key)
      .send()
      .await?;

    if !response.status().is_success() {
      let status = response.status();
      let error_text = response.text().await.unwrap_or_default();
      return Err(AlertError::Api(format!(
        "Alert API error {}: {}",
        status, error_text
      )));
    }

    let alerts: Vec<AlertRecord> = response
      .json()
      .await
      .map_err(|e| AlertError::Api(e.to_string()))?;
    Ok(alerts)
  }

  async fn snooze(&self, alert_id: &str, days: u32) -> Result<(), AlertError> {
    let url = format!("{}/alerts/{}/snooze", self.config.base_url, alert_id);
    self
      .post_mutation(&url, alert_id, serde_json::json!({ "days": days }))
      .await
  }

  async fn dismiss(&self, alert_id: &str) -> Result<(), AlertError> {
    let url = format!("{}/alerts/{}/dismiss", self.config.base_url, alert_id);
    self
      .post_mutation(&url, alert_id, serde_json::json!({}))
      .await
  }
}

/// ---------------------------------------------------------------------------
/// Lifecycle Manager
/// ---------------------------------------------------------------------------

pub struct AlertManager {
  authority: Arc<dyn AlertAuthority>,
  group_id: String,
  cache: RwLock<Vec<AlertRecord>>,
}

impl AlertManager {
  pub fn new(authority: Arc<dyn AlertAuthority>, group_id: impl Into<String>) -> Self {
    Self {
      authority,
      group_id: group_id.into(),
      cache: RwLock::new(Vec::new()),
    }
  }

  /// The last successfully fetched active set.
  pub async fn active_alerts(&self) -> Vec<AlertRecord> {
    self.cache.read().await.clone()
  }

  /// Re-pull the authoritative active set. The cache is replaced only on
  /// success; errors and cancellation leave it exactly as it was, so a
  /// bad refresh can never blank out a good one. The select is biased
  /// toward cancellation so a cancelled token always wins over a fetch
  /// that happens to be ready in the same poll, and the fetched set is
  /// never committed once cancellation has been requested.
  pub async fn refresh(&self, cancel: &CancellationToken) -> Result<usize, AlertError> {
    let fetched = tokio::select! {
      biased;
      _ = cancel.cancelled() => return Err(AlertError::Cancelled),
      result = self.authority.list_active(&self.group_id) => result?,
    };

    if cancel.is_cancelled() {
      return Err(AlertError::Cancelled);
    }

    let count = fetched.len();
    *self.cache.write().await = fetched;
    Ok(count)
  }

  /// Snooze via the authority. Local removal happens only after the
  /// remote confirms; on failure the alert keeps its last known state.
  pub async fn snooze(&self, alert_id: &str, days: u32) -> Result<(), AlertError> {
    self.authority.snooze(alert_id, days).await?;
    self.remove_local(alert_id).await;
    log::info!("Snoozed alert {} for {} days", alert_id, days);
    Ok(())
  }

  /// Dismiss via the authority. Terminal: the authority never returns a
  /// dismissed alert to the active set.
  pub async fn dismiss(&self, alert_id: &str) -> Result<(), AlertError> {
    self.authority.dismiss(alert_id).await?;
    self.remove_local(alert_id).await;
    log::info!("Dismissed alert {}", alert_id);
    Ok(())
  }

  async fn remove_local(&self, alert_id: &str) {
    self.cache.write().await.retain(|a| a.alert_id != alert_id);
  }
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
