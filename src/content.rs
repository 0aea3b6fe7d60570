//! AI insight content retrieval and chat
//!
//! Fetches or triggers generation of explanatory content per alert, and
//! runs the conversational exchange that reuses it. Generation can lag
//! detection, so the chat path tolerates exactly one "not yet generated"
//! response per user message: trigger generation, wait, retry once. A
//! second such response is terminal for that message.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::config::BackendConfig;
use crate::models::InsightContent;

/// ---------------------------------------------------------------------------
/// Error Types
/// ---------------------------------------------------------------------------

#[derive(Debug, Error, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum ContentError {
  #[error("HTTP request failed: {0}")]
  Request(String),

  #[error("Content API error: {0}")]
  Api(String),

  #[error("Parse error: {0}")]
  Parse(String),

  /// Expected status: content exists conceptually but the generator has
  /// not produced it yet. Drives the single bounded retry.
  #[error("Content not yet generated for alert {0}")]
  NotYetGenerated(String),

  /// Terminal: the retry budget for this message is spent. The user must
  /// send again to re-trigger.
  #[error("Content generation unavailable for alert {0}")]
  GenerationUnavailable(String),
}

impl From<reqwest::Error> for ContentError {
  fn from(e: reqwest::Error) -> Self {
    ContentError::Request(e.to_string())
  }
}

/// ---------------------------------------------------------------------------
/// Chat Types
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
  User,
  Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
  pub role: ChatRole,
  pub content: String,
}

/// Typed context shipped with every conversational exchange. The endpoint
/// needs the numbers behind the alert, not a prose rendering of them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatContext {
  pub member_name: String,
  pub metric_type: String,
  pub recent_value: Option<f64>,
  pub baseline_value: Option<f64>,
  pub optimal_range: Option<(f64, f64)>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub prior_headline: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatReply {
  pub reply: String,
  #[serde(default)]
  pub suggested_follow_ups: Vec<String>,
}

/// ---------------------------------------------------------------------------
/// Service Trait
/// ---------------------------------------------------------------------------

#[async_trait]
pub trait ContentService: Send + Sync {
  /// Generate (or return already-generated) content for an alert. Slow
  /// but idempotent.
  async fn generate(&self, alert_id: &str) -> Result<InsightContent, ContentError>;

  /// One conversational exchange. Returns `NotYetGenerated` when the
  /// underlying content does not exist yet.
  async fn converse(
    &self,
    alert_id: &str,
    message: &str,
    context: &ChatContext,
    history: &[ChatTurn],
  ) -> Result<ChatReply, ContentError>;
}

/// ---------------------------------------------------------------------------
/// HTTP Implementation
/// ---------------------------------------------------------------------------

pub struct BackendContentService {
  client: Client,
  config: BackendConfig,
}

impl BackendContentService {
  pub fn new(config: BackendConfig) -> Self {
    Self {
      client: Client::new(),
      config,
    }
  }
}

#[async_trait]
impl ContentService for BackendContentService {
  async fn generate(&self, alert_id: &str) -> Result<InsightContent, ContentError> {
    let url = format!("{}/insights/{}/generate", self.config.base_url, alert_id);
    let response = self
      .client
      .post(&url)
      .bearer_auth(&self.config.api_key)
      .send()
      .await?;

    if !response.status().is_success() {
      let status = response.status();
      let error_text = response.text().await.unwrap_or_default();
      return Err(ContentError::Api(format!(
        "Generate error {}: {}",
        status, error_text
      )));
    }

    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| ContentError::Parse(format!("{}: {}", e, body)))
  }

  async fn converse(
    &self,
    alert_id: &str,
    message: &str,
    context: &ChatContext,
    history: &[ChatTurn],
  ) -> Result<ChatReply, ContentError> {
    let url = format!("{}/insights/{}/chat", self.config.base_url, alert_id);
    let response = self
      .client
      .post(&url)
      .bearer_auth(&self.config.api_key)
      .json(&serde_json::json!({
        "message": message,
        "context": context,
        "history": history,
      }))
      .send()
      .await?;

    if response.status() == reqwest::StatusCode::CONFLICT {
      return Err(ContentError::NotYetGenerated(alert_id.to_string()));
    }

    if !response.status().is_success() {
      let status = response.status();
      let error_text = response.text().await.unwrap_or_default();
      return Err(ContentError::Api(format!(
        "Chat error {}: {}",
        status, error_text
      )));
    }

    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| ContentError::Parse(format!("{}: {}", e, body)))
  }
}

/// ---------------------------------------------------------------------------
/// Per-Alert Content States
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum ContentState {
  NotRequested,
  Loading,
  Loaded(InsightContent),
  Failed(String),
}

pub struct InsightOrchestrator {
  service: Arc<dyn ContentService>,
  states: RwLock<HashMap<String, ContentState>>,
}

impl InsightOrchestrator {
  pub fn new(service: Arc<dyn ContentService>) -> Self {
    Self {
      service,
      states: RwLock::new(HashMap::new()),
    }
  }

  pub async fn state(&self, alert_id: &str) -> ContentState {
    self
      .states
      .read()
      .await
      .get(alert_id)
      .cloned()
      .unwrap_or(ContentState::NotRequested)
  }

  /// Fetch content for an alert. Client-side trend-only items carry no
  /// server alert id and have no generated content: a no-op. Cached
  /// content is returned without touching the service.
  pub async fn fetch(
    &self,
    source_alert_id: Option<&str>,
  ) -> Result<Option<InsightContent>, ContentError> {
    let alert_id = match source_alert_id {
      Some(id) => id,
      None => return Ok(None),
    };

    if let ContentState::Loaded(content) = self.state(alert_id).await {
      return Ok(Some(content));
    }
    self.load(alert_id).await.map(Some)
  }

  /// Explicit regeneration: the only way cached content is invalidated.
  pub async fn regenerate(&self, alert_id: &str) -> Result<InsightContent, ContentError> {
    self.load(alert_id).await
  }

  async fn load(&self, alert_id: &str) -> Result<InsightContent, ContentError> {
    self
      .states
      .write()
      .await
      .insert(alert_id.to_string(), ContentState::Loading);

    match self.service.generate(alert_id).await {
      Ok(content) => {
        self
          .states
          .write()
          .await
          .insert(alert_id.to_string(), ContentState::Loaded(content.clone()));
        Ok(content)
      }
      Err(e) => {
        self
          .states
          .write()
          .await
          .insert(alert_id.to_string(), ContentState::Failed(e.to_string()));
        Err(e)
      }
    }
  }
}

/// ---------------------------------------------------------------------------
/// Conversation
/// ---------------------------------------------------------------------------

/// One chat thread about one alert. The retry budget is per user message:
/// it resets when the user sends, never on automatic retries.
pub struct Conversation {
  alert_id: String,
  context: ChatContext,
  history: Vec<ChatTurn>,
}

impl Conversation {
  pub fn new(alert_id: impl Into<String>, context: ChatContext) -> Self {
    Self {
      alert_id: alert_id.into(),
      context,
      history: Vec::new(),
    }
  }

  pub fn history(&self) -> &[ChatTurn] {
    &self.history
  }

  /// Send one user message. On `NotYetGenerated`, trigger generation and
  /// retry the identical send once; the user turn enters the transcript
  /// exactly once either way. An explicit attempt budget keeps the retry
  /// bounded (no recursion, no shared counter).
  pub async fn send(
    &mut self,
    service: &dyn ContentService,
    message: &str,
    retry_budget: u32,
  ) -> Result<ChatReply, ContentError> {
    let prior_len = self.history.len();
    self.history.push(ChatTurn {
      role: ChatRole::User,
      content: message.to_string(),
    });

    let mut retries_used = 0u32;
    loop {
      let result = self
        .service_send(service, message, prior_len)
        .await;

      match result {
        Ok(reply) => {
          self.history.push(ChatTurn {
            role: ChatRole::Assistant,
            content: reply.reply.clone(),
          });
          return Ok(reply);
        }
        Err(ContentError::NotYetGenerated(alert_id)) => {
          if retries_used >= retry_budget {
            // Budget spent for this message: terminal, no third attempt.
            self.history.truncate(prior_len);
            return Err(ContentError::GenerationUnavailable(alert_id));
          }
          retries_used += 1;
          log::info!(
            "Content for {} not ready; generating and retrying send",
            alert_id
          );
          if let Err(e) = service.generate(&alert_id).await {
            self.history.truncate(prior_len);
            return Err(e);
          }
        }
        Err(e) => {
          // Recoverable: drop the unanswered turn so an explicit re-send
          // does not duplicate it.
          self.history.truncate(prior_len);
          return Err(e);
        }
      }
    }
  }

  async fn service_send(
    &self,
    service: &dyn ContentService,
    message: &str,
    prior_len: usize,
  ) -> Result<ChatReply, ContentError> {
    service
      .converse(
        &self.alert_id,
        message,
        &self.context,
        &self.history[..prior_len],
      )
      .await
  }
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
