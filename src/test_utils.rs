//! Shared mock factories and in-memory collaborator doubles.
//!
//! Compiled only for tests. The doubles implement the collaborator traits
//! with scriptable failure injection so lifecycle and orchestration tests
//! never touch the network.

use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::alerts::{AlertAuthority, AlertError};
use crate::badges::{BadgeError, BadgeStore};
use crate::content::{ChatContext, ChatReply, ContentError, ContentService};
use crate::models::{
  AlertRecord, BadgeWinner, EpisodeStatus, FamilyMember, InsightContent, InsightEvidence,
  MemberRole, Pillar, RawMetricRow, ScoreRow, Severity,
};
use crate::scores::{dedupe_scores, ScoreError, ScoreRepository};

/// Route log output through env_logger so `RUST_LOG=debug cargo test`
/// shows the suppression/retry traces. Repeat calls are no-ops.
pub fn init_test_logging() {
  let _ = env_logger::builder().is_test(true).try_init();
}

/// ---------------------------------------------------------------------------
/// Factories
/// ---------------------------------------------------------------------------

pub fn mock_member(member_id: &str, name: &str) -> FamilyMember {
  FamilyMember {
    member_id: member_id.to_string(),
    name: name.to_string(),
    role: MemberRole::Member,
    pending: false,
  }
}

pub fn mock_admin(member_id: &str, name: &str) -> FamilyMember {
  FamilyMember {
    role: MemberRole::Admin,
    ..mock_member(member_id, name)
  }
}

pub fn score_row(member_id: &str, day: NaiveDate, pillar: Pillar, value: i64) -> ScoreRow {
  ScoreRow {
    member_id: member_id.to_string(),
    day,
    pillar,
    value,
    total_score: value,
  }
}

pub fn mock_alert(alert_id: &str, member_id: &str) -> AlertRecord {
  AlertRecord {
    alert_id: alert_id.to_string(),
    member_id: member_id.to_string(),
    metric_type: "sleep".to_string(),
    pattern_type: "sustained_decline".to_string(),
    episode_status: EpisodeStatus::Active,
    active_since: Utc.with_ymd_and_hms(2026, 8, 20, 6, 0, 0).unwrap(),
    current_level: 5,
    severity: Severity::Attention,
    deviation_percent: -25.0,
    baseline_value: 71.0,
    recent_value: 53.0,
  }
}

pub fn mock_insight_content(alert_id: &str) -> InsightContent {
  InsightContent {
    alert_id: alert_id.to_string(),
    headline: "Sleep has slipped over the past week".to_string(),
    interpretation: "Five of the last seven nights scored below baseline.".to_string(),
    data_connections: "Bedtime drifted later while step counts stayed flat.".to_string(),
    possible_causes: vec!["Later bedtimes".to_string()],
    action_steps: vec!["Aim for a consistent wind-down hour".to_string()],
    confidence_label: "high".to_string(),
    confidence_reason: "21 of 21 window days present".to_string(),
    evidence: InsightEvidence {
      baseline_value: 71.0,
      recent_value: 53.0,
      deviation_percent: -25.0,
    },
    message_suggestions: vec!["How has bedtime felt this week?".to_string()],
  }
}

/// ---------------------------------------------------------------------------
/// Alert Authority Double
/// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryAlertAuthority {
  alerts: Mutex<Vec<AlertRecord>>,
  fail_next: AtomicBool,
}

impl InMemoryAlertAuthority {
  pub fn with_alerts(alerts: Vec<AlertRecord>) -> Self {
    Self {
      alerts: Mutex::new(alerts),
      fail_next: AtomicBool::new(false),
    }
  }

  pub fn set_alerts(&self, alerts: Vec<AlertRecord>) {
    *self.alerts.lock().unwrap() = alerts;
  }

  /// The next call, whichever it is, fails once.
  pub fn fail_next(&self) {
    self.fail_next.store(true, Ordering::SeqCst);
  }

  fn take_failure(&self) -> bool {
    self.fail_next.swap(false, Ordering::SeqCst)
  }
}

#[async_trait]
impl AlertAuthority for InMemoryAlertAuthority {
  async fn list_active(&self, _group_id: &str) -> Result<Vec<AlertRecord>, AlertError> {
    if self.take_failure() {
      return Err(AlertError::Api("injected failure".to_string()));
    }
    Ok(self.alerts.lock().unwrap().clone())
  }

  async fn snooze(&self, alert_id: &str, _days: u32) -> Result<(), AlertError> {
    if self.take_failure() {
      return Err(AlertError::Api("injected failure".to_string()));
    }
    self
      .alerts
      .lock()
      .unwrap()
      .retain(|a| a.alert_id != alert_id);
    Ok(())
  }

  async fn dismiss(&self, alert_id: &str) -> Result<(), AlertError> {
    if self.take_failure() {
      return Err(AlertError::Api("injected failure".to_string()));
    }
    self
      .alerts
      .lock()
      .unwrap()
      .retain(|a| a.alert_id != alert_id);
    Ok(())
  }
}

/// ---------------------------------------------------------------------------
/// Badge Store Double
/// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryBadgeStore {
  weekly: Mutex<Vec<BadgeWinner>>,
  upsert_calls: AtomicUsize,
}

impl InMemoryBadgeStore {
  pub fn with_weekly(winners: Vec<BadgeWinner>) -> Self {
    Self {
      weekly: Mutex::new(winners),
      upsert_calls: AtomicUsize::new(0),
    }
  }

  pub fn upsert_calls(&self) -> usize {
    self.upsert_calls.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl BadgeStore for InMemoryBadgeStore {
  async fn read_weekly(
    &self,
    _group_id: &str,
    _week_start: NaiveDate,
  ) -> Result<Vec<BadgeWinner>, BadgeError> {
    Ok(self.weekly.lock().unwrap().clone())
  }

  async fn upsert_weekly(
    &self,
    _group_id: &str,
    _week_start: NaiveDate,
    _week_end: NaiveDate,
    winners: &[BadgeWinner],
  ) -> Result<(), BadgeError> {
    self.upsert_calls.fetch_add(1, Ordering::SeqCst);
    *self.weekly.lock().unwrap() = winners.to_vec();
    Ok(())
  }
}

/// ---------------------------------------------------------------------------
/// Content Service Double
/// ---------------------------------------------------------------------------

/// Scriptable content service: answers "not yet generated" a set number of
/// times before replying normally, and counts every call.
#[derive(Default)]
pub struct ScriptedContentService {
  not_ready_remaining: AtomicU32,
  fail_next_converse: AtomicBool,
  generate_calls: AtomicUsize,
  converse_calls: AtomicUsize,
}

impl ScriptedContentService {
  pub fn ready() -> Self {
    Self::default()
  }

  pub fn not_ready_times(times: u32) -> Self {
    let service = Self::default();
    service.set_not_ready_times(times);
    service
  }

  pub fn set_not_ready_times(&self, times: u32) {
    self.not_ready_remaining.store(times, Ordering::SeqCst);
  }

  pub fn fail_next_converse(&self) {
    self.fail_next_converse.store(true, Ordering::SeqCst);
  }

  pub fn generate_calls(&self) -> usize {
    self.generate_calls.load(Ordering::SeqCst)
  }

  pub fn converse_calls(&self) -> usize {
    self.converse_calls.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl ContentService for ScriptedContentService {
  async fn generate(&self, alert_id: &str) -> Result<InsightContent, ContentError> {
    self.generate_calls.fetch_add(1, Ordering::SeqCst);
    Ok(mock_insight_content(alert_id))
  }

  async fn converse(
    &self,
    alert_id: &str,
    message: &str,
    _context: &ChatContext,
    _history: &[crate::content::ChatTurn],
  ) -> Result<ChatReply, ContentError> {
    self.converse_calls.fetch_add(1, Ordering::SeqCst);

    if self.fail_next_converse.swap(false, Ordering::SeqCst) {
      return Err(ContentError::Api("injected failure".to_string()));
    }
    let was_not_ready = self
      .not_ready_remaining
      .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| v.checked_sub(1))
      .is_ok();
    if was_not_ready {
      return Err(ContentError::NotYetGenerated(alert_id.to_string()));
    }

    Ok(ChatReply {
      reply: format!("About {}: {}", alert_id, message),
      suggested_follow_ups: vec!["Tell me more".to_string()],
    })
  }
}

/// ---------------------------------------------------------------------------
/// Score Repository Double
/// ---------------------------------------------------------------------------

/// Backed by a flat row list. The bulk endpoint can be scripted to fail a
/// number of times (to exercise retry) or permanently (to exercise the
/// per-member fallback); individual members can be marked broken too.
#[derive(Default)]
pub struct InMemoryScoreRepository {
  rows: Mutex<Vec<ScoreRow>>,
  raw_rows: Mutex<Vec<RawMetricRow>>,
  fail_group_times: AtomicU32,
  broken_members: Mutex<HashSet<String>>,
  group_calls: AtomicUsize,
}

impl InMemoryScoreRepository {
  pub fn with_rows(rows: Vec<ScoreRow>) -> Self {
    Self {
      rows: Mutex::new(rows),
      ..Self::default()
    }
  }

  pub fn fail_group_times(&self, times: u32) {
    self.fail_group_times.store(times, Ordering::SeqCst);
  }

  pub fn break_member(&self, member_id: &str) {
    self
      .broken_members
      .lock()
      .unwrap()
      .insert(member_id.to_string());
  }

  pub fn group_calls(&self) -> usize {
    self.group_calls.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl ScoreRepository for InMemoryScoreRepository {
  async fn fetch_pillar_history(
    &self,
    member_id: &str,
    pillar: Pillar,
    _days: u32,
  ) -> Result<Vec<ScoreRow>, ScoreError> {
    if self.broken_members.lock().unwrap().contains(member_id) {
      return Err(ScoreError::Api("injected member failure".to_string()));
    }
    let rows: Vec<ScoreRow> = self
      .rows
      .lock()
      .unwrap()
      .iter()
      .filter(|r| r.member_id == member_id && r.pillar == pillar)
      .cloned()
      .collect();
    Ok(dedupe_scores(rows))
  }

  async fn fetch_raw_metrics(
    &self,
    member_id: &str,
    _days: u32,
  ) -> Result<Vec<RawMetricRow>, ScoreError> {
    Ok(
      self
        .raw_rows
        .lock()
        .unwrap()
        .iter()
        .filter(|r| r.member_id == member_id)
        .cloned()
        .collect(),
    )
  }

  async fn fetch_group_scores(
    &self,
    _group_id: &str,
    start_day: NaiveDate,
    end_day: NaiveDate,
  ) -> Result<Vec<ScoreRow>, ScoreError> {
    self.group_calls.fetch_add(1, Ordering::SeqCst);
    let should_fail = self
      .fail_group_times
      .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| v.checked_sub(1))
      .is_ok();
    if should_fail {
      return Err(ScoreError::Request("injected group failure".to_string()));
    }
    let rows: Vec<ScoreRow> = self
      .rows
      .lock()
      .unwrap()
      .iter()
      .filter(|r| r.day >= start_day && r.day <= end_day)
      .cloned()
      .collect();
    Ok(dedupe_scores(rows))
  }
}
