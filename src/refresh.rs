//! Dashboard refresh orchestration
//!
//! One refresh pass pulls scores, evaluates trends, filters relevance,
//! syncs alerts, and reconciles badges into a single snapshot. At most one
//! pass runs at a time: a refresh requested while one is in flight is
//! dropped, not queued. Cancellation aborts the pass and leaves the last
//! successful snapshot untouched.

use chrono::{Duration, NaiveDate};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::alerts::{AlertAuthority, AlertError, AlertManager};
use crate::badges::{compute_daily_badges, BadgeEngine, BadgeStore};
use crate::config::Policy;
use crate::models::member::member_initials;
use crate::models::{
  AlertRecord, BadgeWinner, CoverageStatus, FamilyMember, NotificationItem, Pillar, ScoreRow,
};
use crate::relevance::{build_feed, CurrentScores};
use crate::scores::{dedupe_scores, ScoreError, ScoreRepository};
use crate::trends::{evaluate_group, has_fresh_scores};

/// ---------------------------------------------------------------------------
/// Error Types
/// ---------------------------------------------------------------------------

#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "message")]
pub enum RefreshError {
  /// A pass is already running; this request was dropped, not queued.
  #[error("A refresh is already in flight")]
  AlreadyInFlight,

  #[error("Refresh cancelled")]
  Cancelled,

  /// Bulk fetch and the per-member fallback both came up empty.
  #[error("Score data unavailable: {0}")]
  Exhausted(String),
}

/// ---------------------------------------------------------------------------
/// Snapshot
/// ---------------------------------------------------------------------------

/// Everything the dashboard renders from one successful pass. Replaced
/// atomically; consumers never see a half-built one.
#[derive(Debug, Clone)]
pub struct DashboardSnapshot {
  pub generated_on: NaiveDate,
  /// Full feed: server-pattern alert items first, then trend or fallback
  /// items.
  pub notifications: Vec<NotificationItem>,
  /// The first few notifications, for the top-level surface.
  pub top_level: Vec<NotificationItem>,
  pub coverage: CoverageStatus,
  /// The full deduplicated window, stale rows included. Stale rows are
  /// excluded from every computation but kept here so displays do not go
  /// blank the day a wearable stops syncing.
  pub scores: Vec<ScoreRow>,
  pub daily_badges: Vec<BadgeWinner>,
  pub weekly_badges: Vec<BadgeWinner>,
}

/// ---------------------------------------------------------------------------
/// Engine
/// ---------------------------------------------------------------------------

pub struct HealthEngine {
  repository: Arc<dyn ScoreRepository>,
  alerts: AlertManager,
  badges: BadgeEngine,
  policy: Policy,
  group_id: String,
  optimal_targets: HashMap<Pillar, f64>,
  snapshot: tokio::sync::RwLock<Option<DashboardSnapshot>>,
  in_flight: AtomicBool,
  cancel: Mutex<CancellationToken>,
}

impl HealthEngine {
  pub fn new(
    repository: Arc<dyn ScoreRepository>,
    alert_authority: Arc<dyn AlertAuthority>,
    badge_store: Arc<dyn BadgeStore>,
    group_id: impl Into<String>,
    policy: Policy,
  ) -> Self {
    let group_id = group_id.into();
    Self {
      repository,
      alerts: AlertManager::new(alert_authority, group_id.clone()),
      badges: BadgeEngine::new(badge_store),
      policy,
      group_id,
      optimal_targets: HashMap::new(),
      snapshot: tokio::sync::RwLock::new(None),
      in_flight: AtomicBool::new(false),
      cancel: Mutex::new(CancellationToken::new()),
    }
  }

  pub fn with_optimal_targets(mut self, targets: HashMap<Pillar, f64>) -> Self {
    self.optimal_targets = targets;
    self
  }

  /// The last successfully built snapshot, if any pass has completed.
  pub async fn snapshot(&self) -> Option<DashboardSnapshot> {
    self.snapshot.read().await.clone()
  }

  pub async fn active_alerts(&self) -> Vec<AlertRecord> {
    self.alerts.active_alerts().await
  }

  pub async fn snooze_alert(&self, alert_id: &str, days: u32) -> Result<(), AlertError> {
    self.alerts.snooze(alert_id, days).await
  }

  pub async fn dismiss_alert(&self, alert_id: &str) -> Result<(), AlertError> {
    self.alerts.dismiss(alert_id).await
  }

  /// Cancel the in-flight pass, if any. The cancelled pass returns
  /// `Cancelled` and the previous snapshot stays current.
  pub fn cancel_refresh(&self) {
    self.cancel.lock().unwrap().cancel();
  }

  /// Run one full pass. Returns `AlreadyInFlight` without doing anything
  /// when a pass is running.
  pub async fn refresh(
    &self,
    members: &[FamilyMember],
    viewer_is_admin: bool,
    today: NaiveDate,
  ) -> Result<DashboardSnapshot, RefreshError> {
    if self
      .in_flight
      .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
      .is_err()
    {
      log::debug!("Refresh already in flight; dropping request");
      return Err(RefreshError::AlreadyInFlight);
    }

    let token = CancellationToken::new();
    *self.cancel.lock().unwrap() = token.clone();

    let result = self.run_pass(members, viewer_is_admin, today, &token).await;
    self.in_flight.store(false, Ordering::SeqCst);
    result
  }

  async fn run_pass(
    &self,
    members: &[FamilyMember],
    viewer_is_admin: bool,
    today: NaiveDate,
    token: &CancellationToken,
  ) -> Result<DashboardSnapshot, RefreshError> {
    let rows = self.fetch_scores(members, today, token).await?;

    let evaluation = evaluate_group(members, &rows, today, &self.policy);
    let current = CurrentScores::from_rows(&rows, today, &self.policy);
    let insights: Vec<_> = evaluation.insights().into_iter().cloned().collect();
    let feed = build_feed(
      &insights,
      members,
      &current,
      &self.optimal_targets,
      &self.policy,
    );

    // Alert sync failures are non-fatal: the manager keeps its last good
    // active set and the pass continues with that.
    match self.alerts.refresh(token).await {
      Ok(count) => log::debug!("Synced {} active alerts", count),
      Err(AlertError::Cancelled) => return Err(RefreshError::Cancelled),
      Err(e) => log::warn!("Alert sync failed, using cached set: {}", e),
    }
    let notifications =
      self.assemble_notifications(feed, members, &self.alerts.active_alerts().await);

    // Badges read fresh members only; a member whose wearable stopped
    // syncing mid-week must not keep winning on stale rows.
    let badge_rows = fresh_member_rows(&rows, members, today, &self.policy);
    let daily_badges = compute_daily_badges(&badge_rows, members, today);
    let weekly_badges = match self
      .badges
      .reconcile_weekly(&self.group_id, today, &badge_rows, members, viewer_is_admin)
      .await
    {
      Ok(winners) => winners,
      Err(e) => {
        log::warn!("Weekly badge reconciliation failed, keeping last set: {}", e);
        self
          .snapshot
          .read()
          .await
          .as_ref()
          .map(|s| s.weekly_badges.clone())
          .unwrap_or_default()
      }
    };

    if token.is_cancelled() {
      return Err(RefreshError::Cancelled);
    }

    let top_level = notifications
      .iter()
      .take(self.policy.top_level_cap)
      .cloned()
      .collect();
    let built = DashboardSnapshot {
      generated_on: today,
      notifications,
      top_level,
      coverage: evaluation.coverage.clone(),
      scores: rows,
      daily_badges,
      weekly_badges,
    };

    *self.snapshot.write().await = Some(built.clone());
    log::info!(
      "Refresh complete for {}: {} notifications, coverage {}/{}",
      self.group_id,
      built.notifications.len(),
      built.coverage.days_available,
      built.coverage.window_days
    );
    Ok(built)
  }

  /// ---------------------------------------------------------------------------
  /// Score Acquisition
  /// ---------------------------------------------------------------------------

  /// Bulk fetch with capped backoff, then a per-member fallback when every
  /// bulk attempt fails. Cancellation aborts immediately, including
  /// mid-backoff, and never triggers the fallback.
  async fn fetch_scores(
    &self,
    members: &[FamilyMember],
    today: NaiveDate,
    token: &CancellationToken,
  ) -> Result<Vec<ScoreRow>, RefreshError> {
    let start_day = today - Duration::days(self.policy.window_days as i64 - 1);
    let mut last_error = String::new();

    for attempt in 1..=self.policy.max_fetch_attempts {
      let fetched = tokio::select! {
        biased;
        _ = token.cancelled() => return Err(RefreshError::Cancelled),
        result = self.repository.fetch_group_scores(&self.group_id, start_day, today) => result,
      };

      match fetched {
        Ok(rows) => return Ok(rows),
        Err(ScoreError::Cancelled) => return Err(RefreshError::Cancelled),
        Err(e) => {
          log::warn!(
            "Group score fetch attempt {}/{} failed: {}",
            attempt,
            self.policy.max_fetch_attempts,
            e
          );
          last_error = e.to_string();
          if attempt < self.policy.max_fetch_attempts {
            tokio::select! {
              biased;
              _ = token.cancelled() => return Err(RefreshError::Cancelled),
              _ = tokio::time::sleep(self.policy.retry_delay(attempt)) => {}
            }
          }
        }
      }
    }

    log::warn!("Bulk score fetch exhausted; falling back to per-member fetches");
    self
      .fetch_per_member(members, today, token, &last_error)
      .await
  }

  async fn fetch_per_member(
    &self,
    members: &[FamilyMember],
    today: NaiveDate,
    token: &CancellationToken,
    bulk_error: &str,
  ) -> Result<Vec<ScoreRow>, RefreshError> {
    let mut rows = Vec::new();
    let mut any_succeeded = false;

    for member in members.iter().filter(|m| m.is_eligible()) {
      for pillar in Pillar::ALL {
        let fetched = tokio::select! {
          biased;
          _ = token.cancelled() => return Err(RefreshError::Cancelled),
          result = self.repository.fetch_pillar_history(
            &member.member_id, pillar, self.policy.window_days) => result,
        };
        match fetched {
          Ok(mut member_rows) => {
            any_succeeded = true;
            rows.append(&mut member_rows);
          }
          Err(ScoreError::Cancelled) => return Err(RefreshError::Cancelled),
          Err(e) => log::warn!(
            "Per-member fetch failed for {} {}: {}",
            member.member_id,
            pillar,
            e
          ),
        }
      }
    }

    if !any_succeeded {
      return Err(RefreshError::Exhausted(format!(
        "no score data after {} bulk attempts ({}) and per-member fallback",
        self.policy.max_fetch_attempts, bulk_error
      )));
    }
    Ok(dedupe_scores(rows))
  }

  /// ---------------------------------------------------------------------------
  /// Notification Assembly
  /// ---------------------------------------------------------------------------

  /// Server-pattern alerts lead the feed; a trend item covering the same
  /// (member, pillar) is redundant next to its alert and is dropped.
  fn assemble_notifications(
    &self,
    feed: Vec<NotificationItem>,
    members: &[FamilyMember],
    active_alerts: &[AlertRecord],
  ) -> Vec<NotificationItem> {
    let mut items: Vec<NotificationItem> = active_alerts
      .iter()
      .filter(|a| a.episode_status.is_active())
      .filter_map(|a| alert_notification(a, members))
      .collect();

    let covered: HashSet<(String, Pillar)> = items
      .iter()
      .map(|i| (i.member_id.clone(), i.pillar))
      .collect();
    items.extend(
      feed
        .into_iter()
        .filter(|item| !covered.contains(&(item.member_id.clone(), item.pillar))),
    );
    items
  }
}

/// Rows restricted to eligible members whose latest valid score is still
/// fresh. Stale members keep their rows in the snapshot's score view but
/// contribute nothing to any computation.
fn fresh_member_rows(
  rows: &[ScoreRow],
  members: &[FamilyMember],
  today: NaiveDate,
  policy: &Policy,
) -> Vec<ScoreRow> {
  members
    .iter()
    .filter(|m| m.is_eligible())
    .flat_map(|member| {
      let member_rows: Vec<ScoreRow> = rows
        .iter()
        .filter(|r| r.member_id == member.member_id)
        .cloned()
        .collect();
      if has_fresh_scores(&member_rows, today, policy) {
        member_rows
      } else {
        Vec::new()
      }
    })
    .collect()
}

fn alert_notification(
  alert: &AlertRecord,
  members: &[FamilyMember],
) -> Option<NotificationItem> {
  let pillar: Pillar = match alert.metric_type.parse() {
    Ok(p) => p,
    Err(_) => {
      log::warn!(
        "Alert {} has unknown metric type {}; skipping projection",
        alert.alert_id,
        alert.metric_type
      );
      return None;
    }
  };
  let member = members.iter().find(|m| m.member_id == alert.member_id)?;
  let first_name = member.name.split_whitespace().next().unwrap_or(&member.name);

  Some(NotificationItem {
    id: format!("alert-{}", alert.alert_id),
    member_id: member.member_id.clone(),
    pillar,
    title: format!("{}'s {} pattern needs attention", first_name, pillar),
    body: format!(
      "{} has run {:.0}% below the usual {:.0} for {} days.",
      first_name,
      alert.deviation_percent.abs(),
      alert.baseline_value,
      alert.current_level
    ),
    member_initials: member_initials(&member.name),
    member_name: member.name.clone(),
    source_alert_id: Some(alert.alert_id.clone()),
  })
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use super::*;
  use crate::models::BadgeType;
  use crate::test_utils::{
    init_test_logging, mock_alert, mock_member, score_row, InMemoryAlertAuthority,
    InMemoryBadgeStore, InMemoryScoreRepository,
  };

  fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 8, 28).unwrap()
  }

  /// m1 declining sleep (alert-worthy), m2 steady across pillars.
  fn seed_rows() -> Vec<ScoreRow> {
    let mut rows = Vec::new();
    for d in 0..21 {
      let day = today() - Duration::days(d);
      let sleep = if d < 7 { 40 } else { 80 };
      rows.push(score_row("m1", day, Pillar::Sleep, sleep));
      rows.push(score_row("m1", day, Pillar::Movement, 70));
      rows.push(score_row("m2", day, Pillar::Sleep, 78));
      rows.push(score_row("m2", day, Pillar::Movement, 82));
    }
    rows
  }

  fn members() -> Vec<FamilyMember> {
    vec![mock_member("m1", "Maya Chen"), mock_member("m2", "Ben Chen")]
  }

  fn engine_with(
    repo: Arc<InMemoryScoreRepository>,
    authority: Arc<InMemoryAlertAuthority>,
    store: Arc<InMemoryBadgeStore>,
  ) -> HealthEngine {
    init_test_logging();
    HealthEngine::new(repo, authority, store, "fam1", Policy::default())
  }

  #[tokio::test]
  async fn test_refresh_builds_full_snapshot() {
    let repo = Arc::new(InMemoryScoreRepository::with_rows(seed_rows()));
    let authority = Arc::new(InMemoryAlertAuthority::with_alerts(vec![mock_alert(
      "alrt_01", "m1",
    )]));
    let store = Arc::new(InMemoryBadgeStore::default());
    let engine = engine_with(repo, authority, store.clone());

    let snapshot = engine.refresh(&members(), true, today()).await.unwrap();

    // Server alert leads the feed and carries provenance
    assert_eq!(
      snapshot.notifications[0].source_alert_id,
      Some("alrt_01".to_string())
    );
    assert!(snapshot.top_level.len() <= 2);
    assert!(snapshot.coverage.has_minimum_coverage);
    assert!(!snapshot.daily_badges.is_empty());
    assert!(!snapshot.weekly_badges.is_empty());
    assert_eq!(store.upsert_calls(), 1);
    assert!(engine.snapshot().await.is_some());
  }

  #[tokio::test]
  async fn test_trend_item_redundant_with_alert_is_dropped() {
    let repo = Arc::new(InMemoryScoreRepository::with_rows(seed_rows()));
    let authority = Arc::new(InMemoryAlertAuthority::with_alerts(vec![mock_alert(
      "alrt_01", "m1",
    )]));
    let store = Arc::new(InMemoryBadgeStore::default());
    let engine = engine_with(repo, authority, store);

    let snapshot = engine.refresh(&members(), false, today()).await.unwrap();
    // m1's sleep decline surfaces once (the alert), not twice
    let m1_sleep: Vec<_> = snapshot
      .notifications
      .iter()
      .filter(|n| n.member_name == "Maya Chen" && n.pillar == Pillar::Sleep)
      .collect();
    assert_eq!(m1_sleep.len(), 1);
    assert!(m1_sleep[0].source_alert_id.is_some());
  }

  #[tokio::test(start_paused = true)]
  async fn test_bulk_fetch_retries_with_backoff() {
    let repo = Arc::new(InMemoryScoreRepository::with_rows(seed_rows()));
    repo.fail_group_times(2);
    let engine = engine_with(
      repo.clone(),
      Arc::new(InMemoryAlertAuthority::default()),
      Arc::new(InMemoryBadgeStore::default()),
    );

    let snapshot = engine.refresh(&members(), false, today()).await.unwrap();
    assert!(!snapshot.notifications.is_empty());
    assert_eq!(repo.group_calls(), 3);
  }

  #[tokio::test(start_paused = true)]
  async fn test_exhausted_bulk_falls_back_per_member() {
    let repo = Arc::new(InMemoryScoreRepository::with_rows(seed_rows()));
    repo.fail_group_times(10);
    let engine = engine_with(
      repo.clone(),
      Arc::new(InMemoryAlertAuthority::default()),
      Arc::new(InMemoryBadgeStore::default()),
    );

    let snapshot = engine.refresh(&members(), false, today()).await.unwrap();
    assert_eq!(repo.group_calls(), 4);
    assert!(snapshot.coverage.has_minimum_coverage);
  }

  #[tokio::test(start_paused = true)]
  async fn test_everything_failing_is_exhausted_and_keeps_no_snapshot() {
    let repo = Arc::new(InMemoryScoreRepository::with_rows(seed_rows()));
    repo.fail_group_times(10);
    repo.break_member("m1");
    repo.break_member("m2");
    let engine = engine_with(
      repo,
      Arc::new(InMemoryAlertAuthority::default()),
      Arc::new(InMemoryBadgeStore::default()),
    );

    let result = engine.refresh(&members(), false, today()).await;
    assert!(matches!(result, Err(RefreshError::Exhausted(_))));
    assert!(engine.snapshot().await.is_none());
  }

  #[tokio::test(start_paused = true)]
  async fn test_cancelled_refresh_preserves_previous_snapshot() {
    let repo = Arc::new(InMemoryScoreRepository::with_rows(seed_rows()));
    let engine = Arc::new(engine_with(
      repo.clone(),
      Arc::new(InMemoryAlertAuthority::default()),
      Arc::new(InMemoryBadgeStore::default()),
    ));

    let first = engine.refresh(&members(), false, today()).await.unwrap();

    // Next pass stalls in backoff; cancel it mid-flight.
    repo.fail_group_times(10);
    let running = {
      let engine = engine.clone();
      tokio::spawn(async move { engine.refresh(&members(), false, today()).await })
    };
    tokio::task::yield_now().await;
    engine.cancel_refresh();

    let result = running.await.unwrap();
    assert!(matches!(result, Err(RefreshError::Cancelled)));
    let kept = engine.snapshot().await.unwrap();
    assert_eq!(kept.notifications.len(), first.notifications.len());
  }

  #[tokio::test(start_paused = true)]
  async fn test_concurrent_refresh_is_dropped_not_queued() {
    let repo = Arc::new(InMemoryScoreRepository::with_rows(seed_rows()));
    repo.fail_group_times(1); // first pass parks in backoff
    let engine = Arc::new(engine_with(
      repo,
      Arc::new(InMemoryAlertAuthority::default()),
      Arc::new(InMemoryBadgeStore::default()),
    ));

    let running = {
      let engine = engine.clone();
      tokio::spawn(async move { engine.refresh(&members(), false, today()).await })
    };
    tokio::task::yield_now().await;

    let second = engine.refresh(&members(), false, today()).await;
    assert!(matches!(second, Err(RefreshError::AlreadyInFlight)));

    // The in-flight pass still completes normally
    assert!(running.await.unwrap().is_ok());
  }

  #[tokio::test]
  async fn test_empty_group_yields_quiet_snapshot() {
    let repo = Arc::new(InMemoryScoreRepository::with_rows(vec![]));
    let store = Arc::new(InMemoryBadgeStore::default());
    let engine = engine_with(repo, Arc::new(InMemoryAlertAuthority::default()), store.clone());

    let snapshot = engine.refresh(&[], true, today()).await.unwrap();
    assert!(snapshot.notifications.is_empty());
    assert_eq!(snapshot.coverage.days_available, 0);
    assert!(!snapshot.coverage.has_minimum_coverage);
    assert!(snapshot.daily_badges.is_empty());
    assert!(snapshot.weekly_badges.is_empty());
    assert_eq!(store.upsert_calls(), 0);
  }

  #[tokio::test]
  async fn test_stale_member_cannot_win_badges() {
    // m3 posts the highest totals but stopped syncing four days ago;
    // stale rows must not decide daily or weekly winners.
    let mut rows = Vec::new();
    for d in 0..21 {
      let day = today() - Duration::days(d);
      rows.push(score_row("m1", day, Pillar::Sleep, 70));
      rows.push(score_row("m2", day, Pillar::Sleep, 60));
    }
    for d in 4..21 {
      rows.push(score_row("m3", today() - Duration::days(d), Pillar::Sleep, 95));
    }
    let repo = Arc::new(InMemoryScoreRepository::with_rows(rows));
    let store = Arc::new(InMemoryBadgeStore::default());
    let engine = engine_with(repo, Arc::new(InMemoryAlertAuthority::default()), store);

    let family = vec![
      mock_member("m1", "Maya Chen"),
      mock_member("m2", "Ben Chen"),
      mock_member("m3", "Ava Chen"),
    ];
    let snapshot = engine.refresh(&family, true, today()).await.unwrap();

    assert!(snapshot
      .weekly_badges
      .iter()
      .chain(snapshot.daily_badges.iter())
      .all(|w| w.winner_member_id != "m3"));
    let champion = snapshot
      .weekly_badges
      .iter()
      .find(|w| w.badge_type == BadgeType::WeeklyChampion)
      .unwrap();
    assert_eq!(champion.winner_member_id, "m1");
    // Stale rows stay visible in the raw score view
    assert!(snapshot.scores.iter().any(|r| r.member_id == "m3"));
  }

  #[tokio::test]
  async fn test_shared_display_name_does_not_suppress_trend_item() {
    // Two members share a display name; the alert belongs to m1 only,
    // so m2's sleep decline still surfaces as its own trend item.
    let mut rows = Vec::new();
    for d in 0..21 {
      let day = today() - Duration::days(d);
      rows.push(score_row("m1", day, Pillar::Sleep, 75));
      let value = if d < 7 { 40 } else { 80 };
      rows.push(score_row("m2", day, Pillar::Sleep, value));
    }
    let repo = Arc::new(InMemoryScoreRepository::with_rows(rows));
    let authority = Arc::new(InMemoryAlertAuthority::with_alerts(vec![mock_alert(
      "alrt_01", "m1",
    )]));
    let engine = engine_with(repo, authority, Arc::new(InMemoryBadgeStore::default()));

    let family = vec![mock_member("m1", "Maya Chen"), mock_member("m2", "Maya Chen")];
    let snapshot = engine.refresh(&family, false, today()).await.unwrap();

    assert!(snapshot
      .notifications
      .iter()
      .any(|n| n.member_id == "m1" && n.source_alert_id.is_some()));
    assert!(snapshot
      .notifications
      .iter()
      .any(|n| n.member_id == "m2" && n.pillar == Pillar::Sleep && n.source_alert_id.is_none()));
  }

  #[tokio::test]
  async fn test_alert_sync_failure_is_not_fatal() {
    let repo = Arc::new(InMemoryScoreRepository::with_rows(seed_rows()));
    let authority = Arc::new(InMemoryAlertAuthority::with_alerts(vec![mock_alert(
      "alrt_01", "m1",
    )]));
    let engine = engine_with(
      repo,
      authority.clone(),
      Arc::new(InMemoryBadgeStore::default()),
    );

    engine.refresh(&members(), false, today()).await.unwrap();

    // Second pass: alert sync fails but the refresh still succeeds with
    // the cached active set.
    authority.fail_next();
    let snapshot = engine.refresh(&members(), false, today()).await.unwrap();
    assert!(snapshot
      .notifications
      .iter()
      .any(|n| n.source_alert_id.is_some()));
  }
}
