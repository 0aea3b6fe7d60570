//! Hearthscore - family health insight core.
//!
//! Turns per-member daily pillar scores (sleep, movement, stress) into:
//! - trend insights over a rolling baseline window, with coverage gating
//! - a relevance-filtered notification feed with a current-state fallback
//! - comparative daily and weekly badges, weekly ones shared via the store
//! - an alert lifecycle cache backed by the remote authority
//! - AI insight content retrieval with a bounded regenerate-and-retry chat
//!
//! [`refresh::HealthEngine`] composes the pieces into one coalesced,
//! cancellable refresh pass producing a [`refresh::DashboardSnapshot`].

pub mod alerts;
pub mod badges;
pub mod config;
pub mod content;
pub mod models;
pub mod refresh;
pub mod relevance;
pub mod scores;
pub mod trends;

#[cfg(test)]
pub mod test_utils;

pub use config::{BackendConfig, Policy};
pub use refresh::{DashboardSnapshot, HealthEngine, RefreshError};
