pub mod score;
pub mod alert;
pub mod insight;
pub mod badge;
pub mod member;

pub use score::{CoverageStatus, Pillar, RawMetricRow, ScoreRow};
pub use alert::{AlertRecord, EpisodeStatus};
pub use insight::{InsightContent, InsightEvidence, NotificationItem, Severity, TrendInsight};
pub use badge::{covers_all_weekly_types, BadgeType, BadgeWinner};
pub use member::{FamilyMember, MemberRole};
