// src/models/gamification.rs

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};

/// A static achievement definition from the in-code catalog.
#[derive(Debug, Clone, Serialize)]
pub struct AchievementDef {
    /// Stable type tag; also the uniqueness key per user.
    pub key: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
    pub rarity: &'static str,
    pub category: &'static str,
    /// Point bonus credited on unlock.
    pub points: i64,
}

/// Represents the 'user_achievements' table in the database.
/// At most one row per (user, achievement_type) pair.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct UserAchievement {
    pub id: i64,
    pub user_id: i64,
    pub achievement_type: String,
    pub metadata: Option<Json<serde_json::Value>>,
    pub earned_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Represents the 'point_events' table: one append-only row per award.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PointEvent {
    pub id: i64,
    pub user_id: i64,
    pub amount: i64,
    pub reason: String,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Running total plus the most recent ledger events for one user.
#[derive(Debug, Clone, Serialize)]
pub struct PointsSummary {
    pub total: i64,
    pub recent_events: Vec<PointEvent>,
}

/// Represents the 'streaks' table: per-user consecutive-day activity state.
/// Mutated at most once per calendar day.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Streak {
    pub user_id: i64,
    pub current_streak: i32,
    pub longest_streak: i32,
    pub last_active_date: chrono::NaiveDate,
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Metric a leaderboard is ranked by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaderboardCategory {
    Points,
    Streak,
    Completions,
}

impl Default for LeaderboardCategory {
    fn default() -> Self {
        LeaderboardCategory::Points
    }
}

/// One leaderboard row. `rank` is 1-based position in the returned order.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct LeaderboardEntry {
    /// Filled in by the service; the store returns rows in rank order.
    #[sqlx(default)]
    pub rank: i64,
    pub user_id: i64,
    pub username: String,
    /// Value of the ranked metric (points, streak days or completions).
    pub value: i64,
}
