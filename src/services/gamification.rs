// src/services/gamification.rs

use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    error::AppError,
    models::gamification::{
        AchievementDef, LeaderboardCategory, LeaderboardEntry, PointsSummary, Streak,
        UserAchievement,
    },
    store::Store,
};

/// Daily point bonus for keeping a streak alive.
pub const DAILY_STREAK_BONUS: i64 = 5;

/// Ledger events shown in the points summary.
const RECENT_EVENTS: i64 = 20;

/// Fixed achievement catalog. The `key` doubles as the uniqueness tag on
/// user_achievements rows; rules are keyed off it in `check_achievements`.
const CATALOG: &[AchievementDef] = &[
    AchievementDef {
        key: "first_enrollment",
        name: "First Steps",
        description: "Enroll in your first course",
        icon: "backpack",
        rarity: "common",
        category: "enrollment",
        points: 10,
    },
    AchievementDef {
        key: "course_collector",
        name: "Course Collector",
        description: "Enroll in 5 courses",
        icon: "books",
        rarity: "uncommon",
        category: "enrollment",
        points: 25,
    },
    AchievementDef {
        key: "first_completion",
        name: "Finisher",
        description: "Complete your first course",
        icon: "flag",
        rarity: "common",
        category: "completion",
        points: 25,
    },
    AchievementDef {
        key: "dedicated_learner",
        name: "Dedicated Learner",
        description: "Complete 5 courses",
        icon: "graduation-cap",
        rarity: "rare",
        category: "completion",
        points: 100,
    },
    AchievementDef {
        key: "first_quiz",
        name: "Quiz Rookie",
        description: "Submit your first quiz attempt",
        icon: "pencil",
        rarity: "common",
        category: "quiz",
        points: 10,
    },
    AchievementDef {
        key: "quiz_master",
        name: "Quiz Master",
        description: "Submit 10 quiz attempts",
        icon: "brain",
        rarity: "uncommon",
        category: "quiz",
        points: 50,
    },
    AchievementDef {
        key: "perfect_score",
        name: "Perfectionist",
        description: "Score 100% on a quiz",
        icon: "star",
        rarity: "rare",
        category: "quiz",
        points: 50,
    },
    AchievementDef {
        key: "week_streak",
        name: "On Fire",
        description: "Study 7 days in a row",
        icon: "flame",
        rarity: "uncommon",
        category: "streak",
        points: 30,
    },
    AchievementDef {
        key: "month_streak",
        name: "Unstoppable",
        description: "Study 30 days in a row",
        icon: "bolt",
        rarity: "legendary",
        category: "streak",
        points: 150,
    },
];

pub fn catalog() -> &'static [AchievementDef] {
    CATALOG
}

pub fn achievement_def(key: &str) -> Option<&'static AchievementDef> {
    CATALOG.iter().find(|def| def.key == key)
}

/// Activity event kinds dispatched to the achievement rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    CourseEnrollment,
    CourseCompletion,
    QuizCompletion,
    StudyStreak,
}

/// Event payload the rules may consult.
#[derive(Debug, Clone, Copy, Default)]
pub struct ActivityContext {
    /// Attempt score for quiz_completion events.
    pub score: Option<i32>,
    /// Current streak length for study_streak events.
    pub current_streak: Option<i32>,
}

/// Outcome of a streak update.
#[derive(Debug, Clone, Serialize)]
pub struct StreakUpdate {
    pub streak: Streak,
    /// False when today's activity was already recorded (no-op).
    pub changed: bool,
    /// Achievements unlocked by this update.
    pub newly_earned: Vec<&'static AchievementDef>,
}

/// Evaluates activity against the achievement catalog, maintains the points
/// ledger and per-day streak state, and serves leaderboards.
///
/// Every rule check is idempotent: the award path is a conditional insert on
/// the (user, achievement_type) pair, so replayed activity events are no-ops.
#[derive(Clone)]
pub struct GamificationService {
    store: Arc<dyn Store>,
}

impl GamificationService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Runs the rule checks for one activity event and returns any newly
    /// unlocked achievements. Already-earned achievements are skipped.
    pub async fn check_achievements(
        &self,
        student_id: i64,
        activity: ActivityKind,
        ctx: ActivityContext,
    ) -> Result<Vec<&'static AchievementDef>, AppError> {
        let mut earned = Vec::new();

        match activity {
            ActivityKind::CourseEnrollment => {
                let count = self.store.enrollments_for_student(student_id).await?.len() as i64;
                if count >= 1 {
                    self.try_award(student_id, "first_enrollment", json!({"enrollments": count}), &mut earned)
                        .await?;
                }
                if count >= 5 {
                    self.try_award(student_id, "course_collector", json!({"enrollments": count}), &mut earned)
                        .await?;
                }
            }
            ActivityKind::CourseCompletion => {
                let completed = self
                    .store
                    .enrollments_for_student(student_id)
                    .await?
                    .iter()
                    .filter(|e| e.is_completed())
                    .count() as i64;
                if completed >= 1 {
                    self.try_award(student_id, "first_completion", json!({"completed": completed}), &mut earned)
                        .await?;
                }
                if completed >= 5 {
                    self.try_award(student_id, "dedicated_learner", json!({"completed": completed}), &mut earned)
                        .await?;
                }
            }
            ActivityKind::QuizCompletion => {
                let count = self.store.attempts_for_student(student_id).await?.len() as i64;
                if count >= 1 {
                    self.try_award(student_id, "first_quiz", json!({"attempts": count}), &mut earned)
                        .await?;
                }
                if count >= 10 {
                    self.try_award(student_id, "quiz_master", json!({"attempts": count}), &mut earned)
                        .await?;
                }
                if ctx.score == Some(100) {
                    self.try_award(student_id, "perfect_score", json!({"score": 100}), &mut earned)
                        .await?;
                }
            }
            ActivityKind::StudyStreak => {
                let current = match ctx.current_streak {
                    Some(current) => current,
                    None => self
                        .store
                        .streak_for_user(student_id)
                        .await?
                        .map(|s| s.current_streak)
                        .unwrap_or(0),
                };
                if current >= 7 {
                    self.try_award(student_id, "week_streak", json!({"streak": current}), &mut earned)
                        .await?;
                }
                if current >= 30 {
                    self.try_award(student_id, "month_streak", json!({"streak": current}), &mut earned)
                        .await?;
                }
            }
        }

        Ok(earned)
    }

    async fn try_award(
        &self,
        student_id: i64,
        key: &'static str,
        metadata: serde_json::Value,
        earned: &mut Vec<&'static AchievementDef>,
    ) -> Result<(), AppError> {
        match self.award(student_id, key, metadata).await {
            Ok(def) => {
                earned.push(def);
                Ok(())
            }
            Err(AppError::AlreadyEarned(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Awards one achievement, exactly once per (student, type) pair.
    ///
    /// The uniqueness guard lives in the store (conditional insert), so two
    /// concurrent activity events cannot both award; the loser observes
    /// `AlreadyEarned`. A successful award credits the catalog point bonus.
    pub async fn award(
        &self,
        student_id: i64,
        achievement_type: &str,
        metadata: serde_json::Value,
    ) -> Result<&'static AchievementDef, AppError> {
        let def = achievement_def(achievement_type).ok_or_else(|| {
            AppError::NotFound(format!("Unknown achievement '{achievement_type}'"))
        })?;

        let inserted = self
            .store
            .insert_achievement_if_absent(student_id, def.key, metadata)
            .await?;
        if !inserted {
            return Err(AppError::AlreadyEarned(format!(
                "Achievement '{}' already earned",
                def.key
            )));
        }

        self.store
            .add_points(student_id, def.points, &format!("achievement:{}", def.key))
            .await?;
        tracing::info!(student_id, achievement = def.key, "achievement unlocked");
        Ok(def)
    }

    /// Appends to the points ledger. Amounts are strictly positive; the
    /// ledger never decrements. Returns the new running total.
    pub async fn award_points(
        &self,
        student_id: i64,
        amount: i64,
        reason: &str,
    ) -> Result<i64, AppError> {
        if amount <= 0 {
            return Err(AppError::BadRequest(
                "Point awards must be positive".to_string(),
            ));
        }
        self.store.add_points(student_id, amount, reason).await
    }

    pub async fn points(&self, student_id: i64) -> Result<PointsSummary, AppError> {
        self.store.points_summary(student_id, RECENT_EVENTS).await
    }

    pub async fn achievements(&self, student_id: i64) -> Result<Vec<UserAchievement>, AppError> {
        self.store.achievements_for_user(student_id).await
    }

    pub async fn streak(&self, student_id: i64) -> Result<Option<Streak>, AppError> {
        self.store.streak_for_user(student_id).await
    }

    /// Records today's activity against the student's streak.
    pub async fn update_streak(&self, student_id: i64) -> Result<StreakUpdate, AppError> {
        self.update_streak_on(student_id, Utc::now().date_naive())
            .await
    }

    /// Streak state machine, anchored on an explicit calendar day:
    /// * already active today: no-op.
    /// * last active exactly yesterday: current streak + 1, longest raised.
    /// * gap of 2+ days, or first activity ever: reset to 1 (longest kept).
    ///
    /// The write is committed through a guard on the previously observed
    /// last_active_date, so duplicate same-day submissions (e.g. a retried
    /// request) cannot increment twice: the second commit fails its guard
    /// and is treated as a no-op.
    pub async fn update_streak_on(
        &self,
        student_id: i64,
        today: NaiveDate,
    ) -> Result<StreakUpdate, AppError> {
        let existing = self.store.streak_for_user(student_id).await?;
        let yesterday = today - Duration::days(1);

        let (candidate, guard) = match &existing {
            Some(streak) if streak.last_active_date == today => {
                return Ok(StreakUpdate {
                    streak: streak.clone(),
                    changed: false,
                    newly_earned: Vec::new(),
                });
            }
            Some(streak) => {
                let current = if streak.last_active_date == yesterday {
                    streak.current_streak + 1
                } else {
                    1
                };
                (
                    Streak {
                        user_id: student_id,
                        current_streak: current,
                        longest_streak: streak.longest_streak.max(current),
                        last_active_date: today,
                        updated_at: None,
                    },
                    Some(streak.last_active_date),
                )
            }
            None => (
                Streak {
                    user_id: student_id,
                    current_streak: 1,
                    longest_streak: 1,
                    last_active_date: today,
                    updated_at: None,
                },
                None,
            ),
        };

        let committed = self.store.commit_streak(&candidate, guard).await?;
        if !committed {
            // Lost a race with a concurrent update that already recorded
            // today; report the winner's state as a no-op.
            let streak = self
                .store
                .streak_for_user(student_id)
                .await?
                .unwrap_or(candidate);
            return Ok(StreakUpdate {
                streak,
                changed: false,
                newly_earned: Vec::new(),
            });
        }

        self.store
            .add_points(student_id, DAILY_STREAK_BONUS, "daily_streak")
            .await?;

        let newly_earned = self
            .check_achievements(
                student_id,
                ActivityKind::StudyStreak,
                ActivityContext {
                    current_streak: Some(candidate.current_streak),
                    ..Default::default()
                },
            )
            .await?;

        Ok(StreakUpdate {
            streak: candidate,
            changed: true,
            newly_earned,
        })
    }

    /// Top `limit` students by the category's metric. Ordering is metric
    /// descending with ties broken by ascending user id; `rank` is 1-based
    /// position in the returned page.
    pub async fn leaderboard(
        &self,
        category: LeaderboardCategory,
        limit: i64,
    ) -> Result<Vec<LeaderboardEntry>, AppError> {
        let limit = limit.clamp(1, 100);
        let mut entries = self.store.ranked_users(category, Some(limit)).await?;
        for (position, entry) in entries.iter_mut().enumerate() {
            entry.rank = position as i64 + 1;
        }
        Ok(entries)
    }

    /// The student's 1-based rank in the full ordered population, or None if
    /// the student has no standing in the category yet. Full scan by design;
    /// not meant to scale past a few thousand users without a materialized
    /// rank index.
    pub async fn user_rank(
        &self,
        student_id: i64,
        category: LeaderboardCategory,
    ) -> Result<Option<i64>, AppError> {
        let entries = self.store.ranked_users(category, None).await?;
        Ok(entries
            .iter()
            .position(|e| e.user_id == student_id)
            .map(|position| position as i64 + 1))
    }
}
