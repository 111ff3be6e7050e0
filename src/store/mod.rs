// src/store/mod.rs

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::{
    error::AppError,
    models::{
        analytics::{CourseAttempt, NewStudySession, StudySession},
        attempt::{Attempt, NewAttempt},
        course::{Course, NewCourse, NewReview, Review},
        enrollment::{Enrollment, NewEnrollment},
        gamification::{LeaderboardCategory, LeaderboardEntry, PointsSummary, Streak, UserAchievement},
        quiz::{NewQuiz, Quiz},
        user::{NewUser, User},
    },
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Persistence collaborator for the services layer.
///
/// A typed repository surface over the underlying document/relational store.
/// Production uses [`PgStore`]; tests substitute [`MemoryStore`], which
/// reproduces the same conditional-write semantics (unique pairs, guarded
/// streak commits) without a database.
///
/// Duplicate-key inserts surface as `AppError::Conflict`; everything else
/// unexpected maps to `AppError::InternalServerError`.
#[async_trait]
pub trait Store: Send + Sync {
    // --- users ---

    async fn insert_user(&self, user: NewUser) -> Result<User, AppError>;
    async fn user_by_id(&self, id: i64) -> Result<Option<User>, AppError>;
    async fn user_by_username(&self, username: &str) -> Result<Option<User>, AppError>;

    // --- courses & reviews ---

    async fn insert_course(&self, course: NewCourse) -> Result<Course, AppError>;
    async fn update_course(&self, course: &Course) -> Result<(), AppError>;
    async fn course_by_id(&self, id: i64) -> Result<Option<Course>, AppError>;
    async fn published_courses(&self, category: Option<&str>) -> Result<Vec<Course>, AppError>;
    async fn courses_by_tutor(&self, tutor_id: i64) -> Result<Vec<Course>, AppError>;
    async fn insert_review(&self, review: NewReview) -> Result<Review, AppError>;
    async fn reviews_for_courses(&self, course_ids: &[i64]) -> Result<Vec<Review>, AppError>;

    // --- quizzes ---

    async fn insert_quiz(&self, quiz: NewQuiz) -> Result<Quiz, AppError>;
    async fn update_quiz(&self, quiz: &Quiz) -> Result<(), AppError>;
    async fn quiz_by_id(&self, id: i64) -> Result<Option<Quiz>, AppError>;
    async fn quizzes_for_course(&self, course_id: i64) -> Result<Vec<Quiz>, AppError>;

    /// Overwrites the quiz's rolling statistics. Last writer wins; callers
    /// recompute from the full attempt set before patching.
    async fn patch_quiz_stats(
        &self,
        quiz_id: i64,
        total_attempts: i64,
        average_score: f64,
    ) -> Result<(), AppError>;

    // --- attempts ---

    async fn insert_attempt(&self, attempt: NewAttempt) -> Result<Attempt, AppError>;
    async fn attempts_for_quiz(&self, quiz_id: i64) -> Result<Vec<Attempt>, AppError>;
    async fn attempt_count(&self, quiz_id: i64, student_id: i64) -> Result<i64, AppError>;
    async fn attempts_for_student(&self, student_id: i64) -> Result<Vec<Attempt>, AppError>;
    async fn attempts_for_student_since(
        &self,
        student_id: i64,
        since: DateTime<Utc>,
    ) -> Result<Vec<Attempt>, AppError>;

    /// Attempts on any quiz of the given courses, joined with the course id.
    async fn attempts_for_courses_since(
        &self,
        course_ids: &[i64],
        since: DateTime<Utc>,
    ) -> Result<Vec<CourseAttempt>, AppError>;

    // --- enrollments ---

    /// Fails with `Conflict` if the (student, course) pair already exists.
    async fn insert_enrollment(&self, enrollment: NewEnrollment) -> Result<Enrollment, AppError>;
    async fn enrollment_by_id(&self, id: i64) -> Result<Option<Enrollment>, AppError>;
    async fn enrollments_for_student(&self, student_id: i64) -> Result<Vec<Enrollment>, AppError>;
    async fn enrollments_for_courses(
        &self,
        course_ids: &[i64],
    ) -> Result<Vec<Enrollment>, AppError>;
    async fn set_enrollment_progress(
        &self,
        id: i64,
        progress: i32,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<(), AppError>;

    /// Explicit unenroll; the only path that removes an enrollment.
    async fn delete_enrollment(&self, id: i64) -> Result<(), AppError>;

    // --- study sessions ---

    async fn insert_study_session(
        &self,
        session: NewStudySession,
    ) -> Result<StudySession, AppError>;
    async fn study_sessions_since(
        &self,
        student_id: i64,
        since: DateTime<Utc>,
    ) -> Result<Vec<StudySession>, AppError>;

    // --- gamification ---

    /// Conditional insert backing the exactly-once achievement invariant.
    /// Returns false when the (user, type) pair already exists.
    async fn insert_achievement_if_absent(
        &self,
        user_id: i64,
        achievement_type: &str,
        metadata: serde_json::Value,
    ) -> Result<bool, AppError>;
    async fn achievements_for_user(&self, user_id: i64) -> Result<Vec<UserAchievement>, AppError>;

    /// Appends one ledger event and increments the running total in a single
    /// transaction. Returns the new total.
    async fn add_points(&self, user_id: i64, amount: i64, reason: &str) -> Result<i64, AppError>;
    async fn points_summary(&self, user_id: i64, recent: i64) -> Result<PointsSummary, AppError>;

    async fn streak_for_user(&self, user_id: i64) -> Result<Option<Streak>, AppError>;

    /// Conditional write backing the once-per-day streak invariant.
    ///
    /// With `guard = Some(date)`, the row is updated only if its stored
    /// last_active_date still equals `date`; with `guard = None`, the row is
    /// inserted only if absent. Returns false when the guard fails (a
    /// concurrent update won), in which case nothing was written.
    async fn commit_streak(&self, streak: &Streak, guard: Option<NaiveDate>)
        -> Result<bool, AppError>;

    /// Users ordered by the category's metric, descending, ties broken by
    /// ascending user id. `rank` on the returned entries is unset (0); the
    /// gamification service assigns it from position.
    async fn ranked_users(
        &self,
        category: LeaderboardCategory,
        limit: Option<i64>,
    ) -> Result<Vec<LeaderboardEntry>, AppError>;
}
