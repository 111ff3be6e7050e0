// src/store/postgres.rs

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder, types::Json};

use crate::{
    error::AppError,
    models::{
        analytics::{CourseAttempt, NewStudySession, StudySession},
        attempt::{Attempt, NewAttempt},
        course::{Course, NewCourse, NewReview, Review},
        enrollment::{Enrollment, NewEnrollment},
        gamification::{
            LeaderboardCategory, LeaderboardEntry, PointEvent, PointsSummary, Streak,
            UserAchievement,
        },
        quiz::{NewQuiz, Quiz},
        user::{NewUser, User},
    },
};

use super::Store;

/// Maximum ids bound into a single IN clause. Postgres allows far more bind
/// parameters than this, but multi-course fan-out queries keep the chunked
/// union pattern so the cap is a single constant if the backend ever changes.
const IN_CHUNK: usize = 500;

/// Postgres-backed [`Store`] implementation.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Runs `prefix IN (...ids...) suffix` once per chunk and unions the rows.
    async fn fetch_chunked<T>(
        &self,
        prefix: &str,
        ids: &[i64],
        suffix: &str,
    ) -> Result<Vec<T>, AppError>
    where
        T: for<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> + Send + Unpin,
    {
        let mut out = Vec::new();
        for chunk in ids.chunks(IN_CHUNK) {
            let mut query_builder = QueryBuilder::<Postgres>::new(prefix);
            let mut separated = query_builder.separated(",");
            for id in chunk {
                separated.push_bind(*id);
            }
            separated.push_unseparated(")");
            query_builder.push(suffix);

            let rows: Vec<T> = query_builder
                .build_query_as()
                .fetch_all(&self.pool)
                .await?;
            out.extend(rows);
        }
        Ok(out)
    }
}

/// Postgres unique-violation error code.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err.as_database_error().and_then(|db| db.code()),
        Some(code) if code == "23505"
    )
}

const USER_COLUMNS: &str = "id, username, email, password, role, created_at";
const COURSE_COLUMNS: &str =
    "id, tutor_id, title, description, category, price, thumbnail_url, status, created_at, updated_at";
const QUIZ_COLUMNS: &str = "id, course_id, tutor_id, title, description, questions, \
     time_limit_minutes, max_attempts, passing_score, shuffle_questions, shuffle_options, \
     show_results, show_answers, status, total_attempts, average_score, created_at, updated_at";
const ATTEMPT_COLUMNS: &str = "id, quiz_id, student_id, answers, breakdown, score, \
     earned_points, total_points, correct_count, time_spent_secs, passed, created_at";
const ENROLLMENT_COLUMNS: &str =
    "id, student_id, course_id, progress, paid_amount, enrolled_at, completed_at";

#[async_trait]
impl Store for PgStore {
    // --- users ---

    async fn insert_user(&self, user: NewUser) -> Result<User, AppError> {
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (username, email, password, role)
             VALUES ($1, $2, $3, $4)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password)
        .bind(&user.role)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict("Username or email already exists".to_string())
            } else {
                AppError::from(e)
            }
        })
    }

    async fn user_by_id(&self, id: i64) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    // --- courses & reviews ---

    async fn insert_course(&self, course: NewCourse) -> Result<Course, AppError> {
        let row = sqlx::query_as::<_, Course>(&format!(
            "INSERT INTO courses (tutor_id, title, description, category, price, thumbnail_url, status)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {COURSE_COLUMNS}"
        ))
        .bind(course.tutor_id)
        .bind(&course.title)
        .bind(&course.description)
        .bind(&course.category)
        .bind(course.price)
        .bind(&course.thumbnail_url)
        .bind(&course.status)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn update_course(&self, course: &Course) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE courses
             SET title = $2, description = $3, category = $4, price = $5,
                 thumbnail_url = $6, status = $7, updated_at = NOW()
             WHERE id = $1",
        )
        .bind(course.id)
        .bind(&course.title)
        .bind(&course.description)
        .bind(&course.category)
        .bind(course.price)
        .bind(&course.thumbnail_url)
        .bind(&course.status)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn course_by_id(&self, id: i64) -> Result<Option<Course>, AppError> {
        let course = sqlx::query_as::<_, Course>(&format!(
            "SELECT {COURSE_COLUMNS} FROM courses WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(course)
    }

    async fn published_courses(&self, category: Option<&str>) -> Result<Vec<Course>, AppError> {
        let courses = match category {
            Some(category) => {
                sqlx::query_as::<_, Course>(&format!(
                    "SELECT {COURSE_COLUMNS} FROM courses
                     WHERE status = 'published' AND category = $1
                     ORDER BY created_at DESC"
                ))
                .bind(category)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Course>(&format!(
                    "SELECT {COURSE_COLUMNS} FROM courses
                     WHERE status = 'published'
                     ORDER BY created_at DESC"
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(courses)
    }

    async fn courses_by_tutor(&self, tutor_id: i64) -> Result<Vec<Course>, AppError> {
        let courses = sqlx::query_as::<_, Course>(&format!(
            "SELECT {COURSE_COLUMNS} FROM courses WHERE tutor_id = $1 ORDER BY created_at DESC"
        ))
        .bind(tutor_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(courses)
    }

    async fn insert_review(&self, review: NewReview) -> Result<Review, AppError> {
        sqlx::query_as::<_, Review>(
            "INSERT INTO reviews (course_id, student_id, rating, comment)
             VALUES ($1, $2, $3, $4)
             RETURNING id, course_id, student_id, rating, comment, created_at",
        )
        .bind(review.course_id)
        .bind(review.student_id)
        .bind(review.rating)
        .bind(&review.comment)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict("Course already reviewed".to_string())
            } else {
                AppError::from(e)
            }
        })
    }

    async fn reviews_for_courses(&self, course_ids: &[i64]) -> Result<Vec<Review>, AppError> {
        if course_ids.is_empty() {
            return Ok(Vec::new());
        }
        self.fetch_chunked(
            "SELECT id, course_id, student_id, rating, comment, created_at
             FROM reviews WHERE course_id IN (",
            course_ids,
            "",
        )
        .await
    }

    // --- quizzes ---

    async fn insert_quiz(&self, quiz: NewQuiz) -> Result<Quiz, AppError> {
        let row = sqlx::query_as::<_, Quiz>(&format!(
            "INSERT INTO quizzes (course_id, tutor_id, title, description, questions,
                 time_limit_minutes, max_attempts, passing_score, shuffle_questions,
                 shuffle_options, show_results, show_answers, status)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
             RETURNING {QUIZ_COLUMNS}"
        ))
        .bind(quiz.course_id)
        .bind(quiz.tutor_id)
        .bind(&quiz.title)
        .bind(&quiz.description)
        .bind(Json(&quiz.questions))
        .bind(quiz.time_limit_minutes)
        .bind(quiz.max_attempts)
        .bind(quiz.passing_score)
        .bind(quiz.shuffle_questions)
        .bind(quiz.shuffle_options)
        .bind(quiz.show_results)
        .bind(quiz.show_answers)
        .bind(&quiz.status)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn update_quiz(&self, quiz: &Quiz) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE quizzes
             SET title = $2, description = $3, questions = $4, time_limit_minutes = $5,
                 max_attempts = $6, passing_score = $7, shuffle_questions = $8,
                 shuffle_options = $9, show_results = $10, show_answers = $11,
                 status = $12, updated_at = NOW()
             WHERE id = $1",
        )
        .bind(quiz.id)
        .bind(&quiz.title)
        .bind(&quiz.description)
        .bind(&quiz.questions)
        .bind(quiz.time_limit_minutes)
        .bind(quiz.max_attempts)
        .bind(quiz.passing_score)
        .bind(quiz.shuffle_questions)
        .bind(quiz.shuffle_options)
        .bind(quiz.show_results)
        .bind(quiz.show_answers)
        .bind(&quiz.status)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn quiz_by_id(&self, id: i64) -> Result<Option<Quiz>, AppError> {
        let quiz = sqlx::query_as::<_, Quiz>(&format!(
            "SELECT {QUIZ_COLUMNS} FROM quizzes WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(quiz)
    }

    async fn quizzes_for_course(&self, course_id: i64) -> Result<Vec<Quiz>, AppError> {
        let quizzes = sqlx::query_as::<_, Quiz>(&format!(
            "SELECT {QUIZ_COLUMNS} FROM quizzes WHERE course_id = $1 ORDER BY created_at ASC"
        ))
        .bind(course_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(quizzes)
    }

    async fn patch_quiz_stats(
        &self,
        quiz_id: i64,
        total_attempts: i64,
        average_score: f64,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE quizzes SET total_attempts = $2, average_score = $3, updated_at = NOW()
             WHERE id = $1",
        )
        .bind(quiz_id)
        .bind(total_attempts)
        .bind(average_score)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // --- attempts ---

    async fn insert_attempt(&self, attempt: NewAttempt) -> Result<Attempt, AppError> {
        let row = sqlx::query_as::<_, Attempt>(&format!(
            "INSERT INTO attempts (quiz_id, student_id, answers, breakdown, score,
                 earned_points, total_points, correct_count, time_spent_secs, passed)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             RETURNING {ATTEMPT_COLUMNS}"
        ))
        .bind(attempt.quiz_id)
        .bind(attempt.student_id)
        .bind(Json(&attempt.answers))
        .bind(Json(&attempt.breakdown))
        .bind(attempt.score)
        .bind(attempt.earned_points)
        .bind(attempt.total_points)
        .bind(attempt.correct_count)
        .bind(attempt.time_spent_secs)
        .bind(attempt.passed)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn attempts_for_quiz(&self, quiz_id: i64) -> Result<Vec<Attempt>, AppError> {
        let attempts = sqlx::query_as::<_, Attempt>(&format!(
            "SELECT {ATTEMPT_COLUMNS} FROM attempts WHERE quiz_id = $1 ORDER BY created_at ASC"
        ))
        .bind(quiz_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(attempts)
    }

    async fn attempt_count(&self, quiz_id: i64, student_id: i64) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM attempts WHERE quiz_id = $1 AND student_id = $2",
        )
        .bind(quiz_id)
        .bind(student_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn attempts_for_student(&self, student_id: i64) -> Result<Vec<Attempt>, AppError> {
        let attempts = sqlx::query_as::<_, Attempt>(&format!(
            "SELECT {ATTEMPT_COLUMNS} FROM attempts WHERE student_id = $1 ORDER BY created_at DESC"
        ))
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(attempts)
    }

    async fn attempts_for_student_since(
        &self,
        student_id: i64,
        since: DateTime<Utc>,
    ) -> Result<Vec<Attempt>, AppError> {
        let attempts = sqlx::query_as::<_, Attempt>(&format!(
            "SELECT {ATTEMPT_COLUMNS} FROM attempts
             WHERE student_id = $1 AND created_at >= $2
             ORDER BY created_at ASC"
        ))
        .bind(student_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        Ok(attempts)
    }

    async fn attempts_for_courses_since(
        &self,
        course_ids: &[i64],
        since: DateTime<Utc>,
    ) -> Result<Vec<CourseAttempt>, AppError> {
        if course_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut out = Vec::new();
        for chunk in course_ids.chunks(IN_CHUNK) {
            let mut query_builder = QueryBuilder::<Postgres>::new(
                "SELECT q.course_id, a.id, a.quiz_id, a.student_id, a.answers, a.breakdown,
                        a.score, a.earned_points, a.total_points, a.correct_count,
                        a.time_spent_secs, a.passed, a.created_at
                 FROM attempts a
                 JOIN quizzes q ON a.quiz_id = q.id
                 WHERE q.course_id IN (",
            );
            let mut separated = query_builder.separated(",");
            for id in chunk {
                separated.push_bind(*id);
            }
            separated.push_unseparated(")");
            query_builder.push(" AND a.created_at >= ");
            query_builder.push_bind(since);

            let rows: Vec<CourseAttempt> = query_builder
                .build_query_as()
                .fetch_all(&self.pool)
                .await?;
            out.extend(rows);
        }
        Ok(out)
    }

    // --- enrollments ---

    async fn insert_enrollment(&self, enrollment: NewEnrollment) -> Result<Enrollment, AppError> {
        sqlx::query_as::<_, Enrollment>(&format!(
            "INSERT INTO enrollments (student_id, course_id, paid_amount)
             VALUES ($1, $2, $3)
             RETURNING {ENROLLMENT_COLUMNS}"
        ))
        .bind(enrollment.student_id)
        .bind(enrollment.course_id)
        .bind(enrollment.paid_amount)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict("Already enrolled in this course".to_string())
            } else {
                AppError::from(e)
            }
        })
    }

    async fn enrollment_by_id(&self, id: i64) -> Result<Option<Enrollment>, AppError> {
        let enrollment = sqlx::query_as::<_, Enrollment>(&format!(
            "SELECT {ENROLLMENT_COLUMNS} FROM enrollments WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(enrollment)
    }

    async fn enrollments_for_student(&self, student_id: i64) -> Result<Vec<Enrollment>, AppError> {
        let enrollments = sqlx::query_as::<_, Enrollment>(&format!(
            "SELECT {ENROLLMENT_COLUMNS} FROM enrollments
             WHERE student_id = $1 ORDER BY enrolled_at DESC"
        ))
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(enrollments)
    }

    async fn enrollments_for_courses(
        &self,
        course_ids: &[i64],
    ) -> Result<Vec<Enrollment>, AppError> {
        if course_ids.is_empty() {
            return Ok(Vec::new());
        }
        self.fetch_chunked(
            &format!("SELECT {ENROLLMENT_COLUMNS} FROM enrollments WHERE course_id IN ("),
            course_ids,
            "",
        )
        .await
    }

    async fn set_enrollment_progress(
        &self,
        id: i64,
        progress: i32,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE enrollments
             SET progress = $2, completed_at = COALESCE(completed_at, $3)
             WHERE id = $1",
        )
        .bind(id)
        .bind(progress)
        .bind(completed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_enrollment(&self, id: i64) -> Result<(), AppError> {
        sqlx::query("DELETE FROM enrollments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // --- study sessions ---

    async fn insert_study_session(
        &self,
        session: NewStudySession,
    ) -> Result<StudySession, AppError> {
        let row = sqlx::query_as::<_, StudySession>(
            "INSERT INTO study_sessions (student_id, course_id, duration_minutes)
             VALUES ($1, $2, $3)
             RETURNING id, student_id, course_id, duration_minutes, started_at",
        )
        .bind(session.student_id)
        .bind(session.course_id)
        .bind(session.duration_minutes)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn study_sessions_since(
        &self,
        student_id: i64,
        since: DateTime<Utc>,
    ) -> Result<Vec<StudySession>, AppError> {
        let sessions = sqlx::query_as::<_, StudySession>(
            "SELECT id, student_id, course_id, duration_minutes, started_at
             FROM study_sessions
             WHERE student_id = $1 AND started_at >= $2
             ORDER BY started_at ASC",
        )
        .bind(student_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        Ok(sessions)
    }

    // --- gamification ---

    async fn insert_achievement_if_absent(
        &self,
        user_id: i64,
        achievement_type: &str,
        metadata: serde_json::Value,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            "INSERT INTO user_achievements (user_id, achievement_type, metadata)
             VALUES ($1, $2, $3)
             ON CONFLICT (user_id, achievement_type) DO NOTHING",
        )
        .bind(user_id)
        .bind(achievement_type)
        .bind(Json(metadata))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn achievements_for_user(&self, user_id: i64) -> Result<Vec<UserAchievement>, AppError> {
        let achievements = sqlx::query_as::<_, UserAchievement>(
            "SELECT id, user_id, achievement_type, metadata, earned_at
             FROM user_achievements
             WHERE user_id = $1
             ORDER BY earned_at ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(achievements)
    }

    async fn add_points(&self, user_id: i64, amount: i64, reason: &str) -> Result<i64, AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO point_events (user_id, amount, reason) VALUES ($1, $2, $3)")
            .bind(user_id)
            .bind(amount)
            .bind(reason)
            .execute(&mut *tx)
            .await?;

        let total: i64 = sqlx::query_scalar(
            "INSERT INTO user_points (user_id, total) VALUES ($1, $2)
             ON CONFLICT (user_id) DO UPDATE
                 SET total = user_points.total + EXCLUDED.total, updated_at = NOW()
             RETURNING total",
        )
        .bind(user_id)
        .bind(amount)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(total)
    }

    async fn points_summary(&self, user_id: i64, recent: i64) -> Result<PointsSummary, AppError> {
        let total: Option<i64> =
            sqlx::query_scalar("SELECT total FROM user_points WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        let recent_events = sqlx::query_as::<_, PointEvent>(
            "SELECT id, user_id, amount, reason, created_at
             FROM point_events
             WHERE user_id = $1
             ORDER BY created_at DESC, id DESC
             LIMIT $2",
        )
        .bind(user_id)
        .bind(recent)
        .fetch_all(&self.pool)
        .await?;

        Ok(PointsSummary {
            total: total.unwrap_or(0),
            recent_events,
        })
    }

    async fn streak_for_user(&self, user_id: i64) -> Result<Option<Streak>, AppError> {
        let streak = sqlx::query_as::<_, Streak>(
            "SELECT user_id, current_streak, longest_streak, last_active_date, updated_at
             FROM streaks WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(streak)
    }

    async fn commit_streak(
        &self,
        streak: &Streak,
        guard: Option<NaiveDate>,
    ) -> Result<bool, AppError> {
        let result = match guard {
            Some(expected) => {
                sqlx::query(
                    "UPDATE streaks
                     SET current_streak = $2, longest_streak = $3, last_active_date = $4,
                         updated_at = NOW()
                     WHERE user_id = $1 AND last_active_date = $5",
                )
                .bind(streak.user_id)
                .bind(streak.current_streak)
                .bind(streak.longest_streak)
                .bind(streak.last_active_date)
                .bind(expected)
                .execute(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "INSERT INTO streaks (user_id, current_streak, longest_streak, last_active_date)
                     VALUES ($1, $2, $3, $4)
                     ON CONFLICT (user_id) DO NOTHING",
                )
                .bind(streak.user_id)
                .bind(streak.current_streak)
                .bind(streak.longest_streak)
                .bind(streak.last_active_date)
                .execute(&self.pool)
                .await?
            }
        };
        Ok(result.rows_affected() == 1)
    }

    async fn ranked_users(
        &self,
        category: LeaderboardCategory,
        limit: Option<i64>,
    ) -> Result<Vec<LeaderboardEntry>, AppError> {
        let base = match category {
            LeaderboardCategory::Points => {
                "SELECT u.id AS user_id, u.username, p.total AS value
                 FROM user_points p
                 JOIN users u ON u.id = p.user_id
                 ORDER BY p.total DESC, u.id ASC"
            }
            LeaderboardCategory::Streak => {
                "SELECT u.id AS user_id, u.username, s.current_streak::BIGINT AS value
                 FROM streaks s
                 JOIN users u ON u.id = s.user_id
                 ORDER BY s.current_streak DESC, u.id ASC"
            }
            LeaderboardCategory::Completions => {
                "SELECT u.id AS user_id, u.username, COUNT(*)::BIGINT AS value
                 FROM enrollments e
                 JOIN users u ON u.id = e.student_id
                 WHERE e.progress >= 100
                 GROUP BY u.id, u.username
                 ORDER BY value DESC, u.id ASC"
            }
        };

        let mut query_builder = QueryBuilder::<Postgres>::new(base);
        if let Some(limit) = limit {
            query_builder.push(" LIMIT ");
            query_builder.push_bind(limit);
        }

        let entries: Vec<LeaderboardEntry> = query_builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await?;
        Ok(entries)
    }
}
