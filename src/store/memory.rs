// src/store/memory.rs

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::types::Json;

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

/// In-memory [`Store`] used by tests (and available for local experiments).
///
/// Reproduces the semantics the services rely on: unique (student, course)
/// and (user, achievement_type) pairs, the guarded streak commit, and the
/// ordering/tie-break rules of the ranked queries.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    next_id: i64,
    users: Vec<User>,
    courses: Vec<Course>,
    reviews: Vec<Review>,
    quizzes: Vec<Quiz>,
    attempts: Vec<Attempt>,
    enrollments: Vec<Enrollment>,
    sessions: Vec<StudySession>,
    achievements: Vec<UserAchievement>,
    points: HashMap<i64, i64>,
    point_events: Vec<PointEvent>,
    streaks: HashMap<i64, Streak>,
}

impl Inner {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, AppError> {
        self.inner
            .lock()
            .map_err(|_| AppError::InternalServerError("memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl Store for MemoryStore {
    // --- users ---

    async fn insert_user(&self, user: NewUser) -> Result<User, AppError> {
        let mut inner = self.lock()?;
        if inner
            .users
            .iter()
            .any(|u| u.username == user.username || u.email == user.email)
        {
            return Err(AppError::Conflict(
                "Username or email already exists".to_string(),
            ));
        }
        let id = inner.next_id();
        let row = User {
            id,
            username: user.username,
            email: user.email,
            password: user.password,
            role: user.role,
            created_at: Some(Utc::now()),
        };
        inner.users.push(row.clone());
        Ok(row)
    }

    async fn user_by_id(&self, id: i64) -> Result<Option<User>, AppError> {
        Ok(self.lock()?.users.iter().find(|u| u.id == id).cloned())
    }

    async fn user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        Ok(self
            .lock()?
            .users
            .iter()
            .find(|u| u.username == username)
            .cloned())
    }

    // --- courses & reviews ---

    async fn insert_course(&self, course: NewCourse) -> Result<Course, AppError> {
        let mut inner = self.lock()?;
        let id = inner.next_id();
        let now = Utc::now();
        let row = Course {
            id,
            tutor_id: course.tutor_id,
            title: course.title,
            description: course.description,
            category: course.category,
            price: course.price,
            thumbnail_url: course.thumbnail_url,
            status: course.status,
            created_at: Some(now),
            updated_at: Some(now),
        };
        inner.courses.push(row.clone());
        Ok(row)
    }

    async fn update_course(&self, course: &Course) -> Result<(), AppError> {
        let mut inner = self.lock()?;
        if let Some(existing) = inner.courses.iter_mut().find(|c| c.id == course.id) {
            *existing = course.clone();
            existing.updated_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn course_by_id(&self, id: i64) -> Result<Option<Course>, AppError> {
        Ok(self.lock()?.courses.iter().find(|c| c.id == id).cloned())
    }

    async fn published_courses(&self, category: Option<&str>) -> Result<Vec<Course>, AppError> {
        Ok(self
            .lock()?
            .courses
            .iter()
            .filter(|c| c.is_published())
            .filter(|c| category.is_none_or(|cat| c.category == cat))
            .cloned()
            .collect())
    }

    async fn courses_by_tutor(&self, tutor_id: i64) -> Result<Vec<Course>, AppError> {
        Ok(self
            .lock()?
            .courses
            .iter()
            .filter(|c| c.tutor_id == tutor_id)
            .cloned()
            .collect())
    }

    async fn insert_review(&self, review: NewReview) -> Result<Review, AppError> {
        let mut inner = self.lock()?;
        if inner
            .reviews
            .iter()
            .any(|r| r.course_id == review.course_id && r.student_id == review.student_id)
        {
            return Err(AppError::Conflict("Course already reviewed".to_string()));
        }
        let id = inner.next_id();
        let row = Review {
            id,
            course_id: review.course_id,
            student_id: review.student_id,
            rating: review.rating,
            comment: review.comment,
            created_at: Some(Utc::now()),
        };
        inner.reviews.push(row.clone());
        Ok(row)
    }

    async fn reviews_for_courses(&self, course_ids: &[i64]) -> Result<Vec<Review>, AppError> {
        Ok(self
            .lock()?
            .reviews
            .iter()
            .filter(|r| course_ids.contains(&r.course_id))
            .cloned()
            .collect())
    }

    // --- quizzes ---

    async fn insert_quiz(&self, quiz: NewQuiz) -> Result<Quiz, AppError> {
        let mut inner = self.lock()?;
        let id = inner.next_id();
        let now = Utc::now();
        let row = Quiz {
            id,
            course_id: quiz.course_id,
            tutor_id: quiz.tutor_id,
            title: quiz.title,
            description: quiz.description,
            questions: Json(quiz.questions),
            time_limit_minutes: quiz.time_limit_minutes,
            max_attempts: quiz.max_attempts,
            passing_score: quiz.passing_score,
            shuffle_questions: quiz.shuffle_questions,
            shuffle_options: quiz.shuffle_options,
            show_results: quiz.show_results,
            show_answers: quiz.show_answers,
            status: quiz.status,
            total_attempts: 0,
            average_score: 0.0,
            created_at: Some(now),
            updated_at: Some(now),
        };
        inner.quizzes.push(row.clone());
        Ok(row)
    }

    async fn update_quiz(&self, quiz: &Quiz) -> Result<(), AppError> {
        let mut inner = self.lock()?;
        if let Some(existing) = inner.quizzes.iter_mut().find(|q| q.id == quiz.id) {
            *existing = quiz.clone();
            existing.updated_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn quiz_by_id(&self, id: i64) -> Result<Option<Quiz>, AppError> {
        Ok(self.lock()?.quizzes.iter().find(|q| q.id == id).cloned())
    }

    async fn quizzes_for_course(&self, course_id: i64) -> Result<Vec<Quiz>, AppError> {
        Ok(self
            .lock()?
            .quizzes
            .iter()
            .filter(|q| q.course_id == course_id)
            .cloned()
            .collect())
    }

    async fn patch_quiz_stats(
        &self,
        quiz_id: i64,
        total_attempts: i64,
        average_score: f64,
    ) -> Result<(), AppError> {
        let mut inner = self.lock()?;
        if let Some(quiz) = inner.quizzes.iter_mut().find(|q| q.id == quiz_id) {
            quiz.total_attempts = total_attempts;
            quiz.average_score = average_score;
            quiz.updated_at = Some(Utc::now());
        }
        Ok(())
    }

    // --- attempts ---

    async fn insert_attempt(&self, attempt: NewAttempt) -> Result<Attempt, AppError> {
        let mut inner = self.lock()?;
        let id = inner.next_id();
        let row = Attempt {
            id,
            quiz_id: attempt.quiz_id,
            student_id: attempt.student_id,
            answers: Json(attempt.answers),
            breakdown: Json(attempt.breakdown),
            score: attempt.score,
            earned_points: attempt.earned_points,
            total_points: attempt.total_points,
            correct_count: attempt.correct_count,
            time_spent_secs: attempt.time_spent_secs,
            passed: attempt.passed,
            created_at: Some(Utc::now()),
        };
        inner.attempts.push(row.clone());
        Ok(row)
    }

    async fn attempts_for_quiz(&self, quiz_id: i64) -> Result<Vec<Attempt>, AppError> {
        Ok(self
            .lock()?
            .attempts
            .iter()
            .filter(|a| a.quiz_id == quiz_id)
            .cloned()
            .collect())
    }

    async fn attempt_count(&self, quiz_id: i64, student_id: i64) -> Result<i64, AppError> {
        Ok(self
            .lock()?
            .attempts
            .iter()
            .filter(|a| a.quiz_id == quiz_id && a.student_id == student_id)
            .count() as i64)
    }

    async fn attempts_for_student(&self, student_id: i64) -> Result<Vec<Attempt>, AppError> {
        let mut attempts: Vec<Attempt> = self
            .lock()?
            .attempts
            .iter()
            .filter(|a| a.student_id == student_id)
            .cloned()
            .collect();
        attempts.reverse();
        Ok(attempts)
    }

    async fn attempts_for_student_since(
        &self,
        student_id: i64,
        since: DateTime<Utc>,
    ) -> Result<Vec<Attempt>, AppError> {
        Ok(self
            .lock()?
            .attempts
            .iter()
            .filter(|a| a.student_id == student_id)
            .filter(|a| a.created_at.is_some_and(|at| at >= since))
            .cloned()
            .collect())
    }

    async fn attempts_for_courses_since(
        &self,
        course_ids: &[i64],
        since: DateTime<Utc>,
    ) -> Result<Vec<CourseAttempt>, AppError> {
        let inner = self.lock()?;
        let quiz_courses: HashMap<i64, i64> =
            inner.quizzes.iter().map(|q| (q.id, q.course_id)).collect();
        Ok(inner
            .attempts
            .iter()
            .filter(|a| a.created_at.is_some_and(|at| at >= since))
            .filter_map(|a| {
                let course_id = *quiz_courses.get(&a.quiz_id)?;
                course_ids.contains(&course_id).then(|| CourseAttempt {
                    course_id,
                    attempt: a.clone(),
                })
            })
            .collect())
    }

    // --- enrollments ---

    async fn insert_enrollment(&self, enrollment: NewEnrollment) -> Result<Enrollment, AppError> {
        let mut inner = self.lock()?;
        if inner
            .enrollments
            .iter()
            .any(|e| e.student_id == enrollment.student_id && e.course_id == enrollment.course_id)
        {
            return Err(AppError::Conflict(
                "Already enrolled in this course".to_string(),
            ));
        }
        let id = inner.next_id();
        let row = Enrollment {
            id,
            student_id: enrollment.student_id,
            course_id: enrollment.course_id,
            progress: 0,
            paid_amount: enrollment.paid_amount,
            enrolled_at: Some(Utc::now()),
            completed_at: None,
        };
        inner.enrollments.push(row.clone());
        Ok(row)
    }

    async fn enrollment_by_id(&self, id: i64) -> Result<Option<Enrollment>, AppError> {
        Ok(self.lock()?.enrollments.iter().find(|e| e.id == id).cloned())
    }

    async fn enrollments_for_student(&self, student_id: i64) -> Result<Vec<Enrollment>, AppError> {
        Ok(self
            .lock()?
            .enrollments
            .iter()
            .filter(|e| e.student_id == student_id)
            .cloned()
            .collect())
    }

    async fn enrollments_for_courses(
        &self,
        course_ids: &[i64],
    ) -> Result<Vec<Enrollment>, AppError> {
        Ok(self
            .lock()?
            .enrollments
            .iter()
            .filter(|e| course_ids.contains(&e.course_id))
            .cloned()
            .collect())
    }

    async fn set_enrollment_progress(
        &self,
        id: i64,
        progress: i32,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<(), AppError> {
        let mut inner = self.lock()?;
        if let Some(enrollment) = inner.enrollments.iter_mut().find(|e| e.id == id) {
            enrollment.progress = progress;
            if enrollment.completed_at.is_none() {
                enrollment.completed_at = completed_at;
            }
        }
        Ok(())
    }

    async fn delete_enrollment(&self, id: i64) -> Result<(), AppError> {
        self.lock()?.enrollments.retain(|e| e.id != id);
        Ok(())
    }

    // --- study sessions ---

    async fn insert_study_session(
        &self,
        session: NewStudySession,
    ) -> Result<StudySession, AppError> {
        let mut inner = self.lock()?;
        let id = inner.next_id();
        let row = StudySession {
            id,
            student_id: session.student_id,
            course_id: session.course_id,
            duration_minutes: session.duration_minutes,
            started_at: Utc::now(),
        };
        inner.sessions.push(row.clone());
        Ok(row)
    }

    async fn study_sessions_since(
        &self,
        student_id: i64,
        since: DateTime<Utc>,
    ) -> Result<Vec<StudySession>, AppError> {
        Ok(self
            .lock()?
            .sessions
            .iter()
            .filter(|s| s.student_id == student_id && s.started_at >= since)
            .cloned()
            .collect())
    }

    // --- gamification ---

    async fn insert_achievement_if_absent(
        &self,
        user_id: i64,
        achievement_type: &str,
        metadata: serde_json::Value,
    ) -> Result<bool, AppError> {
        let mut inner = self.lock()?;
        if inner
            .achievements
            .iter()
            .any(|a| a.user_id == user_id && a.achievement_type == achievement_type)
        {
            return Ok(false);
        }
        let id = inner.next_id();
        inner.achievements.push(UserAchievement {
            id,
            user_id,
            achievement_type: achievement_type.to_string(),
            metadata: Some(Json(metadata)),
            earned_at: Some(Utc::now()),
        });
        Ok(true)
    }

    async fn achievements_for_user(&self, user_id: i64) -> Result<Vec<UserAchievement>, AppError> {
        Ok(self
            .lock()?
            .achievements
            .iter()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn add_points(&self, user_id: i64, amount: i64, reason: &str) -> Result<i64, AppError> {
        let mut inner = self.lock()?;
        let id = inner.next_id();
        inner.point_events.push(PointEvent {
            id,
            user_id,
            amount,
            reason: reason.to_string(),
            created_at: Some(Utc::now()),
        });
        let total = inner.points.entry(user_id).or_insert(0);
        *total += amount;
        Ok(*total)
    }

    async fn points_summary(&self, user_id: i64, recent: i64) -> Result<PointsSummary, AppError> {
        let inner = self.lock()?;
        let total = inner.points.get(&user_id).copied().unwrap_or(0);
        let recent_events = inner
            .point_events
            .iter()
            .rev()
            .filter(|e| e.user_id == user_id)
            .take(recent as usize)
            .cloned()
            .collect();
        Ok(PointsSummary {
            total,
            recent_events,
        })
    }

    async fn streak_for_user(&self, user_id: i64) -> Result<Option<Streak>, AppError> {
        Ok(self.lock()?.streaks.get(&user_id).cloned())
    }

    async fn commit_streak(
        &self,
        streak: &Streak,
        guard: Option<NaiveDate>,
    ) -> Result<bool, AppError> {
        let mut inner = self.lock()?;
        match (guard, inner.streaks.get(&streak.user_id)) {
            (Some(expected), Some(existing)) if existing.last_active_date == expected => {
                let mut row = streak.clone();
                row.updated_at = Some(Utc::now());
                inner.streaks.insert(streak.user_id, row);
                Ok(true)
            }
            (Some(_), _) => Ok(false),
            (None, None) => {
                let mut row = streak.clone();
                row.updated_at = Some(Utc::now());
                inner.streaks.insert(streak.user_id, row);
                Ok(true)
            }
            (None, Some(_)) => Ok(false),
        }
    }

    async fn ranked_users(
        &self,
        category: LeaderboardCategory,
        limit: Option<i64>,
    ) -> Result<Vec<LeaderboardEntry>, AppError> {
        let inner = self.lock()?;
        let usernames: HashMap<i64, String> = inner
            .users
            .iter()
            .map(|u| (u.id, u.username.clone()))
            .collect();

        let mut entries: Vec<LeaderboardEntry> = match category {
            LeaderboardCategory::Points => inner
                .points
                .iter()
                .map(|(user_id, total)| (*user_id, *total))
                .collect::<Vec<_>>(),
            LeaderboardCategory::Streak => inner
                .streaks
                .values()
                .map(|s| (s.user_id, s.current_streak as i64))
                .collect(),
            LeaderboardCategory::Completions => {
                let mut counts: HashMap<i64, i64> = HashMap::new();
                for enrollment in inner.enrollments.iter().filter(|e| e.progress >= 100) {
                    *counts.entry(enrollment.student_id).or_insert(0) += 1;
                }
                counts.into_iter().collect()
            }
        }
        .into_iter()
        .map(|(user_id, value)| LeaderboardEntry {
            rank: 0,
            user_id,
            username: usernames.get(&user_id).cloned().unwrap_or_default(),
            value,
        })
        .collect();

        // Same ordering contract as the SQL queries: metric descending,
        // ties broken by ascending user id.
        entries.sort_by(|a, b| b.value.cmp(&a.value).then(a.user_id.cmp(&b.user_id)));
        if let Some(limit) = limit {
            entries.truncate(limit as usize);
        }
        Ok(entries)
    }
}
