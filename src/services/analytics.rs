// src/services/analytics.rs

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::{
    error::AppError,
    models::{
        analytics::{
            CourseAttempt, CoursePerformance, DailyStudyPoint, StudentAnalytics, StudySession,
            TimeWindow, TutorAnalytics, WeeklyPerformancePoint,
        },
        attempt::Attempt,
        course::{Course, Review, status},
        enrollment::Enrollment,
    },
    store::Store,
};

/// Days covered by the per-day study series.
const DAILY_SERIES_DAYS: i64 = 10;
/// Weeks covered by the performance series.
const WEEKLY_SERIES_WEEKS: i64 = 4;
/// Engagement proxy: study sessions per week, 10 points each, capped at 100.
const ENGAGEMENT_PER_SESSION: i64 = 10;

/// Batch-computes the student and tutor dashboard aggregates.
///
/// All derived metrics are computed in memory from full result sets; at
/// single-dashboard volumes this is cheap, and it keeps the store interface
/// to plain bounded queries. This is deliberately not an OLAP engine.
#[derive(Clone)]
pub struct AnalyticsService {
    store: Arc<dyn Store>,
}

impl AnalyticsService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn student(
        &self,
        student_id: i64,
        window: TimeWindow,
    ) -> Result<StudentAnalytics, AppError> {
        self.student_at(student_id, window, Utc::now()).await
    }

    /// Window arithmetic is anchored on `now`; split out so tests can pin it.
    pub async fn student_at(
        &self,
        student_id: i64,
        window: TimeWindow,
        now: DateTime<Utc>,
    ) -> Result<StudentAnalytics, AppError> {
        let since = now - Duration::days(window.days());
        let sessions = self.store.study_sessions_since(student_id, since).await?;
        let enrollments = self.store.enrollments_for_student(student_id).await?;
        let attempts = self
            .store
            .attempts_for_student_since(student_id, since)
            .await?;
        Ok(aggregate_student(&sessions, &enrollments, &attempts, now))
    }

    pub async fn tutor(&self, tutor_id: i64, window: TimeWindow) -> Result<TutorAnalytics, AppError> {
        self.tutor_at(tutor_id, window, Utc::now()).await
    }

    pub async fn tutor_at(
        &self,
        tutor_id: i64,
        window: TimeWindow,
        now: DateTime<Utc>,
    ) -> Result<TutorAnalytics, AppError> {
        let since = now - Duration::days(window.days());
        let courses = self.store.courses_by_tutor(tutor_id).await?;
        let course_ids: Vec<i64> = courses.iter().map(|c| c.id).collect();

        let enrollments = self.store.enrollments_for_courses(&course_ids).await?;
        let attempts = self
            .store
            .attempts_for_courses_since(&course_ids, since)
            .await?;
        let reviews = self.store.reviews_for_courses(&course_ids).await?;

        Ok(aggregate_tutor(&courses, &enrollments, &attempts, &reviews))
    }
}

/// Rounded percentage; 0 when the denominator is 0.
fn percent(part: i64, whole: i64) -> i32 {
    if whole > 0 {
        ((part as f64 / whole as f64) * 100.0).round() as i32
    } else {
        0
    }
}

/// Rounded mean of attempt scores; 0 for an empty slice.
fn mean_score<'a, I>(scores: I) -> i32
where
    I: IntoIterator<Item = &'a Attempt>,
{
    let mut sum = 0i64;
    let mut count = 0i64;
    for attempt in scores {
        sum += attempt.score as i64;
        count += 1;
    }
    if count > 0 {
        (sum as f64 / count as f64).round() as i32
    } else {
        0
    }
}

fn aggregate_student(
    sessions: &[StudySession],
    enrollments: &[Enrollment],
    attempts: &[Attempt],
    now: DateTime<Utc>,
) -> StudentAnalytics {
    let total_study_minutes = sessions.iter().map(|s| s.duration_minutes as i64).sum();

    let courses_completed = enrollments.iter().filter(|e| e.is_completed()).count() as i64;
    let courses_in_progress = enrollments.len() as i64 - courses_completed;

    let average_score = mean_score(attempts);
    let completion_rate = percent(courses_completed, enrollments.len() as i64);

    // Most recent 10 calendar days, oldest first; days without sessions are
    // zero-filled so the chart axis stays continuous.
    let today = now.date_naive();
    let daily_study = (0..DAILY_SERIES_DAYS)
        .rev()
        .map(|offset| {
            let date = today - Duration::days(offset);
            let minutes = sessions
                .iter()
                .filter(|s| s.started_at.date_naive() == date)
                .map(|s| s.duration_minutes as i64)
                .sum();
            DailyStudyPoint { date, minutes }
        })
        .collect();

    // Last 4 rolling weeks, oldest first. Each point blends the week's mean
    // attempt score with a session-count engagement proxy capped at 100.
    let weekly_performance = (0..WEEKLY_SERIES_WEEKS)
        .rev()
        .map(|offset| {
            let week_end = now - Duration::weeks(offset);
            let week_start = week_end - Duration::weeks(1);

            let week_attempts = attempts.iter().filter(|a| {
                a.created_at
                    .is_some_and(|at| at >= week_start && at < week_end)
            });
            let session_count = sessions
                .iter()
                .filter(|s| s.started_at >= week_start && s.started_at < week_end)
                .count() as i64;

            WeeklyPerformancePoint {
                week_start: week_start.date_naive(),
                average_score: mean_score(week_attempts),
                engagement: (session_count * ENGAGEMENT_PER_SESSION).min(100) as i32,
            }
        })
        .collect();

    StudentAnalytics {
        total_study_minutes,
        courses_completed,
        courses_in_progress,
        average_score,
        completion_rate,
        daily_study,
        weekly_performance,
    }
}

fn aggregate_tutor(
    courses: &[Course],
    enrollments: &[Enrollment],
    attempts: &[CourseAttempt],
    reviews: &[Review],
) -> TutorAnalytics {
    let total_students = enrollments
        .iter()
        .map(|e| e.student_id)
        .collect::<HashSet<_>>()
        .len() as i64;

    let total_revenue = enrollments.iter().map(|e| e.paid_amount).sum();

    let published_courses = courses
        .iter()
        .filter(|c| c.status == status::PUBLISHED)
        .count() as i64;

    let average_rating = if reviews.is_empty() {
        0.0
    } else {
        let sum: i64 = reviews.iter().map(|r| r.rating as i64).sum();
        // One decimal place.
        (sum as f64 / reviews.len() as f64 * 10.0).round() / 10.0
    };

    let completed_total = enrollments.iter().filter(|e| e.is_completed()).count() as i64;
    let completion_rate = percent(completed_total, enrollments.len() as i64);

    let course_breakdown = courses
        .iter()
        .map(|course| {
            let course_enrollments: Vec<&Enrollment> = enrollments
                .iter()
                .filter(|e| e.course_id == course.id)
                .collect();
            let students = course_enrollments.len() as i64;
            let completed = course_enrollments
                .iter()
                .filter(|e| e.is_completed())
                .count() as i64;
            let average_progress = if students > 0 {
                let sum: i64 = course_enrollments.iter().map(|e| e.progress as i64).sum();
                (sum as f64 / students as f64).round() as i32
            } else {
                0
            };
            let average_score = mean_score(
                attempts
                    .iter()
                    .filter(|a| a.course_id == course.id)
                    .map(|a| &a.attempt),
            );
            let revenue = course_enrollments.iter().map(|e| e.paid_amount).sum();

            CoursePerformance {
                course_id: course.id,
                title: course.title.clone(),
                students,
                completed,
                average_progress,
                average_score,
                revenue,
            }
        })
        .collect();

    TutorAnalytics {
        total_students,
        total_revenue,
        published_courses,
        average_rating,
        completion_rate,
        courses: course_breakdown,
    }
}
