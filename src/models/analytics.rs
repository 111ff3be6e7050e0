// src/models/analytics.rs

use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use validator::Validate;

use crate::models::attempt::Attempt;

/// Represents the 'study_sessions' table: raw activity events consumed by
/// the analytics aggregator and the streak tracker.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct StudySession {
    pub id: i64,
    pub student_id: i64,
    pub course_id: Option<i64>,
    pub duration_minutes: i32,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

/// Insert payload for a new study session row.
#[derive(Debug, Clone)]
pub struct NewStudySession {
    pub student_id: i64,
    pub course_id: Option<i64>,
    pub duration_minutes: i32,
}

/// DTO for recording a study session.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateStudySessionRequest {
    pub course_id: Option<i64>,

    #[validate(range(min = 1, max = 1440))]
    pub duration_minutes: i32,
}

/// Reporting window for analytics queries, resolved to "now minus N days".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeWindow {
    Week,
    Month,
    Quarter,
    Year,
}

impl Default for TimeWindow {
    fn default() -> Self {
        TimeWindow::Month
    }
}

impl TimeWindow {
    pub fn days(self) -> i64 {
        match self {
            TimeWindow::Week => 7,
            TimeWindow::Month => 30,
            TimeWindow::Quarter => 90,
            TimeWindow::Year => 365,
        }
    }
}

/// Study minutes for one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyStudyPoint {
    pub date: chrono::NaiveDate,
    pub minutes: i64,
}

/// Blended weekly performance: mean attempt score plus a session-count
/// engagement proxy, both 0-100.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklyPerformancePoint {
    pub week_start: chrono::NaiveDate,
    pub average_score: i32,
    pub engagement: i32,
}

/// Student dashboard aggregate for one time window.
#[derive(Debug, Clone, Serialize)]
pub struct StudentAnalytics {
    pub total_study_minutes: i64,
    pub courses_completed: i64,
    pub courses_in_progress: i64,
    /// Mean attempt score within the window, rounded.
    pub average_score: i32,
    /// completed / total enrollments, rounded percentage.
    pub completion_rate: i32,
    /// Most recent 10 days, oldest first; empty days are zero-filled.
    pub daily_study: Vec<DailyStudyPoint>,
    /// Last 4 weeks, oldest first.
    pub weekly_performance: Vec<WeeklyPerformancePoint>,
}

/// Per-course line of the tutor dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct CoursePerformance {
    pub course_id: i64,
    pub title: String,
    pub students: i64,
    pub completed: i64,
    pub average_progress: i32,
    pub average_score: i32,
    pub revenue: f64,
}

/// Tutor dashboard aggregate for one time window.
#[derive(Debug, Clone, Serialize)]
pub struct TutorAnalytics {
    /// Distinct students across the tutor's courses.
    pub total_students: i64,
    pub total_revenue: f64,
    pub published_courses: i64,
    /// Mean review rating across all the tutor's courses, one decimal.
    pub average_rating: f64,
    pub completion_rate: i32,
    pub courses: Vec<CoursePerformance>,
}

/// An attempt joined with the course its quiz belongs to, used by the tutor
/// aggregation to bucket scores per course.
#[derive(Debug, Clone, FromRow)]
pub struct CourseAttempt {
    pub course_id: i64,
    #[sqlx(flatten)]
    pub attempt: Attempt,
}

/// Per-question correct rate for the tutor's quiz analytics view.
#[derive(Debug, Clone, Serialize)]
pub struct QuestionStat {
    pub question_id: uuid::Uuid,
    pub prompt: String,
    pub attempts: i64,
    /// Percentage of attempts that answered this question correctly.
    pub correct_rate: i32,
}

/// Aggregate view of one quiz's attempts, for the owning tutor.
#[derive(Debug, Clone, Serialize)]
pub struct QuizAnalytics {
    pub quiz_id: i64,
    pub total_attempts: i64,
    pub average_score: f64,
    pub pass_rate: i32,
    /// Attempt counts bucketed as [0-59, 60-69, 70-79, 80-89, 90-100].
    pub score_distribution: [i64; 5],
    pub question_stats: Vec<QuestionStat>,
}

/// Query parameters for the analytics endpoints.
#[derive(Debug, Deserialize)]
pub struct AnalyticsParams {
    #[serde(default)]
    pub window: TimeWindow,
}
