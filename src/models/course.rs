// src/models/course.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::utils::validation::validate_http_url;

/// Lifecycle strings shared by courses and quizzes.
pub mod status {
    pub const DRAFT: &str = "draft";
    pub const PUBLISHED: &str = "published";
    pub const ARCHIVED: &str = "archived";

    pub fn is_valid(value: &str) -> bool {
        matches!(value, DRAFT | PUBLISHED | ARCHIVED)
    }
}

/// Represents the 'courses' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Course {
    pub id: i64,

    /// Owning tutor.
    pub tutor_id: i64,

    pub title: String,

    /// Sanitized HTML description.
    pub description: String,

    pub category: String,

    pub price: f64,

    pub thumbnail_url: Option<String>,

    /// Lifecycle status: 'draft', 'published' or 'archived'.
    pub status: String,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Course {
    pub fn is_published(&self) -> bool {
        self.status == status::PUBLISHED
    }
}

/// Insert payload for a new course row.
#[derive(Debug, Clone)]
pub struct NewCourse {
    pub tutor_id: i64,
    pub title: String,
    pub description: String,
    pub category: String,
    pub price: f64,
    pub thumbnail_url: Option<String>,
    pub status: String,
}

/// DTO for a tutor creating a course.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCourseRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,

    #[validate(length(max = 10000))]
    pub description: Option<String>,

    #[validate(length(min = 1, max = 50))]
    pub category: Option<String>,

    #[validate(range(min = 0.0, max = 100000.0))]
    pub price: Option<f64>,

    #[validate(custom(function = validate_http_url))]
    pub thumbnail_url: Option<String>,
}

/// DTO for a tutor updating a course. Fields are optional.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCourseRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,

    #[validate(length(max = 10000))]
    pub description: Option<String>,

    #[validate(length(min = 1, max = 50))]
    pub category: Option<String>,

    #[validate(range(min = 0.0, max = 100000.0))]
    pub price: Option<f64>,

    #[validate(custom(function = validate_http_url))]
    pub thumbnail_url: Option<String>,

    /// 'draft', 'published' or 'archived'.
    pub status: Option<String>,
}

/// Represents the 'reviews' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Review {
    pub id: i64,
    pub course_id: i64,
    pub student_id: i64,
    /// 1 to 5 stars.
    pub rating: i32,
    pub comment: Option<String>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Insert payload for a new review row.
#[derive(Debug, Clone)]
pub struct NewReview {
    pub course_id: i64,
    pub student_id: i64,
    pub rating: i32,
    pub comment: Option<String>,
}

/// DTO for a student reviewing a course.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateReviewRequest {
    #[validate(range(min = 1, max = 5))]
    pub rating: i32,

    #[validate(length(max = 2000))]
    pub comment: Option<String>,
}
