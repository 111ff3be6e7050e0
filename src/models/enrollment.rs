// src/models/enrollment.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'enrollments' table in the database.
/// One row per (student, course) pair, enforced by a unique constraint.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: i64,
    pub student_id: i64,
    pub course_id: i64,

    /// Course progress percentage, 0-100.
    pub progress: i32,

    /// Amount paid at enrollment time.
    pub paid_amount: f64,

    pub enrolled_at: Option<chrono::DateTime<chrono::Utc>>,

    /// Set once when progress first reaches 100.
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Enrollment {
    pub fn is_completed(&self) -> bool {
        self.progress >= 100
    }
}

/// Insert payload for a new enrollment row.
#[derive(Debug, Clone)]
pub struct NewEnrollment {
    pub student_id: i64,
    pub course_id: i64,
    pub paid_amount: f64,
}

/// DTO for updating enrollment progress.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProgressRequest {
    #[validate(range(min = 0, max = 100))]
    pub progress: i32,
}
