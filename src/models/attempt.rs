// src/models/attempt.rs

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use uuid::Uuid;
use validator::Validate;

/// A student's submitted answer for one question.
///
/// Untagged: the JSON shape selects the variant (bool, index, index array or
/// free text). Whether the shape fits the question's type is decided by the
/// scoring engine, not by deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SubmittedAnswer {
    Flag(bool),
    Choice(usize),
    Selection(Vec<usize>),
    Text(String),
}

/// Grading outcome for a single question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionResult {
    pub question_id: Uuid,
    pub correct: bool,
    pub earned_points: i32,
    pub possible_points: i32,
    /// True for essay/code questions that need manual grading.
    pub needs_review: bool,
}

/// Aggregate result of scoring one submission. Pure data; produced by the
/// scoring engine and persisted on the attempt.
#[derive(Debug, Clone, Serialize)]
pub struct ScoreBreakdown {
    /// Rounded percentage, 0-100. Zero when the quiz has no scorable points.
    pub percentage: i32,
    pub earned_points: i32,
    pub total_points: i32,
    pub correct_count: i32,
    pub results: Vec<QuestionResult>,
}

/// Represents the 'attempts' table in the database.
/// One immutable record per submission; never updated after insert.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Attempt {
    pub id: i64,
    pub quiz_id: i64,
    pub student_id: i64,

    /// Map from question id to the submitted answer, stored as JSON.
    pub answers: Json<HashMap<Uuid, SubmittedAnswer>>,

    /// Per-question grading breakdown, stored as JSON.
    pub breakdown: Json<Vec<QuestionResult>>,

    /// Rounded percentage score, 0-100.
    pub score: i32,
    pub earned_points: i32,
    pub total_points: i32,
    pub correct_count: i32,

    pub time_spent_secs: i32,

    /// score >= the quiz's passing threshold at submission time.
    pub passed: bool,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Insert payload for a new attempt row.
#[derive(Debug, Clone)]
pub struct NewAttempt {
    pub quiz_id: i64,
    pub student_id: i64,
    pub answers: HashMap<Uuid, SubmittedAnswer>,
    pub breakdown: Vec<QuestionResult>,
    pub score: i32,
    pub earned_points: i32,
    pub total_points: i32,
    pub correct_count: i32,
    pub time_spent_secs: i32,
    pub passed: bool,
}

/// DTO for submitting a quiz attempt.
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitAttemptRequest {
    /// User's answers keyed by question id.
    pub answers: HashMap<Uuid, SubmittedAnswer>,

    /// Seconds spent on the quiz, as reported by the client.
    #[validate(range(min = 0, max = 86400))]
    pub time_spent_secs: Option<i32>,
}

/// Result of the attempt-eligibility check (`canAttempt` in the UI).
#[derive(Debug, Clone, Serialize)]
pub struct Eligibility {
    pub can_take: bool,
    pub attempts_used: i64,
    pub attempts_remaining: i64,
    /// Error code explaining why the quiz cannot be taken, when it cannot.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
}
