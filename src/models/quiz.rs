// src/models/quiz.rs

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use uuid::Uuid;
use validator::Validate;

pub use crate::models::course::status;

/// A single quiz question, stored inside the quiz's JSON document column.
///
/// The answer key lives in the type-specific `kind` variant and is never
/// serialized to students (see [`PublicQuestion`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: Uuid,

    pub prompt: String,

    /// Points awarded for a correct answer.
    pub points: i32,

    /// Shown to the student after grading, when the quiz allows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,

    #[serde(flatten)]
    pub kind: QuestionKind,
}

/// Question type together with its type-specific answer key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestionKind {
    SingleChoice {
        options: Vec<String>,
        /// Index of the correct option.
        answer: usize,
    },
    MultiSelect {
        options: Vec<String>,
        /// Indices of all correct options. Submissions must match exactly.
        answers: Vec<usize>,
    },
    TrueFalse {
        answer: bool,
    },
    ShortAnswer {
        /// Reference answer, matched after trimming and case-folding.
        answer: String,
    },
    /// Free-form response; graded manually, never auto-scored.
    Essay,
}

impl Question {
    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            QuestionKind::SingleChoice { .. } => "single_choice",
            QuestionKind::MultiSelect { .. } => "multi_select",
            QuestionKind::TrueFalse { .. } => "true_false",
            QuestionKind::ShortAnswer { .. } => "short_answer",
            QuestionKind::Essay => "essay",
        }
    }

    pub fn options(&self) -> Option<&[String]> {
        match &self.kind {
            QuestionKind::SingleChoice { options, .. }
            | QuestionKind::MultiSelect { options, .. } => Some(options),
            _ => None,
        }
    }

    /// Student-facing view with the answer key stripped.
    pub fn public(&self) -> PublicQuestion {
        PublicQuestion {
            id: self.id,
            question_type: self.kind_name(),
            prompt: self.prompt.clone(),
            points: self.points,
            options: self.options().map(|o| o.to_vec()),
        }
    }
}

/// DTO for sending a question to students (excludes answer key and explanation).
#[derive(Debug, Serialize)]
pub struct PublicQuestion {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub question_type: &'static str,
    pub prompt: String,
    pub points: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
}

/// Represents the 'quizzes' table in the database.
///
/// `total_attempts` and `average_score` are rolling statistics recomputed by
/// the attempt service after each submission; nothing else writes them.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Quiz {
    pub id: i64,
    pub course_id: i64,

    /// Owning tutor.
    pub tutor_id: i64,

    pub title: String,
    pub description: String,

    /// Ordered question list, stored as a JSON array in the database.
    pub questions: Json<Vec<Question>>,

    pub time_limit_minutes: Option<i32>,

    /// Maximum number of attempts per student.
    pub max_attempts: i32,

    /// Passing threshold as a percentage (0-100).
    pub passing_score: i32,

    pub shuffle_questions: bool,
    pub shuffle_options: bool,

    /// Whether students see their per-question breakdown after submitting.
    pub show_results: bool,
    /// Whether explanations are revealed alongside results.
    pub show_answers: bool,

    /// Lifecycle status: 'draft', 'published' or 'archived'.
    pub status: String,

    pub total_attempts: i64,
    pub average_score: f64,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Quiz {
    pub fn is_published(&self) -> bool {
        self.status == status::PUBLISHED
    }

    /// Student-facing view with all answer keys stripped.
    pub fn public(&self) -> PublicQuiz {
        PublicQuiz {
            id: self.id,
            course_id: self.course_id,
            title: self.title.clone(),
            description: self.description.clone(),
            question_count: self.questions.0.len(),
            questions: self.questions.0.iter().map(Question::public).collect(),
            time_limit_minutes: self.time_limit_minutes,
            max_attempts: self.max_attempts,
            passing_score: self.passing_score,
            shuffle_questions: self.shuffle_questions,
            total_attempts: self.total_attempts,
            average_score: self.average_score,
        }
    }
}

/// DTO for serving a quiz to students.
#[derive(Debug, Serialize)]
pub struct PublicQuiz {
    pub id: i64,
    pub course_id: i64,
    pub title: String,
    pub description: String,
    pub question_count: usize,
    pub questions: Vec<PublicQuestion>,
    pub time_limit_minutes: Option<i32>,
    pub max_attempts: i32,
    pub passing_score: i32,
    pub shuffle_questions: bool,
    pub total_attempts: i64,
    pub average_score: f64,
}

/// Insert payload for a new quiz row.
#[derive(Debug, Clone)]
pub struct NewQuiz {
    pub course_id: i64,
    pub tutor_id: i64,
    pub title: String,
    pub description: String,
    pub questions: Vec<Question>,
    pub time_limit_minutes: Option<i32>,
    pub max_attempts: i32,
    pub passing_score: i32,
    pub shuffle_questions: bool,
    pub shuffle_options: bool,
    pub show_results: bool,
    pub show_answers: bool,
    pub status: String,
}

/// Question as submitted by a tutor; the server assigns the id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionInput {
    pub prompt: String,
    pub points: i32,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(flatten)]
    pub kind: QuestionKind,
}

impl QuestionInput {
    pub fn into_question(self) -> Question {
        Question {
            id: Uuid::new_v4(),
            prompt: self.prompt,
            points: self.points,
            explanation: self.explanation,
            kind: self.kind,
        }
    }
}

/// DTO for a tutor creating a quiz.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuizRequest {
    pub course_id: i64,

    #[validate(length(min = 1, max = 200))]
    pub title: String,

    #[validate(length(max = 5000))]
    pub description: Option<String>,

    #[validate(custom(function = validate_questions))]
    pub questions: Vec<QuestionInput>,

    #[validate(range(min = 1, max = 600))]
    pub time_limit_minutes: Option<i32>,

    #[validate(range(min = 1, max = 50))]
    pub max_attempts: Option<i32>,

    #[validate(range(min = 0, max = 100))]
    pub passing_score: Option<i32>,

    pub shuffle_questions: Option<bool>,
    pub shuffle_options: Option<bool>,
    pub show_results: Option<bool>,
    pub show_answers: Option<bool>,
}

/// DTO for a tutor updating a quiz. Fields are optional; `questions` is
/// rejected once the quiz has recorded attempts.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateQuizRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,

    #[validate(length(max = 5000))]
    pub description: Option<String>,

    #[validate(custom(function = validate_questions))]
    pub questions: Option<Vec<QuestionInput>>,

    #[validate(range(min = 1, max = 600))]
    pub time_limit_minutes: Option<i32>,

    #[validate(range(min = 1, max = 50))]
    pub max_attempts: Option<i32>,

    #[validate(range(min = 0, max = 100))]
    pub passing_score: Option<i32>,

    pub shuffle_questions: Option<bool>,
    pub shuffle_options: Option<bool>,
    pub show_results: Option<bool>,
    pub show_answers: Option<bool>,

    /// 'draft', 'published' or 'archived'.
    pub status: Option<String>,
}

fn validate_questions(questions: &[QuestionInput]) -> Result<(), validator::ValidationError> {
    for q in questions {
        if q.prompt.trim().is_empty() || q.prompt.len() > 2000 {
            return Err(validator::ValidationError::new("invalid_prompt"));
        }
        if !(1..=100).contains(&q.points) {
            return Err(validator::ValidationError::new("invalid_points"));
        }
        match &q.kind {
            QuestionKind::SingleChoice { options, answer } => {
                validate_options(options)?;
                if *answer >= options.len() {
                    return Err(validator::ValidationError::new("answer_out_of_range"));
                }
            }
            QuestionKind::MultiSelect { options, answers } => {
                validate_options(options)?;
                if answers.is_empty() {
                    return Err(validator::ValidationError::new("empty_answer_set"));
                }
                if answers.iter().any(|a| *a >= options.len()) {
                    return Err(validator::ValidationError::new("answer_out_of_range"));
                }
                let unique: std::collections::BTreeSet<_> = answers.iter().collect();
                if unique.len() != answers.len() {
                    return Err(validator::ValidationError::new("duplicate_answer_index"));
                }
            }
            QuestionKind::ShortAnswer { answer } => {
                if answer.trim().is_empty() || answer.len() > 500 {
                    return Err(validator::ValidationError::new("invalid_reference_answer"));
                }
            }
            QuestionKind::TrueFalse { .. } | QuestionKind::Essay => {}
        }
    }
    Ok(())
}

fn validate_options(options: &[String]) -> Result<(), validator::ValidationError> {
    if options.len() < 2 || options.len() > 10 {
        return Err(validator::ValidationError::new("invalid_option_count"));
    }
    for opt in options {
        if opt.is_empty() || opt.len() > 500 {
            return Err(validator::ValidationError::new("invalid_option"));
        }
    }
    Ok(())
}
