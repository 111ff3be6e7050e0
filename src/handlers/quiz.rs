// src/handlers/quiz.rs

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    error::AppError,
    models::attempt::SubmitAttemptRequest,
    models::quiz::{CreateQuizRequest, NewQuiz, Quiz, UpdateQuizRequest, status},
    services::gamification::{ActivityContext, ActivityKind},
    services::{AttemptService, GamificationService},
    store::Store,
    utils::jwt::Claims,
};

/// Creates a quiz on one of the calling tutor's courses.
pub async fn create_quiz(
    State(store): State<Arc<dyn Store>>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let tutor_id = claims.user_id();
    let course = store
        .course_by_id(payload.course_id)
        .await?
        .ok_or(AppError::NotFound("Course not found".to_string()))?;
    if course.tutor_id != tutor_id {
        return Err(AppError::Forbidden(
            "Quizzes can only be added to your own courses".to_string(),
        ));
    }

    let quiz = store
        .insert_quiz(NewQuiz {
            course_id: payload.course_id,
            tutor_id,
            title: payload.title,
            description: payload.description.unwrap_or_default(),
            questions: payload
                .questions
                .into_iter()
                .map(|q| q.into_question())
                .collect(),
            time_limit_minutes: payload.time_limit_minutes,
            max_attempts: payload.max_attempts.unwrap_or(3),
            passing_score: payload.passing_score.unwrap_or(60),
            shuffle_questions: payload.shuffle_questions.unwrap_or(false),
            shuffle_options: payload.shuffle_options.unwrap_or(false),
            show_results: payload.show_results.unwrap_or(true),
            show_answers: payload.show_answers.unwrap_or(false),
            status: status::DRAFT.to_string(),
        })
        .await?;

    Ok((StatusCode::CREATED, Json(quiz)))
}

/// Updates a quiz. Question edits are rejected once the quiz has attempts,
/// since recorded breakdowns reference the existing question set.
pub async fn update_quiz(
    State(store): State<Arc<dyn Store>>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let mut quiz = store
        .quiz_by_id(id)
        .await?
        .ok_or(AppError::NotFound("Quiz not found".to_string()))?;

    if quiz.tutor_id != claims.user_id() {
        return Err(AppError::Forbidden(
            "Only the owning tutor can edit this quiz".to_string(),
        ));
    }

    if let Some(questions) = payload.questions {
        if quiz.total_attempts > 0 {
            return Err(AppError::Conflict(
                "Questions cannot change once the quiz has attempts".to_string(),
            ));
        }
        quiz.questions.0 = questions.into_iter().map(|q| q.into_question()).collect();
    }

    if let Some(title) = payload.title {
        quiz.title = title;
    }
    if let Some(description) = payload.description {
        quiz.description = description;
    }
    if let Some(time_limit_minutes) = payload.time_limit_minutes {
        quiz.time_limit_minutes = Some(time_limit_minutes);
    }
    if let Some(max_attempts) = payload.max_attempts {
        quiz.max_attempts = max_attempts;
    }
    if let Some(passing_score) = payload.passing_score {
        quiz.passing_score = passing_score;
    }
    if let Some(shuffle_questions) = payload.shuffle_questions {
        quiz.shuffle_questions = shuffle_questions;
    }
    if let Some(shuffle_options) = payload.shuffle_options {
        quiz.shuffle_options = shuffle_options;
    }
    if let Some(show_results) = payload.show_results {
        quiz.show_results = show_results;
    }
    if let Some(show_answers) = payload.show_answers {
        quiz.show_answers = show_answers;
    }
    if let Some(new_status) = payload.status {
        if !status::is_valid(&new_status) {
            return Err(AppError::BadRequest(format!(
                "Unknown status '{new_status}'"
            )));
        }
        quiz.status = new_status;
    }

    store.update_quiz(&quiz).await?;
    Ok(Json(quiz))
}

/// Serves a published quiz to a student, with answer keys stripped.
pub async fn get_quiz(
    State(store): State<Arc<dyn Store>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = store
        .quiz_by_id(id)
        .await?
        .filter(Quiz::is_published)
        .ok_or(AppError::NotFound("Quiz not found".to_string()))?;
    Ok(Json(quiz.public()))
}

/// Lists the published quizzes of a course, answer keys stripped.
pub async fn course_quizzes(
    State(store): State<Arc<dyn Store>>,
    Path(course_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let quizzes: Vec<_> = store
        .quizzes_for_course(course_id)
        .await?
        .iter()
        .filter(|q| q.is_published())
        .map(Quiz::public)
        .collect();
    Ok(Json(quizzes))
}

/// Whether the calling student may still take the quiz.
pub async fn eligibility(
    State(attempts): State<AttemptService>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let eligibility = attempts.eligibility(quiz_id, claims.user_id()).await?;
    Ok(Json(eligibility))
}

/// Submits a quiz attempt for the calling student.
///
/// The attempt service scores and persists the submission; afterwards a
/// quiz_completion activity is dispatched to the gamification engine. A
/// gamification failure is logged, never surfaced - the attempt is already
/// durable at that point.
pub async fn submit_attempt(
    State(store): State<Arc<dyn Store>>,
    State(attempts): State<AttemptService>,
    State(gamification): State<GamificationService>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
    Json(payload): Json<SubmitAttemptRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let student_id = claims.user_id();
    let attempt = attempts
        .submit(
            quiz_id,
            student_id,
            payload.answers,
            payload.time_spent_secs.unwrap_or(0),
        )
        .await?;

    let newly_earned = gamification
        .check_achievements(
            student_id,
            ActivityKind::QuizCompletion,
            ActivityContext {
                score: Some(attempt.score),
                ..Default::default()
            },
        )
        .await
        .unwrap_or_else(|e| {
            tracing::warn!(student_id, quiz_id, error = %e, "achievement check failed after attempt");
            Vec::new()
        });

    let mut body = serde_json::json!({
        "id": attempt.id,
        "score": attempt.score,
        "earned_points": attempt.earned_points,
        "total_points": attempt.total_points,
        "correct_count": attempt.correct_count,
        "passed": attempt.passed,
        "newly_earned": newly_earned,
    });

    // Result visibility is the quiz author's call: the per-question
    // breakdown and the explanations are only included when enabled.
    if let Some(quiz) = store.quiz_by_id(quiz_id).await? {
        if quiz.show_results {
            body["breakdown"] = serde_json::to_value(&attempt.breakdown.0)?;
        }
        if quiz.show_answers {
            let explanations: serde_json::Map<String, serde_json::Value> = quiz
                .questions
                .0
                .iter()
                .filter_map(|q| {
                    q.explanation
                        .as_ref()
                        .map(|e| (q.id.to_string(), serde_json::Value::from(e.as_str())))
                })
                .collect();
            body["explanations"] = serde_json::Value::Object(explanations);
        }
    }

    Ok((StatusCode::CREATED, Json(body)))
}

/// The calling student's attempt history, newest first.
pub async fn my_attempts(
    State(store): State<Arc<dyn Store>>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let attempts = store.attempts_for_student(claims.user_id()).await?;
    Ok(Json(attempts))
}

/// Aggregate attempt statistics for the owning tutor.
pub async fn quiz_analytics(
    State(attempts): State<AttemptService>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let analytics = attempts.quiz_analytics(quiz_id, claims.user_id()).await?;
    Ok(Json(analytics))
}
