// src/handlers/course.rs

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde::Deserialize;
use validator::Validate;

use crate::{
    error::AppError,
    models::course::{
        CreateCourseRequest, CreateReviewRequest, NewCourse, NewReview, UpdateCourseRequest,
        status,
    },
    models::enrollment::{NewEnrollment, UpdateProgressRequest},
    services::GamificationService,
    services::gamification::{ActivityContext, ActivityKind},
    store::Store,
    utils::{jwt::Claims, validation::sanitize_html},
};

#[derive(Debug, Deserialize)]
pub struct CourseListParams {
    pub category: Option<String>,
}

/// Lists published courses, optionally filtered by category.
pub async fn list_courses(
    State(store): State<Arc<dyn Store>>,
    Query(params): Query<CourseListParams>,
) -> Result<impl IntoResponse, AppError> {
    let courses = store.published_courses(params.category.as_deref()).await?;
    Ok(Json(courses))
}

/// Fetches one published course.
pub async fn get_course(
    State(store): State<Arc<dyn Store>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let course = store
        .course_by_id(id)
        .await?
        .filter(|c| c.is_published())
        .ok_or(AppError::NotFound("Course not found".to_string()))?;
    Ok(Json(course))
}

/// Creates a new course owned by the calling tutor.
pub async fn create_course(
    State(store): State<Arc<dyn Store>>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateCourseRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let course = store
        .insert_course(NewCourse {
            tutor_id: claims.user_id(),
            title: payload.title,
            description: sanitize_html(payload.description.as_deref().unwrap_or_default()),
            category: payload.category.unwrap_or_else(|| "general".to_string()),
            price: payload.price.unwrap_or(0.0),
            thumbnail_url: payload.thumbnail_url,
            status: status::DRAFT.to_string(),
        })
        .await?;

    Ok((StatusCode::CREATED, Json(course)))
}

/// Updates a course. Only the owning tutor may edit it.
pub async fn update_course(
    State(store): State<Arc<dyn Store>>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateCourseRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let mut course = store
        .course_by_id(id)
        .await?
        .ok_or(AppError::NotFound("Course not found".to_string()))?;

    if course.tutor_id != claims.user_id() {
        return Err(AppError::Forbidden(
            "Only the owning tutor can edit this course".to_string(),
        ));
    }

    if let Some(title) = payload.title {
        course.title = title;
    }
    if let Some(description) = payload.description {
        course.description = sanitize_html(&description);
    }
    if let Some(category) = payload.category {
        course.category = category;
    }
    if let Some(price) = payload.price {
        course.price = price;
    }
    if let Some(thumbnail_url) = payload.thumbnail_url {
        course.thumbnail_url = Some(thumbnail_url);
    }
    if let Some(new_status) = payload.status {
        if !status::is_valid(&new_status) {
            return Err(AppError::BadRequest(format!(
                "Unknown status '{new_status}'"
            )));
        }
        course.status = new_status;
    }

    store.update_course(&course).await?;
    Ok(Json(course))
}

/// Lists the calling tutor's courses, drafts included.
pub async fn tutor_courses(
    State(store): State<Arc<dyn Store>>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let courses = store.courses_by_tutor(claims.user_id()).await?;
    Ok(Json(courses))
}

/// Enrolls the calling student in a published course.
///
/// The (student, course) pair is unique; enrolling twice returns Conflict.
/// A successful enrollment dispatches a course_enrollment activity to the
/// gamification engine; a failure there is logged and never fails the
/// enrollment itself.
pub async fn enroll(
    State(store): State<Arc<dyn Store>>,
    State(gamification): State<GamificationService>,
    Extension(claims): Extension<Claims>,
    Path(course_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.user_id();

    let course = store
        .course_by_id(course_id)
        .await?
        .ok_or(AppError::NotFound("Course not found".to_string()))?;
    if !course.is_published() {
        return Err(AppError::Unavailable(
            "Course is not open for enrollment".to_string(),
        ));
    }

    let enrollment = store
        .insert_enrollment(NewEnrollment {
            student_id,
            course_id,
            paid_amount: course.price,
        })
        .await?;

    let newly_earned = gamification
        .check_achievements(
            student_id,
            ActivityKind::CourseEnrollment,
            ActivityContext::default(),
        )
        .await
        .unwrap_or_else(|e| {
            tracing::warn!(student_id, course_id, error = %e, "achievement check failed after enrollment");
            Vec::new()
        });

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "enrollment": enrollment,
            "newly_earned": newly_earned,
        })),
    ))
}

/// Lists the calling student's enrollments.
pub async fn my_enrollments(
    State(store): State<Arc<dyn Store>>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let enrollments = store.enrollments_for_student(claims.user_id()).await?;
    Ok(Json(enrollments))
}

/// Updates course progress for one of the caller's enrollments.
///
/// Reaching 100 marks the enrollment completed (completed_at is set once)
/// and dispatches a course_completion activity.
pub async fn update_progress(
    State(store): State<Arc<dyn Store>>,
    State(gamification): State<GamificationService>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateProgressRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let student_id = claims.user_id();
    let enrollment = store
        .enrollment_by_id(id)
        .await?
        .ok_or(AppError::NotFound("Enrollment not found".to_string()))?;

    if enrollment.student_id != student_id {
        return Err(AppError::Forbidden("Not your enrollment".to_string()));
    }

    let newly_completed = payload.progress >= 100 && !enrollment.is_completed();
    let completed_at = newly_completed.then(Utc::now);
    store
        .set_enrollment_progress(id, payload.progress, completed_at)
        .await?;

    let mut newly_earned = Vec::new();
    if newly_completed {
        match gamification
            .check_achievements(
                student_id,
                ActivityKind::CourseCompletion,
                ActivityContext::default(),
            )
            .await
        {
            Ok(earned) => newly_earned = earned,
            Err(e) => {
                tracing::warn!(student_id, enrollment_id = id, error = %e, "achievement check failed after completion");
            }
        }
    }

    Ok(Json(serde_json::json!({
        "progress": payload.progress,
        "completed": payload.progress >= 100,
        "newly_earned": newly_earned,
    })))
}

/// Removes one of the caller's enrollments. Attempts and sessions recorded
/// while enrolled are kept.
pub async fn unenroll(
    State(store): State<Arc<dyn Store>>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let enrollment = store
        .enrollment_by_id(id)
        .await?
        .ok_or(AppError::NotFound("Enrollment not found".to_string()))?;

    if enrollment.student_id != claims.user_id() {
        return Err(AppError::Forbidden("Not your enrollment".to_string()));
    }

    store.delete_enrollment(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Creates a review for a course the caller is enrolled in.
pub async fn create_review(
    State(store): State<Arc<dyn Store>>,
    Extension(claims): Extension<Claims>,
    Path(course_id): Path<i64>,
    Json(payload): Json<CreateReviewRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let student_id = claims.user_id();

    let enrolled = store
        .enrollments_for_student(student_id)
        .await?
        .iter()
        .any(|e| e.course_id == course_id);
    if !enrolled {
        return Err(AppError::Forbidden(
            "Only enrolled students can review a course".to_string(),
        ));
    }

    let review = store
        .insert_review(NewReview {
            course_id,
            student_id,
            rating: payload.rating,
            comment: payload.comment.map(|c| sanitize_html(&c)),
        })
        .await?;

    Ok((StatusCode::CREATED, Json(review)))
}
