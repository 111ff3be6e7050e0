// src/handlers/analytics.rs

use axum::{
    Extension, Json,
    extract::{Query, State},
    response::IntoResponse,
};

use crate::{
    error::AppError, models::analytics::AnalyticsParams, services::AnalyticsService,
    utils::jwt::Claims,
};

/// The calling student's dashboard aggregate for the requested window.
pub async fn student_analytics(
    State(analytics): State<AnalyticsService>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<AnalyticsParams>,
) -> Result<impl IntoResponse, AppError> {
    let view = analytics.student(claims.user_id(), params.window).await?;
    Ok(Json(view))
}

/// The calling tutor's dashboard aggregate for the requested window.
pub async fn tutor_analytics(
    State(analytics): State<AnalyticsService>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<AnalyticsParams>,
) -> Result<impl IntoResponse, AppError> {
    let view = analytics.tutor(claims.user_id(), params.window).await?;
    Ok(Json(view))
}
