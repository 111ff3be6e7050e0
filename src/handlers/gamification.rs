// src/handlers/gamification.rs

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use validator::Validate;

use crate::{
    error::AppError,
    models::analytics::{CreateStudySessionRequest, NewStudySession},
    models::gamification::LeaderboardCategory,
    services::GamificationService,
    store::Store,
    utils::jwt::Claims,
};

#[derive(Debug, Deserialize)]
pub struct LeaderboardParams {
    #[serde(default)]
    pub category: LeaderboardCategory,
    pub limit: Option<i64>,
}

/// Top students by points, streak or completions.
pub async fn leaderboard(
    State(gamification): State<GamificationService>,
    Query(params): Query<LeaderboardParams>,
) -> Result<impl IntoResponse, AppError> {
    let entries = gamification
        .leaderboard(params.category, params.limit.unwrap_or(10))
        .await?;
    Ok(Json(entries))
}

#[derive(Debug, Deserialize)]
pub struct RankParams {
    #[serde(default)]
    pub category: LeaderboardCategory,
}

/// The calling student's rank in a category; null when they have no
/// standing yet.
pub async fn my_rank(
    State(gamification): State<GamificationService>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<RankParams>,
) -> Result<impl IntoResponse, AppError> {
    let rank = gamification
        .user_rank(claims.user_id(), params.category)
        .await?;
    Ok(Json(serde_json::json!({ "rank": rank })))
}

/// The calling student's earned achievements.
pub async fn my_achievements(
    State(gamification): State<GamificationService>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let achievements = gamification.achievements(claims.user_id()).await?;
    Ok(Json(achievements))
}

/// The full achievement catalog, for rendering locked/unlocked states.
pub async fn achievement_catalog() -> impl IntoResponse {
    Json(crate::services::gamification::catalog())
}

/// The calling student's points total and recent ledger events.
pub async fn my_points(
    State(gamification): State<GamificationService>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let summary = gamification.points(claims.user_id()).await?;
    Ok(Json(summary))
}

/// The calling student's streak state; zeros when no activity yet.
pub async fn my_streak(
    State(gamification): State<GamificationService>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    match gamification.streak(claims.user_id()).await? {
        Some(streak) => Ok(Json(serde_json::json!({
            "current_streak": streak.current_streak,
            "longest_streak": streak.longest_streak,
            "last_active_date": streak.last_active_date,
        }))),
        None => Ok(Json(serde_json::json!({
            "current_streak": 0,
            "longest_streak": 0,
            "last_active_date": null,
        }))),
    }
}

/// Records a study session and advances the caller's streak.
///
/// The streak mutation happens at most once per calendar day; repeated
/// sessions on the same day record the session but leave the streak alone.
pub async fn create_study_session(
    State(store): State<Arc<dyn Store>>,
    State(gamification): State<GamificationService>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateStudySessionRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let student_id = claims.user_id();
    let session = store
        .insert_study_session(NewStudySession {
            student_id,
            course_id: payload.course_id,
            duration_minutes: payload.duration_minutes,
        })
        .await?;

    let streak = gamification.update_streak(student_id).await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "session": session,
            "streak": streak,
        })),
    ))
}
