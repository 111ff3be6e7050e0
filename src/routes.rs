// src/routes.rs

use std::sync::Arc;

use axum::{
    Router, http::Method, middleware,
    routing::{delete, get, post, put},
};
use tower_governor::{GovernorLayer, governor::GovernorConfigBuilder};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{analytics, auth, course, gamification, quiz},
    state::AppState,
    utils::jwt::{auth_middleware, tutor_middleware},
};

/// Assembles the main application router.
///
/// * Merges all sub-routers (auth, courses, quizzes, gamification, tutor).
/// * Applies global middleware (Trace, CORS) and rate limiting on auth.
/// * Injects global state (config, store, services).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        "http://localhost:3000".parse().unwrap(),
        "http://127.0.0.1:3000".parse().unwrap(),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let governor_conf = GovernorConfigBuilder::default()
        .per_second(2)
        .burst_size(5)
        .finish()
        .expect("valid rate limiter configuration");
    let governor_conf = Arc::new(governor_conf);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .layer(GovernorLayer::new(governor_conf));

    let course_routes = Router::new()
        .route("/", get(course::list_courses))
        .route("/{id}", get(course::get_course))
        .route("/{id}/quizzes", get(quiz::course_quizzes))
        // Protected course routes
        .merge(
            Router::new()
                .route("/{id}/enroll", post(course::enroll))
                .route("/{id}/reviews", post(course::create_review))
                .layer(middleware::from_fn_with_state(
                    state.clone(),
                    auth_middleware,
                )),
        );

    let quiz_routes = Router::new()
        .route("/{id}", get(quiz::get_quiz))
        .route("/{id}/eligibility", get(quiz::eligibility))
        .route("/{id}/attempts", post(quiz::submit_attempt))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let me_routes = Router::new()
        .route("/achievements", get(gamification::my_achievements))
        .route("/points", get(gamification::my_points))
        .route("/streak", get(gamification::my_streak))
        .route("/rank", get(gamification::my_rank))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let student_routes = Router::new()
        .route("/enrollments", get(course::my_enrollments))
        .route("/enrollments/{id}", delete(course::unenroll))
        .route("/enrollments/{id}/progress", put(course::update_progress))
        .route("/attempts", get(quiz::my_attempts))
        .route("/study-sessions", post(gamification::create_study_session))
        .route("/analytics/student", get(analytics::student_analytics))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let tutor_routes = Router::new()
        .route(
            "/courses",
            get(course::tutor_courses).post(course::create_course),
        )
        .route("/courses/{id}", put(course::update_course))
        .route("/quizzes", post(quiz::create_quiz))
        .route("/quizzes/{id}", put(quiz::update_quiz))
        .route("/quizzes/{id}/analytics", get(quiz::quiz_analytics))
        .route("/analytics", get(analytics::tutor_analytics))
        // Double middleware protection: Auth first, then role check
        .layer(middleware::from_fn(tutor_middleware))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/courses", course_routes)
        .nest("/api/quizzes", quiz_routes)
        .nest("/api/me", me_routes)
        .nest("/api/tutor", tutor_routes)
        .nest("/api", student_routes)
        .route("/api/leaderboard", get(gamification::leaderboard))
        .route("/api/achievements", get(gamification::achievement_catalog))
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
