// tests/gamification_tests.rs

use std::net::SocketAddr;
use std::sync::Arc;

use learnhub::{config::Config, routes, state::AppState, store::MemoryStore};

/// Spawns the app over the in-memory store on a random port.
async fn spawn_app() -> String {
    let store = Arc::new(MemoryStore::new());

    let config = Config {
        database_url: "unused-for-memory-store".to_string(),
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600,
        rust_log: "error".to_string(),
        admin_username: None,
        admin_password: None,
    };

    let state = AppState::new(store, config);
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    address
}

async fn register_and_login(
    client: &reqwest::Client,
    address: &str,
    username: &str,
    role: &str,
) -> String {
    let response = client
        .post(format!("{}/api/auth/register", address))
        .json(&serde_json::json!({
            "username": username,
            "email": format!("{username}@example.com"),
            "password": "password123",
            "role": role,
        }))
        .send()
        .await
        .expect("Failed to execute register request");
    assert_eq!(response.status().as_u16(), 201);

    let response = client
        .post(format!("{}/api/auth/login", address))
        .json(&serde_json::json!({
            "username": username,
            "password": "password123",
        }))
        .send()
        .await
        .expect("Failed to execute login request");
    assert_eq!(response.status().as_u16(), 200);

    let body: serde_json::Value = response.json().await.unwrap();
    body["token"].as_str().unwrap().to_string()
}

async fn record_session(client: &reqwest::Client, address: &str, token: &str, minutes: i32) -> serde_json::Value {
    let response = client
        .post(format!("{}/api/study-sessions", address))
        .bearer_auth(token)
        .json(&serde_json::json!({ "duration_minutes": minutes }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);
    response.json().await.unwrap()
}

#[tokio::test]
async fn study_session_starts_streak_once_per_day() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let token = register_and_login(&client, &address, "learner1", "student").await;

    // First session of the day starts the streak and pays the daily bonus.
    let body = record_session(&client, &address, &token, 30).await;
    assert_eq!(body["streak"]["changed"], true);
    assert_eq!(body["streak"]["streak"]["current_streak"], 1);

    // Second session the same day records, but the streak is untouched.
    let body = record_session(&client, &address, &token, 20).await;
    assert_eq!(body["streak"]["changed"], false);
    assert_eq!(body["streak"]["streak"]["current_streak"], 1);

    // The daily bonus was credited exactly once.
    let points: serde_json::Value = client
        .get(format!("{}/api/me/points", address))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(points["total"], 5);
    assert_eq!(points["recent_events"].as_array().unwrap().len(), 1);

    let streak: serde_json::Value = client
        .get(format!("{}/api/me/streak", address))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(streak["current_streak"], 1);
    assert_eq!(streak["longest_streak"], 1);
}

#[tokio::test]
async fn streak_defaults_to_zero_without_activity() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let token = register_and_login(&client, &address, "learner2", "student").await;

    let streak: serde_json::Value = client
        .get(format!("{}/api/me/streak", address))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(streak["current_streak"], 0);
    assert!(streak["last_active_date"].is_null());
}

#[tokio::test]
async fn leaderboard_ranks_by_points() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let first = register_and_login(&client, &address, "amber", "student").await;
    let second = register_and_login(&client, &address, "blake", "student").await;

    // amber: one session today (5 points daily bonus).
    record_session(&client, &address, &first, 25).await;
    // blake: one session today as well, then nothing else - tie on 5 points,
    // broken by ascending user id (amber registered first).
    record_session(&client, &address, &second, 25).await;

    let board: serde_json::Value = client
        .get(format!("{}/api/leaderboard?category=points&limit=10", address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let entries = board.as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["rank"], 1);
    assert_eq!(entries[1]["rank"], 2);
    assert_eq!(entries[0]["username"], "amber");
    assert_eq!(entries[1]["username"], "blake");
    assert!(entries[0]["value"].as_i64() >= entries[1]["value"].as_i64());

    // Rank lookup matches leaderboard position.
    let rank: serde_json::Value = client
        .get(format!("{}/api/me/rank?category=points", address))
        .bearer_auth(&second)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(rank["rank"], 2);
}

#[tokio::test]
async fn rank_is_null_without_standing() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let token = register_and_login(&client, &address, "learner3", "student").await;

    let rank: serde_json::Value = client
        .get(format!("{}/api/me/rank?category=points", address))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(rank["rank"].is_null());
}

#[tokio::test]
async fn achievement_catalog_is_served() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let catalog: serde_json::Value = client
        .get(format!("{}/api/achievements", address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let entries = catalog.as_array().unwrap();
    assert!(entries.iter().any(|a| a["key"] == "week_streak"));
    assert!(entries.iter().any(|a| a["key"] == "perfect_score"));
}

#[tokio::test]
async fn student_analytics_reflect_sessions() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let token = register_and_login(&client, &address, "learner4", "student").await;

    record_session(&client, &address, &token, 30).await;
    record_session(&client, &address, &token, 20).await;

    let analytics: serde_json::Value = client
        .get(format!("{}/api/analytics/student?window=week", address))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(analytics["total_study_minutes"], 50);
    assert_eq!(analytics["daily_study"].as_array().unwrap().len(), 10);
    // Both sessions happened today, the last point of the series.
    assert_eq!(analytics["daily_study"][9]["minutes"], 50);
    assert_eq!(analytics["completion_rate"], 0);
}

#[tokio::test]
async fn tutor_analytics_reflect_enrollments() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let tutor_token = register_and_login(&client, &address, "tutor9", "tutor").await;
    let student_token = register_and_login(&client, &address, "learner5", "student").await;

    // Create and publish a paid course.
    let course: serde_json::Value = client
        .post(format!("{}/api/tutor/courses", address))
        .bearer_auth(&tutor_token)
        .json(&serde_json::json!({ "title": "Deep Learning", "price": 70.0 }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let course_id = course["id"].as_i64().unwrap();
    client
        .put(format!("{}/api/tutor/courses/{}", address, course_id))
        .bearer_auth(&tutor_token)
        .json(&serde_json::json!({ "status": "published" }))
        .send()
        .await
        .unwrap();

    client
        .post(format!("{}/api/courses/{}/enroll", address, course_id))
        .bearer_auth(&student_token)
        .send()
        .await
        .unwrap();

    let analytics: serde_json::Value = client
        .get(format!("{}/api/tutor/analytics?window=month", address))
        .bearer_auth(&tutor_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(analytics["total_students"], 1);
    assert_eq!(analytics["total_revenue"], 70.0);
    assert_eq!(analytics["published_courses"], 1);
    assert_eq!(analytics["courses"][0]["students"], 1);
    assert_eq!(analytics["courses"][0]["revenue"], 70.0);
}
