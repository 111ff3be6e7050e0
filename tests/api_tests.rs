// tests/api_tests.rs

use std::net::SocketAddr;
use std::sync::Arc;

use learnhub::{config::Config, routes, state::AppState, store::MemoryStore};

/// Helper function to spawn the app on a random port for testing.
/// Returns the base URL (e.g., "http://127.0.0.1:12345").
///
/// Backed by the in-memory store, so no database is needed.
async fn spawn_app() -> String {
    let store = Arc::new(MemoryStore::new());

    let config = Config {
        database_url: "unused-for-memory-store".to_string(),
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600, // 10 minutes for tests
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

/// Registers a user and returns a bearer token for it.
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

/// Creates and publishes a course, returning its id.
async fn publish_course(client: &reqwest::Client, address: &str, tutor_token: &str) -> i64 {
    let response = client
        .post(format!("{}/api/tutor/courses", address))
        .bearer_auth(tutor_token)
        .json(&serde_json::json!({
            "title": "Machine Learning 101",
            "description": "<p>Learn the basics</p>",
            "category": "ml",
            "price": 50.0,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);
    let course: serde_json::Value = response.json().await.unwrap();
    let course_id = course["id"].as_i64().unwrap();

    let response = client
        .put(format!("{}/api/tutor/courses/{}", address, course_id))
        .bearer_auth(tutor_token)
        .json(&serde_json::json!({ "status": "published" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    course_id
}

/// Creates and publishes a two-question quiz, returning its id.
async fn publish_quiz(
    client: &reqwest::Client,
    address: &str,
    tutor_token: &str,
    course_id: i64,
    max_attempts: i32,
) -> i64 {
    let response = client
        .post(format!("{}/api/tutor/quizzes", address))
        .bearer_auth(tutor_token)
        .json(&serde_json::json!({
            "course_id": course_id,
            "title": "Fundamentals check",
            "max_attempts": max_attempts,
            "passing_score": 60,
            "questions": [
                {
                    "prompt": "Gradient descent minimizes a loss function.",
                    "points": 10,
                    "type": "true_false",
                    "answer": true,
                },
                {
                    "prompt": "Which algorithm is used to fit linear regression?",
                    "points": 10,
                    "type": "short_answer",
                    "answer": "Gradient Descent",
                },
            ],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);
    let quiz: serde_json::Value = response.json().await.unwrap();
    let quiz_id = quiz["id"].as_i64().unwrap();

    let response = client
        .put(format!("{}/api/tutor/quizzes/{}", address, quiz_id))
        .bearer_auth(tutor_token)
        .json(&serde_json::json!({ "status": "published" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    quiz_id
}

#[tokio::test]
async fn health_check_404() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/random_path_that_does_not_exist", address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn register_fails_validation() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    // Username too short.
    let response = client
        .post(format!("{}/api/auth/register", address))
        .json(&serde_json::json!({
            "username": "yo",
            "email": "yo@example.com",
            "password": "password123",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    // Password without digits is too weak.
    let response = client
        .post(format!("{}/api/auth/register", address))
        .json(&serde_json::json!({
            "username": "validname",
            "email": "valid@example.com",
            "password": "passwordonly",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    // Malformed email.
    let response = client
        .post(format!("{}/api/auth/register", address))
        .json(&serde_json::json!({
            "username": "validname",
            "email": "not-an-email",
            "password": "password123",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn duplicate_username_conflicts() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let payload = serde_json::json!({
        "username": "duplicate",
        "email": "duplicate@example.com",
        "password": "password123",
    });

    let response = client
        .post(format!("{}/api/auth/register", address))
        .json(&payload)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);

    let response = client
        .post(format!("{}/api/auth/register", address))
        .json(&payload)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 409);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["code"], "conflict");
}

#[tokio::test]
async fn login_rejects_wrong_password() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    register_and_login(&client, &address, "student1", "student").await;

    let response = client
        .post(format!("{}/api/auth/login", address))
        .json(&serde_json::json!({
            "username": "student1",
            "password": "wrongpassword1",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn protected_routes_require_token() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/api/enrollments", address))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn tutor_routes_reject_students() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let student_token = register_and_login(&client, &address, "student2", "student").await;

    let response = client
        .post(format!("{}/api/tutor/courses", address))
        .bearer_auth(&student_token)
        .json(&serde_json::json!({ "title": "Nope" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);
}

#[tokio::test]
async fn quiz_is_served_without_answer_keys() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let tutor_token = register_and_login(&client, &address, "tutor1", "tutor").await;
    let student_token = register_and_login(&client, &address, "student3", "student").await;

    let course_id = publish_course(&client, &address, &tutor_token).await;
    let quiz_id = publish_quiz(&client, &address, &tutor_token, course_id, 3).await;

    let response = client
        .get(format!("{}/api/quizzes/{}", address, quiz_id))
        .bearer_auth(&student_token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let body = response.text().await.unwrap();
    let quiz: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(quiz["question_count"], 2);
    // The serialized payload must never contain the answer key.
    assert!(!body.contains("\"answer\""));
    assert!(quiz["questions"][0]["answer"].is_null());
}

#[tokio::test]
async fn full_quiz_flow_scores_and_awards() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let tutor_token = register_and_login(&client, &address, "tutor2", "tutor").await;
    let student_token = register_and_login(&client, &address, "student4", "student").await;

    let course_id = publish_course(&client, &address, &tutor_token).await;
    let quiz_id = publish_quiz(&client, &address, &tutor_token, course_id, 3).await;

    // Enroll (first_enrollment achievement unlocks here).
    let response = client
        .post(format!("{}/api/courses/{}/enroll", address, course_id))
        .bearer_auth(&student_token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);
    let body: serde_json::Value = response.json().await.unwrap();
    let earned: Vec<&str> = body["newly_earned"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["key"].as_str().unwrap())
        .collect();
    assert!(earned.contains(&"first_enrollment"));

    // Double enrollment is a conflict.
    let response = client
        .post(format!("{}/api/courses/{}/enroll", address, course_id))
        .bearer_auth(&student_token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 409);

    // Fetch the quiz to learn the question ids.
    let quiz: serde_json::Value = client
        .get(format!("{}/api/quizzes/{}", address, quiz_id))
        .bearer_auth(&student_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let q0 = quiz["questions"][0]["id"].as_str().unwrap();
    let q1 = quiz["questions"][1]["id"].as_str().unwrap();

    // Submit a perfect attempt; short answer matches despite case/padding.
    let response = client
        .post(format!("{}/api/quizzes/{}/attempts", address, quiz_id))
        .bearer_auth(&student_token)
        .json(&serde_json::json!({
            "answers": {
                q0: true,
                q1: "  gradient descent  ",
            },
            "time_spent_secs": 95,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);
    let result: serde_json::Value = response.json().await.unwrap();
    assert_eq!(result["score"], 100);
    assert_eq!(result["passed"], true);
    assert_eq!(result["correct_count"], 2);

    let earned: Vec<&str> = result["newly_earned"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["key"].as_str().unwrap())
        .collect();
    assert!(earned.contains(&"first_quiz"));
    assert!(earned.contains(&"perfect_score"));

    // The attempt shows up in the student's history.
    let attempts: serde_json::Value = client
        .get(format!("{}/api/attempts", address))
        .bearer_auth(&student_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(attempts.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn attempt_quota_is_enforced_over_http() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let tutor_token = register_and_login(&client, &address, "tutor3", "tutor").await;
    let student_token = register_and_login(&client, &address, "student5", "student").await;

    let course_id = publish_course(&client, &address, &tutor_token).await;
    let quiz_id = publish_quiz(&client, &address, &tutor_token, course_id, 1).await;

    let response = client
        .post(format!("{}/api/quizzes/{}/attempts", address, quiz_id))
        .bearer_auth(&student_token)
        .json(&serde_json::json!({ "answers": {} }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);

    // Quota used up: eligibility reports it, submission is rejected.
    let eligibility: serde_json::Value = client
        .get(format!("{}/api/quizzes/{}/eligibility", address, quiz_id))
        .bearer_auth(&student_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(eligibility["can_take"], false);
    assert_eq!(eligibility["reason"], "attempts_exhausted");

    let response = client
        .post(format!("{}/api/quizzes/{}/attempts", address, quiz_id))
        .bearer_auth(&student_token)
        .json(&serde_json::json!({ "answers": {} }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 409);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["code"], "attempts_exhausted");
}

#[tokio::test]
async fn draft_quiz_is_hidden_from_students() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let tutor_token = register_and_login(&client, &address, "tutor4", "tutor").await;
    let student_token = register_and_login(&client, &address, "student6", "student").await;

    let course_id = publish_course(&client, &address, &tutor_token).await;

    // Created but never published.
    let response = client
        .post(format!("{}/api/tutor/quizzes", address))
        .bearer_auth(&tutor_token)
        .json(&serde_json::json!({
            "course_id": course_id,
            "title": "Draft quiz",
            "questions": [
                { "prompt": "?", "points": 5, "type": "true_false", "answer": false },
            ],
        }))
        .send()
        .await
        .unwrap();
    let quiz: serde_json::Value = response.json().await.unwrap();
    let quiz_id = quiz["id"].as_i64().unwrap();

    let response = client
        .get(format!("{}/api/quizzes/{}", address, quiz_id))
        .bearer_auth(&student_token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn progress_completion_and_review_flow() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let tutor_token = register_and_login(&client, &address, "tutor5", "tutor").await;
    let student_token = register_and_login(&client, &address, "student7", "student").await;

    let course_id = publish_course(&client, &address, &tutor_token).await;

    let enrollment: serde_json::Value = client
        .post(format!("{}/api/courses/{}/enroll", address, course_id))
        .bearer_auth(&student_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let enrollment_id = enrollment["enrollment"]["id"].as_i64().unwrap();

    // Completing the course unlocks first_completion.
    let response = client
        .put(format!(
            "{}/api/enrollments/{}/progress",
            address, enrollment_id
        ))
        .bearer_auth(&student_token)
        .json(&serde_json::json!({ "progress": 100 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["completed"], true);
    let earned: Vec<&str> = body["newly_earned"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["key"].as_str().unwrap())
        .collect();
    assert!(earned.contains(&"first_completion"));

    // Enrolled students can review, but only once.
    let response = client
        .post(format!("{}/api/courses/{}/reviews", address, course_id))
        .bearer_auth(&student_token)
        .json(&serde_json::json!({ "rating": 5, "comment": "Great course" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);

    let response = client
        .post(format!("{}/api/courses/{}/reviews", address, course_id))
        .bearer_auth(&student_token)
        .json(&serde_json::json!({ "rating": 4 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 409);
}
