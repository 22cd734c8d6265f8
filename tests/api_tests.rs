use axum::http::StatusCode;
use axum_test::TestServer;
use chrono::{Duration, TimeZone, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use study_pal::{api::*, Database, FixedClock, SchedulingEngine, StudyService};
use uuid::Uuid;

async fn create_test_server() -> (TestServer, FixedClock) {
    let db = Database::new("sqlite::memory:").await.unwrap();
    let clock = FixedClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap());
    let study_service =
        StudyService::new(db, SchedulingEngine::default()).with_clock(Arc::new(clock.clone()));

    let app = create_router(AppState { study_service });
    (TestServer::new(app).unwrap(), clock)
}

async fn create_card(server: &TestServer, user_id: Uuid, front: &str) -> Value {
    let response = server
        .post("/api/cards")
        .json(&json!({
            "user_id": user_id,
            "front": front,
            "back": "answer",
            "difficulty": "hard"
        }))
        .await;
    response.assert_status_ok();
    response.json::<Value>()["data"].clone()
}

#[tokio::test]
async fn test_health_check() {
    let (server, _) = create_test_server().await;

    let response = server.get("/health").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["content_service"], "disabled");
}

#[tokio::test]
async fn test_api_create_and_get_card() {
    let (server, _) = create_test_server().await;
    let user_id = Uuid::new_v4();

    let card = create_card(&server, user_id, "What is a trait?").await;
    assert_eq!(card["front"], "What is a trait?");
    assert_eq!(card["difficulty"], "hard");
    assert_eq!(card["easiness_factor"], 2.5);
    assert_eq!(card["repetitions"], 0);
    assert_eq!(card["version"], 0);

    let response = server
        .get(&format!("/api/cards/{}", card["id"].as_str().unwrap()))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["id"], card["id"]);
}

#[tokio::test]
async fn test_api_unknown_card_is_404() {
    let (server, _) = create_test_server().await;

    let response = server.get(&format!("/api/cards/{}", Uuid::new_v4())).await;
    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["success"], false);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_api_review_flow() {
    let (server, clock) = create_test_server().await;
    let user_id = Uuid::new_v4();
    let card = create_card(&server, user_id, "Borrow checker?").await;
    let card_id = card["id"].as_str().unwrap().to_string();

    let due: Value = server
        .get(&format!("/api/cards/due?user_id={}", user_id))
        .await
        .json();
    assert_eq!(due["data"].as_array().unwrap().len(), 1);

    let response = server
        .post(&format!("/api/cards/{}/review", card_id))
        .json(&json!({ "quality": 4, "response_time_ms": 2100 }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["card"]["interval_days"], 1);
    assert_eq!(body["data"]["card"]["repetitions"], 1);
    assert_eq!(body["data"]["card"]["times_correct"], 1);
    assert_eq!(body["data"]["event"]["quality"], 4);

    let due: Value = server
        .get(&format!("/api/cards/due?user_id={}", user_id))
        .await
        .json();
    assert!(due["data"].as_array().unwrap().is_empty());

    clock.advance(Duration::days(1));
    let due: Value = server
        .get(&format!("/api/cards/due?user_id={}&limit=5", user_id))
        .await
        .json();
    assert_eq!(due["data"].as_array().unwrap().len(), 1);

    let history: Value = server
        .get(&format!("/api/cards/{}/history", card_id))
        .await
        .json();
    assert_eq!(history["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_api_review_rejects_out_of_range_quality() {
    let (server, _) = create_test_server().await;
    let card = create_card(&server, Uuid::new_v4(), "Q").await;

    let response = server
        .post(&format!("/api/cards/{}/review", card["id"].as_str().unwrap()))
        .json(&json!({ "quality": 7 }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_api_archived_cards_are_not_due() {
    let (server, _) = create_test_server().await;
    let user_id = Uuid::new_v4();
    let card = create_card(&server, user_id, "Q").await;
    let card_id = card["id"].as_str().unwrap();

    let response = server.post(&format!("/api/cards/{}/archive", card_id)).await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["data"]["archived"], true);

    let due: Value = server
        .get(&format!("/api/cards/due?user_id={}", user_id))
        .await
        .json();
    assert!(due["data"].as_array().unwrap().is_empty());

    server
        .post(&format!("/api/cards/{}/unarchive", card_id))
        .await
        .assert_status_ok();
    let due: Value = server
        .get(&format!("/api/cards/due?user_id={}", user_id))
        .await
        .json();
    assert_eq!(due["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_api_assessment_attempt_flow() {
    let (server, _) = create_test_server().await;
    let user_id = Uuid::new_v4();

    let response = server
        .post("/api/assessments")
        .json(&json!({
            "user_id": user_id,
            "title": "Rust basics",
            "questions": [
                {
                    "id": "q1",
                    "prompt": "Is Rust memory safe without a GC?",
                    "question_type": "true_false",
                    "options": ["True", "False"],
                    "correct_answer": "True",
                    "points": 5,
                    "difficulty": "easy",
                    "explanation": "Ownership rules are checked at compile time"
                },
                {
                    "id": "q2",
                    "prompt": "Keyword for an immutable binding?",
                    "question_type": "short_answer",
                    "correct_answer": "let",
                    "points": 5,
                    "difficulty": "medium"
                }
            ]
        }))
        .await;
    response.assert_status_ok();
    let assessment: Value = response.json::<Value>()["data"].clone();
    assert_eq!(assessment["passing_score"], 70.0);

    let response = server
        .post(&format!("/api/assessments/{}/attempts", assessment["id"].as_str().unwrap()))
        .json(&json!({ "user_id": user_id }))
        .await;
    response.assert_status_ok();
    let attempt_id = response.json::<Value>()["data"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    for (question_id, value) in [("q1", "True"), ("q2", "mut")] {
        server
            .post(&format!("/api/attempts/{}/answers", attempt_id))
            .json(&json!({ "question_id": question_id, "value": value, "time_spent_secs": 12 }))
            .await
            .assert_status_ok();
    }

    let response = server
        .post(&format!("/api/attempts/{}/complete", attempt_id))
        .await;
    response.assert_status_ok();
    let result = response.json::<Value>()["data"]["result"].clone();
    assert_eq!(result["score"], 50.0);
    assert_eq!(result["passed"], false);
    assert_eq!(result["total_time_secs"], 24);
    assert_eq!(result["analysis"]["weaknesses"], json!(["medium questions"]));

    let again = server
        .post(&format!("/api/attempts/{}/complete", attempt_id))
        .await;
    again.assert_status(StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_api_rejects_duplicate_question_ids() {
    let (server, _) = create_test_server().await;

    let question = json!({
        "id": "q1",
        "prompt": "2 + 2",
        "question_type": "short_answer",
        "correct_answer": 4,
        "points": 1,
        "difficulty": "easy"
    });
    let response = server
        .post("/api/assessments")
        .json(&json!({
            "user_id": Uuid::new_v4(),
            "title": "Duplicate",
            "questions": [question.clone(), question]
        }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_api_sessions_and_streak() {
    let (server, clock) = create_test_server().await;
    let user_id = Uuid::new_v4();

    let response = server
        .post("/api/sessions")
        .json(&json!({ "user_id": user_id }))
        .await;
    response.assert_status_ok();
    let session_id = response.json::<Value>()["data"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    clock.advance(Duration::minutes(30));
    let response = server
        .post(&format!("/api/sessions/{}/finish", session_id))
        .json(&json!({ "cards_reviewed": 12, "cards_correct": 9 }))
        .await;
    response.assert_status_ok();
    let session: Value = response.json::<Value>()["data"].clone();
    assert_eq!(session["duration_minutes"], 30);
    assert_eq!(session["focus_score"], 75.0);

    server
        .post(&format!("/api/sessions/{}/finish", session_id))
        .json(&json!({ "cards_reviewed": 1, "cards_correct": 1 }))
        .await
        .assert_status(StatusCode::CONFLICT);

    let streak: Value = server
        .get(&format!("/api/users/{}/streak", user_id))
        .await
        .json();
    assert_eq!(streak["data"]["current_streak"], 1);

    let analytics: Value = server
        .get(&format!("/api/users/{}/analytics", user_id))
        .await
        .json();
    assert_eq!(analytics["data"]["sessions_completed"], 1);
    assert_eq!(analytics["data"]["total_study_minutes"], 30);
}

#[tokio::test]
async fn test_api_import_without_content_service() {
    let (server, _) = create_test_server().await;

    let response = server
        .post("/api/import/flashcards")
        .json(&json!({ "user_id": Uuid::new_v4(), "text": "Ownership is a set of rules." }))
        .await;
    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
}
