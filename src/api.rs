use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::{
    api_error,
    content_client::ContentServiceHealth,
    engine::StudyAnalytics,
    models::*,
    sm2_scheduler::ReviewOutcome,
    study_service::StudyService,
};

// Import logging macros
use crate::{log_api_start, log_api_success, log_api_warn};

#[derive(Clone)]
pub struct AppState {
    pub study_service: StudyService,
}

#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, (StatusCode, Json<ApiResponse<()>>)>;

#[derive(Deserialize)]
pub struct UserQuery {
    pub user_id: Uuid,
}

#[derive(Deserialize)]
pub struct DueQuery {
    pub user_id: Uuid,
    pub limit: Option<usize>,
}

#[derive(Serialize)]
pub struct StreakResponse {
    pub user_id: Uuid,
    pub current_streak: u32,
}

// Card endpoints

pub async fn create_card(
    State(state): State<AppState>,
    Json(request): Json<CreateCardRequest>,
) -> ApiResult<Card> {
    log_api_start!("create_card", user_id = request.user_id);

    match state.study_service.create_card(request).await {
        Ok(card) => {
            log_api_success!("create_card", card_id = card.id, "card created");
            Ok(Json(ApiResponse::success(card)))
        }
        Err(e) => Err(api_error!(e, "create_card", "card")),
    }
}

pub async fn get_card(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Card> {
    log_api_start!("get_card", card_id = id);

    state
        .study_service
        .get_card(id)
        .await
        .map(|card| Json(ApiResponse::success(card)))
        .map_err(|e| api_error!(e, "get_card", "card", &id.to_string()))
}

pub async fn list_cards(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> ApiResult<Vec<Card>> {
    match state.study_service.list_cards(query.user_id).await {
        Ok(cards) => {
            log_api_success!("list_cards", count = cards.len(), "cards listed");
            Ok(Json(ApiResponse::success(cards)))
        }
        Err(e) => Err(api_error!(e, "list_cards", "card")),
    }
}

pub async fn get_due_cards(
    State(state): State<AppState>,
    Query(query): Query<DueQuery>,
) -> ApiResult<Vec<Card>> {
    log_api_start!("get_due_cards", user_id = query.user_id);

    match state.study_service.due_cards(query.user_id, query.limit).await {
        Ok(cards) => {
            log_api_success!("get_due_cards", count = cards.len(), "due cards selected");
            Ok(Json(ApiResponse::success(cards)))
        }
        Err(e) => Err(api_error!(e, "get_due_cards", "card")),
    }
}

pub async fn review_card(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ReviewCardRequest>,
) -> ApiResult<ReviewOutcome> {
    log_api_start!("review_card", card_id = id);

    match state.study_service.review_card(id, request).await {
        Ok(outcome) => {
            info!(
                card_id = %id,
                quality = outcome.event.quality,
                interval_days = outcome.card.memory.interval_days,
                next_review_at = %outcome.card.memory.next_review_at,
                "Card reviewed"
            );
            Ok(Json(ApiResponse::success(outcome)))
        }
        Err(e) => {
            log_api_warn!("review_card", card_id = id, e.to_string());
            Err(api_error!(e, "review_card", "card", &id.to_string()))
        }
    }
}

pub async fn archive_card(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Card> {
    set_archived(state, id, true).await
}

pub async fn unarchive_card(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Card> {
    set_archived(state, id, false).await
}

async fn set_archived(state: AppState, id: Uuid, archived: bool) -> ApiResult<Card> {
    match state.study_service.set_archived(id, archived).await {
        Ok(card) => {
            log_api_success!(
                "set_archived",
                card_id = id,
                if archived { "card archived" } else { "card restored" }
            );
            Ok(Json(ApiResponse::success(card)))
        }
        Err(e) => Err(api_error!(e, "set_archived", "card", &id.to_string())),
    }
}

pub async fn get_card_history(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<ReviewEvent>> {
    state
        .study_service
        .card_history(id)
        .await
        .map(|events| Json(ApiResponse::success(events)))
        .map_err(|e| api_error!(e, "get_card_history", "card", &id.to_string()))
}

// Assessment endpoints

pub async fn create_assessment(
    State(state): State<AppState>,
    Json(request): Json<CreateAssessmentRequest>,
) -> ApiResult<Assessment> {
    log_api_start!("create_assessment", user_id = request.user_id);

    match state.study_service.create_assessment(request).await {
        Ok(assessment) => {
            log_api_success!("create_assessment", assessment_id = assessment.id, "assessment created");
            Ok(Json(ApiResponse::success(assessment)))
        }
        Err(e) => Err(api_error!(e, "create_assessment", "assessment")),
    }
}

pub async fn get_assessment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Assessment> {
    state
        .study_service
        .get_assessment(id)
        .await
        .map(|assessment| Json(ApiResponse::success(assessment)))
        .map_err(|e| api_error!(e, "get_assessment", "assessment", &id.to_string()))
}

pub async fn start_attempt(
    State(state): State<AppState>,
    Path(assessment_id): Path<Uuid>,
    Json(request): Json<StartAttemptRequest>,
) -> ApiResult<Attempt> {
    log_api_start!("start_attempt", assessment_id = assessment_id);

    match state.study_service.start_attempt(assessment_id, request.user_id).await {
        Ok(attempt) => {
            log_api_success!("start_attempt", attempt_id = attempt.id, "attempt started");
            Ok(Json(ApiResponse::success(attempt)))
        }
        Err(e) => Err(api_error!(e, "start_attempt", "assessment", &assessment_id.to_string())),
    }
}

// Attempt endpoints

pub async fn list_attempts(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> ApiResult<Vec<Attempt>> {
    state
        .study_service
        .list_attempts(query.user_id)
        .await
        .map(|attempts| Json(ApiResponse::success(attempts)))
        .map_err(|e| api_error!(e, "list_attempts", "attempt"))
}

pub async fn get_attempt(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Attempt> {
    state
        .study_service
        .get_attempt(id)
        .await
        .map(|attempt| Json(ApiResponse::success(attempt)))
        .map_err(|e| api_error!(e, "get_attempt", "attempt", &id.to_string()))
}

pub async fn submit_answer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(answer): Json<SubmittedAnswer>,
) -> ApiResult<Attempt> {
    log_api_start!("submit_answer", attempt_id = id);

    match state.study_service.submit_answer(id, answer).await {
        Ok(attempt) => {
            log_api_success!("submit_answer", attempt_id = id, "answer recorded");
            Ok(Json(ApiResponse::success(attempt)))
        }
        Err(e) => Err(api_error!(e, "submit_answer", "attempt", &id.to_string())),
    }
}

pub async fn complete_attempt(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Attempt> {
    log_api_start!("complete_attempt", attempt_id = id);

    match state.study_service.complete_attempt(id).await {
        Ok(attempt) => {
            if let Some(result) = &attempt.result {
                info!(
                    attempt_id = %id,
                    score = result.score,
                    passed = result.passed,
                    "Attempt graded"
                );
            }
            Ok(Json(ApiResponse::success(attempt)))
        }
        Err(e) => Err(api_error!(e, "complete_attempt", "attempt", &id.to_string())),
    }
}

// Study session endpoints

pub async fn start_session(
    State(state): State<AppState>,
    Json(request): Json<StartSessionRequest>,
) -> ApiResult<StudySession> {
    match state.study_service.start_session(request.user_id).await {
        Ok(session) => {
            log_api_success!("start_session", session_id = session.id, "session started");
            Ok(Json(ApiResponse::success(session)))
        }
        Err(e) => Err(api_error!(e, "start_session", "session")),
    }
}

pub async fn finish_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<FinishSessionRequest>,
) -> ApiResult<StudySession> {
    log_api_start!("finish_session", session_id = id);

    match state.study_service.finish_session(id, request).await {
        Ok(session) => {
            log_api_success!("finish_session", session_id = id, "session finalized");
            Ok(Json(ApiResponse::success(session)))
        }
        Err(e) => Err(api_error!(e, "finish_session", "session", &id.to_string())),
    }
}

pub async fn list_sessions(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> ApiResult<Vec<StudySession>> {
    state
        .study_service
        .list_sessions(query.user_id)
        .await
        .map(|sessions| Json(ApiResponse::success(sessions)))
        .map_err(|e| api_error!(e, "list_sessions", "session"))
}

pub async fn get_streak(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<StreakResponse> {
    state
        .study_service
        .current_streak(user_id)
        .await
        .map(|current_streak| {
            Json(ApiResponse::success(StreakResponse {
                user_id,
                current_streak,
            }))
        })
        .map_err(|e| api_error!(e, "get_streak", "user", &user_id.to_string()))
}

pub async fn get_analytics(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<StudyAnalytics> {
    state
        .study_service
        .analytics(user_id)
        .await
        .map(|analytics| Json(ApiResponse::success(analytics)))
        .map_err(|e| api_error!(e, "get_analytics", "user", &user_id.to_string()))
}

// Content import endpoints

pub async fn import_flashcards(
    State(state): State<AppState>,
    Json(request): Json<ImportFlashcardsRequest>,
) -> ApiResult<Vec<Card>> {
    log_api_start!("import_flashcards", user_id = request.user_id);

    match state.study_service.import_flashcards(request).await {
        Ok(cards) => {
            log_api_success!("import_flashcards", count = cards.len(), "flashcards imported");
            Ok(Json(ApiResponse::success(cards)))
        }
        Err(e) => Err(api_error!(e, "import_flashcards", "card")),
    }
}

pub async fn generate_assessment(
    State(state): State<AppState>,
    Json(request): Json<GenerateAssessmentRequest>,
) -> ApiResult<Assessment> {
    log_api_start!("generate_assessment", user_id = request.user_id);

    match state.study_service.generate_assessment(request).await {
        Ok(assessment) => {
            log_api_success!("generate_assessment", assessment_id = assessment.id, "assessment generated");
            Ok(Json(ApiResponse::success(assessment)))
        }
        Err(e) => Err(api_error!(e, "generate_assessment", "assessment")),
    }
}

pub async fn content_health(State(state): State<AppState>) -> ApiResult<ContentServiceHealth> {
    state
        .study_service
        .content_health()
        .await
        .map(|health| Json(ApiResponse::success(health)))
        .map_err(|e| api_error!(e, "content_health", "content_service"))
}

pub async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    let content_service = if state.study_service.has_content_generator() {
        "configured"
    } else {
        "disabled"
    };

    Json(json!({
        "status": "healthy",
        "service": "study-pal",
        "timestamp": Utc::now().to_rfc3339(),
        "content_service": content_service,
    }))
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        // Card routes
        .route("/api/cards", post(create_card).get(list_cards))
        .route("/api/cards/due", get(get_due_cards))
        .route("/api/cards/:id", get(get_card))
        .route("/api/cards/:id/review", post(review_card))
        .route("/api/cards/:id/archive", post(archive_card))
        .route("/api/cards/:id/unarchive", post(unarchive_card))
        .route("/api/cards/:id/history", get(get_card_history))
        // Assessment routes
        .route("/api/assessments", post(create_assessment))
        .route("/api/assessments/:id", get(get_assessment))
        .route("/api/assessments/:id/attempts", post(start_attempt))
        // Attempt routes
        .route("/api/attempts", get(list_attempts))
        .route("/api/attempts/:id", get(get_attempt))
        .route("/api/attempts/:id/answers", post(submit_answer))
        .route("/api/attempts/:id/complete", post(complete_attempt))
        // Study session routes
        .route("/api/sessions", post(start_session).get(list_sessions))
        .route("/api/sessions/:id/finish", post(finish_session))
        .route("/api/users/:user_id/streak", get(get_streak))
        .route("/api/users/:user_id/analytics", get(get_analytics))
        // Content import routes
        .route("/api/import/flashcards", post(import_flashcards))
        .route("/api/import/assessment", post(generate_assessment))
        .route("/api/content/health", get(content_health))
        .with_state(state)
}
