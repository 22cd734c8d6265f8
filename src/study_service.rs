use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::content_client::{ContentGenerator, ContentServiceHealth};
use crate::database::Database;
use crate::engine::{SchedulingEngine, StudyAnalytics};
use crate::errors::{EngineError, EngineResult};
use crate::models::*;
use crate::sm2_scheduler::ReviewOutcome;
use crate::stores::{AssessmentStore, AttemptStore, CardStore, Clock, SessionStore, SystemClock};

use crate::{log_content_operation, log_performance, log_service_start, log_service_success, log_service_warn};

const SERVICE: &str = "study_service";

/// Review writes that lose a version race are recomputed this many times in total.
pub const MAX_REVIEW_ATTEMPTS: u32 = 3;

/// Gradings overtaken by a late answer are redone this many times in total.
pub const MAX_GRADING_ATTEMPTS: u32 = 3;

const DEFAULT_IMPORT_COUNT: usize = 10;

#[derive(Clone)]
pub struct StudyService {
    db: Database,
    engine: SchedulingEngine,
    clock: Arc<dyn Clock>,
    content: Option<Arc<dyn ContentGenerator>>,
}

impl StudyService {
    pub fn new(db: Database, engine: SchedulingEngine) -> Self {
        Self {
            db,
            engine,
            clock: Arc::new(SystemClock),
            content: None,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_content_generator(mut self, generator: Arc<dyn ContentGenerator>) -> Self {
        self.content = Some(generator);
        self
    }

    pub fn engine(&self) -> &SchedulingEngine {
        &self.engine
    }

    pub fn has_content_generator(&self) -> bool {
        self.content.is_some()
    }

    // Cards

    pub async fn create_card(&self, request: CreateCardRequest) -> EngineResult<Card> {
        let card = self.new_card(request, self.clock.now())?;
        self.db.insert_card(&card).await?;
        log_service_success!(SERVICE, "create_card", "card created");
        Ok(card)
    }

    fn new_card(&self, request: CreateCardRequest, now: DateTime<Utc>) -> EngineResult<Card> {
        if request.front.trim().is_empty() || request.back.trim().is_empty() {
            return Err(EngineError::validation("Card front and back must not be empty"));
        }

        Ok(Card {
            id: Uuid::new_v4(),
            user_id: request.user_id,
            front: request.front,
            back: request.back,
            context: request.context,
            difficulty: request.difficulty.unwrap_or(Difficulty::Medium),
            archived: false,
            created_at: now,
            memory: self.engine.scheduler().initial_state(now),
            stats: ReviewStats::default(),
            version: 0,
        })
    }

    pub async fn get_card(&self, id: Uuid) -> EngineResult<Card> {
        self.db
            .get_card(id)
            .await?
            .ok_or_else(|| EngineError::not_found("Card", id))
    }

    pub async fn list_cards(&self, user_id: Uuid) -> EngineResult<Vec<Card>> {
        self.db.list_cards(user_id).await
    }

    pub async fn set_archived(&self, id: Uuid, archived: bool) -> EngineResult<Card> {
        self.db
            .set_archived(id, archived)
            .await?
            .ok_or_else(|| EngineError::not_found("Card", id))
    }

    /// Applies one review to the stored card.
    ///
    /// The new state is always computed from the latest stored snapshot; a
    /// concurrent review that lands first forces a re-read and a recompute.
    pub async fn review_card(&self, id: Uuid, request: ReviewCardRequest) -> EngineResult<ReviewOutcome> {
        let started = Instant::now();
        log_service_start!(SERVICE, "review_card", card_id = id);

        let mut attempt = 1;
        loop {
            let card = self.get_card(id).await?;
            let outcome =
                self.engine
                    .review_card(&card, request.quality, request.response_time_ms, self.clock.now())?;

            match self.db.record_review(&outcome.card, card.version, &outcome.event).await {
                Ok(stored) => {
                    log_service_success!(
                        SERVICE,
                        "review_card",
                        card_id = id,
                        duration_ms = started.elapsed().as_millis() as u64
                    );
                    return Ok(ReviewOutcome {
                        card: stored,
                        event: outcome.event,
                    });
                }
                Err(EngineError::Conflict { .. }) if attempt < MAX_REVIEW_ATTEMPTS => {
                    log_service_warn!(SERVICE, "review_card", attempt = attempt, "version conflict, retrying");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub async fn due_cards(&self, user_id: Uuid, limit: Option<usize>) -> EngineResult<Vec<Card>> {
        let now = self.clock.now();
        let candidates = self.db.list_due_candidates(user_id, now).await?;
        Ok(self.engine.due_cards(&candidates, now, limit))
    }

    pub async fn card_history(&self, id: Uuid) -> EngineResult<Vec<ReviewEvent>> {
        self.get_card(id).await?;
        self.db.list_review_events(id).await
    }

    // Assessments

    pub async fn create_assessment(&self, request: CreateAssessmentRequest) -> EngineResult<Assessment> {
        let passing_score = request
            .passing_score
            .unwrap_or(self.engine.config().default_passing_score);
        validate_assessment(&request.title, &request.questions, passing_score)?;

        let assessment = Assessment {
            id: Uuid::new_v4(),
            user_id: request.user_id,
            title: request.title,
            passing_score,
            questions: request.questions,
            created_at: self.clock.now(),
        };

        self.db.insert_assessment(&assessment).await?;
        log_service_success!(SERVICE, "create_assessment", "assessment created");
        Ok(assessment)
    }

    pub async fn get_assessment(&self, id: Uuid) -> EngineResult<Assessment> {
        self.db
            .get_assessment(id)
            .await?
            .ok_or_else(|| EngineError::not_found("Assessment", id))
    }

    // Attempts

    pub async fn start_attempt(&self, assessment_id: Uuid, user_id: Uuid) -> EngineResult<Attempt> {
        self.get_assessment(assessment_id).await?;

        let attempt = Attempt {
            id: Uuid::new_v4(),
            assessment_id,
            user_id,
            status: AttemptStatus::InProgress,
            answers: Vec::new(),
            started_at: self.clock.now(),
            completed_at: None,
            result: None,
        };
        self.db.insert_attempt(&attempt).await?;
        Ok(attempt)
    }

    pub async fn get_attempt(&self, id: Uuid) -> EngineResult<Attempt> {
        self.db
            .get_attempt(id)
            .await?
            .ok_or_else(|| EngineError::not_found("Attempt", id))
    }

    pub async fn submit_answer(&self, attempt_id: Uuid, answer: SubmittedAnswer) -> EngineResult<Attempt> {
        let attempt = self.get_attempt(attempt_id).await?;
        self.engine.validate_answer(&attempt, &answer)?;

        // the store re-checks status and uniqueness in the same statement
        self.db.append_answer(attempt_id, &answer).await?;

        let mut updated = attempt;
        updated.answers.push(answer);
        Ok(updated)
    }

    /// Grades the attempt and stores the result. Only the first completion wins.
    pub async fn complete_attempt(&self, attempt_id: Uuid) -> EngineResult<Attempt> {
        let started = Instant::now();
        log_service_start!(SERVICE, "complete_attempt", attempt_id = attempt_id);

        let mut round = 1;
        loop {
            let attempt = self.get_attempt(attempt_id).await?;
            let assessment = self.get_assessment(attempt.assessment_id).await?;
            let now = self.clock.now();
            let (_, result) = self.engine.grade_attempt(&attempt, &assessment, now)?;

            match self
                .db
                .mark_completed(attempt_id, &result, attempt.answers.len(), now)
                .await
            {
                Ok(completed) => {
                    log_service_success!(
                        SERVICE,
                        "complete_attempt",
                        attempt_id = attempt_id,
                        duration_ms = started.elapsed().as_millis() as u64
                    );
                    return Ok(completed);
                }
                Err(EngineError::Conflict { .. }) if round < MAX_GRADING_ATTEMPTS => {
                    log_service_warn!(SERVICE, "complete_attempt", attempt = round, "answers changed, regrading");
                    round += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub async fn list_attempts(&self, user_id: Uuid) -> EngineResult<Vec<Attempt>> {
        self.db.list_attempts(user_id).await
    }

    // Sessions

    pub async fn start_session(&self, user_id: Uuid) -> EngineResult<StudySession> {
        let session = StudySession::start(user_id, self.clock.now());
        self.db.insert_session(&session).await?;
        Ok(session)
    }

    pub async fn finish_session(&self, id: Uuid, request: FinishSessionRequest) -> EngineResult<StudySession> {
        let session = self
            .db
            .get_session(id)
            .await?
            .ok_or_else(|| EngineError::not_found("Session", id))?;

        let finished = self.engine.finish_session(
            &session,
            request.cards_reviewed,
            request.cards_correct,
            self.clock.now(),
        )?;
        self.db.finalize_session(&finished).await
    }

    pub async fn list_sessions(&self, user_id: Uuid) -> EngineResult<Vec<StudySession>> {
        self.db.list_by_user(user_id).await
    }

    pub async fn current_streak(&self, user_id: Uuid) -> EngineResult<u32> {
        let sessions = self.db.list_by_user(user_id).await?;
        Ok(self.engine.current_streak(&sessions, self.clock.now()))
    }

    pub async fn analytics(&self, user_id: Uuid) -> EngineResult<StudyAnalytics> {
        let cards = self.db.list_cards(user_id).await?;
        let sessions = self.db.list_by_user(user_id).await?;
        let attempts = self.db.list_attempts(user_id).await?;
        Ok(self
            .engine
            .analytics(&cards, &sessions, &attempts, self.clock.now()))
    }

    // Content import

    fn content_generator(&self) -> EngineResult<&Arc<dyn ContentGenerator>> {
        self.content
            .as_ref()
            .ok_or_else(|| EngineError::ContentService("Content service is not configured".to_string()))
    }

    pub async fn import_flashcards(&self, request: ImportFlashcardsRequest) -> EngineResult<Vec<Card>> {
        if request.text.trim().is_empty() {
            return Err(EngineError::validation("Source text must not be empty"));
        }
        let generator = self.content_generator()?;
        let started = Instant::now();
        log_content_operation!(
            start,
            "generate_flashcards",
            service = generator.service_name(),
            text_length = request.text.len()
        );

        let drafts = generator
            .generate_flashcards(
                &request.text,
                request.count.unwrap_or(DEFAULT_IMPORT_COUNT),
                request.difficulty.unwrap_or(Difficulty::Medium),
            )
            .await
            .inspect_err(|e| {
                log_content_operation!(
                    error,
                    "generate_flashcards",
                    service = generator.service_name(),
                    error = e
                );
            })?;

        // every draft is checked before anything is stored
        let now = self.clock.now();
        let cards = drafts
            .into_iter()
            .map(|draft| {
                self.new_card(
                    CreateCardRequest {
                        user_id: request.user_id,
                        front: draft.front,
                        back: draft.back,
                        context: draft.context,
                        difficulty: Some(draft.difficulty),
                    },
                    now,
                )
            })
            .collect::<EngineResult<Vec<Card>>>()?;
        self.db.insert_cards(&cards).await?;

        let elapsed = started.elapsed();
        log_content_operation!(
            success,
            "generate_flashcards",
            service = generator.service_name(),
            count = cards.len(),
            duration_ms = elapsed.as_millis() as u64
        );
        log_performance!(
            "import_flashcards",
            duration_ms = elapsed.as_millis() as u64,
            throughput = cards.len() as f64 / elapsed.as_secs_f64().max(0.001)
        );
        Ok(cards)
    }

    pub async fn generate_assessment(&self, request: GenerateAssessmentRequest) -> EngineResult<Assessment> {
        if request.text.trim().is_empty() {
            return Err(EngineError::validation("Source text must not be empty"));
        }
        let generator = self.content_generator()?;
        let started = Instant::now();
        log_content_operation!(
            start,
            "generate_quiz",
            service = generator.service_name(),
            text_length = request.text.len()
        );

        let questions = generator
            .generate_quiz(
                &request.text,
                request.question_count.unwrap_or(DEFAULT_IMPORT_COUNT),
                request.difficulty.unwrap_or(Difficulty::Medium),
            )
            .await
            .inspect_err(|e| {
                log_content_operation!(error, "generate_quiz", service = generator.service_name(), error = e);
            })?;

        log_content_operation!(
            success,
            "generate_quiz",
            service = generator.service_name(),
            count = questions.len(),
            duration_ms = started.elapsed().as_millis() as u64
        );

        self.create_assessment(CreateAssessmentRequest {
            user_id: request.user_id,
            title: request.title,
            passing_score: request.passing_score,
            questions,
        })
        .await
    }

    pub async fn content_health(&self) -> EngineResult<ContentServiceHealth> {
        self.content_generator()?.health().await
    }
}

fn validate_assessment(title: &str, questions: &[Question], passing_score: f64) -> EngineResult<()> {
    if title.trim().is_empty() {
        return Err(EngineError::validation("Assessment title must not be empty"));
    }
    if questions.is_empty() {
        return Err(EngineError::validation("Assessment must contain at least one question"));
    }
    if !(0.0..=100.0).contains(&passing_score) {
        return Err(EngineError::validation(format!(
            "Passing score must be between 0 and 100, got {}",
            passing_score
        )));
    }

    let mut seen = HashSet::new();
    for question in questions {
        if question.id.trim().is_empty() {
            return Err(EngineError::validation("Question id must not be empty"));
        }
        if !seen.insert(question.id.as_str()) {
            return Err(EngineError::validation(format!(
                "Duplicate question id '{}'",
                question.id
            )));
        }
        if question.points == 0 {
            return Err(EngineError::validation(format!(
                "Question '{}' must be worth at least one point",
                question.id
            )));
        }
    }
    Ok(())
}
