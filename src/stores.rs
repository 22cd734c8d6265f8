use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::{Arc, RwLock};
use uuid::Uuid;

use crate::errors::EngineResult;
use crate::models::{
    Assessment, Attempt, Card, GradedResult, ReviewEvent, StudySession, SubmittedAnswer,
};

/// Card persistence with per-card atomic read-modify-write.
#[async_trait]
pub trait CardStore: Send + Sync {
    async fn insert_card(&self, card: &Card) -> EngineResult<()>;

    /// Inserts every card or none of them.
    async fn insert_cards(&self, cards: &[Card]) -> EngineResult<()>;

    async fn get_card(&self, id: Uuid) -> EngineResult<Option<Card>>;

    async fn list_cards(&self, user_id: Uuid) -> EngineResult<Vec<Card>>;

    /// Non-archived cards of the user whose next review is at or before `now`.
    async fn list_due_candidates(&self, user_id: Uuid, now: DateTime<Utc>) -> EngineResult<Vec<Card>>;

    /// Stores the reviewed card and appends its event in one step. Fails with
    /// `Conflict` when the stored version no longer equals `expected_version`.
    async fn record_review(
        &self,
        card: &Card,
        expected_version: i64,
        event: &ReviewEvent,
    ) -> EngineResult<Card>;

    async fn set_archived(&self, id: Uuid, archived: bool) -> EngineResult<Option<Card>>;

    async fn list_review_events(&self, card_id: Uuid) -> EngineResult<Vec<ReviewEvent>>;
}

#[async_trait]
pub trait AssessmentStore: Send + Sync {
    async fn insert_assessment(&self, assessment: &Assessment) -> EngineResult<()>;

    async fn get_assessment(&self, id: Uuid) -> EngineResult<Option<Assessment>>;
}

#[async_trait]
pub trait AttemptStore: Send + Sync {
    async fn insert_attempt(&self, attempt: &Attempt) -> EngineResult<()>;

    async fn get_attempt(&self, id: Uuid) -> EngineResult<Option<Attempt>>;

    async fn list_attempts(&self, user_id: Uuid) -> EngineResult<Vec<Attempt>>;

    /// Appends an answer while the attempt is still in progress.
    async fn append_answer(&self, attempt_id: Uuid, answer: &SubmittedAnswer) -> EngineResult<()>;

    /// Completes the attempt. A second completion fails with `AlreadyGraded`;
    /// `Conflict` when the stored answers no longer number `graded_answers`.
    async fn mark_completed(
        &self,
        id: Uuid,
        result: &GradedResult,
        graded_answers: usize,
        completed_at: DateTime<Utc>,
    ) -> EngineResult<Attempt>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert_session(&self, session: &StudySession) -> EngineResult<()>;

    async fn get_session(&self, id: Uuid) -> EngineResult<Option<StudySession>>;

    async fn list_by_user(&self, user_id: Uuid) -> EngineResult<Vec<StudySession>>;

    /// Writes the end of a session. A second finalization fails with `AlreadyFinalized`.
    async fn finalize_session(&self, session: &StudySession) -> EngineResult<StudySession>;
}

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for tests and replays.
#[derive(Debug, Clone)]
pub struct FixedClock {
    now: Arc<RwLock<DateTime<Utc>>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(RwLock::new(now)),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        let mut guard = self.now.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = now;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut guard = self.now.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = *guard + by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
