use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::due_selector::{DueSelector, DEFAULT_DUE_LIMIT};
use crate::errors::{EngineError, EngineResult};
use crate::grader::{AnswerKey, AssessmentGrader};
use crate::models::{
    Assessment, Attempt, Card, GradedResult, StudySession, SubmittedAnswer, DEFAULT_PASSING_SCORE,
};
use crate::sm2_scheduler::{Quality, ReviewOutcome, Sm2Scheduler};
use crate::streak::{StreakCalculator, StreakPolicy};

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub due_limit: usize,
    pub default_passing_score: f64,
    pub streak: StreakCalculator,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            due_limit: DEFAULT_DUE_LIMIT,
            default_passing_score: DEFAULT_PASSING_SCORE,
            streak: StreakCalculator::new(StreakPolicy::default()),
        }
    }
}

/// Per-user summary derived from cards, sessions and attempts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyAnalytics {
    pub total_cards: usize,
    pub archived_cards: usize,
    pub due_now: usize,
    pub total_reviews: u32,
    pub correct_reviews: u32,
    pub review_accuracy: f64,
    pub current_streak: u32,
    pub sessions_completed: usize,
    pub total_study_minutes: i64,
    pub average_focus_score: Option<f64>,
    pub attempts_completed: usize,
    pub attempts_passed: usize,
    pub average_score: Option<f64>,
}

/// Stateless orchestration over snapshots supplied by the stores.
///
/// Nothing here touches storage or reads the wall clock: every
/// time-dependent call takes `now`.
#[derive(Debug, Clone)]
pub struct SchedulingEngine {
    scheduler: Sm2Scheduler,
    selector: DueSelector,
    grader: AssessmentGrader,
    config: EngineConfig,
}

impl Default for SchedulingEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl SchedulingEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            scheduler: Sm2Scheduler::new(),
            selector: DueSelector::new(config.due_limit),
            grader: AssessmentGrader::new(),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &Sm2Scheduler {
        &self.scheduler
    }

    /// Validates the raw quality before anything is computed.
    pub fn review_card(
        &self,
        card: &Card,
        quality: i32,
        response_time_ms: u64,
        now: DateTime<Utc>,
    ) -> EngineResult<ReviewOutcome> {
        let quality = Quality::new(quality)?;
        if i64::try_from(response_time_ms).is_err() {
            return Err(EngineError::validation(format!(
                "Response time {}ms is out of range",
                response_time_ms
            )));
        }
        if card.archived {
            return Err(EngineError::validation(format!(
                "Card '{}' is archived and cannot be reviewed",
                card.id
            )));
        }
        Ok(self.scheduler.review(card, quality, response_time_ms, now))
    }

    pub fn due_cards(&self, cards: &[Card], now: DateTime<Utc>, limit: Option<usize>) -> Vec<Card> {
        match limit {
            Some(limit) => crate::due_selector::select_due(cards, now, limit),
            None => self.selector.select(cards, now),
        }
    }

    pub fn validate_answer(&self, attempt: &Attempt, answer: &SubmittedAnswer) -> EngineResult<()> {
        self.grader.validate_submission(attempt, answer)
    }

    pub fn grade_attempt(
        &self,
        attempt: &Attempt,
        assessment: &Assessment,
        now: DateTime<Utc>,
    ) -> EngineResult<(Attempt, GradedResult)> {
        self.grader
            .complete(attempt, &AnswerKey::from_assessment(assessment), now)
    }

    pub fn current_streak(&self, sessions: &[StudySession], now: DateTime<Utc>) -> u32 {
        self.config.streak.compute_streak(sessions, now)
    }

    /// Closes a session exactly once, deriving its duration and focus score.
    pub fn finish_session(
        &self,
        session: &StudySession,
        cards_reviewed: u32,
        cards_correct: u32,
        now: DateTime<Utc>,
    ) -> EngineResult<StudySession> {
        if session.is_finalized() {
            return Err(EngineError::AlreadyFinalized(session.id));
        }
        if now < session.started_at {
            return Err(EngineError::validation(
                "Session cannot end before it started",
            ));
        }
        if cards_correct > cards_reviewed {
            return Err(EngineError::validation(format!(
                "cards_correct ({}) cannot exceed cards_reviewed ({})",
                cards_correct, cards_reviewed
            )));
        }

        Ok(StudySession {
            ended_at: Some(now),
            duration_minutes: Some((now - session.started_at).num_minutes()),
            cards_reviewed,
            cards_correct,
            focus_score: Some(focus_score(cards_reviewed, cards_correct)),
            ..session.clone()
        })
    }

    pub fn analytics(
        &self,
        cards: &[Card],
        sessions: &[StudySession],
        attempts: &[Attempt],
        now: DateTime<Utc>,
    ) -> StudyAnalytics {
        let total_reviews: u32 = cards.iter().map(|c| c.stats.times_reviewed).sum();
        let correct_reviews: u32 = cards.iter().map(|c| c.stats.times_correct).sum();

        let finished: Vec<&StudySession> = sessions.iter().filter(|s| s.is_finalized()).collect();
        let focus_scores: Vec<f64> = finished.iter().filter_map(|s| s.focus_score).collect();

        let scores: Vec<&GradedResult> = attempts
            .iter()
            .filter(|a| a.is_completed())
            .filter_map(|a| a.result.as_ref())
            .collect();

        StudyAnalytics {
            total_cards: cards.len(),
            archived_cards: cards.iter().filter(|c| c.archived).count(),
            due_now: cards
                .iter()
                .filter(|c| !c.archived && c.memory.is_due(now))
                .count(),
            total_reviews,
            correct_reviews,
            review_accuracy: percentage(correct_reviews, total_reviews),
            current_streak: self.current_streak(sessions, now),
            sessions_completed: finished.len(),
            total_study_minutes: finished.iter().filter_map(|s| s.duration_minutes).sum(),
            average_focus_score: mean(&focus_scores),
            attempts_completed: scores.len(),
            attempts_passed: scores.iter().filter(|r| r.passed).count(),
            average_score: mean(&scores.iter().map(|r| r.score).collect::<Vec<_>>()),
        }
    }
}

/// Share of reviewed cards answered correctly, 0 when nothing was reviewed.
pub fn focus_score(cards_reviewed: u32, cards_correct: u32) -> f64 {
    percentage(cards_correct, cards_reviewed)
}

fn percentage(part: u32, whole: u32) -> f64 {
    if whole == 0 {
        0.0
    } else {
        f64::from(part) / f64::from(whole) * 100.0
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        AttemptStatus, Difficulty, MemoryState, Question, QuestionType, ReviewStats,
    };
    use chrono::{Duration, TimeZone};
    use serde_json::json;
    use uuid::Uuid;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, 2, 8, 0, 0).unwrap()
    }

    fn card() -> Card {
        Card {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            front: "Capital of Peru?".to_string(),
            back: "Lima".to_string(),
            context: None,
            difficulty: Difficulty::Easy,
            archived: false,
            created_at: now() - Duration::days(3),
            memory: MemoryState::new(now() - Duration::days(3)),
            stats: ReviewStats::default(),
            version: 0,
        }
    }

    #[test]
    fn test_review_rejects_invalid_quality_without_changes() {
        let engine = SchedulingEngine::default();
        let card = card();

        let result = engine.review_card(&card, 9, 0, now());
        assert!(matches!(result, Err(EngineError::Validation(_))));
        assert_eq!(card.stats.times_reviewed, 0);
    }

    #[test]
    fn test_review_rejects_archived_card() {
        let engine = SchedulingEngine::default();
        let mut card = card();
        card.archived = true;

        assert!(engine.review_card(&card, 4, 0, now()).is_err());
    }

    #[test]
    fn test_review_rejects_response_time_beyond_i64() {
        let engine = SchedulingEngine::default();
        let card = card();

        let result = engine.review_card(&card, 4, u64::MAX, now());
        assert!(matches!(result, Err(EngineError::Validation(_))));
        assert!(engine.review_card(&card, 4, i64::MAX as u64, now()).is_ok());
    }

    #[test]
    fn test_reviewed_card_leaves_due_list() {
        let engine = SchedulingEngine::default();
        let card = card();
        assert_eq!(engine.due_cards(&[card.clone()], now(), None).len(), 1);

        let outcome = engine.review_card(&card, 5, 900, now()).unwrap();
        assert!(engine.due_cards(&[outcome.card.clone()], now(), None).is_empty());
        assert_eq!(
            engine
                .due_cards(&[outcome.card], now() + Duration::days(1), None)
                .len(),
            1
        );
    }

    #[test]
    fn test_finish_session_once() {
        let engine = SchedulingEngine::default();
        let session = StudySession::start(Uuid::nil(), now());

        let finished = engine
            .finish_session(&session, 20, 15, now() + Duration::minutes(25))
            .unwrap();
        assert_eq!(finished.duration_minutes, Some(25));
        assert_eq!(finished.focus_score, Some(75.0));

        let again = engine.finish_session(&finished, 1, 1, now() + Duration::minutes(30));
        assert!(matches!(again, Err(EngineError::AlreadyFinalized(_))));
    }

    #[test]
    fn test_finish_session_validates_counts_and_time() {
        let engine = SchedulingEngine::default();
        let session = StudySession::start(Uuid::nil(), now());

        assert!(engine.finish_session(&session, 3, 4, now()).is_err());
        assert!(
            engine
                .finish_session(&session, 3, 1, now() - Duration::minutes(1))
                .is_err()
        );

        let empty = engine.finish_session(&session, 0, 0, now()).unwrap();
        assert_eq!(empty.focus_score, Some(0.0));
    }

    #[test]
    fn test_analytics_summary() {
        let engine = SchedulingEngine::default();
        let reviewed = engine.review_card(&card(), 4, 500, now()).unwrap().card;
        let failed = engine.review_card(&card(), 1, 500, now()).unwrap().card;
        let mut archived = card();
        archived.archived = true;

        let session = engine
            .finish_session(
                &StudySession::start(Uuid::nil(), now() - Duration::minutes(10)),
                2,
                1,
                now(),
            )
            .unwrap();

        let assessment = Assessment {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            title: "Geography".to_string(),
            passing_score: 70.0,
            questions: vec![Question {
                id: "1".to_string(),
                prompt: "Capital of Peru?".to_string(),
                question_type: QuestionType::ShortAnswer,
                options: None,
                correct_answer: json!("Lima"),
                points: 10,
                difficulty: Difficulty::Easy,
                explanation: None,
            }],
            created_at: now(),
        };
        let attempt = Attempt {
            id: Uuid::new_v4(),
            assessment_id: assessment.id,
            user_id: Uuid::nil(),
            status: AttemptStatus::InProgress,
            answers: vec![SubmittedAnswer {
                question_id: "1".to_string(),
                value: json!("Lima"),
                time_spent_secs: 4,
            }],
            started_at: now(),
            completed_at: None,
            result: None,
        };
        let (graded, _) = engine.grade_attempt(&attempt, &assessment, now()).unwrap();

        let stats = engine.analytics(
            &[reviewed, failed, archived],
            &[session],
            &[graded, attempt],
            now(),
        );

        assert_eq!(stats.total_cards, 3);
        assert_eq!(stats.archived_cards, 1);
        // failed card is due again tomorrow, not now
        assert_eq!(stats.due_now, 0);
        assert_eq!(stats.total_reviews, 2);
        assert_eq!(stats.review_accuracy, 50.0);
        assert_eq!(stats.current_streak, 1);
        assert_eq!(stats.sessions_completed, 1);
        assert_eq!(stats.total_study_minutes, 10);
        assert_eq!(stats.average_focus_score, Some(50.0));
        assert_eq!(stats.attempts_completed, 1);
        assert_eq!(stats.attempts_passed, 1);
        assert_eq!(stats.average_score, Some(100.0));
    }
}
