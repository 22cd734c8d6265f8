use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::errors::EngineError;

pub const DEFAULT_EASINESS_FACTOR: f64 = 2.5;
pub const MIN_EASINESS_FACTOR: f64 = 1.3;
pub const DEFAULT_PASSING_SCORE: f64 = 70.0;

/// SM-2 scheduling state of a single card.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MemoryState {
    pub easiness_factor: f64,
    pub interval_days: u32,
    pub repetitions: u32,
    pub next_review_at: DateTime<Utc>,
    pub last_reviewed_at: Option<DateTime<Utc>>,
}

impl MemoryState {
    /// State of a card that has never been reviewed; it is due immediately.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            easiness_factor: DEFAULT_EASINESS_FACTOR,
            interval_days: 1,
            repetitions: 0,
            next_review_at: now,
            last_reviewed_at: None,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        now >= self.next_review_at
    }

    pub fn interval(&self) -> Duration {
        Duration::days(i64::from(self.interval_days))
    }
}

/// Aggregate review counters carried alongside a card's memory state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewStats {
    pub times_reviewed: u32,
    pub times_correct: u32,
    pub times_incorrect: u32,
}

impl ReviewStats {
    /// Returns the counters advanced by one review.
    pub fn record(self, correct: bool) -> Self {
        Self {
            times_reviewed: self.times_reviewed + 1,
            times_correct: self.times_correct + u32::from(correct),
            times_incorrect: self.times_incorrect + u32::from(!correct),
        }
    }

    /// Rebuilds the counters from a card's review history.
    pub fn from_events(events: &[ReviewEvent]) -> Self {
        events
            .iter()
            .fold(Self::default(), |stats, event| stats.record(event.correct))
    }

    pub fn accuracy(&self) -> f64 {
        if self.times_reviewed == 0 {
            0.0
        } else {
            f64::from(self.times_correct) / f64::from(self.times_reviewed) * 100.0
        }
    }
}

/// One recorded review. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewEvent {
    pub id: Uuid,
    pub card_id: Uuid,
    pub quality: u8,
    pub response_time_ms: u64,
    pub reviewed_at: DateTime<Utc>,
    pub correct: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(EngineError::validation(format!(
                "Unknown difficulty '{}', expected easy, medium or hard",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Card {
    pub id: Uuid,
    pub user_id: Uuid,
    pub front: String,
    pub back: String,
    pub context: Option<String>,
    pub difficulty: Difficulty,
    pub archived: bool,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub memory: MemoryState,
    #[serde(flatten)]
    pub stats: ReviewStats,
    /// Optimistic concurrency token, bumped on every stored review.
    pub version: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    MultipleChoice,
    TrueFalse,
    ShortAnswer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub prompt: String,
    pub question_type: QuestionType,
    #[serde(default)]
    pub options: Option<Vec<String>>,
    /// Compared by exact JSON equality, so `"True"` and `true` differ.
    pub correct_answer: serde_json::Value,
    pub points: u32,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assessment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub passing_score: f64,
    pub questions: Vec<Question>,
    pub created_at: DateTime<Utc>,
}

impl Assessment {
    pub fn total_points(&self) -> u32 {
        self.questions.iter().map(|q| q.points).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmittedAnswer {
    pub question_id: String,
    pub value: serde_json::Value,
    #[serde(default)]
    pub time_spent_secs: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    InProgress,
    Completed,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::InProgress => "in_progress",
            AttemptStatus::Completed => "completed",
        }
    }
}

impl FromStr for AttemptStatus {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(AttemptStatus::InProgress),
            "completed" => Ok(AttemptStatus::Completed),
            other => Err(EngineError::validation(format!(
                "Unknown attempt status '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerformanceAnalysis {
    pub strengths: BTreeSet<String>,
    pub weaknesses: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerOutcome {
    pub question_id: String,
    pub correct: bool,
    pub points_awarded: u32,
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradedResult {
    pub score: f64,
    pub passed: bool,
    pub correct_count: u32,
    pub total_questions: u32,
    pub points_earned: u32,
    pub total_points: u32,
    pub total_time_secs: u64,
    pub analysis: PerformanceAnalysis,
    pub outcomes: Vec<AnswerOutcome>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attempt {
    pub id: Uuid,
    pub assessment_id: Uuid,
    pub user_id: Uuid,
    pub status: AttemptStatus,
    pub answers: Vec<SubmittedAnswer>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result: Option<GradedResult>,
}

impl Attempt {
    pub fn is_completed(&self) -> bool {
        self.status == AttemptStatus::Completed
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudySession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i64>,
    pub cards_reviewed: u32,
    pub cards_correct: u32,
    pub focus_score: Option<f64>,
}

impl StudySession {
    pub fn start(user_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            started_at: now,
            ended_at: None,
            duration_minutes: None,
            cards_reviewed: 0,
            cards_correct: 0,
            focus_score: None,
        }
    }

    pub fn is_finalized(&self) -> bool {
        self.ended_at.is_some()
    }
}

// Request payloads

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCardRequest {
    pub user_id: Uuid,
    pub front: String,
    pub back: String,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewCardRequest {
    pub quality: i32,
    #[serde(default)]
    pub response_time_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAssessmentRequest {
    pub user_id: Uuid,
    pub title: String,
    #[serde(default)]
    pub passing_score: Option<f64>,
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartAttemptRequest {
    pub user_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartSessionRequest {
    pub user_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinishSessionRequest {
    pub cards_reviewed: u32,
    pub cards_correct: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportFlashcardsRequest {
    pub user_id: Uuid,
    pub text: String,
    #[serde(default)]
    pub count: Option<usize>,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateAssessmentRequest {
    pub user_id: Uuid,
    pub title: String,
    pub text: String,
    #[serde(default)]
    pub question_count: Option<usize>,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    #[serde(default)]
    pub passing_score: Option<f64>,
}
