use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info};

use crate::errors::{EngineError, EngineResult};
use crate::models::{Difficulty, Question, QuestionType};

/// Candidate flashcard produced by the content service, not yet owned by a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardDraft {
    pub front: String,
    pub back: String,
    pub context: Option<String>,
    pub difficulty: Difficulty,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentServiceHealth {
    pub status: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub nlp_model: Option<String>,
}

/// Turns source text into flashcards and quiz questions.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate_flashcards(
        &self,
        text: &str,
        count: usize,
        difficulty: Difficulty,
    ) -> EngineResult<Vec<CardDraft>>;

    async fn generate_quiz(
        &self,
        text: &str,
        question_count: usize,
        difficulty: Difficulty,
    ) -> EngineResult<Vec<Question>>;

    async fn health(&self) -> EngineResult<ContentServiceHealth>;

    fn service_name(&self) -> &str;
}

// Wire format of the NLP service

#[derive(Debug, Serialize)]
struct FlashcardRequest<'a> {
    text: &'a str,
    count: usize,
    difficulty: &'a str,
}

#[derive(Debug, Serialize)]
struct QuizRequest<'a> {
    text: &'a str,
    question_count: usize,
    quiz_type: &'a str,
    difficulty: &'a str,
}

#[derive(Debug, Deserialize)]
struct FlashcardResponse {
    flashcards: Vec<GeneratedFlashcard>,
}

#[derive(Debug, Deserialize)]
struct GeneratedFlashcard {
    front: String,
    back: String,
    #[serde(default)]
    context: Option<String>,
    #[serde(default = "default_difficulty")]
    difficulty: String,
}

#[derive(Debug, Deserialize)]
struct QuizResponse {
    questions: Vec<GeneratedQuestion>,
}

#[derive(Debug, Deserialize)]
struct GeneratedQuestion {
    question_id: serde_json::Value,
    question_text: String,
    question_type: QuestionType,
    #[serde(default)]
    options: Option<Vec<String>>,
    correct_answer: serde_json::Value,
    #[serde(default)]
    explanation: Option<String>,
    #[serde(default = "default_difficulty")]
    difficulty: String,
    #[serde(default)]
    points: Option<u32>,
}

fn default_difficulty() -> String {
    "medium".to_string()
}

/// Points the NLP service awards when a question carries none.
fn default_points(question_type: QuestionType) -> u32 {
    match question_type {
        QuestionType::MultipleChoice => 10,
        QuestionType::TrueFalse => 5,
        QuestionType::ShortAnswer => 10,
    }
}

impl GeneratedFlashcard {
    fn into_draft(self) -> EngineResult<CardDraft> {
        Ok(CardDraft {
            front: self.front,
            back: self.back,
            context: self.context.filter(|c| !c.trim().is_empty()),
            difficulty: self.difficulty.parse()?,
        })
    }
}

impl GeneratedQuestion {
    fn into_question(self) -> EngineResult<Question> {
        let id = match self.question_id {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        };

        Ok(Question {
            id,
            prompt: self.question_text,
            question_type: self.question_type,
            options: self.options,
            correct_answer: self.correct_answer,
            points: self.points.unwrap_or_else(|| default_points(self.question_type)),
            difficulty: self.difficulty.parse()?,
            explanation: self.explanation,
        })
    }
}

/// Parses a `/generate-flashcards` body.
pub fn parse_flashcards(body: &str) -> EngineResult<Vec<CardDraft>> {
    let response: FlashcardResponse = serde_json::from_str(body)
        .map_err(|e| EngineError::ContentService(format!("Malformed flashcard response: {}", e)))?;
    response.flashcards.into_iter().map(GeneratedFlashcard::into_draft).collect()
}

/// Parses a `/generate-quiz` body.
pub fn parse_quiz(body: &str) -> EngineResult<Vec<Question>> {
    let response: QuizResponse = serde_json::from_str(body)
        .map_err(|e| EngineError::ContentService(format!("Malformed quiz response: {}", e)))?;
    response.questions.into_iter().map(GeneratedQuestion::into_question).collect()
}

/// HTTP client for the StudyPal NLP service.
#[derive(Debug, Clone)]
pub struct ContentClient {
    client: Client,
    base_url: String,
}

impl ContentClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post_json<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> EngineResult<String> {
        let url = format!("{}{}", self.base_url, path);
        info!(service = self.service_name(), url = %url, "Calling content service");

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| EngineError::ContentService(format!("Request to {} failed: {}", url, e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| EngineError::ContentService(format!("Reading response failed: {}", e)))?;

        if !status.is_success() {
            error!(
                service = self.service_name(),
                status = %status,
                error = %text,
                "Content service request failed"
            );
            return Err(EngineError::ContentService(format!(
                "Content service returned {}: {}",
                status, text
            )));
        }
        Ok(text)
    }
}

#[async_trait]
impl ContentGenerator for ContentClient {
    async fn generate_flashcards(
        &self,
        text: &str,
        count: usize,
        difficulty: Difficulty,
    ) -> EngineResult<Vec<CardDraft>> {
        let body = self
            .post_json(
                "/generate-flashcards",
                &FlashcardRequest {
                    text,
                    count,
                    difficulty: difficulty.as_str(),
                },
            )
            .await?;

        let drafts = parse_flashcards(&body)?;
        info!(service = self.service_name(), count = drafts.len(), "Received flashcards");
        Ok(drafts)
    }

    async fn generate_quiz(
        &self,
        text: &str,
        question_count: usize,
        difficulty: Difficulty,
    ) -> EngineResult<Vec<Question>> {
        let body = self
            .post_json(
                "/generate-quiz",
                &QuizRequest {
                    text,
                    question_count,
                    quiz_type: "multiple_choice",
                    difficulty: difficulty.as_str(),
                },
            )
            .await?;

        let questions = parse_quiz(&body)?;
        info!(service = self.service_name(), count = questions.len(), "Received quiz questions");
        Ok(questions)
    }

    async fn health(&self) -> EngineResult<ContentServiceHealth> {
        let url = format!("{}/health", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| EngineError::ContentService(format!("Health check failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(EngineError::ContentService(format!(
                "Content service unhealthy: {}",
                response.status()
            )));
        }
        response
            .json()
            .await
            .map_err(|e| EngineError::ContentService(format!("Malformed health response: {}", e)))
    }

    fn service_name(&self) -> &str {
        "nlp-content-service"
    }
}
