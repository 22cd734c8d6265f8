use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::errors::{EngineError, EngineResult};
use crate::models::{
    AnswerOutcome, Assessment, Attempt, AttemptStatus, Difficulty, GradedResult,
    PerformanceAnalysis, Question, SubmittedAnswer,
};

/// Strength recorded for every correctly answered hard question.
pub const HARD_QUESTION_STRENGTH: &str = "Complex concepts";

/// Weakness tag for a missed question of the given difficulty, e.g. "medium questions".
pub fn weakness_tag(difficulty: Difficulty) -> String {
    format!("{} questions", difficulty)
}

/// Question lookup table for one assessment.
#[derive(Debug, Clone)]
pub struct AnswerKey<'a> {
    assessment_id: Option<Uuid>,
    questions: HashMap<&'a str, &'a Question>,
    total_questions: u32,
    total_points: u32,
    passing_score: f64,
}

impl<'a> AnswerKey<'a> {
    pub fn new(questions: &'a [Question], passing_score: f64) -> Self {
        Self {
            assessment_id: None,
            questions: questions.iter().map(|q| (q.id.as_str(), q)).collect(),
            total_questions: questions.len() as u32,
            total_points: questions.iter().map(|q| q.points).sum(),
            passing_score,
        }
    }

    pub fn from_assessment(assessment: &'a Assessment) -> Self {
        Self {
            assessment_id: Some(assessment.id),
            ..Self::new(&assessment.questions, assessment.passing_score)
        }
    }

    pub fn question(&self, id: &str) -> Option<&'a Question> {
        self.questions.get(id).copied()
    }

    pub fn total_questions(&self) -> u32 {
        self.total_questions
    }
}

#[derive(Debug, Clone, Default)]
pub struct AssessmentGrader;

impl AssessmentGrader {
    pub fn new() -> Self {
        Self
    }

    /// Grades a finished set of answers. Rejects attempts that were already
    /// completed; an assessment without questions scores 0 and does not pass.
    pub fn grade(&self, attempt: &Attempt, key: &AnswerKey<'_>) -> EngineResult<GradedResult> {
        if attempt.is_completed() {
            return Err(EngineError::AlreadyGraded(attempt.id));
        }
        if let Some(assessment_id) = key.assessment_id {
            if assessment_id != attempt.assessment_id {
                return Err(EngineError::validation(format!(
                    "Attempt '{}' belongs to assessment '{}', not '{}'",
                    attempt.id, attempt.assessment_id, assessment_id
                )));
            }
        }
        Self::check_unique_answers(&attempt.answers)?;

        let mut correct_count = 0u32;
        let mut points_earned = 0u32;
        let mut total_time_secs = 0u64;
        let mut analysis = PerformanceAnalysis::default();
        let mut outcomes = Vec::with_capacity(attempt.answers.len());

        for answer in &attempt.answers {
            total_time_secs += u64::from(answer.time_spent_secs);

            let question = key.question(&answer.question_id);
            let correct = question.is_some_and(|q| q.correct_answer == answer.value);
            let points_awarded = match question {
                Some(q) if correct => q.points,
                _ => 0,
            };

            if correct {
                correct_count += 1;
                points_earned += points_awarded;
            }

            match question {
                Some(q) if correct && q.difficulty == Difficulty::Hard => {
                    analysis.strengths.insert(HARD_QUESTION_STRENGTH.to_string());
                }
                Some(q) if !correct => {
                    analysis.weaknesses.insert(weakness_tag(q.difficulty));
                }
                _ => {}
            }

            outcomes.push(AnswerOutcome {
                question_id: answer.question_id.clone(),
                correct,
                points_awarded,
                explanation: question.and_then(|q| q.explanation.clone()),
            });
        }

        let total_questions = key.total_questions();
        let score = if total_questions == 0 {
            0.0
        } else {
            f64::from(correct_count) / f64::from(total_questions) * 100.0
        };
        let passed = total_questions > 0 && score >= key.passing_score;

        Ok(GradedResult {
            score,
            passed,
            correct_count,
            total_questions,
            points_earned,
            total_points: key.total_points,
            total_time_secs,
            analysis,
            outcomes,
        })
    }

    /// Grades the attempt and returns it in its completed form.
    pub fn complete(
        &self,
        attempt: &Attempt,
        key: &AnswerKey<'_>,
        now: DateTime<Utc>,
    ) -> EngineResult<(Attempt, GradedResult)> {
        let result = self.grade(attempt, key)?;
        let completed = Attempt {
            status: AttemptStatus::Completed,
            completed_at: Some(now),
            result: Some(result.clone()),
            ..attempt.clone()
        };
        Ok((completed, result))
    }

    /// Checks that a new answer may be appended to an in-progress attempt.
    pub fn validate_submission(&self, attempt: &Attempt, answer: &SubmittedAnswer) -> EngineResult<()> {
        if attempt.is_completed() {
            return Err(EngineError::AlreadyGraded(attempt.id));
        }
        if answer.question_id.trim().is_empty() {
            return Err(EngineError::validation("Answer must reference a question id"));
        }
        if attempt
            .answers
            .iter()
            .any(|existing| existing.question_id == answer.question_id)
        {
            return Err(EngineError::validation(format!(
                "Question '{}' has already been answered in this attempt",
                answer.question_id
            )));
        }
        Ok(())
    }

    fn check_unique_answers(answers: &[SubmittedAnswer]) -> EngineResult<()> {
        let mut seen = HashSet::new();
        for answer in answers {
            if !seen.insert(answer.question_id.as_str()) {
                return Err(EngineError::validation(format!(
                    "Question '{}' was answered more than once",
                    answer.question_id
                )));
            }
        }
        Ok(())
    }
}
