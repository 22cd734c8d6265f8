use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::errors::{EngineError, EngineResult};
use crate::models::{Card, MemoryState, ReviewEvent, MIN_EASINESS_FACTOR};

/// Recall quality on the SM-2 scale, 0 (blackout) to 5 (perfect).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Quality(u8);

impl Quality {
    pub const MAX: u8 = 5;

    pub fn new(value: i32) -> EngineResult<Self> {
        if (0..=i32::from(Self::MAX)).contains(&value) {
            Ok(Quality(value as u8))
        } else {
            Err(EngineError::validation(format!(
                "Invalid quality {}: must be an integer between 0 and 5",
                value
            )))
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Qualities of 3 and above count as successful recall.
    pub fn is_correct(self) -> bool {
        self.0 >= 3
    }
}

impl TryFrom<i32> for Quality {
    type Error = EngineError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Quality::new(value)
    }
}

/// Everything a single review produces; the caller persists both halves together.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewOutcome {
    pub card: Card,
    pub event: ReviewEvent,
}

#[derive(Debug, Clone)]
pub struct Sm2Scheduler {
    initial_ease: f64,
}

impl Default for Sm2Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Sm2Scheduler {
    pub fn new() -> Self {
        Self { initial_ease: 2.5 }
    }

    pub fn initial_state(&self, now: DateTime<Utc>) -> MemoryState {
        MemoryState {
            easiness_factor: self.initial_ease,
            ..MemoryState::new(now)
        }
    }

    /// Pure SM-2 transition. History and counters are left to the caller.
    pub fn update(&self, state: &MemoryState, quality: Quality, now: DateTime<Utc>) -> MemoryState {
        let easiness_factor = Self::next_easiness(state.easiness_factor, quality);

        let (interval_days, repetitions) = if quality.is_correct() {
            let interval = match state.repetitions {
                0 => 1,
                1 => 6,
                _ => Self::scaled_interval(state.interval_days, easiness_factor),
            };
            (interval, state.repetitions.saturating_add(1))
        } else {
            (1, 0)
        };

        MemoryState {
            easiness_factor,
            interval_days,
            repetitions,
            next_review_at: now + Duration::days(i64::from(interval_days)),
            last_reviewed_at: Some(now),
        }
    }

    /// Applies a review to a card: new memory state, advanced counters and
    /// the event to append to the card's history.
    pub fn review(
        &self,
        card: &Card,
        quality: Quality,
        response_time_ms: u64,
        now: DateTime<Utc>,
    ) -> ReviewOutcome {
        let correct = quality.is_correct();

        let updated_card = Card {
            memory: self.update(&card.memory, quality, now),
            stats: card.stats.record(correct),
            ..card.clone()
        };

        let event = ReviewEvent {
            id: Uuid::new_v4(),
            card_id: card.id,
            quality: quality.value(),
            response_time_ms,
            reviewed_at: now,
            correct,
        };

        ReviewOutcome {
            card: updated_card,
            event,
        }
    }

    fn next_easiness(current: f64, quality: Quality) -> f64 {
        let miss = f64::from(Quality::MAX - quality.value());
        let next = current + (0.1 - miss * (0.08 + miss * 0.02));
        next.max(MIN_EASINESS_FACTOR)
    }

    fn scaled_interval(interval_days: u32, easiness_factor: f64) -> u32 {
        // `as` saturates on overflow
        (f64::from(interval_days) * easiness_factor).round().max(1.0) as u32
    }

    pub fn get_quality_from_int(quality: i32) -> Option<Quality> {
        Quality::new(quality).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Difficulty, ReviewStats};
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 9, 30, 0).unwrap()
    }

    fn create_test_card(now: DateTime<Utc>) -> Card {
        Card {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            front: "What does SM-2 stand for?".to_string(),
            back: "SuperMemo 2".to_string(),
            context: None,
            difficulty: Difficulty::Easy,
            archived: false,
            created_at: now,
            memory: MemoryState::new(now),
            stats: ReviewStats::default(),
            version: 0,
        }
    }

    fn q(value: i32) -> Quality {
        Quality::new(value).unwrap()
    }

    #[test]
    fn test_quality_conversion() {
        for value in 0..=5 {
            assert_eq!(Quality::new(value).unwrap().value(), value as u8);
        }

        assert!(Quality::new(-1).is_err());
        assert!(Quality::new(6).is_err());
        assert!(matches!(Quality::try_from(42), Err(EngineError::Validation(_))));
        assert_eq!(Sm2Scheduler::get_quality_from_int(100), None);
        assert!(q(3).is_correct());
        assert!(!q(2).is_correct());
    }

    #[test]
    fn test_first_review_quality_four_keeps_easiness() {
        let scheduler = Sm2Scheduler::new();
        let now = fixed_now();
        let state = MemoryState::new(now);

        let next = scheduler.update(&state, q(4), now);

        assert!((next.easiness_factor - 2.5).abs() < 1e-9);
        assert_eq!(next.interval_days, 1);
        assert_eq!(next.repetitions, 1);
        assert_eq!(next.next_review_at, now + Duration::days(1));
        assert_eq!(next.last_reviewed_at, Some(now));
    }

    #[test]
    fn test_second_and_third_review_intervals() {
        let scheduler = Sm2Scheduler::new();
        let now = fixed_now();

        let first = scheduler.update(&MemoryState::new(now), q(4), now);
        let second = scheduler.update(&first, q(4), now);
        assert_eq!(second.interval_days, 6);
        assert_eq!(second.repetitions, 2);

        let third = scheduler.update(&second, q(4), now);
        // 6 * 2.5 = 15
        assert_eq!(third.interval_days, 15);
        assert_eq!(third.repetitions, 3);
    }

    #[test]
    fn test_perfect_reviews_grow_strictly_after_six_days() {
        let scheduler = Sm2Scheduler::new();
        let now = fixed_now();
        let mut state = MemoryState::new(now);
        let mut intervals = Vec::new();

        for _ in 0..8 {
            state = scheduler.update(&state, q(5), now);
            intervals.push(state.interval_days);
        }

        assert_eq!(intervals[0], 1);
        assert_eq!(intervals[1], 6);
        for pair in intervals[1..].windows(2) {
            assert!(pair[1] > pair[0], "intervals not increasing: {:?}", intervals);
        }
    }

    #[test]
    fn test_failure_resets_progress() {
        let scheduler = Sm2Scheduler::new();
        let now = fixed_now();
        let state = MemoryState {
            easiness_factor: 2.2,
            interval_days: 40,
            repetitions: 7,
            next_review_at: now,
            last_reviewed_at: Some(now - Duration::days(40)),
        };

        for quality in 0..3 {
            let next = scheduler.update(&state, q(quality), now);
            assert_eq!(next.repetitions, 0);
            assert_eq!(next.interval_days, 1);
            assert!(next.easiness_factor < state.easiness_factor);
        }
    }

    #[test]
    fn test_easiness_floor_under_repeated_blackouts() {
        let scheduler = Sm2Scheduler::new();
        let now = fixed_now();
        let mut state = MemoryState::new(now);

        for _ in 0..20 {
            state = scheduler.update(&state, q(0), now);
            assert!(state.easiness_factor >= MIN_EASINESS_FACTOR);
        }

        assert!((state.easiness_factor - MIN_EASINESS_FACTOR).abs() < 1e-9);
    }

    #[test]
    fn test_review_produces_event_and_counters() {
        let scheduler = Sm2Scheduler::new();
        let now = fixed_now();
        let card = create_test_card(now);

        let outcome = scheduler.review(&card, q(2), 3400, now);
        assert_eq!(outcome.card.stats.times_reviewed, 1);
        assert_eq!(outcome.card.stats.times_incorrect, 1);
        assert_eq!(outcome.card.stats.times_correct, 0);
        assert_eq!(outcome.event.card_id, card.id);
        assert_eq!(outcome.event.quality, 2);
        assert!(!outcome.event.correct);
        assert_eq!(outcome.event.response_time_ms, 3400);

        // the input card is untouched
        assert_eq!(card.stats.times_reviewed, 0);
        assert_eq!(outcome.card.version, card.version);
        assert_eq!(outcome.card.front, card.front);
    }
}
