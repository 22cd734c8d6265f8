use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use study_pal::*;
use uuid::Uuid;

fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
}

fn card_due_in(hours: i64, archived: bool, index: u128) -> Card {
    let created_at = base() - Duration::days(30) + Duration::minutes(index as i64);
    let mut memory = MemoryState::new(created_at);
    memory.next_review_at = base() + Duration::hours(hours);
    Card {
        id: Uuid::from_u128(index + 1),
        user_id: Uuid::nil(),
        front: format!("front {}", index),
        back: "back".to_string(),
        context: None,
        difficulty: Difficulty::Medium,
        archived,
        created_at,
        memory,
        stats: ReviewStats::default(),
        version: 0,
    }
}

proptest! {
    #[test]
    fn easiness_never_drops_below_floor(qualities in proptest::collection::vec(0i32..=5, 1..40)) {
        let scheduler = Sm2Scheduler::new();
        let mut state = scheduler.initial_state(base());
        let mut now = base();
        for q in qualities {
            state = scheduler.update(&state, Quality::new(q).unwrap(), now);
            prop_assert!(state.easiness_factor >= 1.3);
            prop_assert!(state.interval_days >= 1);
            prop_assert!(state.next_review_at > now);
            now = state.next_review_at;
        }
    }

    #[test]
    fn failing_quality_always_resets(prefix in proptest::collection::vec(3i32..=5, 0..10), fail in 0i32..3) {
        let scheduler = Sm2Scheduler::new();
        let mut state = scheduler.initial_state(base());
        for q in prefix {
            state = scheduler.update(&state, Quality::new(q).unwrap(), base());
        }
        let reset = scheduler.update(&state, Quality::new(fail).unwrap(), base());
        prop_assert_eq!(reset.repetitions, 0);
        prop_assert_eq!(reset.interval_days, 1);
    }

    #[test]
    fn out_of_range_quality_is_rejected(q in prop_oneof![i32::MIN..0, 6..i32::MAX]) {
        prop_assert!(Quality::new(q).is_err());
    }

    #[test]
    fn due_selection_is_bounded_sorted_and_due(
        offsets in proptest::collection::vec((-72i64..72, any::<bool>()), 0..30),
        limit in 0usize..20,
    ) {
        let cards: Vec<Card> = offsets
            .iter()
            .enumerate()
            .map(|(i, (hours, archived))| card_due_in(*hours, *archived, i as u128))
            .collect();

        let due = select_due(&cards, base(), limit);
        let eligible = cards
            .iter()
            .filter(|c| !c.archived && c.memory.next_review_at <= base())
            .count();

        prop_assert_eq!(due.len(), eligible.min(limit));
        prop_assert!(due.iter().all(|c| !c.archived && c.memory.next_review_at <= base()));
        prop_assert!(due.windows(2).all(|w| w[0].memory.next_review_at <= w[1].memory.next_review_at));
    }

    #[test]
    fn streak_ignores_session_order(days in proptest::collection::vec(0i64..10, 0..15), seed in any::<u64>()) {
        let sessions: Vec<StudySession> = days
            .iter()
            .map(|d| StudySession::start(Uuid::nil(), base() - Duration::days(*d)))
            .collect();

        let mut shuffled = sessions.clone();
        let len = shuffled.len();
        if len > 1 {
            shuffled.rotate_left((seed as usize) % len);
            shuffled.reverse();
        }

        let streak = compute_streak(&sessions, base());
        prop_assert_eq!(streak, compute_streak(&shuffled, base()));
        prop_assert!(streak as usize <= days.len());
    }

    #[test]
    fn grade_score_is_a_percentage(answers in proptest::collection::vec(any::<bool>(), 0..20)) {
        let questions: Vec<Question> = (0..answers.len())
            .map(|i| Question {
                id: i.to_string(),
                prompt: format!("q{}", i),
                question_type: QuestionType::TrueFalse,
                options: None,
                correct_answer: serde_json::json!(true),
                points: 5,
                difficulty: Difficulty::Easy,
                explanation: None,
            })
            .collect();
        let attempt = Attempt {
            id: Uuid::new_v4(),
            assessment_id: Uuid::nil(),
            user_id: Uuid::nil(),
            status: AttemptStatus::InProgress,
            answers: answers
                .iter()
                .enumerate()
                .map(|(i, value)| SubmittedAnswer {
                    question_id: i.to_string(),
                    value: serde_json::json!(value),
                    time_spent_secs: 1,
                })
                .collect(),
            started_at: base(),
            completed_at: None,
            result: None,
        };

        let key = AnswerKey::new(&questions, 70.0);
        let result = AssessmentGrader::new().grade(&attempt, &key).unwrap();
        let correct = answers.iter().filter(|a| **a).count() as u32;

        prop_assert!((0.0..=100.0).contains(&result.score));
        prop_assert_eq!(result.correct_count, correct);
        prop_assert_eq!(result.points_earned, correct * 5);
        prop_assert_eq!(result.passed, !answers.is_empty() && result.score >= 70.0);
    }
}
