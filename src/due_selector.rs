use chrono::{DateTime, Utc};

use crate::models::Card;

pub const DEFAULT_DUE_LIMIT: usize = 50;

/// Picks the cards that should be reviewed now.
#[derive(Debug, Clone)]
pub struct DueSelector {
    limit: usize,
}

impl Default for DueSelector {
    fn default() -> Self {
        Self::new(DEFAULT_DUE_LIMIT)
    }
}

impl DueSelector {
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Due cards with the configured cap applied.
    pub fn select(&self, cards: &[Card], now: DateTime<Utc>) -> Vec<Card> {
        select_due(cards, now, self.limit)
    }
}

/// Returns at most `limit` non-archived cards whose next review is at or
/// before `now`, soonest-due first. Ties are broken by creation time and
/// then id so the order is stable across calls.
pub fn select_due(cards: &[Card], now: DateTime<Utc>, limit: usize) -> Vec<Card> {
    let mut due: Vec<&Card> = cards
        .iter()
        .filter(|card| !card.archived && card.memory.is_due(now))
        .collect();

    due.sort_by(|a, b| {
        a.memory
            .next_review_at
            .cmp(&b.memory.next_review_at)
            .then_with(|| a.created_at.cmp(&b.created_at))
            .then_with(|| a.id.cmp(&b.id))
    });

    due.into_iter().take(limit).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Difficulty, MemoryState, ReviewStats};
    use chrono::{Duration, TimeZone};
    use uuid::Uuid;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn card_due_at(next_review_at: DateTime<Utc>) -> Card {
        Card {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            front: "front".to_string(),
            back: "back".to_string(),
            context: None,
            difficulty: Difficulty::Medium,
            archived: false,
            created_at: now() - Duration::days(30),
            memory: MemoryState {
                next_review_at,
                ..MemoryState::new(now())
            },
            stats: ReviewStats::default(),
            version: 0,
        }
    }

    #[test]
    fn test_only_due_cards_are_selected() {
        let overdue = card_due_at(now() - Duration::days(2));
        let exactly_now = card_due_at(now());
        let future = card_due_at(now() + Duration::seconds(1));

        let due = select_due(&[future.clone(), overdue.clone(), exactly_now.clone()], now(), 50);

        let ids: Vec<Uuid> = due.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![overdue.id, exactly_now.id]);
    }

    #[test]
    fn test_archived_cards_are_skipped() {
        let mut archived = card_due_at(now() - Duration::days(1));
        archived.archived = true;

        assert!(select_due(&[archived], now(), 50).is_empty());
    }

    #[test]
    fn test_limit_caps_result() {
        let cards: Vec<Card> = (0..10)
            .map(|i| card_due_at(now() - Duration::hours(i)))
            .collect();

        let due = select_due(&cards, now(), 3);
        assert_eq!(due.len(), 3);
        // the three most overdue come first
        assert_eq!(due[0].id, cards[9].id);
        assert_eq!(due[1].id, cards[8].id);
        assert_eq!(due[2].id, cards[7].id);

        assert!(select_due(&cards, now(), 0).is_empty());
    }

    #[test]
    fn test_nothing_due_returns_empty() {
        let selector = DueSelector::default();
        assert_eq!(selector.limit(), DEFAULT_DUE_LIMIT);
        assert!(selector.select(&[], now()).is_empty());
        assert!(
            selector
                .select(&[card_due_at(now() + Duration::days(3))], now())
                .is_empty()
        );
    }
}
