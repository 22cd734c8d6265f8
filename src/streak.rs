use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;

use crate::errors::EngineError;
use crate::models::StudySession;

/// Whether a streak survives a day on which the user has not studied yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreakPolicy {
    /// Activity yesterday keeps the streak alive until today ends.
    #[default]
    AllowYesterday,
    /// The streak is zero unless there was activity today.
    RequireToday,
}

impl FromStr for StreakPolicy {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "allow_yesterday" | "yesterday" => Ok(StreakPolicy::AllowYesterday),
            "require_today" | "today" | "strict" => Ok(StreakPolicy::RequireToday),
            other => Err(EngineError::validation(format!(
                "Unknown streak policy '{}'",
                other
            ))),
        }
    }
}

/// Counts consecutive calendar days with at least one study session.
#[derive(Debug, Clone, Copy)]
pub struct StreakCalculator {
    offset: FixedOffset,
    policy: StreakPolicy,
}

impl Default for StreakCalculator {
    fn default() -> Self {
        Self::new(StreakPolicy::default())
    }
}

impl StreakCalculator {
    /// Buckets days in UTC.
    pub fn new(policy: StreakPolicy) -> Self {
        Self::with_offset(policy, Utc.fix())
    }

    pub fn with_offset(policy: StreakPolicy, offset: FixedOffset) -> Self {
        Self { offset, policy }
    }

    pub fn policy(&self) -> StreakPolicy {
        self.policy
    }

    pub fn day_of(&self, timestamp: DateTime<Utc>) -> NaiveDate {
        timestamp.with_timezone(&self.offset).date_naive()
    }

    pub fn compute_streak(&self, sessions: &[StudySession], now: DateTime<Utc>) -> u32 {
        let days: BTreeSet<NaiveDate> = sessions
            .iter()
            .map(|session| self.day_of(session.started_at))
            .collect();
        self.streak_from_days(&days, self.day_of(now))
    }

    fn streak_from_days(&self, days: &BTreeSet<NaiveDate>, today: NaiveDate) -> u32 {
        let anchor = match self.policy {
            StreakPolicy::AllowYesterday if !days.contains(&today) => today - Duration::days(1),
            _ => today,
        };

        let mut streak = 0u32;
        // most recent first; days after the anchor are ignored
        for day in days.range(..=anchor).rev() {
            let expected = anchor - Duration::days(i64::from(streak));
            if *day == expected {
                streak += 1;
            } else {
                break;
            }
        }
        streak
    }
}

/// Streak with the default policy, bucketing days in UTC.
pub fn compute_streak(sessions: &[StudySession], now: DateTime<Utc>) -> u32 {
    StreakCalculator::default().compute_streak(sessions, now)
}
