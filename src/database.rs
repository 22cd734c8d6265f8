use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use std::time::Instant;
use uuid::Uuid;

use crate::errors::{EngineError, EngineResult};
use crate::models::*;
use crate::stores::{AssessmentStore, AttemptStore, CardStore, SessionStore};

// Import logging macros
use crate::log_db_operation;

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> EngineResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

        // every connection to `:memory:` opens its own database, so keep exactly one alive
        let pool = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new().connect_with(options).await?
        };

        let db = Database { pool };
        db.migrate().await?;
        Ok(db)
    }

    async fn migrate(&self) -> EngineResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS cards (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                front TEXT NOT NULL,
                back TEXT NOT NULL,
                context TEXT,
                difficulty TEXT NOT NULL DEFAULT 'medium',
                archived BOOLEAN NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                easiness_factor REAL NOT NULL DEFAULT 2.5,
                interval_days INTEGER NOT NULL DEFAULT 1,
                repetitions INTEGER NOT NULL DEFAULT 0,
                next_review_at TEXT NOT NULL,
                last_reviewed_at TEXT,
                times_reviewed INTEGER NOT NULL DEFAULT 0,
                times_correct INTEGER NOT NULL DEFAULT 0,
                times_incorrect INTEGER NOT NULL DEFAULT 0,
                version INTEGER NOT NULL DEFAULT 0
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_cards_user_due ON cards (user_id, archived, next_review_at)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS review_events (
                id TEXT PRIMARY KEY,
                card_id TEXT NOT NULL,
                quality INTEGER NOT NULL,
                response_time_ms INTEGER NOT NULL,
                reviewed_at TEXT NOT NULL,
                correct BOOLEAN NOT NULL,
                FOREIGN KEY (card_id) REFERENCES cards(id) ON DELETE CASCADE
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS assessments (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                title TEXT NOT NULL,
                passing_score REAL NOT NULL,
                questions TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS attempts (
                id TEXT PRIMARY KEY,
                assessment_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'in_progress',
                started_at TEXT NOT NULL,
                completed_at TEXT,
                result TEXT,
                FOREIGN KEY (assessment_id) REFERENCES assessments(id) ON DELETE CASCADE
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS attempt_answers (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                attempt_id TEXT NOT NULL,
                question_id TEXT NOT NULL,
                value TEXT NOT NULL,
                time_spent_secs INTEGER NOT NULL DEFAULT 0,
                UNIQUE (attempt_id, question_id),
                FOREIGN KEY (attempt_id) REFERENCES attempts(id) ON DELETE CASCADE
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS study_sessions (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                started_at TEXT NOT NULL,
                ended_at TEXT,
                duration_minutes INTEGER,
                cards_reviewed INTEGER NOT NULL DEFAULT 0,
                cards_correct INTEGER NOT NULL DEFAULT 0,
                focus_score REAL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        log_db_operation!(info, "migrate", "schema ready");
        Ok(())
    }

    fn row_to_card(row: &SqliteRow) -> EngineResult<Card> {
        Ok(Card {
            id: parse_uuid(&row.try_get::<String, _>("id")?)?,
            user_id: parse_uuid(&row.try_get::<String, _>("user_id")?)?,
            front: row.try_get("front")?,
            back: row.try_get("back")?,
            context: row.try_get("context")?,
            difficulty: row.try_get::<String, _>("difficulty")?.parse()?,
            archived: row.try_get("archived")?,
            created_at: parse_timestamp(&row.try_get::<String, _>("created_at")?)?,
            memory: MemoryState {
                easiness_factor: row.try_get("easiness_factor")?,
                interval_days: to_u32("interval_days", row.try_get("interval_days")?)?,
                repetitions: to_u32("repetitions", row.try_get("repetitions")?)?,
                next_review_at: parse_timestamp(&row.try_get::<String, _>("next_review_at")?)?,
                last_reviewed_at: row
                    .try_get::<Option<String>, _>("last_reviewed_at")?
                    .map(|s| parse_timestamp(&s))
                    .transpose()?,
            },
            stats: ReviewStats {
                times_reviewed: to_u32("times_reviewed", row.try_get("times_reviewed")?)?,
                times_correct: to_u32("times_correct", row.try_get("times_correct")?)?,
                times_incorrect: to_u32("times_incorrect", row.try_get("times_incorrect")?)?,
            },
            version: row.try_get("version")?,
        })
    }

    fn rows_to_cards(rows: Vec<SqliteRow>) -> EngineResult<Vec<Card>> {
        rows.iter().map(Self::row_to_card).collect()
    }

    fn row_to_session(row: &SqliteRow) -> EngineResult<StudySession> {
        Ok(StudySession {
            id: parse_uuid(&row.try_get::<String, _>("id")?)?,
            user_id: parse_uuid(&row.try_get::<String, _>("user_id")?)?,
            started_at: parse_timestamp(&row.try_get::<String, _>("started_at")?)?,
            ended_at: row
                .try_get::<Option<String>, _>("ended_at")?
                .map(|s| parse_timestamp(&s))
                .transpose()?,
            duration_minutes: row.try_get("duration_minutes")?,
            cards_reviewed: to_u32("cards_reviewed", row.try_get("cards_reviewed")?)?,
            cards_correct: to_u32("cards_correct", row.try_get("cards_correct")?)?,
            focus_score: row.try_get("focus_score")?,
        })
    }

    async fn load_answers(&self, attempt_id: Uuid) -> EngineResult<Vec<SubmittedAnswer>> {
        let rows = sqlx::query(
            "SELECT question_id, value, time_spent_secs FROM attempt_answers WHERE attempt_id = ?1 ORDER BY seq ASC",
        )
        .bind(attempt_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> EngineResult<SubmittedAnswer> {
                Ok(SubmittedAnswer {
                    question_id: row.try_get("question_id")?,
                    value: serde_json::from_str(&row.try_get::<String, _>("value")?)?,
                    time_spent_secs: to_u32("time_spent_secs", row.try_get("time_spent_secs")?)?,
                })
            })
            .collect()
    }

    async fn row_to_attempt(&self, row: &SqliteRow) -> EngineResult<Attempt> {
        let id = parse_uuid(&row.try_get::<String, _>("id")?)?;
        let result = match row.try_get::<Option<String>, _>("result")? {
            Some(json) => Some(serde_json::from_str(&json)?),
            None => None,
        };

        Ok(Attempt {
            id,
            assessment_id: parse_uuid(&row.try_get::<String, _>("assessment_id")?)?,
            user_id: parse_uuid(&row.try_get::<String, _>("user_id")?)?,
            status: row.try_get::<String, _>("status")?.parse()?,
            answers: self.load_answers(id).await?,
            started_at: parse_timestamp(&row.try_get::<String, _>("started_at")?)?,
            completed_at: row
                .try_get::<Option<String>, _>("completed_at")?
                .map(|s| parse_timestamp(&s))
                .transpose()?,
            result,
        })
    }

    async fn attempt_status(&self, id: Uuid) -> EngineResult<Option<AttemptStatus>> {
        let status = sqlx::query_scalar::<_, String>("SELECT status FROM attempts WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        status.map(|s| s.parse()).transpose()
    }
}

#[async_trait]
impl CardStore for Database {
    async fn insert_card(&self, card: &Card) -> EngineResult<()> {
        self.insert_cards(std::slice::from_ref(card)).await
    }

    async fn insert_cards(&self, cards: &[Card]) -> EngineResult<()> {
        let started = Instant::now();
        let mut tx = self.pool.begin().await?;

        for card in cards {
            sqlx::query(
                r#"
                INSERT INTO cards (id, user_id, front, back, context, difficulty, archived, created_at,
                                   easiness_factor, interval_days, repetitions, next_review_at, last_reviewed_at,
                                   times_reviewed, times_correct, times_incorrect, version)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
                "#,
            )
            .bind(card.id.to_string())
            .bind(card.user_id.to_string())
            .bind(&card.front)
            .bind(&card.back)
            .bind(&card.context)
            .bind(card.difficulty.as_str())
            .bind(card.archived)
            .bind(format_timestamp(card.created_at))
            .bind(card.memory.easiness_factor)
            .bind(i64::from(card.memory.interval_days))
            .bind(i64::from(card.memory.repetitions))
            .bind(format_timestamp(card.memory.next_review_at))
            .bind(card.memory.last_reviewed_at.map(format_timestamp))
            .bind(i64::from(card.stats.times_reviewed))
            .bind(i64::from(card.stats.times_correct))
            .bind(i64::from(card.stats.times_incorrect))
            .bind(card.version)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        log_db_operation!(
            debug,
            "insert_cards",
            count = cards.len(),
            duration_ms = started.elapsed().as_millis() as u64
        );
        Ok(())
    }

    async fn get_card(&self, id: Uuid) -> EngineResult<Option<Card>> {
        let row = sqlx::query("SELECT * FROM cards WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_card).transpose()
    }

    async fn list_cards(&self, user_id: Uuid) -> EngineResult<Vec<Card>> {
        let rows = sqlx::query("SELECT * FROM cards WHERE user_id = ?1 ORDER BY created_at DESC")
            .bind(user_id.to_string())
            .fetch_all(&self.pool)
            .await?;

        Self::rows_to_cards(rows)
    }

    async fn list_due_candidates(&self, user_id: Uuid, now: DateTime<Utc>) -> EngineResult<Vec<Card>> {
        let started = Instant::now();
        let rows = sqlx::query(
            "SELECT * FROM cards WHERE user_id = ?1 AND archived = 0 AND next_review_at <= ?2 ORDER BY next_review_at ASC",
        )
        .bind(user_id.to_string())
        .bind(format_timestamp(now))
        .fetch_all(&self.pool)
        .await?;

        let cards = Self::rows_to_cards(rows)?;
        log_db_operation!(
            debug,
            "list_due_candidates",
            count = cards.len(),
            duration_ms = started.elapsed().as_millis() as u64
        );
        Ok(cards)
    }

    async fn record_review(
        &self,
        card: &Card,
        expected_version: i64,
        event: &ReviewEvent,
    ) -> EngineResult<Card> {
        let started = Instant::now();
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE cards
            SET easiness_factor = ?1, interval_days = ?2, repetitions = ?3, next_review_at = ?4,
                last_reviewed_at = ?5, times_reviewed = ?6, times_correct = ?7, times_incorrect = ?8,
                version = version + 1
            WHERE id = ?9 AND version = ?10
            "#,
        )
        .bind(card.memory.easiness_factor)
        .bind(i64::from(card.memory.interval_days))
        .bind(i64::from(card.memory.repetitions))
        .bind(format_timestamp(card.memory.next_review_at))
        .bind(card.memory.last_reviewed_at.map(format_timestamp))
        .bind(i64::from(card.stats.times_reviewed))
        .bind(i64::from(card.stats.times_correct))
        .bind(i64::from(card.stats.times_incorrect))
        .bind(card.id.to_string())
        .bind(expected_version)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return match self.get_card(card.id).await? {
                Some(_) => Err(EngineError::conflict("Card", card.id)),
                None => Err(EngineError::not_found("Card", card.id)),
            };
        }

        sqlx::query(
            "INSERT INTO review_events (id, card_id, quality, response_time_ms, reviewed_at, correct) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(event.id.to_string())
        .bind(event.card_id.to_string())
        .bind(i64::from(event.quality))
        .bind(
            i64::try_from(event.response_time_ms)
                .map_err(|_| EngineError::validation("Response time is out of range"))?,
        )
        .bind(format_timestamp(event.reviewed_at))
        .bind(event.correct)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        log_db_operation!(
            debug,
            "record_review",
            card_id = card.id,
            duration_ms = started.elapsed().as_millis() as u64
        );

        Ok(Card {
            version: expected_version + 1,
            ..card.clone()
        })
    }

    async fn set_archived(&self, id: Uuid, archived: bool) -> EngineResult<Option<Card>> {
        let result = sqlx::query("UPDATE cards SET archived = ?1, version = version + 1 WHERE id = ?2")
            .bind(archived)
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_card(id).await
    }

    async fn list_review_events(&self, card_id: Uuid) -> EngineResult<Vec<ReviewEvent>> {
        let rows = sqlx::query("SELECT * FROM review_events WHERE card_id = ?1 ORDER BY reviewed_at ASC")
            .bind(card_id.to_string())
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| -> EngineResult<ReviewEvent> {
                Ok(ReviewEvent {
                    id: parse_uuid(&row.try_get::<String, _>("id")?)?,
                    card_id: parse_uuid(&row.try_get::<String, _>("card_id")?)?,
                    quality: stored_quality(row.try_get("quality")?)?,
                    response_time_ms: u64::try_from(row.try_get::<i64, _>("response_time_ms")?)
                        .map_err(|e| EngineError::Storage(anyhow::anyhow!("invalid response time: {}", e)))?,
                    reviewed_at: parse_timestamp(&row.try_get::<String, _>("reviewed_at")?)?,
                    correct: row.try_get("correct")?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl AssessmentStore for Database {
    async fn insert_assessment(&self, assessment: &Assessment) -> EngineResult<()> {
        sqlx::query(
            "INSERT INTO assessments (id, user_id, title, passing_score, questions, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(assessment.id.to_string())
        .bind(assessment.user_id.to_string())
        .bind(&assessment.title)
        .bind(assessment.passing_score)
        .bind(serde_json::to_string(&assessment.questions)?)
        .bind(format_timestamp(assessment.created_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_assessment(&self, id: Uuid) -> EngineResult<Option<Assessment>> {
        let row = sqlx::query("SELECT * FROM assessments WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(Assessment {
            id: parse_uuid(&row.try_get::<String, _>("id")?)?,
            user_id: parse_uuid(&row.try_get::<String, _>("user_id")?)?,
            title: row.try_get("title")?,
            passing_score: row.try_get("passing_score")?,
            questions: serde_json::from_str(&row.try_get::<String, _>("questions")?)?,
            created_at: parse_timestamp(&row.try_get::<String, _>("created_at")?)?,
        }))
    }
}

#[async_trait]
impl AttemptStore for Database {
    async fn insert_attempt(&self, attempt: &Attempt) -> EngineResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO attempts (id, assessment_id, user_id, status, started_at, completed_at, result) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(attempt.id.to_string())
        .bind(attempt.assessment_id.to_string())
        .bind(attempt.user_id.to_string())
        .bind(attempt.status.as_str())
        .bind(format_timestamp(attempt.started_at))
        .bind(attempt.completed_at.map(format_timestamp))
        .bind(attempt.result.as_ref().map(serde_json::to_string).transpose()?)
        .execute(&mut *tx)
        .await?;

        for answer in &attempt.answers {
            sqlx::query(
                "INSERT INTO attempt_answers (attempt_id, question_id, value, time_spent_secs) VALUES (?1, ?2, ?3, ?4)",
            )
            .bind(attempt.id.to_string())
            .bind(&answer.question_id)
            .bind(serde_json::to_string(&answer.value)?)
            .bind(i64::from(answer.time_spent_secs))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_attempt(&self, id: Uuid) -> EngineResult<Option<Attempt>> {
        let row = sqlx::query("SELECT * FROM attempts WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(self.row_to_attempt(&row).await?)),
            None => Ok(None),
        }
    }

    async fn list_attempts(&self, user_id: Uuid) -> EngineResult<Vec<Attempt>> {
        let rows = sqlx::query("SELECT * FROM attempts WHERE user_id = ?1 ORDER BY started_at DESC")
            .bind(user_id.to_string())
            .fetch_all(&self.pool)
            .await?;

        let mut attempts = Vec::with_capacity(rows.len());
        for row in &rows {
            attempts.push(self.row_to_attempt(row).await?);
        }
        Ok(attempts)
    }

    async fn append_answer(&self, attempt_id: Uuid, answer: &SubmittedAnswer) -> EngineResult<()> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO attempt_answers (attempt_id, question_id, value, time_spent_secs)
            SELECT ?1, ?2, ?3, ?4
            WHERE EXISTS (SELECT 1 FROM attempts WHERE id = ?1 AND status = 'in_progress')
            "#,
        )
        .bind(attempt_id.to_string())
        .bind(&answer.question_id)
        .bind(serde_json::to_string(&answer.value)?)
        .bind(i64::from(answer.time_spent_secs))
        .execute(&self.pool)
        .await;

        let inserted = match inserted {
            Ok(result) => result,
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                return Err(EngineError::validation(format!(
                    "Question '{}' has already been answered in this attempt",
                    answer.question_id
                )));
            }
            Err(e) => return Err(e.into()),
        };

        if inserted.rows_affected() == 0 {
            return match self.attempt_status(attempt_id).await? {
                Some(_) => Err(EngineError::AlreadyGraded(attempt_id)),
                None => Err(EngineError::not_found("Attempt", attempt_id)),
            };
        }
        Ok(())
    }

    async fn mark_completed(
        &self,
        id: Uuid,
        result: &GradedResult,
        graded_answers: usize,
        completed_at: DateTime<Utc>,
    ) -> EngineResult<Attempt> {
        let graded_answers = i64::try_from(graded_answers)
            .map_err(|_| EngineError::validation("Too many answers"))?;
        let updated = sqlx::query(
            r#"
            UPDATE attempts SET status = 'completed', completed_at = ?1, result = ?2
            WHERE id = ?3 AND status = 'in_progress'
              AND (SELECT COUNT(*) FROM attempt_answers WHERE attempt_id = ?3) = ?4
            "#,
        )
        .bind(format_timestamp(completed_at))
        .bind(serde_json::to_string(result)?)
        .bind(id.to_string())
        .bind(graded_answers)
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            // an answer landed after grading read the attempt
            return match self.attempt_status(id).await? {
                Some(AttemptStatus::InProgress) => Err(EngineError::conflict("Attempt", id)),
                Some(AttemptStatus::Completed) => Err(EngineError::AlreadyGraded(id)),
                None => Err(EngineError::not_found("Attempt", id)),
            };
        }

        self.get_attempt(id)
            .await?
            .ok_or_else(|| EngineError::not_found("Attempt", id))
    }
}

#[async_trait]
impl SessionStore for Database {
    async fn insert_session(&self, session: &StudySession) -> EngineResult<()> {
        sqlx::query(
            r#"
            INSERT INTO study_sessions (id, user_id, started_at, ended_at, duration_minutes,
                                        cards_reviewed, cards_correct, focus_score)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(session.id.to_string())
        .bind(session.user_id.to_string())
        .bind(format_timestamp(session.started_at))
        .bind(session.ended_at.map(format_timestamp))
        .bind(session.duration_minutes)
        .bind(i64::from(session.cards_reviewed))
        .bind(i64::from(session.cards_correct))
        .bind(session.focus_score)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_session(&self, id: Uuid) -> EngineResult<Option<StudySession>> {
        let row = sqlx::query("SELECT * FROM study_sessions WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_session).transpose()
    }

    async fn list_by_user(&self, user_id: Uuid) -> EngineResult<Vec<StudySession>> {
        let rows = sqlx::query("SELECT * FROM study_sessions WHERE user_id = ?1 ORDER BY started_at DESC")
            .bind(user_id.to_string())
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::row_to_session).collect()
    }

    async fn finalize_session(&self, session: &StudySession) -> EngineResult<StudySession> {
        let updated = sqlx::query(
            r#"
            UPDATE study_sessions
            SET ended_at = ?1, duration_minutes = ?2, cards_reviewed = ?3, cards_correct = ?4, focus_score = ?5
            WHERE id = ?6 AND ended_at IS NULL
            "#,
        )
        .bind(session.ended_at.map(format_timestamp))
        .bind(session.duration_minutes)
        .bind(i64::from(session.cards_reviewed))
        .bind(i64::from(session.cards_correct))
        .bind(session.focus_score)
        .bind(session.id.to_string())
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return match self.get_session(session.id).await? {
                Some(_) => Err(EngineError::AlreadyFinalized(session.id)),
                None => Err(EngineError::not_found("Session", session.id)),
            };
        }
        Ok(session.clone())
    }
}

/// Fixed-width UTC timestamps so that text comparison in SQL orders by time.
fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(value: &str) -> EngineResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| EngineError::Storage(anyhow::anyhow!("invalid timestamp '{}': {}", value, e)))
}

fn stored_quality(value: i64) -> EngineResult<u8> {
    u8::try_from(value)
        .ok()
        .filter(|q| *q <= 5)
        .ok_or_else(|| EngineError::Storage(anyhow::anyhow!("invalid review quality: {}", value)))
}

fn parse_uuid(value: &str) -> EngineResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| EngineError::Storage(anyhow::anyhow!("invalid id '{}': {}", value, e)))
}

fn to_u32(column: &str, value: i64) -> EngineResult<u32> {
    u32::try_from(value)
        .map_err(|_| EngineError::Storage(anyhow::anyhow!("column '{}' out of range: {}", column, value)))
}
