pub mod api;
pub mod config;
pub mod content_client;
pub mod database;
pub mod due_selector;
pub mod engine;
pub mod errors;
pub mod grader;
pub mod logging;
pub mod models;
pub mod sm2_scheduler;
pub mod stores;
pub mod streak;
pub mod study_service;

pub use config::Config;
pub use content_client::{CardDraft, ContentClient, ContentGenerator};
pub use database::Database;
pub use due_selector::{select_due, DueSelector};
pub use engine::{focus_score, EngineConfig, SchedulingEngine, StudyAnalytics};
pub use errors::*;
pub use grader::{AnswerKey, AssessmentGrader};
pub use models::*;
pub use sm2_scheduler::{Quality, ReviewOutcome, Sm2Scheduler};
pub use stores::{Clock, FixedClock, SystemClock};
pub use streak::{compute_streak, StreakCalculator, StreakPolicy};
pub use study_service::StudyService;
