use anyhow::{anyhow, Result};
use chrono::FixedOffset;
use serde::Deserialize;
use std::env;
use std::time::Duration;
use tracing::{info, warn};

use crate::due_selector::DEFAULT_DUE_LIMIT;
use crate::engine::EngineConfig;
use crate::models::DEFAULT_PASSING_SCORE;
use crate::streak::{StreakCalculator, StreakPolicy};

// Import logging macros
use crate::{log_system_event, log_validation};

/// Largest UTC offset accepted for streak day boundaries.
const MAX_UTC_OFFSET_MINUTES: i32 = 18 * 60;

/// Complete application configuration loaded from environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub scheduler: SchedulerConfig,
    pub content: ContentServiceConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file_enabled: bool,
    pub console_enabled: bool,
    pub log_directory: String,
}

/// Tunables of the review scheduler, grader and streak calculator
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    pub due_limit: usize,
    pub default_passing_score: f64,
    pub streak_policy: StreakPolicy,
    pub streak_utc_offset_minutes: i32,
}

/// External content-generation service. Import endpoints are disabled without a URL.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentServiceConfig {
    pub url: Option<String>,
    pub timeout_secs: u64,
}

type Lookup<'a> = &'a dyn Fn(&str) -> Option<String>;

fn env_lookup(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn parse_or<T: std::str::FromStr>(lookup: Lookup<'_>, key: &str, default: T) -> Result<T> {
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| anyhow!("Invalid {} value: '{}'", key, raw)),
        None => Ok(default),
    }
}

impl Config {
    /// Load configuration from environment variables with sensible defaults
    pub fn from_env() -> Result<Self> {
        log_system_event!(config, "Loading application configuration from environment variables");

        let config = Self::from_lookup(&env_lookup)?;

        log_system_event!(config, "Configuration loaded successfully");
        config.log_configuration_summary();

        Ok(config)
    }

    pub fn from_lookup(lookup: Lookup<'_>) -> Result<Self> {
        Ok(Config {
            database: DatabaseConfig::from_lookup(lookup),
            server: ServerConfig::from_lookup(lookup)?,
            logging: LoggingConfig::from_lookup(lookup),
            scheduler: SchedulerConfig::from_lookup(lookup)?,
            content: ContentServiceConfig::from_lookup(lookup)?,
        })
    }

    /// Log a summary of loaded configuration (without sensitive data)
    fn log_configuration_summary(&self) {
        info!(
            database_url_masked = %mask_sensitive_data(&self.database.url),
            server_address = %format!("{}:{}", self.server.host, self.server.port),
            log_level = %self.logging.level,
            due_limit = self.scheduler.due_limit,
            streak_policy = ?self.scheduler.streak_policy,
            content_service = ?self.content.url.as_deref().map(mask_sensitive_data),
            "Configuration summary"
        );
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !self.database.url.starts_with("sqlite:") {
            return Err(anyhow!("DATABASE_URL must start with 'sqlite:'"));
        }

        if self.server.port == 0 {
            return Err(anyhow!("Server port must be greater than 0"));
        }

        if self.scheduler.due_limit == 0 {
            return Err(anyhow!("DUE_CARD_LIMIT must be greater than 0"));
        }

        if !(0.0..=100.0).contains(&self.scheduler.default_passing_score) {
            return Err(anyhow!("DEFAULT_PASSING_SCORE must be between 0 and 100"));
        }

        if self.scheduler.streak_utc_offset_minutes.abs() > MAX_UTC_OFFSET_MINUTES {
            return Err(anyhow!(
                "STREAK_UTC_OFFSET_MINUTES must be within +/-{}",
                MAX_UTC_OFFSET_MINUTES
            ));
        }

        match &self.content.url {
            Some(url) if !url.starts_with("http://") && !url.starts_with("https://") => {
                return Err(anyhow!("CONTENT_SERVICE_URL must be an http(s) URL"));
            }
            None => warn!("CONTENT_SERVICE_URL not set - content import endpoints are disabled"),
            _ => {}
        }

        if !["trace", "debug", "info", "warn", "error"]
            .iter()
            .any(|level| self.logging.level.to_lowercase().starts_with(level))
        {
            warn!("Unusual log filter '{}', falling back to defaults where invalid", self.logging.level);
        }

        log_validation!(success, "configuration", "Configuration validation completed successfully");
        Ok(())
    }

    /// Builds the engine settings described by the scheduler section.
    pub fn engine_config(&self) -> Result<EngineConfig> {
        let offset = FixedOffset::east_opt(self.scheduler.streak_utc_offset_minutes * 60)
            .ok_or_else(|| anyhow!("Invalid UTC offset: {} minutes", self.scheduler.streak_utc_offset_minutes))?;

        Ok(EngineConfig {
            due_limit: self.scheduler.due_limit,
            default_passing_score: self.scheduler.default_passing_score,
            streak: StreakCalculator::with_offset(self.scheduler.streak_policy, offset),
        })
    }
}

impl DatabaseConfig {
    fn from_lookup(lookup: Lookup<'_>) -> Self {
        let url = lookup("DATABASE_URL").unwrap_or_else(|| "sqlite:study_pal.db".to_string());
        DatabaseConfig { url }
    }
}

impl ServerConfig {
    fn from_lookup(lookup: Lookup<'_>) -> Result<Self> {
        let port_str = lookup("PORT").unwrap_or_else(|| "3000".to_string());
        let port = port_str
            .parse::<u16>()
            .map_err(|_| anyhow!("Invalid PORT value: '{}'. Must be a number between 1-65535", port_str))?;

        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string());

        Ok(ServerConfig { port, host })
    }
}

impl LoggingConfig {
    fn from_lookup(lookup: Lookup<'_>) -> Self {
        let level = lookup("RUST_LOG").unwrap_or_else(|| "info,study_pal=debug".to_string());

        let file_enabled = lookup("LOG_FILE_ENABLED")
            .and_then(|v| v.parse::<bool>().ok())
            .unwrap_or(true);

        let console_enabled = lookup("LOG_CONSOLE_ENABLED")
            .and_then(|v| v.parse::<bool>().ok())
            .unwrap_or(true);

        let log_directory = lookup("LOG_DIRECTORY").unwrap_or_else(|| "logs".to_string());

        LoggingConfig {
            level,
            file_enabled,
            console_enabled,
            log_directory,
        }
    }
}

impl SchedulerConfig {
    fn from_lookup(lookup: Lookup<'_>) -> Result<Self> {
        let streak_policy = match lookup("STREAK_POLICY") {
            Some(raw) => raw.parse::<StreakPolicy>().map_err(|e| anyhow!(e.to_string()))?,
            None => StreakPolicy::default(),
        };

        Ok(SchedulerConfig {
            due_limit: parse_or(lookup, "DUE_CARD_LIMIT", DEFAULT_DUE_LIMIT)?,
            default_passing_score: parse_or(lookup, "DEFAULT_PASSING_SCORE", DEFAULT_PASSING_SCORE)?,
            streak_policy,
            streak_utc_offset_minutes: parse_or(lookup, "STREAK_UTC_OFFSET_MINUTES", 0)?,
        })
    }
}

impl ContentServiceConfig {
    fn from_lookup(lookup: Lookup<'_>) -> Result<Self> {
        Ok(ContentServiceConfig {
            url: lookup("CONTENT_SERVICE_URL").filter(|url| !url.trim().is_empty()),
            timeout_secs: parse_or(lookup, "CONTENT_SERVICE_TIMEOUT_SECS", 30)?,
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Mask sensitive data in configuration for safe logging
pub fn mask_sensitive_data(data: &str) -> String {
    let chars: Vec<char> = data.chars().collect();
    if chars.len() <= 8 {
        "*".repeat(chars.len())
    } else {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}***{}", head, tail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_mask_sensitive_data() {
        assert_eq!(mask_sensitive_data("short"), "*****");
        assert_eq!(mask_sensitive_data("sqlite:study_pal.db"), "sqli***l.db");
        assert_eq!(mask_sensitive_data("http://nlp.internal:8000"), "http***8000");
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(&lookup_from(&[])).unwrap();
        assert_eq!(config.database.url, "sqlite:study_pal.db");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.scheduler.due_limit, 50);
        assert_eq!(config.scheduler.default_passing_score, 70.0);
        assert_eq!(config.scheduler.streak_policy, StreakPolicy::AllowYesterday);
        assert_eq!(config.content.url, None);
        assert_eq!(config.content.timeout(), Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_scheduler_overrides() {
        let config = Config::from_lookup(&lookup_from(&[
            ("DUE_CARD_LIMIT", "20"),
            ("DEFAULT_PASSING_SCORE", "80"),
            ("STREAK_POLICY", "require_today"),
            ("STREAK_UTC_OFFSET_MINUTES", "-300"),
        ]))
        .unwrap();

        let engine = config.engine_config().unwrap();
        assert_eq!(engine.due_limit, 20);
        assert_eq!(engine.default_passing_score, 80.0);
        assert_eq!(engine.streak.policy(), StreakPolicy::RequireToday);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(Config::from_lookup(&lookup_from(&[("PORT", "not-a-number")])).is_err());
        assert!(Config::from_lookup(&lookup_from(&[("STREAK_POLICY", "weekly")])).is_err());
        assert!(Config::from_lookup(&lookup_from(&[("DUE_CARD_LIMIT", "-1")])).is_err());
    }

    #[test]
    fn test_config_validation() {
        let config = Config::from_lookup(&lookup_from(&[(
            "CONTENT_SERVICE_URL",
            "http://localhost:8000",
        )]))
        .unwrap();
        assert!(config.validate().is_ok());

        let mut invalid = config.clone();
        invalid.server.port = 0;
        assert!(invalid.validate().is_err());

        let mut invalid = config.clone();
        invalid.scheduler.default_passing_score = 101.0;
        assert!(invalid.validate().is_err());

        let mut invalid = config.clone();
        invalid.content.url = Some("localhost:8000".to_string());
        assert!(invalid.validate().is_err());

        let mut invalid = config;
        invalid.database.url = "postgres://localhost/db".to_string();
        assert!(invalid.validate().is_err());
    }
}
